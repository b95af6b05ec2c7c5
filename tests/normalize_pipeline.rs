use std::fs;

use placefinder::config::NormalizeOptions;
use placefinder::models::Record;
use placefinder::normalize::normalize_file;
use placefinder::utils::{load_table, RecordSink};

fn record(url: &str, name: &str) -> Record {
    Record {
        name: name.to_string(),
        profile_url: url.to_string(),
        timestamp: "2024-03-01 10:00:00".to_string(),
        ..Record::new("restaurants", "Cairo")
    }
}

fn write_raw(path: &str, records: &[Record]) {
    let mut sink = RecordSink::open(path).unwrap();
    for r in records {
        sink.append(r).unwrap();
    }
}

fn raw_batch() -> Vec<Record> {
    let mut first = record(
        "https://www.google.com/maps/place/Koshary+Abou+Tarek/data=!4m7",
        "Abou Tarek",
    );
    first.category_line = "Koshary restaurant".to_string();
    first.address_line = "16 Maarouf Street, Cairo".to_string();
    first.phone = "02 2577 5935".to_string();
    first.rating = "4.6 stars".to_string();
    first.reviews_count = "(1,234)".to_string();
    first.website = "aboutarek.example?utm_source=maps".to_string();
    first.social_links = "facebook.com/aboutarek; https://example.com/blog".to_string();
    first.photo_urls =
        "https://lh5.googleusercontent.com/p/p1=w100,https://lh5.googleusercontent.com/p/p2".to_string();

    let duplicate = record(
        "HTTPS://WWW.GOOGLE.COM/MAPS/PLACE/KOSHARY+ABOU+TAREK/DATA=!4M7",
        "Abou Tarek again",
    );

    let mut third = record("https://www.google.com/maps/place/Kebab+House/data=!4m7", "Kebab House");
    third.category_line = "Restaurant · 12 Tahrir Street".to_string();
    third.address_line = "Minimum order 150 EGP".to_string();
    third.photo_urls =
        "https://lh5.googleusercontent.com/p/P1=w200,https://lh5.googleusercontent.com/p/p3".to_string();

    let mut fourth = record("https://www.google.com/maps/place/Grill+Corner/data=!4m7", "Grill Corner");
    fourth.category_line = "Delivery 20 EGP · 12 Tahrir Street".to_string();
    fourth.address_line = "Minimum order 150 EGP".to_string();

    vec![first, duplicate, third, fourth]
}

#[test]
fn cleans_dedups_and_recovers_fields() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv").to_str().unwrap().to_string();
    let output = dir.path().join("clean.csv").to_str().unwrap().to_string();
    write_raw(&input, &raw_batch());

    let report = normalize_file(&input, &output, &NormalizeOptions::default()).unwrap();
    assert_eq!(report.input_rows, 4);
    assert_eq!(report.written, 3);
    assert_eq!(report.duplicates_dropped, 1);

    let table = load_table(&output).unwrap();
    assert_eq!(table.headers.len(), 22);
    assert_eq!(table.headers[21], "correct_name");

    let first = &table.rows[0];
    assert_eq!(first.record.name, "Abou Tarek");
    assert_eq!(first.correct_name, "Koshary Abou Tarek");
    assert_eq!(first.phone_e164, "+20225775935");
    assert_eq!(first.record.rating, "4.6");
    assert_eq!(first.record.reviews_count, "1234");
    assert_eq!(first.record.website, "http://aboutarek.example");
    assert_eq!(first.record.social_links, "http://facebook.com/aboutarek");
    assert_eq!(first.record.photo_urls, "https://lh5.googleusercontent.com/p/p1");
    assert_eq!(first.column("address_clean_source").as_deref(), Some("original"));
    assert_eq!(first.column("price_is_plus").as_deref(), Some("FALSE"));

    let kebab = &table.rows[1];
    assert_eq!(kebab.record.address_line, "12 Tahrir Street");
    assert_eq!(kebab.column("address_clean_source").as_deref(), Some("recovered"));
    assert_eq!(kebab.price_text, "Minimum order 150 EGP");
    assert_eq!(kebab.price_min, "150");
    assert_eq!(kebab.price_max, "150");
    // p1 is already claimed by the first row.
    assert_eq!(kebab.record.photo_urls, "https://lh5.googleusercontent.com/p/p3");
}

#[test]
fn second_pass_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv").to_str().unwrap().to_string();
    let once = dir.path().join("once.csv").to_str().unwrap().to_string();
    let twice = dir.path().join("twice.csv").to_str().unwrap().to_string();
    write_raw(&input, &raw_batch());

    normalize_file(&input, &once, &NormalizeOptions::default()).unwrap();
    let report = normalize_file(&once, &twice, &NormalizeOptions::default()).unwrap();

    assert_eq!(report.duplicates_dropped, 0);
    // The recovered address must not let the category line price win on the second pass.
    let grill = &load_table(&twice).unwrap().rows[2];
    assert_eq!(grill.record.address_line, "12 Tahrir Street");
    assert_eq!(grill.price_text, "Minimum order 150 EGP");
    assert_eq!((grill.price_min.as_str(), grill.price_max.as_str()), ("150", "150"));
    assert_eq!(fs::read(&once).unwrap(), fs::read(&twice).unwrap());
}

#[test]
fn first_occurrence_wins_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv").to_str().unwrap().to_string();
    let output = dir.path().join("clean.csv").to_str().unwrap().to_string();
    write_raw(
        &input,
        &[record("https://x/Place/A", "First"), record("HTTPS://X/PLACE/A", "Second")],
    );

    normalize_file(&input, &output, &NormalizeOptions::default()).unwrap();
    let table = load_table(&output).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].record.name, "First");
}

#[test]
fn empty_names_dropped_only_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv").to_str().unwrap().to_string();
    let output = dir.path().join("clean.csv").to_str().unwrap().to_string();
    let mut nameless = record("https://x/maps/search/nothing", "");
    nameless.address_line = "Zamalek".to_string();
    // The name can still be recovered from a place link.
    let recoverable = record("https://www.google.com/maps/place/Cafe+Riche/data=!4m7", "");
    write_raw(&input, &[nameless, recoverable]);

    let kept = normalize_file(&input, &output, &NormalizeOptions::default()).unwrap();
    assert_eq!(kept.written, 2);

    let options = NormalizeOptions {
        drop_empty_name: true,
        ..Default::default()
    };
    let report = normalize_file(&input, &output, &options).unwrap();
    assert_eq!(report.empty_name_dropped, 1);
    let table = load_table(&output).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].resolved_name(), "Cafe Riche");
}

#[test]
fn unknown_columns_survive_cleaning() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.csv");
    let output = dir.path().join("clean.csv");
    fs::write(
        &input,
        "\u{feff}owner_note,name,profile_url,phone\n\u{00A0}call first ,Cafe,https://x/place/A,01012345678\n",
    )
    .unwrap();

    normalize_file(
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        &NormalizeOptions::default(),
    )
    .unwrap();
    let table = load_table(output.to_str().unwrap()).unwrap();
    assert_eq!(table.headers[..4], ["owner_note", "name", "profile_url", "phone"]);
    assert_eq!(table.rows[0].column("owner_note").as_deref(), Some("call first"));
    assert_eq!(table.rows[0].phone_e164, "+201012345678");
}
