//! Batch cleaning and de-duplication of harvested records.
//!
//! Per-record steps are independent and run in parallel. Photo claims and
//! de-duplication depend on batch order and are committed sequentially.

use std::collections::HashSet;

use anyhow::Result;
use log::info;
use rayon::prelude::*;

use crate::config::NormalizeOptions;
use crate::models::{AddressSource, CleanedRecord};
use crate::patterns::{
    canonicalize, clean_rating, clean_reviews, extract_price, looks_like_address, looks_like_price,
    name_from_profile_url, normalize_social_links, normalize_website, photo_candidates,
    photo_identity, split_category_line, PhoneRules,
};
use crate::utils::{load_table, output_headers, write_table};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub input_rows: usize,
    pub written: usize,
    pub duplicates_dropped: usize,
    pub empty_name_dropped: usize,
}

fn canonicalize_fields(row: &mut CleanedRecord) {
    for column in crate::models::RECORD_FIELDS {
        if let Some(slot) = row.record.field_mut(column) {
            *slot = canonicalize(slot);
        }
    }
    for value in [
        &mut row.price_text,
        &mut row.price_min,
        &mut row.price_max,
        &mut row.phone_e164,
        &mut row.correct_name,
    ] {
        *value = canonicalize(value);
    }
    for (_, value) in row.extra.iter_mut() {
        *value = canonicalize(value);
    }
}

/// Address recovery and price extraction for one row.
fn fix_address_and_price(row: &mut CleanedRecord) {
    let address = row.record.address_line.clone();
    let category_line = row.record.category_line.clone();
    let address_is_price = looks_like_price(&address);

    let mut recovered = None;
    if address.is_empty() || address_is_price {
        let (left, right) = split_category_line(&category_line);
        if looks_like_address(&right) {
            recovered = Some(right);
        } else if looks_like_address(&left) {
            recovered = Some(left);
        }
    }

    // A recovered address or stored price means the category line was already consulted.
    let settled = row.address_clean_source == Some(AddressSource::Recovered)
        || !row.price_text.is_empty()
        || !row.price_min.is_empty();
    let price = if address_is_price {
        extract_price(&address)
    } else if !settled && looks_like_price(&category_line) {
        extract_price(&category_line)
    } else {
        None
    };
    if let Some(price) = price {
        row.price_text = price.text;
        row.price_min = price.min;
        row.price_max = price.max;
        row.price_is_plus = price.plus;
    }

    row.address_clean_source = Some(match recovered {
        Some(found) => {
            row.record.address_line = found;
            AddressSource::Recovered
        }
        None if row.record.address_line.is_empty() => AddressSource::Empty,
        None => row.address_clean_source.unwrap_or(AddressSource::Original),
    });
}

/// Every order-independent cleaning step for a single row.
pub fn clean_record(mut row: CleanedRecord, phone_rules: &PhoneRules) -> CleanedRecord {
    canonicalize_fields(&mut row);

    row.record.rating = clean_rating(&row.record.rating);
    row.record.reviews_count = clean_reviews(&row.record.reviews_count);
    row.record.website = normalize_website(&row.record.website);
    row.record.social_links = normalize_social_links(&row.record.social_links);

    let phone = phone_rules.normalize(&row.record.phone);
    if !phone.is_empty() {
        row.phone_e164 = phone;
    }

    fix_address_and_price(&mut row);

    let parsed_name = name_from_profile_url(&row.record.profile_url);
    if !parsed_name.is_empty() {
        row.correct_name = parsed_name;
    }
    row
}

/// Batch-wide set of claimed photo identities.
#[derive(Debug, Default)]
pub struct PhotoClaims {
    claimed: HashSet<String>,
}

impl PhotoClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the first candidate no earlier row has claimed and claims it.
    /// Falls back to the first candidate when all are taken.
    pub fn claim(&mut self, raw: &str) -> String {
        let candidates = photo_candidates(raw);
        let mut local = HashSet::new();
        for candidate in &candidates {
            let Some((base, key)) = photo_identity(candidate) else {
                continue;
            };
            if !local.insert(key.clone()) {
                continue;
            }
            if self.claimed.insert(key) {
                return base;
            }
        }
        candidates
            .first()
            .and_then(|first| photo_identity(first))
            .map(|(base, _)| base)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Url(String),
    NameAddress(String),
    Name(String),
    Row(String),
}

pub fn dedup_key(row: &CleanedRecord) -> DedupKey {
    let url = row.record.profile_url.trim().to_lowercase();
    if !url.is_empty() {
        return DedupKey::Url(url);
    }
    let name = row.record.name.trim().to_lowercase();
    let address = row.record.address_line.trim().to_lowercase();
    match (name.is_empty(), address.is_empty()) {
        (false, false) => DedupKey::NameAddress(format!("{}|{}", name, address)),
        (false, true) => DedupKey::Name(name),
        _ => {
            let structural = serde_json::to_string(&(&row.record, &row.extra))
                .unwrap_or_else(|_| format!("{:?}", row));
            DedupKey::Row(structural)
        }
    }
}

/// Cleans a whole batch, preserving input order.
pub fn normalize_batch(rows: Vec<CleanedRecord>, options: &NormalizeOptions) -> (Vec<CleanedRecord>, NormalizeReport) {
    let phone_rules = PhoneRules::new(&options.phone);
    let mut report = NormalizeReport {
        input_rows: rows.len(),
        ..Default::default()
    };

    let cleaned: Vec<CleanedRecord> = rows
        .into_par_iter()
        .map(|row| clean_record(row, &phone_rules))
        .collect();

    let mut photos = PhotoClaims::new();
    let mut keys = HashSet::new();
    let mut output = Vec::with_capacity(cleaned.len());
    for mut row in cleaned {
        row.record.photo_urls = photos.claim(&row.record.photo_urls);

        if !keys.insert(dedup_key(&row)) {
            report.duplicates_dropped += 1;
            continue;
        }
        if options.drop_empty_name && row.resolved_name().trim().is_empty() {
            report.empty_name_dropped += 1;
            continue;
        }
        output.push(row);
    }
    report.written = output.len();
    (output, report)
}

/// Reads `input`, cleans it and writes the result to `output`.
pub fn normalize_file(input: &str, output: &str, options: &NormalizeOptions) -> Result<NormalizeReport> {
    let table = load_table(input)?;
    let headers = output_headers(&table.headers);
    let (rows, report) = normalize_batch(table.rows, options);
    write_table(output, &headers, &rows)?;
    info!(
        "Cleaned {} rows -> {} written ({} duplicates, {} without name) to {}",
        report.input_rows,
        report.written,
        report.duplicates_dropped,
        report.empty_name_dropped,
        output
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn row(url: &str, name: &str, address: &str, category_line: &str) -> CleanedRecord {
        CleanedRecord::from_record(Record {
            name: name.to_string(),
            profile_url: url.to_string(),
            address_line: address.to_string(),
            category_line: category_line.to_string(),
            ..Record::new("restaurants", "Cairo")
        })
    }

    #[test]
    fn price_like_address_is_recovered_from_category_line() {
        let cleaned = clean_record(
            row("", "Kebab", "Minimum order 150 EGP", "Restaurant · 12 Tahrir Street"),
            &PhoneRules::default(),
        );
        assert_eq!(cleaned.record.address_line, "12 Tahrir Street");
        assert_eq!(cleaned.address_clean_source, Some(AddressSource::Recovered));
        assert_eq!(cleaned.price_text, "Minimum order 150 EGP");
        assert_eq!((cleaned.price_min.as_str(), cleaned.price_max.as_str()), ("150", "150"));
        assert!(!cleaned.price_is_plus);
    }

    #[test]
    fn price_from_category_line_keeps_original_address() {
        let cleaned = clean_record(
            row("", "Pizza", "9 Road 9, Maadi", "Pizza · From 80+ LE"),
            &PhoneRules::default(),
        );
        assert_eq!(cleaned.record.address_line, "9 Road 9, Maadi");
        assert_eq!(cleaned.address_clean_source, Some(AddressSource::Original));
        assert_eq!(cleaned.price_min, "80");
        assert!(cleaned.price_is_plus);
    }

    #[test]
    fn empty_address_without_candidates_is_marked_empty() {
        let cleaned = clean_record(row("", "Kiosk", "", "Kiosk"), &PhoneRules::default());
        assert_eq!(cleaned.address_clean_source, Some(AddressSource::Empty));
    }

    #[test]
    fn second_pass_keeps_recovered_provenance_and_price() {
        let rules = PhoneRules::default();
        let first = clean_record(
            row("", "Kebab", "Minimum order 150 EGP", "Restaurant · 12 Tahrir Street"),
            &rules,
        );
        let second = clean_record(first.clone(), &rules);
        assert_eq!(second, first);
    }

    #[test]
    fn stored_price_is_not_replaced_by_category_line_price() {
        let rules = PhoneRules::default();
        let first = clean_record(
            row("", "Grill", "Minimum order 150 EGP", "Delivery 20 EGP · 12 Tahrir Street"),
            &rules,
        );
        assert_eq!(first.record.address_line, "12 Tahrir Street");
        assert_eq!(first.price_min, "150");

        let second = clean_record(first.clone(), &rules);
        assert_eq!(second.price_text, "Minimum order 150 EGP");
        assert_eq!(second, first);
    }

    #[test]
    fn correct_name_comes_from_profile_url() {
        let cleaned = clean_record(
            row("https://www.google.com/maps/place/Abou+Tarek/data=!3m1", "abou tarek koshary", "", ""),
            &PhoneRules::default(),
        );
        assert_eq!(cleaned.correct_name, "Abou Tarek");
        assert_eq!(cleaned.resolved_name(), "Abou Tarek");
    }

    #[test]
    fn photo_claims_prefer_unclaimed_candidates() {
        let mut claims = PhotoClaims::new();
        assert_eq!(
            claims.claim("https://lh3.example/p1=w100, https://lh3.example/p2"),
            "https://lh3.example/p1"
        );
        assert_eq!(
            claims.claim("https://lh3.example/P1?x=1,https://lh3.example/p3"),
            "https://lh3.example/p3"
        );
        assert_eq!(claims.claim("https://lh3.example/p1"), "https://lh3.example/p1");
        assert_eq!(claims.claim(""), "");
        assert_eq!(claims.len(), 2);
    }

    #[test]
    fn dedup_key_precedence() {
        assert_eq!(
            dedup_key(&row("HTTPS://X/PLACE/A", "A", "", "")),
            DedupKey::Url("https://x/place/a".to_string())
        );
        assert_eq!(
            dedup_key(&row("", "Cafe", "Zamalek", "")),
            DedupKey::NameAddress("cafe|zamalek".to_string())
        );
        assert_eq!(dedup_key(&row("", "Cafe", "", "")), DedupKey::Name("cafe".to_string()));
        assert!(matches!(dedup_key(&row("", "", "", "")), DedupKey::Row(_)));
    }

    #[test]
    fn batch_drops_duplicates_and_optionally_nameless_rows() {
        let rows = vec![
            row("https://x/Place/A", "First", "", ""),
            row("HTTPS://X/PLACE/A", "Second", "", ""),
            row("", "", "", ""),
        ];
        let options = NormalizeOptions {
            drop_empty_name: true,
            ..Default::default()
        };
        let (out, report) = normalize_batch(rows, &options);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.name, "First");
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(report.empty_name_dropped, 1);
        assert_eq!(report.input_rows, 3);
        assert_eq!(report.written, 1);
    }
}
