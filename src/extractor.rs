use std::collections::HashSet;
use std::time::Duration;

use chrono::Local;
use log::debug;
use scraper::{ElementRef, Html, Selector};

use crate::config::Pacing;
use crate::error::HarvestResult;
use crate::models::Record;
use crate::patterns::{
    clean_rating, clean_reviews, collapse_whitespace, is_social_link, looks_like_hours,
    looks_like_rating_line, strip_address_label, PhoneRules,
};
use crate::selectors;
use crate::session::Page;
use crate::wait::{pause, wait_until};

/// Fields readable from a result card without opening it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicFields {
    pub name: String,
    pub profile_url: String,
    pub category_line: String,
    pub address_line: String,
    pub opening_hours: String,
    pub phone: String,
}

/// Fields from the opened detail pane. Empty strings mean "not shown".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub name: String,
    pub rating: String,
    pub reviews_count: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub plus_code: String,
    pub opening_hours: String,
    pub social_links: String,
    pub photo_urls: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySeen,
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Written(Record),
    Skipped(SkipReason),
}

/// Where a record is harvested from: the query pair plus detail-pane timing.
pub struct ItemContext<'a> {
    pub category: &'a str,
    pub location: &'a str,
    pub phone_rules: &'a PhoneRules,
    pub detail_timeout: Duration,
    pub poll_interval: Duration,
    pub pacing: &'a Pacing,
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn attr(element: &ElementRef, name: &str) -> String {
    element.value().attr(name).unwrap_or_default().trim().to_string()
}

fn first_text(document: &Html, candidates: &[&str]) -> String {
    for selector_str in candidates {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let text = element_text(&element);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

fn first_attr(document: &Html, candidates: &[&str], name: &str) -> String {
    for selector_str in candidates {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let value = attr(&element, name);
                if !value.is_empty() {
                    return value;
                }
            }
        }
    }
    String::new()
}

fn split_once_on_separator(line: &str) -> Option<(String, String)> {
    let (left, right) = line.split_once(|c: char| c == '·' || c == '•')?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        None
    } else {
        Some((left.to_string(), right.to_string()))
    }
}

/// Parses the `outerHTML` of one result card.
pub fn extract_basic(card_html: &str, phone_rules: &PhoneRules) -> BasicFields {
    let document = Html::parse_document(card_html);
    let mut fields = BasicFields::default();

    if let Ok(anchor) = Selector::parse(selectors::CARD_ANCHOR_CSS) {
        if let Some(a) = document.select(&anchor).next() {
            fields.profile_url = attr(&a, "href");
            fields.name = collapse_whitespace(&attr(&a, "aria-label"));
        }
    }
    if fields.name.is_empty() {
        fields.name = first_text(&document, &[selectors::CARD_TITLE_CSS]);
    }

    let texts: Vec<String> = match Selector::parse(selectors::INFO_ROW_CSS) {
        Ok(rows) => document
            .select(&rows)
            .filter(|row| row.select(&rows).next().is_none())
            .map(|row| element_text(&row))
            .filter(|t| !t.is_empty() && !looks_like_rating_line(t))
            .collect(),
        Err(_) => Vec::new(),
    };

    for text in &texts {
        if fields.opening_hours.is_empty() && looks_like_hours(text) {
            fields.opening_hours = text.clone();
        }
        if fields.phone.is_empty() {
            fields.phone = phone_rules.extract(text);
        }
    }
    if let Some((category, address)) = texts.iter().find_map(|t| split_once_on_separator(t)) {
        fields.category_line = category;
        fields.address_line = address;
    }
    if fields.category_line.is_empty() {
        if let Some(first) = texts.first() {
            fields.category_line = first.clone();
        }
    }
    if fields.address_line.is_empty() {
        if let Some(second) = texts.get(1) {
            fields.address_line = second.clone();
        }
    }
    fields
}

/// Parses a snapshot of the detail pane.
pub fn extract_detail(detail_html: &str) -> DetailFields {
    let document = Html::parse_document(detail_html);
    let mut fields = DetailFields {
        name: first_text(&document, &selectors::DETAIL_NAME_CSS),
        ..Default::default()
    };

    fields.rating = clean_rating(&first_attr(&document, &selectors::DETAIL_RATING_CSS, "aria-label"));
    if fields.rating.is_empty() {
        fields.rating = clean_rating(&first_text(&document, &selectors::DETAIL_RATING_TEXT_CSS));
    }
    fields.reviews_count = clean_reviews(&first_attr(&document, &selectors::DETAIL_REVIEWS_CSS, "aria-label"));

    let address = first_attr(&document, &selectors::DETAIL_ADDRESS_CSS, "aria-label");
    let address = if address.is_empty() {
        first_text(&document, &selectors::DETAIL_ADDRESS_CSS)
    } else {
        address
    };
    fields.address = strip_address_label(&collapse_whitespace(&address));

    let phone_button = first_attr(&document, &[selectors::DETAIL_PHONE_CSS], "data-item-id");
    fields.phone = match phone_button.strip_prefix("phone:tel:") {
        Some(number) => number.to_string(),
        None => first_attr(&document, &[selectors::DETAIL_TEL_LINK_CSS], "href")
            .trim_start_matches("tel:")
            .to_string(),
    };

    fields.website = first_attr(&document, &selectors::DETAIL_WEBSITE_CSS, "href");

    let plus_code = first_text(&document, &[selectors::DETAIL_PLUS_CODE_CSS]);
    fields.plus_code = if plus_code.is_empty() {
        let label = first_attr(&document, &[selectors::DETAIL_PLUS_CODE_CSS], "aria-label");
        label
            .split_once(':')
            .map(|(_, code)| code.trim().to_string())
            .unwrap_or(label)
    } else {
        plus_code
    };

    fields.opening_hours = detail_hours(&document);
    fields.social_links = collect_social_links(&document).join(", ");
    fields.photo_urls = collect_photos(&document).join(",");
    fields
}

fn detail_hours(document: &Html) -> String {
    if let Ok(labelled) = Selector::parse(selectors::DETAIL_LABELLED_CSS) {
        for element in document.select(&labelled) {
            let label = collapse_whitespace(&attr(&element, "aria-label"));
            if label.chars().count() <= 120 && looks_like_hours(&label) {
                return label;
            }
        }
    }
    if let Ok(spans) = Selector::parse(selectors::DETAIL_SPAN_CSS) {
        for element in document.select(&spans) {
            let text = element_text(&element);
            if !text.is_empty() && text.chars().count() <= 120 && looks_like_hours(&text) {
                return text;
            }
        }
    }
    String::new()
}

fn collect_social_links(document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    if let Ok(anchors) = Selector::parse(selectors::DETAIL_LINK_CSS) {
        for element in document.select(&anchors) {
            let href = attr(&element, "href");
            if is_social_link(&href) && seen.insert(href.to_lowercase()) {
                links.push(href);
            }
        }
    }
    links
}

fn collect_photos(document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut photos = Vec::new();
    if let Ok(images) = Selector::parse(selectors::DETAIL_PHOTO_CSS) {
        for element in document.select(&images) {
            let src = attr(&element, "src");
            if selectors::PHOTO_HOSTS.iter().any(|h| src.contains(h)) && seen.insert(src.clone()) {
                photos.push(src);
            }
        }
    }
    photos
}

fn prefer(detail: String, basic: String) -> String {
    if detail.is_empty() {
        basic
    } else {
        detail
    }
}

/// Combines both phases; non-empty detail values win field by field.
pub fn merge(category: &str, location: &str, basic: BasicFields, detail: DetailFields) -> Record {
    let address = prefer(detail.address, basic.address_line);
    Record {
        category: category.to_string(),
        query_location: location.to_string(),
        name: prefer(detail.name, basic.name),
        category_line: basic.category_line,
        address_line: strip_address_label(&address),
        plus_code: detail.plus_code,
        phone: prefer(detail.phone, basic.phone),
        website: detail.website,
        profile_url: basic.profile_url,
        rating: detail.rating,
        reviews_count: detail.reviews_count,
        opening_hours: prefer(detail.opening_hours, basic.opening_hours),
        social_links: detail.social_links,
        photo_urls: detail.photo_urls,
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Opens the item's detail pane and parses it once it is ready or the wait runs out.
pub fn read_detail<P: Page + ?Sized>(page: &mut P, index: usize, ctx: &ItemContext) -> HarvestResult<DetailFields> {
    pause(ctx.pacing.before_click);
    page.open_item(index)?;
    let ready = wait_until(ctx.detail_timeout, ctx.poll_interval, || page.detail_ready())?;
    if !ready {
        debug!("Detail pane for card {} not ready after {:?}", index, ctx.detail_timeout);
    }
    pause(ctx.pacing.after_detail_open);
    Ok(extract_detail(&page.detail_html()?))
}

/// Reads one result card into a record.
///
/// Item-level failures become `Skipped(Unreadable)`; only session-level failures are returned as errors.
pub fn extract_item<P: Page + ?Sized>(
    page: &mut P,
    index: usize,
    seen: &HashSet<String>,
    ctx: &ItemContext,
) -> HarvestResult<ItemOutcome> {
    let card_html = match page.item_html(index) {
        Ok(html) => html,
        Err(e) if e.is_session_fatal() => return Err(e),
        Err(e) => return Ok(ItemOutcome::Skipped(SkipReason::Unreadable(e.to_string()))),
    };
    let basic = extract_basic(&card_html, ctx.phone_rules);
    if !basic.profile_url.is_empty() && seen.contains(&basic.profile_url) {
        return Ok(ItemOutcome::Skipped(SkipReason::AlreadySeen));
    }

    let detail = match read_detail(page, index, ctx) {
        Ok(detail) => detail,
        Err(e) if e.is_session_fatal() => return Err(e),
        Err(e) => {
            debug!("Detail phase failed for card {}: {}", index, e);
            DetailFields::default()
        }
    };

    let record = merge(ctx.category, ctx.location, basic, detail);
    if record.profile_url.is_empty() && record.name.is_empty() {
        return Ok(ItemOutcome::Skipped(SkipReason::Unreadable(format!(
            "card {} has neither link nor name",
            index
        ))));
    }
    Ok(ItemOutcome::Written(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div class="Nv2PK">
          <a class="hfpxzc" href="https://www.google.com/maps/place/Cafe+Riche/data=!4m7" aria-label="Cafe Riche"></a>
          <div class="qBF1Pd">Cafe Riche (title)</div>
          <div class="W4Efsd">
            <div class="W4Efsd"><span>4.5</span><span>(1,234)</span></div>
            <div class="W4Efsd"><span>Cafe</span><span>·</span><span>17 Talaat Harb Street</span></div>
            <div class="W4Efsd"><span>Open</span><span>⋅ Closes 11 PM</span><span>· 010 1234 5678</span></div>
          </div>
        </div>"#;

    const DETAIL: &str = r#"
        <div role="main">
          <h1 class="DUwDvf">Café Riche</h1>
          <div class="F7nice">
            <span role="img" aria-label="4.6 stars"></span>
            <span aria-label="2,310 reviews">(2,310)</span>
          </div>
          <button data-item-id="address" aria-label="Address: 17 Talaat Harb, Cairo">17 Talaat Harb</button>
          <button data-item-id="phone:tel:0223929793" aria-label="Phone: 02 23929793"></button>
          <a data-item-id="authority" href="https://caferiche.example/?utm_source=maps">caferiche.example</a>
          <button data-item-id="oloc" aria-label="Plus code: 2XQ3+4F Cairo"></button>
          <span aria-label="Open · Closes 12 AM"></span>
          <a href="https://www.facebook.com/caferiche">fb</a>
          <a href="https://www.facebook.com/caferiche">fb again</a>
          <a href="https://example.com/blog">blog</a>
          <img src="https://lh5.googleusercontent.com/p/AF1Q=w408-h306">
          <img src="https://maps.gstatic.com/icon.png">
        </div>"#;

    #[test]
    fn basic_phase_reads_card() {
        let basic = extract_basic(CARD, &PhoneRules::default());
        assert_eq!(basic.name, "Cafe Riche");
        assert_eq!(basic.profile_url, "https://www.google.com/maps/place/Cafe+Riche/data=!4m7");
        assert_eq!(basic.category_line, "Cafe");
        assert_eq!(basic.address_line, "17 Talaat Harb Street");
        assert_eq!(basic.opening_hours, "Open ⋅ Closes 11 PM · 010 1234 5678");
        assert_eq!(basic.phone, "01012345678");
    }

    #[test]
    fn basic_phase_falls_back_to_rows() {
        let html = r#"<div class="Nv2PK"><div class="qBF1Pd">Pharmacy One</div>
            <div class="W4Efsd">Pharmacy</div><div class="W4Efsd">Nasr City</div></div>"#;
        let basic = extract_basic(html, &PhoneRules::default());
        assert_eq!(basic.name, "Pharmacy One");
        assert_eq!(basic.profile_url, "");
        assert_eq!(basic.category_line, "Pharmacy");
        assert_eq!(basic.address_line, "Nasr City");
    }

    #[test]
    fn detail_phase_reads_pane() {
        let detail = extract_detail(DETAIL);
        assert_eq!(detail.name, "Café Riche");
        assert_eq!(detail.rating, "4.6");
        assert_eq!(detail.reviews_count, "2310");
        assert_eq!(detail.address, "17 Talaat Harb, Cairo");
        assert_eq!(detail.phone, "0223929793");
        assert_eq!(detail.website, "https://caferiche.example/?utm_source=maps");
        assert_eq!(detail.plus_code, "2XQ3+4F Cairo");
        assert_eq!(detail.opening_hours, "Open · Closes 12 AM");
        assert_eq!(detail.social_links, "https://www.facebook.com/caferiche");
        assert_eq!(detail.photo_urls, "https://lh5.googleusercontent.com/p/AF1Q=w408-h306");
    }

    #[test]
    fn detail_values_win_when_present() {
        let basic = extract_basic(CARD, &PhoneRules::default());
        let detail = DetailFields {
            name: "Café Riche".into(),
            address: "Address: 17 Talaat Harb".into(),
            ..Default::default()
        };
        let record = merge("cafes", "Cairo", basic, detail);
        assert_eq!(record.name, "Café Riche");
        assert_eq!(record.address_line, "17 Talaat Harb");
        assert_eq!(record.phone, "01012345678");
        assert_eq!(record.category_line, "Cafe");
        assert_eq!(record.category, "cafes");
        assert!(!record.timestamp.is_empty());
    }
}
