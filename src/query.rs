use serde::Serialize;
use serde_json::Value;

use crate::upsert::{row_payload, Payload};
use crate::utils::{output_headers, Table};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub category: Option<String>,
    pub location: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub items: Vec<Payload>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Facets {
    pub categories: Vec<String>,
    pub locations: Vec<String>,
}

fn wanted(filter: &Option<String>) -> Option<String> {
    filter
        .as_deref()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
}

/// `http(s)` entries of a comma-separated photo field.
pub fn photo_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|u| u.starts_with("http"))
        .map(str::to_string)
        .collect()
}

fn display_item(headers: &[String], row: &crate::models::CleanedRecord) -> Payload {
    let mut item = row_payload(headers, row);
    let photos = photo_list(&row.record.photo_urls);
    let own_main = row
        .column("main_photo_url")
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let main = own_main.or_else(|| photos.first().cloned()).unwrap_or_default();
    item.insert("main_photo_url".to_string(), Value::String(main));
    item.insert(
        "photos".to_string(),
        Value::Array(photos.into_iter().map(Value::String).collect()),
    );
    item
}

/// Filters by exact category and location prefix (both case-insensitive) and returns one page.
pub fn search(table: &Table, query: &SearchQuery) -> SearchPage {
    let category = wanted(&query.category);
    let location = wanted(&query.location);
    let per_page = match query.per_page {
        0 => DEFAULT_PER_PAGE,
        n => n.min(MAX_PER_PAGE),
    };

    let matches: Vec<_> = table
        .rows
        .iter()
        .filter(|row| {
            category
                .as_ref()
                .map_or(true, |c| row.record.category.trim().to_lowercase() == *c)
        })
        .filter(|row| {
            location
                .as_ref()
                .map_or(true, |l| row.record.query_location.trim().to_lowercase().starts_with(l.as_str()))
        })
        .collect();

    let total = matches.len();
    let pages = total.div_ceil(per_page).max(1);
    let page = query.page.clamp(1, pages);
    let headers = output_headers(&table.headers);
    let items = matches
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(|row| display_item(&headers, row))
        .collect();

    SearchPage {
        items,
        page,
        per_page,
        total,
        pages,
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = values.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect();
    out.sort();
    out.dedup();
    out
}

pub fn facets(table: &Table) -> Facets {
    Facets {
        categories: distinct(table.rows.iter().map(|r| r.record.category.clone())),
        locations: distinct(table.rows.iter().map(|r| r.record.query_location.clone())),
    }
}
