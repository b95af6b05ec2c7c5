use std::fmt;

/// Interchange columns written by the harvester, in order.
pub const RECORD_FIELDS: [&str; 15] = [
    "category",
    "query_location",
    "name",
    "category_line",
    "address_line",
    "plus_code",
    "phone",
    "website",
    "profile_url",
    "rating",
    "reviews_count",
    "opening_hours",
    "social_links",
    "photo_urls",
    "timestamp",
];

/// Columns appended by the normalizer when they are not already present.
pub const DERIVED_FIELDS: [&str; 7] = [
    "price_text",
    "price_min_egp",
    "price_max_egp",
    "price_is_plus",
    "phone_e164",
    "address_clean_source",
    "correct_name",
];

/// One harvested place, exactly as the extractor produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Record {
    pub category: String,
    pub query_location: String,
    pub name: String,
    pub category_line: String,
    pub address_line: String,
    pub plus_code: String,
    pub phone: String,
    pub website: String,
    pub profile_url: String,
    pub rating: String,
    pub reviews_count: String,
    pub opening_hours: String,
    pub social_links: String,
    pub photo_urls: String,
    pub timestamp: String,
}

impl Record {
    pub fn new(category: &str, query_location: &str) -> Self {
        Self {
            category: category.to_string(),
            query_location: query_location.to_string(),
            ..Default::default()
        }
    }

    pub fn field(&self, column: &str) -> Option<&str> {
        let value = match column {
            "category" => &self.category,
            "query_location" => &self.query_location,
            "name" => &self.name,
            "category_line" => &self.category_line,
            "address_line" => &self.address_line,
            "plus_code" => &self.plus_code,
            "phone" => &self.phone,
            "website" => &self.website,
            "profile_url" => &self.profile_url,
            "rating" => &self.rating,
            "reviews_count" => &self.reviews_count,
            "opening_hours" => &self.opening_hours,
            "social_links" => &self.social_links,
            "photo_urls" => &self.photo_urls,
            "timestamp" => &self.timestamp,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn field_mut(&mut self, column: &str) -> Option<&mut String> {
        let value = match column {
            "category" => &mut self.category,
            "query_location" => &mut self.query_location,
            "name" => &mut self.name,
            "category_line" => &mut self.category_line,
            "address_line" => &mut self.address_line,
            "plus_code" => &mut self.plus_code,
            "phone" => &mut self.phone,
            "website" => &mut self.website,
            "profile_url" => &mut self.profile_url,
            "rating" => &mut self.rating,
            "reviews_count" => &mut self.reviews_count,
            "opening_hours" => &mut self.opening_hours,
            "social_links" => &mut self.social_links,
            "photo_urls" => &mut self.photo_urls,
            "timestamp" => &mut self.timestamp,
            _ => return None,
        };
        Some(value)
    }

    /// Row values in `RECORD_FIELDS` order.
    pub fn to_csv_record(&self) -> Vec<&str> {
        RECORD_FIELDS
            .iter()
            .map(|column| self.field(column).unwrap_or_default())
            .collect()
    }
}

/// Where the cleaned address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSource {
    Original,
    Recovered,
    Empty,
}

impl AddressSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressSource::Original => "original",
            AddressSource::Recovered => "recovered",
            AddressSource::Empty => "empty",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "original" => Some(AddressSource::Original),
            "recovered" => Some(AddressSource::Recovered),
            "empty" => Some(AddressSource::Empty),
            _ => None,
        }
    }
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record plus the fields the normalizer derives from it.
///
/// `extra` holds columns the interchange file carried that this crate does not
/// know about, in their original order, so they survive a cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CleanedRecord {
    pub record: Record,
    pub price_text: String,
    /// `price_min_egp` column.
    pub price_min: String,
    /// `price_max_egp` column.
    pub price_max: String,
    pub price_is_plus: bool,
    pub phone_e164: String,
    pub address_clean_source: Option<AddressSource>,
    pub correct_name: String,
    pub extra: Vec<(String, String)>,
}

impl CleanedRecord {
    pub fn from_record(record: Record) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }

    /// Builds a row from a header line and its values. Unknown columns land in `extra`.
    pub fn from_columns<'a, I>(columns: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut row = CleanedRecord::default();
        for (column, value) in columns {
            if !row.set_column(column, value) {
                row.extra.push((column.to_string(), value.to_string()));
            }
        }
        row
    }

    /// Value of any known, derived, or extra column, formatted for the interchange file.
    pub fn column(&self, column: &str) -> Option<String> {
        if let Some(value) = self.record.field(column) {
            return Some(value.to_string());
        }
        let derived = match column {
            "price_text" => self.price_text.clone(),
            "price_min_egp" => self.price_min.clone(),
            "price_max_egp" => self.price_max.clone(),
            "price_is_plus" => bool_column(self.price_is_plus).to_string(),
            "phone_e164" => self.phone_e164.clone(),
            "address_clean_source" => self
                .address_clean_source
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            "correct_name" => self.correct_name.clone(),
            _ => {
                return self
                    .extra
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, value)| value.clone())
            }
        };
        Some(derived)
    }

    /// Sets a known or derived column. Returns false for columns this type does not model.
    pub fn set_column(&mut self, column: &str, value: &str) -> bool {
        if let Some(slot) = self.record.field_mut(column) {
            *slot = value.to_string();
            return true;
        }
        match column {
            "price_text" => self.price_text = value.to_string(),
            "price_min_egp" => self.price_min = value.to_string(),
            "price_max_egp" => self.price_max = value.to_string(),
            "price_is_plus" => self.price_is_plus = parse_bool_column(value),
            "phone_e164" => self.phone_e164 = value.to_string(),
            "address_clean_source" => self.address_clean_source = AddressSource::parse(value),
            "correct_name" => self.correct_name = value.to_string(),
            _ => return false,
        }
        true
    }

    /// `correct_name` when it is known, otherwise the displayed name.
    pub fn resolved_name(&self) -> &str {
        if self.correct_name.is_empty() {
            &self.record.name
        } else {
            &self.correct_name
        }
    }
}

pub fn bool_column(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

pub fn parse_bool_column(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_columns_round_trip_through_accessors() {
        let mut record = Record::new("cafes", "Cairo");
        *record.field_mut("profile_url").unwrap() = "https://maps/place/A".to_string();
        assert_eq!(record.field("profile_url"), Some("https://maps/place/A"));
        assert_eq!(record.field("category"), Some("cafes"));
        assert_eq!(record.field("nope"), None);
        assert_eq!(record.to_csv_record().len(), RECORD_FIELDS.len());
    }

    #[test]
    fn unknown_columns_are_kept_as_extra() {
        let row = CleanedRecord::from_columns(vec![
            ("name", "Cafe"),
            ("owner_note", "call after 5"),
            ("price_is_plus", "TRUE"),
            ("address_clean_source", "recovered"),
        ]);
        assert_eq!(row.record.name, "Cafe");
        assert!(row.price_is_plus);
        assert_eq!(row.address_clean_source, Some(AddressSource::Recovered));
        assert_eq!(row.extra, vec![("owner_note".to_string(), "call after 5".to_string())]);
        assert_eq!(row.column("owner_note").as_deref(), Some("call after 5"));
        assert_eq!(row.column("price_is_plus").as_deref(), Some("TRUE"));
    }

    #[test]
    fn resolved_name_prefers_correct_name() {
        let mut row = CleanedRecord::default();
        row.record.name = "Shown".to_string();
        assert_eq!(row.resolved_name(), "Shown");
        row.correct_name = "Real Name".to_string();
        assert_eq!(row.resolved_name(), "Real Name");
    }
}
