//! Stateless text heuristics shared by the extractor and the normalizer.
//!
//! Every function here is total: when nothing recognizable is found it returns
//! an empty string (or `None`/`false`) instead of failing.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::PhoneConfig;

const CURRENCY: &str = r"(?:\b(?:egp|le|e\s?p)\b|l\.e\.|جنيه|ج\.\s*م)";
const AMOUNT: &str = r"\d[\d,.]*(?:\s*[-–]\s*\d[\d,.]*)?";

static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i){amount}\s*\+?\s*{cur}\+?|{cur}\s*{amount}\s*\+?|\b(?:min(?:imum)?|delivery|charge|service)\b\s*[:=]?\s*{amount}\s*\+?",
        amount = AMOUNT,
        cur = CURRENCY
    ))
    .unwrap()
});

static NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());
static FIRST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

static RATING_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[0-5](?:[.,]\d)?\s*\(\s*[\d,.]+\s*[km]?\s*\)|[0-5][.,]\d\s*$|no reviews)").unwrap()
});

static HOURS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:open|opens|closed|closes)\b|24 hours|يفتح|مفتوح|مغلق|٢٤ ساعة").unwrap()
});

static PHONE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+?\d[\d\s\-().]{6,}\d").unwrap());

static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:https?:)?//").unwrap());
static HOST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:https?:)?//(?:[^/?#@]*@)?([^/?#:]+)").unwrap());
static LINK_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,;]+").unwrap());

static ADDRESS_VOCAB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:street|st|road|rd|square|sq|mohand\w*|nasr|heliopolis|giza|cairo|alex\w*|maadi|dokki|zamalek|new cairo|6th of october|sheikh zayed|العنوان|شارع|ميدان|طريق|القاهرة|الجيزة|المعادي|الدقي|مدينة نصر|مصر الجديدة)\b",
    )
    .unwrap()
});
static WORD3_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z\x{0600}-\x{06FF}]{3,}\b").unwrap());
static ANY_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[·•]\s*").unwrap());
static ADDRESS_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*(?:address|العنوان)\s*:\s*").unwrap());
static PLACE_SEGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/place/([^/]+)/").unwrap());

pub const SOCIAL_HOSTS: [&str; 8] = [
    "facebook.com",
    "fb.com",
    "instagram.com",
    "x.com",
    "twitter.com",
    "tiktok.com",
    "linkedin.com",
    "youtube.com",
];

const INVISIBLE_MARKS: [char; 14] = [
    '\u{200b}', '\u{200c}', '\u{200d}', '\u{200e}', '\u{200f}', '\u{202a}', '\u{202b}', '\u{202c}',
    '\u{202d}', '\u{202e}', '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}',
];

const NAME_DECODE_ROUNDS: usize = 6;

/// NFKC, control characters removed (whitespace controls become spaces), trimmed.
pub fn canonicalize(text: &str) -> String {
    let normalized: String = text
        .nfkc()
        .filter_map(|c| {
            if c.is_control() {
                c.is_whitespace().then_some(' ')
            } else {
                Some(c)
            }
        })
        .collect();
    normalized.trim().to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First decimal or integer number, e.g. `"4.6 stars"` -> `"4.6"`.
pub fn clean_rating(text: &str) -> String {
    let text = canonicalize(text);
    FIRST_NUMBER_RE
        .find(&text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// First run of digits once thousands separators are gone, e.g. `"(1,234)"` -> `"1234"`.
pub fn clean_reviews(text: &str) -> String {
    let text = canonicalize(text).replace(',', "");
    DIGITS_RE
        .find(&text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub fn looks_like_rating_line(text: &str) -> bool {
    !text.is_empty() && RATING_LINE_RE.is_match(text)
}

pub fn looks_like_hours(text: &str) -> bool {
    !text.is_empty() && HOURS_RE.is_match(text)
}

/// Compiled phone rules for one locale.
#[derive(Debug, Clone)]
pub struct PhoneRules {
    config: PhoneConfig,
    number_re: Regex,
}

impl PhoneRules {
    pub fn new(config: &PhoneConfig) -> Self {
        let pattern = format!(
            r"(?:\+?{cc})?0?\d{{{min},{max}}}",
            cc = regex::escape(&config.country_code),
            min = config.local_min_digits,
            max = config.local_max_digits
        );
        let number_re = Regex::new(&pattern).unwrap_or_else(|_| Regex::new(r"\d{8,11}").unwrap());
        Self {
            config: config.clone(),
            number_re,
        }
    }

    fn match_number(&self, candidate: &str) -> Option<String> {
        let compact: String = candidate
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        self.number_re.find(&compact).map(|m| m.as_str().to_string())
    }

    /// Pulls the first phone-looking number out of free text, as written (digits and `+` only).
    pub fn extract(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = canonicalize(text);
        PHONE_RUN_RE
            .find_iter(&text)
            .find_map(|run| self.match_number(run.as_str()))
            .unwrap_or_default()
    }

    /// Canonical `+<country><number>` form, or empty when no number is present.
    pub fn normalize(&self, text: &str) -> String {
        let text = canonicalize(text);
        if text.is_empty() {
            return String::new();
        }
        let found = match self.extract(&text) {
            found if !found.is_empty() => Some(found),
            _ => self.match_number(&text),
        };
        let Some(found) = found else {
            return String::new();
        };
        let digits: String = found.chars().filter(char::is_ascii_digit).collect();
        let cc = &self.config.country_code;
        if digits.starts_with(cc.as_str()) && digits.len() >= self.config.min_len_with_country {
            return format!("+{}", digits);
        }
        if let Some(rest) = digits.strip_prefix('0') {
            if digits.len() >= self.config.min_len_with_trunk {
                return format!("+{}{}", cc, rest);
            }
        }
        if digits.starts_with(self.config.mobile_lead) && digits.len() == self.config.mobile_len {
            return format!("+{}{}", cc, digits);
        }
        format!("+{}{}", cc, digits)
    }
}

impl Default for PhoneRules {
    fn default() -> Self {
        PhoneRules::new(&PhoneConfig::default())
    }
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || key.starts_with("hsa_") || key == "fbclid" || key == "gclid"
}

/// Adds a scheme when missing and strips tracking query parameters.
pub fn normalize_website(url: &str) -> String {
    let url = canonicalize(url);
    if url.is_empty() {
        return url;
    }
    let url = if SCHEME_RE.is_match(&url) {
        url
    } else {
        format!("http://{}", url)
    };

    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, frag)) => (head.to_string(), Some(frag.to_string())),
        None => (url.clone(), None),
    };
    let mut out = match without_fragment.split_once('?') {
        Some((base, query)) => {
            let kept: Vec<&str> = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .filter(|pair| !is_tracking_param(pair.split('=').next().unwrap_or_default()))
                .collect();
            if kept.is_empty() {
                base.to_string()
            } else {
                format!("{}?{}", base, kept.join("&"))
            }
        }
        None => without_fragment,
    };
    let trimmed_len = out.trim_end_matches(|c: char| c == '?' || c == '&').len();
    out.truncate(trimmed_len);
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        out.push('#');
        out.push_str(&fragment);
    }
    out
}

/// Lower-cased host of a scheme-qualified URL, without `www.`/`m.` prefixes.
pub fn url_host(url: &str) -> Option<String> {
    let host = HOST_RE.captures(url)?.get(1)?.as_str().to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("web."))
        .unwrap_or(&host)
        .to_string();
    Some(host)
}

pub fn is_social_link(url: &str) -> bool {
    url_host(url).is_some_and(|host| {
        SOCIAL_HOSTS
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
    })
}

/// Keeps scheme-qualified social-platform links, de-duplicated case-insensitively.
pub fn normalize_social_links(raw: &str) -> String {
    let raw = canonicalize(raw);
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for token in LINK_SPLIT_RE.split(&raw).filter(|t| !t.is_empty()) {
        let link = if SCHEME_RE.is_match(token) {
            token.to_string()
        } else {
            format!("http://{}", token)
        };
        if is_social_link(&link) && seen.insert(link.to_lowercase()) {
            links.push(link);
        }
    }
    links.join(", ")
}

pub fn looks_like_price(text: &str) -> bool {
    !text.is_empty() && PRICE_RE.is_match(text)
}

/// Price fields recovered from a currency-bearing text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceInfo {
    pub text: String,
    pub min: String,
    pub max: String,
    pub plus: bool,
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Collects the amounts inside the currency-bearing spans of `text`.
pub fn extract_price(text: &str) -> Option<PriceInfo> {
    let text = collapse_whitespace(&canonicalize(text));
    let mut amounts: Vec<f64> = Vec::new();
    let mut plus = false;
    for span in PRICE_RE.find_iter(&text) {
        plus |= span.as_str().contains('+');
        amounts.extend(
            NUM_RE
                .find_iter(span.as_str())
                .filter_map(|n| n.as_str().replace(',', "").parse::<f64>().ok()),
        );
    }
    if amounts.is_empty() {
        return None;
    }
    let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(PriceInfo {
        text,
        min: format_amount(min),
        max: format_amount(max),
        plus,
    })
}

/// Street/locality vocabulary, or a digit together with a real word.
pub fn looks_like_address(text: &str) -> bool {
    if text.is_empty() || looks_like_price(text) {
        return false;
    }
    ADDRESS_VOCAB_RE.is_match(text) || (ANY_DIGIT_RE.is_match(text) && WORD3_RE.is_match(text))
}

/// Splits a `category · address` summary into its first and last segments.
pub fn split_category_line(line: &str) -> (String, String) {
    let line = line.trim();
    if line.is_empty() {
        return (String::new(), String::new());
    }
    let parts: Vec<&str> = SEPARATOR_RE.split(line).collect();
    if parts.len() >= 2 {
        (
            parts[0].trim().to_string(),
            parts[parts.len() - 1].trim().to_string(),
        )
    } else {
        (line.to_string(), String::new())
    }
}

/// Non-empty segments of an info line split on the `·`/`•` glyph.
pub fn separator_segments(line: &str) -> Vec<String> {
    SEPARATOR_RE
        .split(line)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn has_separator(line: &str) -> bool {
    line.contains('·') || line.contains('•')
}

pub fn strip_address_label(text: &str) -> String {
    ADDRESS_LABEL_RE.replace(text, "").trim().to_string()
}

fn percent_decode(text: &str) -> Cow<'_, str> {
    urlencoding::decode(text).unwrap_or(Cow::Borrowed(text))
}

/// Place name embedded in a `/place/<name>/` profile URL, decoded until stable.
pub fn name_from_profile_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let decoded = percent_decode(url);
    let Some(segment) = PLACE_SEGMENT_RE
        .captures(&decoded)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return String::new();
    };

    let mut raw = segment;
    for _ in 0..NAME_DECODE_ROUNDS {
        let next = percent_decode(&raw).into_owned();
        if next == raw {
            break;
        }
        raw = next;
    }
    let spaced = raw.replace('+', " ");
    let visible: String = spaced.chars().filter(|c| !INVISIBLE_MARKS.contains(c)).collect();
    collapse_whitespace(&visible)
}

/// Normalized photo reference and its comparison key.
///
/// Protocol-relative URLs are upgraded to https, the query string and any `=size`
/// suffix are dropped. Returns `None` for anything that is not an http(s) URL.
pub fn photo_identity(candidate: &str) -> Option<(String, String)> {
    let url = canonicalize(candidate);
    let url = url.trim_matches(',').trim();
    if url.is_empty() {
        return None;
    }
    let url = if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    };
    if !SCHEME_RE.is_match(&url) {
        return None;
    }
    let base = url.split('?').next().unwrap_or_default();
    let base = base.split('=').next().unwrap_or_default().to_string();
    let key = base.to_lowercase();
    Some((base, key))
}

pub fn photo_candidates(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_compatibility_forms_and_controls() {
        assert_eq!(canonicalize("\u{00A0}Cafe\u{202F}One\t\n"), "Cafe One");
        assert_eq!(canonicalize("ﬁsh\u{0007}"), "fish");
        let once = canonicalize(" Ｃａｆｅ ");
        assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn rating_and_reviews() {
        assert_eq!(clean_rating("4.6 stars"), "4.6");
        assert_eq!(clean_rating("Rated 5"), "5");
        assert_eq!(clean_rating("no rating"), "");
        assert_eq!(clean_reviews("(1,234)"), "1234");
        assert_eq!(clean_reviews("87 reviews"), "87");
        assert_eq!(clean_reviews(""), "");
    }

    #[test]
    fn phone_canonicalization() {
        let rules = PhoneRules::default();
        assert_eq!(rules.normalize("01012345678"), "+201012345678");
        assert_eq!(rules.normalize("0221234567"), "+20221234567");
        assert_eq!(rules.normalize("201012345678"), "+201012345678");
        assert_eq!(rules.normalize("+20 10 1234 5678"), "+201012345678");
        assert_eq!(rules.normalize("1012345678"), "+201012345678");
        assert_eq!(rules.normalize("call us"), "");
    }

    #[test]
    fn phone_rules_follow_configured_country() {
        let config = PhoneConfig {
            country_code: "44".to_string(),
            local_min_digits: 9,
            local_max_digits: 10,
            min_len_with_country: 12,
            min_len_with_trunk: 11,
            mobile_len: 10,
            mobile_lead: '7',
        };
        let rules = PhoneRules::new(&config);
        assert_eq!(rules.normalize("07700 900123"), "+447700900123");
        assert_eq!(rules.normalize("+44 7700 900123"), "+447700900123");
    }

    #[test]
    fn phone_extraction_ignores_hours_digits() {
        let rules = PhoneRules::default();
        assert_eq!(rules.extract("Open ⋅ Closes 11 PM · 010 1234 5678"), "01012345678");
        assert_eq!(rules.extract("Closes 11 PM"), "");
    }

    #[test]
    fn website_normalization() {
        assert_eq!(normalize_website("example.com"), "http://example.com");
        assert_eq!(
            normalize_website("https://example.com/menu?utm_source=maps&id=4&fbclid=xyz"),
            "https://example.com/menu?id=4"
        );
        assert_eq!(normalize_website("https://example.com/?gclid=1"), "https://example.com/");
        assert_eq!(normalize_website("https://example.com/?&"), "https://example.com/");
        let once = normalize_website("shop.example.com?utm_medium=x");
        assert_eq!(normalize_website(&once), once);
    }

    #[test]
    fn social_links_are_filtered_and_deduplicated() {
        let raw = "facebook.com/cafe; https://www.instagram.com/cafe, https://box.com/file  HTTP://FACEBOOK.COM/cafe";
        assert_eq!(
            normalize_social_links(raw),
            "http://facebook.com/cafe, https://www.instagram.com/cafe"
        );
        assert!(is_social_link("https://m.facebook.com/page"));
        assert!(!is_social_link("https://notx.com/page"));
    }

    #[test]
    fn price_detection_and_extraction() {
        assert!(looks_like_price("Minimum order 150 EGP"));
        assert!(looks_like_price("From 80+ LE"));
        assert!(looks_like_price("ج.م 200"));
        assert!(!looks_like_price("Table 5 Street"));

        let p = extract_price("Minimum order 150 EGP").unwrap();
        assert_eq!((p.min.as_str(), p.max.as_str(), p.plus), ("150", "150", false));
        assert_eq!(p.text, "Minimum order 150 EGP");

        let p = extract_price("From 80+ LE").unwrap();
        assert_eq!((p.min.as_str(), p.max.as_str(), p.plus), ("80", "80", true));

        let p = extract_price("EGP 100 - 250").unwrap();
        assert_eq!((p.min.as_str(), p.max.as_str()), ("100", "250"));

        let p = extract_price("1,250.50 EGP").unwrap();
        assert_eq!(p.min, "1250.5");

        assert_eq!(extract_price("Bakery"), None);
    }

    #[test]
    fn address_heuristics() {
        assert!(looks_like_address("12 Tahrir Street, Cairo"));
        assert!(looks_like_address("Zamalek"));
        assert!(looks_like_address("Building 5 Gamal"));
        assert!(!looks_like_address("Restaurant"));
        assert!(!looks_like_address("150 EGP"));
    }

    #[test]
    fn category_line_split() {
        assert_eq!(
            split_category_line("Restaurant · 12 Tahrir Street"),
            ("Restaurant".to_string(), "12 Tahrir Street".to_string())
        );
        assert_eq!(
            split_category_line("Cafe • $$ • 9 Road 9"),
            ("Cafe".to_string(), "9 Road 9".to_string())
        );
        assert_eq!(split_category_line("Pharmacy"), ("Pharmacy".to_string(), String::new()));
    }

    #[test]
    fn rating_and_hours_lines() {
        assert!(looks_like_rating_line("4.5(1,234)"));
        assert!(looks_like_rating_line("4.5 (87)"));
        assert!(!looks_like_rating_line("12 Tahrir Street"));
        assert!(looks_like_hours("Open ⋅ Closes 11 PM"));
        assert!(looks_like_hours("Open 24 hours"));
        assert!(!looks_like_hours("Opera House Street"));
    }

    #[test]
    fn strips_address_label() {
        assert_eq!(strip_address_label("Address: 12 Tahrir St"), "12 Tahrir St");
        assert_eq!(strip_address_label("العنوان: شارع التحرير"), "شارع التحرير");
        assert_eq!(strip_address_label("12 Tahrir St"), "12 Tahrir St");
    }

    #[test]
    fn recovers_name_from_profile_url() {
        let url = "https://www.google.com/maps/place/Caf%25C3%25A9+Riche/data=!4m7";
        assert_eq!(name_from_profile_url(url), "Café Riche");
        let url = "https://www.google.com/maps/place/%E2%80%8FKoshary+Abou+Tarek/@30.05";
        assert_eq!(name_from_profile_url(url), "Koshary Abou Tarek");
        assert_eq!(name_from_profile_url("https://example.com/nothing"), "");
    }

    #[test]
    fn photo_identity_normalization() {
        let (base, key) = photo_identity("//lh5.googleusercontent.com/p/AF1Q=w408-h306?x=1").unwrap();
        assert_eq!(base, "https://lh5.googleusercontent.com/p/AF1Q");
        assert_eq!(key, "https://lh5.googleusercontent.com/p/af1q");
        assert_eq!(photo_identity("not a url"), None);
        assert_eq!(photo_candidates(" a, ,b "), vec!["a", "b"]);
    }
}
