//! DOM selectors for the map results page and the page scripts built from them.
//!
//! Scripts return primitives or JSON strings, never objects, so they can be read
//! back by value.

pub const CARD_CSS: &str = "div.Nv2PK";
pub const CARD_TITLE_CSS: &str = ".qBF1Pd";
pub const CARD_ANCHOR_CSS: &str = "a.hfpxzc";
pub const INFO_ROW_CSS: &str = ".W4Efsd";

pub const DETAIL_NAME_CSS: [&str; 4] = ["h1.DUwDvf", "h1.fontHeadline", "h1[role='heading']", "h1"];
pub const DETAIL_RATING_CSS: [&str; 3] = [
    "span[role='img'][aria-label*='star']",
    "span[aria-label*='stars']",
    "span[aria-label*='rating']",
];
pub const DETAIL_RATING_TEXT_CSS: [&str; 2] = ["div.F7nice span[aria-hidden='true']", "span.ceNzKf"];
pub const DETAIL_REVIEWS_CSS: [&str; 3] = [
    "span[aria-label*='review']",
    "button[aria-label*='review']",
    "span[aria-label*='تقييم']",
];
pub const DETAIL_ADDRESS_CSS: [&str; 2] = ["button[data-item-id='address']", "div[aria-label^='Address']"];
pub const DETAIL_PHONE_CSS: &str = "button[data-item-id^='phone:tel:']";
pub const DETAIL_TEL_LINK_CSS: &str = "a[href^='tel:']";
pub const DETAIL_WEBSITE_CSS: [&str; 2] = ["a[data-item-id='authority']", "a[aria-label^='Website']"];
pub const DETAIL_PLUS_CODE_CSS: &str = "button[data-item-id='oloc']";
pub const DETAIL_LABELLED_CSS: &str = "[aria-label]";
pub const DETAIL_SPAN_CSS: &str = "span";
pub const DETAIL_LINK_CSS: &str = "a[href]";
pub const DETAIL_PHOTO_CSS: &str = "img[src]";

pub const PHOTO_HOSTS: [&str; 2] = ["googleusercontent", "ggpht"];
pub const END_MARKERS: [&str; 2] = ["You've reached the end", "You\u{2019}ve reached the end"];

const FEED_LOOKUP: &str = "(document.querySelector(\"div[role='feed'].m6QErb\") \
     || document.querySelector(\"div[role='feed']\") \
     || document.querySelector('div.m6QErb') \
     || document.scrollingElement || document.body)";

pub fn item_count_script() -> String {
    format!("document.querySelectorAll('{}').length", CARD_CSS)
}

pub fn feed_metrics_script() -> String {
    format!(
        "(function() {{ const f = {}; return JSON.stringify({{scroll_height: f.scrollHeight, scroll_top: f.scrollTop, client_height: f.clientHeight}}); }})()",
        FEED_LOOKUP
    )
}

pub fn scroll_script(delta: i64) -> String {
    format!(
        "(function() {{ const f = {}; f.scrollBy(0, {}); return true; }})()",
        FEED_LOOKUP, delta
    )
}

pub fn end_marker_script() -> String {
    let checks: Vec<String> = END_MARKERS
        .iter()
        .map(|m| format!("t.includes({})", js_string(m)))
        .collect();
    format!(
        "(function() {{ const t = ({}).innerText || ''; return {}; }})()",
        FEED_LOOKUP,
        checks.join(" || ")
    )
}

/// Clicks a "More places"/"View all" chip if one exists, then zooms out once.
pub fn prepare_feed_script() -> String {
    r#"(function() {
        let clicked = false;
        const chips = Array.from(document.querySelectorAll('button, a'));
        const chip = chips.find(e => /More places|View all/.test(e.innerText || ''));
        if (chip) { chip.scrollIntoView({block: 'center'}); chip.click(); clicked = true; }
        const zoom = document.querySelector("button[aria-label='Zoom out']");
        if (zoom) { zoom.click(); }
        const feed = document.querySelector("div[role='feed']");
        if (feed) { feed.scrollIntoView({block: 'nearest'}); }
        return clicked;
    })()"#
        .to_string()
}

pub fn item_html_script(index: usize) -> String {
    format!(
        "(function() {{ const c = document.querySelectorAll('{}')[{}]; return c ? c.outerHTML : ''; }})()",
        CARD_CSS, index
    )
}

pub fn open_item_script(index: usize) -> String {
    format!(
        "(function() {{ const c = document.querySelectorAll('{card}')[{idx}]; if (!c) return false; \
         const a = c.querySelector('{anchor}') || c; a.scrollIntoView({{block: 'center'}}); a.click(); return true; }})()",
        card = CARD_CSS,
        anchor = CARD_ANCHOR_CSS,
        idx = index
    )
}

pub fn detail_ready_script() -> String {
    let photo_checks: Vec<String> = PHOTO_HOSTS
        .iter()
        .map(|h| format!("(i.src || '').includes('{}')", h))
        .collect();
    format!(
        "(function() {{ if (document.querySelector(\"{}\")) return true; \
         return Array.from(document.images).some(i => (i.src || '').startsWith('http') && ({})); }})()",
        DETAIL_NAME_CSS[..3].join(", "),
        photo_checks.join(" || ")
    )
}

pub fn detail_html_script() -> String {
    "(function() { const m = document.querySelector(\"div[role='main']\"); return (m || document.body).outerHTML; })()"
        .to_string()
}

pub fn results_ready_script() -> String {
    format!("document.querySelectorAll('{}').length > 0", CARD_CSS)
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "''".to_string())
}
