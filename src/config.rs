use std::time::Duration;

use anyhow::{Context, Result};

/// Browser launch and timeout settings for one automation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    pub proxy: Option<String>,
    pub page_load_timeout: Duration,
    pub script_timeout: Duration,
    pub window_size: (u32, u32),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            page_load_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(20),
            window_size: (1280, 1000),
        }
    }
}

/// Tunables for draining a virtualized result feed.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    pub max_iterations: usize,
    pub steps_min: u32,
    pub steps_max: u32,
    pub delta_min: i64,
    pub delta_max: i64,
    pub step_pause_min: Duration,
    pub step_pause_max: Duration,
    pub poll_window_min: Duration,
    pub poll_window_max: Duration,
    pub poll_interval: Duration,
    /// Consecutive iterations without growth before giving up.
    pub patience: u32,
    pub growth_threshold_px: f64,
    pub end_tolerance_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            steps_min: 3,
            steps_max: 6,
            delta_min: 320,
            delta_max: 800,
            step_pause_min: Duration::from_millis(250),
            step_pause_max: Duration::from_millis(700),
            poll_window_min: Duration::from_millis(5500),
            poll_window_max: Duration::from_millis(8000),
            poll_interval: Duration::from_millis(250),
            patience: 3,
            growth_threshold_px: 12.0,
            end_tolerance_px: 4.0,
        }
    }
}

/// Random pauses between user-visible actions.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub after_navigation: (Duration, Duration),
    pub before_click: (Duration, Duration),
    pub after_detail_open: (Duration, Duration),
    pub between_items: (Duration, Duration),
    pub between_categories: (Duration, Duration),
    pub navigation_cooldown: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_navigation: (Duration::from_millis(1000), Duration::from_millis(1600)),
            before_click: (Duration::from_millis(200), Duration::from_millis(600)),
            after_detail_open: (Duration::from_millis(500), Duration::from_millis(1100)),
            between_items: (Duration::from_millis(500), Duration::from_millis(1200)),
            between_categories: (Duration::from_millis(1400), Duration::from_millis(2800)),
            navigation_cooldown: Duration::from_millis(2500),
        }
    }
}

impl Pacing {
    /// No pauses at all; used by tests and dry runs.
    pub fn none() -> Self {
        let zero = (Duration::ZERO, Duration::ZERO);
        Self {
            after_navigation: zero,
            before_click: zero,
            after_detail_open: zero,
            between_items: zero,
            between_categories: zero,
            navigation_cooldown: Duration::ZERO,
        }
    }
}

/// Everything one harvest run needs besides the category list.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub location: String,
    pub output_file: String,
    pub max_places: usize,
    pub language: String,
    pub region: String,
    pub navigation_attempts: u32,
    pub acquire_attempts: u32,
    /// Recycle the browser after this many categories; 0 disables recycling.
    pub restart_every: usize,
    pub detail_timeout: Duration,
    pub session: SessionConfig,
    pub scroll: ScrollConfig,
    pub pacing: Pacing,
    pub phone: PhoneConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            output_file: "places.csv".to_string(),
            max_places: 500,
            language: "en".to_string(),
            region: "eg".to_string(),
            navigation_attempts: 2,
            acquire_attempts: 2,
            restart_every: 1,
            detail_timeout: Duration::from_secs(15),
            session: SessionConfig::default(),
            scroll: ScrollConfig::default(),
            pacing: Pacing::default(),
            phone: PhoneConfig::default(),
        }
    }
}

/// Locale rules for phone canonicalization.
#[derive(Debug, Clone)]
pub struct PhoneConfig {
    pub country_code: String,
    pub local_min_digits: usize,
    pub local_max_digits: usize,
    /// A number starting with the country code needs at least this many digits to keep it as-is.
    pub min_len_with_country: usize,
    /// A number starting with a trunk zero needs at least this many digits.
    pub min_len_with_trunk: usize,
    pub mobile_len: usize,
    pub mobile_lead: char,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_code: "20".to_string(),
            local_min_digits: 8,
            local_max_digits: 11,
            min_len_with_country: 11,
            min_len_with_trunk: 10,
            mobile_len: 10,
            mobile_lead: '1',
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub drop_empty_name: bool,
    pub phone: PhoneConfig,
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub limit: Option<usize>,
    pub restart_every: usize,
    pub checkpoint_every: usize,
    pub phone_timeout: Duration,
    pub jitter: (Duration, Duration),
    pub session: SessionConfig,
    pub phone: PhoneConfig,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            limit: None,
            restart_every: 200,
            checkpoint_every: 20,
            phone_timeout: Duration::from_secs(8),
            jitter: (Duration::from_millis(200), Duration::from_millis(600)),
            session: SessionConfig::default(),
            phone: PhoneConfig::default(),
        }
    }
}

/// Remote store settings for the upsert client, read from the environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub batch_size: usize,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SUPABASE_URL").context("SUPABASE_URL is not set")?;
        let api_key = std::env::var("SUPABASE_KEY").context("SUPABASE_KEY is not set")?;
        let table = std::env::var("SUPABASE_TABLE").unwrap_or_else(|_| "places".to_string());
        let batch_size = match std::env::var("UPSERT_BATCH") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("UPSERT_BATCH is not a number: {}", raw))?,
            Err(_) => 500,
        };
        Ok(Self {
            base_url,
            api_key,
            table,
            batch_size: batch_size.max(1),
        })
    }
}

/// Reads categories from a file (one per line) or a comma-separated list.
/// The file wins when both are given.
pub fn load_categories(list: Option<&str>, file: Option<&str>) -> Result<Vec<String>> {
    if let Some(path) = file.filter(|p| !p.trim().is_empty()) {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read categories file: {}", path))?;
        return Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect());
    }
    Ok(list
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}
