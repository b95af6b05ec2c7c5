use std::collections::{HashMap, HashSet};
use std::thread;

use log::{debug, error, info, warn};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::extractor::{extract_item, ItemContext, ItemOutcome, SkipReason};
use crate::models::Record;
use crate::patterns::PhoneRules;
use crate::scroller::exhaust_feed;
use crate::session::{Page, SessionFactory, SessionManager, SessionState};
use crate::utils::RecordSink;
use crate::wait::{pause, wait_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestPhase {
    Idle,
    Navigating,
    Scrolling,
    Extracting(usize),
    NextCategory,
    SessionRestart,
    Done,
}

/// Run-level counters reported to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub categories_completed: usize,
    pub categories_failed: usize,
    pub records_written: usize,
    pub skipped_seen: usize,
    pub skipped_unreadable: usize,
    pub session_restarts: usize,
    pub sessions_recycled: usize,
}

/// Per-run state: the identities captured so far and the counters.
#[derive(Debug)]
pub struct HarvestContext {
    pub seen: HashSet<String>,
    pub report: HarvestReport,
    phase: HarvestPhase,
    per_category: HashMap<String, usize>,
}

impl HarvestContext {
    pub fn new(seen: HashSet<String>) -> Self {
        Self {
            seen,
            report: HarvestReport::default(),
            phase: HarvestPhase::Idle,
            per_category: HashMap::new(),
        }
    }

    pub fn phase(&self) -> HarvestPhase {
        self.phase
    }

    /// Records written for `category` this run, across retries.
    pub fn written_for(&self, category: &str) -> usize {
        self.per_category.get(category).copied().unwrap_or(0)
    }

    fn count_written(&mut self, category: &str) -> usize {
        self.report.records_written += 1;
        let count = self.per_category.entry(category.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn enter(&mut self, phase: HarvestPhase) {
        if self.phase != phase {
            debug!("Harvest phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

/// Progress callbacks; every method defaults to doing nothing.
pub trait HarvestObserver {
    fn category_started(&mut self, _index: usize, _category: &str, _max_places: usize) {}
    fn item_written(&mut self, _record: &Record) {}
    fn item_skipped(&mut self, _reason: &SkipReason) {}
    fn category_restarted(&mut self) {}
    fn category_finished(&mut self, _category: &str, _failed: bool) {}
}

impl HarvestObserver for () {}

/// `https://www.google.com/maps/search/<category in location>?hl=..&gl=..`, query encoded with `+` for spaces.
pub fn build_search_url(category: &str, location: &str, language: &str, region: &str) -> String {
    let query = format!("{} in {}", category.trim(), location.trim());
    let encoded = urlencoding::encode(&query).replace("%20", "+");
    format!(
        "https://www.google.com/maps/search/{}?hl={}&gl={}",
        encoded, language, region
    )
}

/// Loads `url` and waits for the first result card, retrying with a cooldown.
pub fn navigate_with_retry<P: Page + ?Sized>(page: &mut P, url: &str, config: &HarvestConfig) -> HarvestResult<()> {
    let attempts = config.navigation_attempts.max(1);
    let mut reason = String::new();
    for attempt in 1..=attempts {
        let loaded = page.navigate(url).and_then(|_| {
            wait_until(config.session.page_load_timeout, config.scroll.poll_interval, || {
                page.results_ready()
            })
        });
        match loaded {
            Ok(true) => return Ok(()),
            Ok(false) => reason = "no result cards before timeout".to_string(),
            Err(e @ HarvestError::Session(_)) => return Err(e),
            Err(e) => reason = e.to_string(),
        }
        warn!("Navigation attempt {}/{} failed: {}", attempt, attempts, reason);
        if let Err(e) = page.navigate("about:blank") {
            debug!("Could not reset page to about:blank: {}", e);
        }
        if attempt < attempts && !config.pacing.navigation_cooldown.is_zero() {
            thread::sleep(config.pacing.navigation_cooldown);
        }
    }
    Err(HarvestError::Navigation {
        url: url.to_string(),
        attempts,
        reason,
    })
}

/// Harvests one category on an existing page. Returns the number of records written by this call;
/// `max_places` counts every record of the category written this run.
///
/// Session-level failures and sink failures are returned; single broken items are skipped.
pub fn harvest_category<P, O>(
    page: &mut P,
    category: &str,
    ctx: &mut HarvestContext,
    sink: &mut RecordSink,
    config: &HarvestConfig,
    phone_rules: &PhoneRules,
    observer: &mut O,
) -> HarvestResult<usize>
where
    P: Page + ?Sized,
    O: HarvestObserver + ?Sized,
{
    if config.max_places > 0 && ctx.written_for(category) >= config.max_places {
        return Ok(0);
    }
    let url = build_search_url(category, &config.location, &config.language, &config.region);
    info!("Navigating to search: {}", url);
    ctx.enter(HarvestPhase::Navigating);
    navigate_with_retry(page, &url, config)?;
    pause(config.pacing.after_navigation);

    ctx.enter(HarvestPhase::Scrolling);
    let visible_items = match exhaust_feed(page, &config.scroll) {
        Ok(outcome) => outcome.visible_items,
        Err(e) if e.is_session_fatal() => return Err(e),
        Err(e) => {
            warn!("Scrolling stopped early for '{}': {}", category, e);
            page.item_count().unwrap_or(0)
        }
    };
    info!("Total cards discovered for '{}': {}", category, visible_items);

    let item_ctx = ItemContext {
        category,
        location: &config.location,
        phone_rules,
        detail_timeout: config.detail_timeout,
        poll_interval: config.scroll.poll_interval,
        pacing: &config.pacing,
    };

    let mut written = 0usize;
    for index in 0..visible_items {
        ctx.enter(HarvestPhase::Extracting(index));
        match extract_item(page, index, &ctx.seen, &item_ctx)? {
            ItemOutcome::Written(record) => {
                sink.append(&record)?;
                written += 1;
                let total = ctx.count_written(category);
                if !record.profile_url.is_empty() {
                    ctx.seen.insert(record.profile_url.clone());
                }
                observer.item_written(&record);
                info!(
                    "[{} {}/{}] Saved: {} | {}",
                    category,
                    total,
                    config.max_places,
                    record.name,
                    record.profile_url
                );
                if config.max_places > 0 && total >= config.max_places {
                    info!("Reached max-places={} for category '{}'", config.max_places, category);
                    break;
                }
                pause(config.pacing.between_items);
            }
            ItemOutcome::Skipped(reason) => {
                match &reason {
                    SkipReason::AlreadySeen => ctx.report.skipped_seen += 1,
                    SkipReason::Unreadable(msg) => {
                        ctx.report.skipped_unreadable += 1;
                        warn!("Error on card {}: {}", index + 1, msg);
                    }
                }
                observer.item_skipped(&reason);
            }
        }
    }
    Ok(written)
}

/// Runs categories one after another over a single managed browser session.
pub struct Harvester<F: SessionFactory> {
    sessions: SessionManager<F>,
    config: HarvestConfig,
    phone_rules: PhoneRules,
}

impl<F: SessionFactory> Harvester<F> {
    pub fn new(factory: F, config: HarvestConfig) -> Self {
        Self {
            sessions: SessionManager::new(factory, config.session.clone()),
            phone_rules: PhoneRules::new(&config.phone),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionManager<F> {
        &self.sessions
    }

    fn ensure_session(&mut self) -> HarvestResult<()> {
        let attempts = self.config.acquire_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sessions.acquire() {
                Ok(_) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!("Browser launch attempt {}/{} failed: {}", attempt, attempts, e);
                    if !self.config.pacing.navigation_cooldown.is_zero() {
                        thread::sleep(self.config.pacing.navigation_cooldown);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Harvests each category in order, appending new records to `sink`.
    ///
    /// A category gets one retry on a fresh session after a session-level failure;
    /// a second failure marks it failed and the run moves on. Failing to start a
    /// browser, or to write the sink, ends the run.
    pub fn run<O>(
        &mut self,
        categories: &[String],
        ctx: &mut HarvestContext,
        sink: &mut RecordSink,
        observer: &mut O,
    ) -> HarvestResult<HarvestReport>
    where
        O: HarvestObserver + ?Sized,
    {
        if categories.is_empty() {
            return Err(HarvestError::Config(
                "no categories provided; use --categories or --categories-file".to_string(),
            ));
        }

        let total = categories.len();
        for (i, category) in categories.iter().enumerate() {
            observer.category_started(i + 1, category, self.config.max_places);
            let mut attempt = 0;
            let failed = loop {
                attempt += 1;
                self.ensure_session()?;
                let page = self.sessions.acquire()?;
                let result = harvest_category(
                    page,
                    category,
                    ctx,
                    sink,
                    &self.config,
                    &self.phone_rules,
                    observer,
                );
                match result {
                    Ok(written) => {
                        info!("Category '{}' done: {} new records", category, written);
                        ctx.report.categories_completed += 1;
                        break false;
                    }
                    Err(e) if e.is_session_fatal() => {
                        warn!("Driver error while harvesting '{}': {}", category, e);
                        ctx.enter(HarvestPhase::SessionRestart);
                        self.sessions.mark_degraded();
                        if attempt >= 2 {
                            error!("Category '{}' failed on a fresh session too; skipping it", category);
                            ctx.report.categories_failed += 1;
                            break true;
                        }
                        ctx.report.session_restarts += 1;
                        observer.category_restarted();
                    }
                    Err(e) => return Err(e),
                }
            };
            observer.category_finished(category, failed);
            ctx.enter(HarvestPhase::NextCategory);

            if i + 1 < total {
                self.between_categories(i + 1, ctx);
            }
        }

        ctx.enter(HarvestPhase::Done);
        self.sessions.release();
        info!("Done. Total rows written this run: {}", ctx.report.records_written);
        Ok(ctx.report.clone())
    }

    fn between_categories(&mut self, finished: usize, ctx: &mut HarvestContext) {
        let every = self.config.restart_every;
        if every > 0 && finished % every == 0 {
            debug!("Recycling browser session after {} categories", finished);
            self.sessions.release();
            ctx.report.sessions_recycled += 1;
        } else if self.sessions.state() == SessionState::Active {
            if let Ok(page) = self.sessions.acquire() {
                if let Err(e) = page.open_blank_context() {
                    debug!("Could not open blank context: {}", e);
                }
            }
        }
        pause(self.config.pacing.between_categories);
    }
}
