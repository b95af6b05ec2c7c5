use log::info;
use rand::seq::SliceRandom;

use crate::config::SessionConfig;
use crate::error::{HarvestError, HarvestResult};

pub const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

pub const ACCEPT_LANGUAGES: [&str; 3] = [
    "en-US,en;q=0.9,ar;q=0.7",
    "en-GB,en;q=0.9,ar;q=0.7",
    "ar-EG,ar;q=0.9,en;q=0.6",
];

/// Browser identity presented for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub accept_language: String,
}

impl Identity {
    /// Picks a user agent and a language uniformly from the pools.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
        let accept_language = ACCEPT_LANGUAGES
            .choose(&mut rng)
            .copied()
            .unwrap_or(ACCEPT_LANGUAGES[0]);
        Self {
            user_agent: user_agent.to_string(),
            accept_language: accept_language.to_string(),
        }
    }

    /// First tag of the accept-language list, e.g. `en-US`.
    pub fn primary_language(&self) -> &str {
        self.accept_language
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or("en-US")
    }

    /// Chromium command-line switches for this identity.
    pub fn launch_args(&self, config: &SessionConfig) -> Vec<String> {
        let mut args = vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!("--accept-language={}", self.accept_language),
            format!("--lang={}", self.primary_language()),
            "--blink-settings=imagesEnabled=true".to_string(),
            "--disable-features=Translate,IsolateOrigins,site-per-process".to_string(),
        ];
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            args.push(format!("--proxy-server={}", proxy.trim()));
        }
        args
    }
}

/// Scroll geometry of the results container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl FeedMetrics {
    pub fn at_end(&self, tolerance: f64) -> bool {
        self.scroll_height > 0.0 && self.scroll_top + self.client_height >= self.scroll_height - tolerance
    }
}

/// One live browser tab, seen through the operations the harvester needs.
///
/// Item indices refer to the order of result cards in the feed.
pub trait Page {
    fn navigate(&mut self, url: &str) -> HarvestResult<()>;

    /// True once at least one result card is present.
    fn results_ready(&mut self) -> HarvestResult<bool>;

    /// Best-effort: open the full result list and zoom out once.
    fn prepare_feed(&mut self) -> HarvestResult<()> {
        Ok(())
    }

    fn item_count(&mut self) -> HarvestResult<usize>;
    fn feed_metrics(&mut self) -> HarvestResult<FeedMetrics>;
    fn scroll_feed(&mut self, delta: i64) -> HarvestResult<()>;
    fn end_marker_present(&mut self) -> HarvestResult<bool>;

    fn item_html(&mut self, index: usize) -> HarvestResult<String>;
    fn open_item(&mut self, index: usize) -> HarvestResult<()>;

    /// True once the detail pane shows a heading or a loaded photo.
    fn detail_ready(&mut self) -> HarvestResult<bool>;
    fn detail_html(&mut self) -> HarvestResult<String>;

    fn open_blank_context(&mut self) -> HarvestResult<()>;
    fn close(&mut self);
}

/// Creates automation sessions. Construction failures are returned, never retried here.
pub trait SessionFactory {
    type Session: Page;

    fn create(&mut self, config: &SessionConfig, identity: &Identity) -> HarvestResult<Self::Session>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Degraded,
    Restarting,
    Failed,
}

/// Owns at most one session and tracks its lifecycle.
pub struct SessionManager<F: SessionFactory> {
    factory: F,
    config: SessionConfig,
    state: SessionState,
    session: Option<F::Session>,
    identity: Option<Identity>,
    created: usize,
}

impl<F: SessionFactory> SessionManager<F> {
    pub fn new(factory: F, config: SessionConfig) -> Self {
        Self {
            factory,
            config,
            state: SessionState::Idle,
            session: None,
            identity: None,
            created: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Sessions created so far, successful ones only.
    pub fn sessions_created(&self) -> usize {
        self.created
    }

    /// Returns the active session, creating one when there is none or the current one is degraded.
    pub fn acquire(&mut self) -> HarvestResult<&mut F::Session> {
        if self.state == SessionState::Active && self.session.is_some() {
            return self
                .session
                .as_mut()
                .ok_or_else(|| HarvestError::Session("active session disappeared".to_string()));
        }
        self.create_session()
    }

    pub fn mark_degraded(&mut self) {
        if self.state == SessionState::Active {
            self.state = SessionState::Degraded;
        }
    }

    /// Discards the current session, whatever its state, and creates a fresh one.
    pub fn restart(&mut self) -> HarvestResult<&mut F::Session> {
        self.create_session()
    }

    pub fn release(&mut self) {
        self.close_current();
        self.state = SessionState::Idle;
    }

    fn close_current(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    fn create_session(&mut self) -> HarvestResult<&mut F::Session> {
        self.close_current();
        self.state = SessionState::Restarting;
        let identity = Identity::random();
        info!(
            "Launching browser: UA={} | Lang={} | Headless={}",
            identity.user_agent,
            identity.accept_language,
            self.config.headless
        );
        match self.factory.create(&self.config, &identity) {
            Ok(session) => {
                self.identity = Some(identity);
                self.state = SessionState::Active;
                self.created += 1;
                Ok(self.session.insert(session))
            }
            Err(e) => {
                self.identity = None;
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }
}

impl<F: SessionFactory> Drop for SessionManager<F> {
    fn drop(&mut self) {
        self.close_current();
    }
}
