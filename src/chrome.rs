use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info};
use serde_json::Value;

use crate::config::SessionConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::selectors;
use crate::session::{FeedMetrics, Identity, Page, SessionFactory};

const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// Launches headless Chromium sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeFactory;

impl SessionFactory for ChromeFactory {
    type Session = ChromeSession;

    fn create(&mut self, config: &SessionConfig, identity: &Identity) -> HarvestResult<ChromeSession> {
        ChromeSession::launch(config, identity)
    }
}

/// One Chromium process with a working tab and any auxiliary blank tabs.
pub struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
    aux_tabs: Vec<Arc<Tab>>,
    page_load_timeout: Duration,
    script_timeout: Duration,
}

impl ChromeSession {
    pub fn launch(config: &SessionConfig, identity: &Identity) -> HarvestResult<Self> {
        let switches = identity.launch_args(config);
        let args: Vec<&OsStr> = switches.iter().map(OsStr::new).collect();

        let browser = Browser::new(LaunchOptions {
            headless: config.headless,
            sandbox: false,
            window_size: Some(config.window_size),
            idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
            args,
            ..Default::default()
        })
        .map_err(|e| HarvestError::Session(format!("failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| HarvestError::Session(format!("failed to open tab: {}", e)))?;
        tab.set_default_timeout(config.script_timeout);
        tab.set_user_agent(
            &identity.user_agent,
            Some(&identity.accept_language),
            None,
        )
        .map_err(|e| HarvestError::Session(format!("failed to set user agent: {}", e)))?;

        Ok(Self {
            browser,
            tab,
            aux_tabs: Vec::new(),
            page_load_timeout: config.page_load_timeout,
            script_timeout: config.script_timeout,
        })
    }

    fn eval(&self, script: &str) -> HarvestResult<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| classify("script evaluation failed", e))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn eval_bool(&self, script: &str) -> HarvestResult<bool> {
        Ok(self.eval(script)?.as_bool().unwrap_or(false))
    }

    fn eval_string(&self, script: &str) -> HarvestResult<String> {
        Ok(self.eval(script)?.as_str().unwrap_or_default().to_string())
    }
}

/// Dead DevTools connections mean the session is gone; anything else is local to the call.
fn classify(context: &str, err: anyhow::Error) -> HarvestError {
    let message = format!("{}: {}", context, err);
    let lowered = message.to_lowercase();
    if lowered.contains("connection is closed")
        || lowered.contains("connectionclosed")
        || lowered.contains("channel closed")
        || lowered.contains("browser process exited")
    {
        HarvestError::Session(message)
    } else {
        HarvestError::Extraction(message)
    }
}

impl Page for ChromeSession {
    fn navigate(&mut self, url: &str) -> HarvestResult<()> {
        self.tab.set_default_timeout(self.page_load_timeout);
        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| match classify("navigation failed", e) {
                HarvestError::Extraction(reason) => HarvestError::Navigation {
                    url: url.to_string(),
                    attempts: 1,
                    reason,
                },
                other => other,
            });
        self.tab.set_default_timeout(self.script_timeout);
        result
    }

    fn results_ready(&mut self) -> HarvestResult<bool> {
        self.eval_bool(&selectors::results_ready_script())
    }

    fn prepare_feed(&mut self) -> HarvestResult<()> {
        if self.eval_bool(&selectors::prepare_feed_script())? {
            info!("Clicked entry chip to open the full result list");
        }
        Ok(())
    }

    fn item_count(&mut self) -> HarvestResult<usize> {
        Ok(self.eval(&selectors::item_count_script())?.as_u64().unwrap_or(0) as usize)
    }

    fn feed_metrics(&mut self) -> HarvestResult<FeedMetrics> {
        let raw = self.eval_string(&selectors::feed_metrics_script())?;
        if raw.is_empty() {
            return Ok(FeedMetrics::default());
        }
        let parsed: Value = serde_json::from_str(&raw)?;
        let field = |name: &str| parsed.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(FeedMetrics {
            scroll_height: field("scroll_height"),
            scroll_top: field("scroll_top"),
            client_height: field("client_height"),
        })
    }

    fn scroll_feed(&mut self, delta: i64) -> HarvestResult<()> {
        self.eval(&selectors::scroll_script(delta)).map(|_| ())
    }

    fn end_marker_present(&mut self) -> HarvestResult<bool> {
        self.eval_bool(&selectors::end_marker_script())
    }

    fn item_html(&mut self, index: usize) -> HarvestResult<String> {
        let html = self.eval_string(&selectors::item_html_script(index))?;
        if html.is_empty() {
            return Err(HarvestError::Extraction(format!("result card {} is gone", index)));
        }
        Ok(html)
    }

    fn open_item(&mut self, index: usize) -> HarvestResult<()> {
        if self.eval_bool(&selectors::open_item_script(index))? {
            Ok(())
        } else {
            Err(HarvestError::Extraction(format!("result card {} could not be opened", index)))
        }
    }

    fn detail_ready(&mut self) -> HarvestResult<bool> {
        self.eval_bool(&selectors::detail_ready_script())
    }

    fn detail_html(&mut self) -> HarvestResult<String> {
        self.eval_string(&selectors::detail_html_script())
    }

    fn open_blank_context(&mut self) -> HarvestResult<()> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| classify("failed to open blank tab", e))?;
        self.aux_tabs.push(tab);
        Ok(())
    }

    fn close(&mut self) {
        for tab in self.aux_tabs.drain(..) {
            let _ = tab.close(false);
        }
        if let Err(e) = self.tab.close(false) {
            debug!("Closing tab failed: {}", e);
        }
    }
}
