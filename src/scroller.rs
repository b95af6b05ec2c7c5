use std::time::Duration;

use log::{debug, info};
use rand::Rng;

use crate::config::ScrollConfig;
use crate::error::HarvestResult;
use crate::session::{FeedMetrics, Page};
use crate::wait::{jitter, wait_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The feed showed its "reached the end" marker.
    EndOfList,
    /// The container's scroll position reached its bottom.
    ScrolledToEnd,
    /// Too many consecutive iterations without growth.
    NoGrowth,
    IterationCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub iterations: usize,
    pub visible_items: usize,
    pub stop: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollSignal {
    Grew,
    ScrolledToEnd,
    EndOfList,
    Nothing,
}

/// Scrolls the result feed until it stops yielding new items.
///
/// Items are never removed: the caller reads them after this returns.
pub fn exhaust_feed<P: Page + ?Sized>(page: &mut P, config: &ScrollConfig) -> HarvestResult<ScrollOutcome> {
    if let Err(e) = page.prepare_feed() {
        debug!("Feed preparation skipped: {}", e);
    }

    let mut no_growth_runs = 0u32;
    let mut iterations = 0usize;
    let mut stop = StopReason::IterationCap;

    while iterations < config.max_iterations {
        iterations += 1;
        let prev_count = page.item_count()?;
        let prev_metrics = page.feed_metrics().unwrap_or_default();
        info!("[scroll {:02}] visible_cards={}", iterations, prev_count);

        apply_scroll_steps(page, config)?;

        let window = jitter(config.poll_window_min, config.poll_window_max);
        let signal = poll_for_signal(page, config, window, prev_count, &prev_metrics)?;

        if signal == PollSignal::Grew {
            no_growth_runs = 0;
        } else {
            no_growth_runs += 1;
        }

        match signal {
            PollSignal::EndOfList => {
                stop = StopReason::EndOfList;
                break;
            }
            PollSignal::ScrolledToEnd => {
                stop = StopReason::ScrolledToEnd;
                break;
            }
            _ if no_growth_runs >= config.patience => {
                stop = StopReason::NoGrowth;
                break;
            }
            _ => {}
        }
    }

    let visible_items = page.item_count()?;
    info!(
        "Stopping scroll after {} iteration(s): {:?}, {} cards visible",
        iterations,
        stop,
        visible_items
    );
    Ok(ScrollOutcome {
        iterations,
        visible_items,
        stop,
    })
}

fn apply_scroll_steps<P: Page + ?Sized>(page: &mut P, config: &ScrollConfig) -> HarvestResult<()> {
    let steps = {
        let mut rng = rand::thread_rng();
        if config.steps_max > config.steps_min {
            rng.gen_range(config.steps_min..=config.steps_max)
        } else {
            config.steps_min
        }
    };
    for _ in 0..steps {
        let delta = if config.delta_max > config.delta_min {
            rand::thread_rng().gen_range(config.delta_min..=config.delta_max)
        } else {
            config.delta_min
        };
        page.scroll_feed(delta)?;
        let pause = jitter(config.step_pause_min, config.step_pause_max);
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
    Ok(())
}

fn poll_for_signal<P: Page + ?Sized>(
    page: &mut P,
    config: &ScrollConfig,
    window: Duration,
    prev_count: usize,
    prev_metrics: &FeedMetrics,
) -> HarvestResult<PollSignal> {
    let mut signal = PollSignal::Nothing;
    wait_until(window, config.poll_interval, || {
        if page.item_count()? > prev_count {
            signal = PollSignal::Grew;
            return Ok(true);
        }
        if let Ok(metrics) = page.feed_metrics() {
            if prev_metrics.scroll_height > 0.0
                && metrics.scroll_height > prev_metrics.scroll_height + config.growth_threshold_px
            {
                signal = PollSignal::Grew;
                return Ok(true);
            }
            if metrics.at_end(config.end_tolerance_px) {
                signal = PollSignal::ScrolledToEnd;
                return Ok(true);
            }
        }
        if page.end_marker_present().unwrap_or(false) {
            signal = PollSignal::EndOfList;
            return Ok(true);
        }
        Ok(false)
    })?;
    Ok(signal)
}
