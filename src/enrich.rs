use anyhow::Result;
use crossterm::{
    cursor::MoveToPreviousLine,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use log::{debug, info, warn};
use std::io;
use std::time::Duration;

use crate::config::EnrichOptions;
use crate::error::{HarvestError, HarvestResult};
use crate::extractor::extract_detail;
use crate::models::CleanedRecord;
use crate::patterns::{canonicalize, PhoneRules};
use crate::session::{Page, SessionFactory, SessionManager};
use crate::utils::{write_table_preserving, Table};
use crate::wait::{pause, wait_until};

const ENRICHED_COLUMNS: [&str; 2] = ["phone", "phone_e164"];

const DETAIL_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct EnrichTUI {
    total_rows: usize,
    updated_count: usize,
    missed_count: usize,
    current_index: usize,
    enabled: bool,
}

impl EnrichTUI {
    pub fn new(total_rows: usize, enabled: bool) -> Self {
        Self {
            total_rows,
            updated_count: 0,
            missed_count: 0,
            current_index: 0,
            enabled,
        }
    }

    pub fn start(&self) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(format!("📞 Found {} places without a phone number...\n", self.total_rows)),
            ResetColor
        )?;
        self.show_progress()
    }

    pub fn update_progress(&mut self, updated: bool, name: &str, phone: &str) -> io::Result<()> {
        self.current_index += 1;
        if updated {
            self.updated_count += 1;
        } else {
            self.missed_count += 1;
        }
        if !self.enabled {
            return Ok(());
        }

        execute!(io::stdout(), MoveToPreviousLine(1), Clear(ClearType::CurrentLine))?;
        self.show_progress()?;

        if updated {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Green),
                Print(format!("✓ {}: {}\n", name, phone)),
                ResetColor
            )
        } else {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Yellow),
                Print(format!("⚠ No phone shown for {}\n", name)),
                ResetColor
            )
        }
    }

    pub fn complete(&self) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Green),
            Print(format!(
                "✅ Phone enrichment completed: {} updated, {} without phone\n",
                self.updated_count, self.missed_count
            )),
            ResetColor
        )
    }

    fn show_progress(&self) -> io::Result<()> {
        let percentage = if self.total_rows > 0 {
            (self.current_index * 100) / self.total_rows
        } else {
            0
        };
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Blue),
            Print(format!(
                "📍 Progress: {}/{} ({}%) - {} updated, {} without phone\n",
                self.current_index, self.total_rows, percentage, self.updated_count, self.missed_count
            )),
            ResetColor
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub candidates: usize,
    pub updated: usize,
    pub without_phone: usize,
    pub failed: usize,
    pub sessions_recycled: usize,
}

pub fn needs_phone(row: &CleanedRecord) -> bool {
    !row.record.profile_url.trim().is_empty() && row.phone_e164.trim().is_empty()
}

/// Interchange headers for the enriched file: the input order plus `phone`/`phone_e164` when missing.
pub fn enrich_headers(input: &[String]) -> Vec<String> {
    let mut headers = input.to_vec();
    for column in ENRICHED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            headers.push(column.to_string());
        }
    }
    headers
}

/// Phone number shown in a detail pane snapshot, as displayed.
pub fn phone_from_detail(detail_html: &str, rules: &PhoneRules) -> String {
    let raw = canonicalize(&extract_detail(detail_html).phone);
    if raw.is_empty() {
        return raw;
    }
    let extracted = rules.extract(&raw);
    if extracted.is_empty() {
        raw
    } else {
        extracted
    }
}

/// Opens a profile and reads its phone. Empty when the pane shows none in time.
pub fn read_phone<P: Page + ?Sized>(page: &mut P, url: &str, timeout: Duration, rules: &PhoneRules) -> HarvestResult<String> {
    debug!("Opening profile for phone enrichment: {}", url);
    page.navigate(url)?;
    if !wait_until(timeout, DETAIL_POLL_INTERVAL, || page.detail_ready())? {
        debug!("No detail pane for {} within {:?}", url, timeout);
        return Ok(String::new());
    }
    Ok(phone_from_detail(&page.detail_html()?, rules))
}

/// Backfills `phone`/`phone_e164` for rows that have a profile link but no canonical phone.
///
/// The table is written to `output` every `checkpoint_every` updates and once at the end.
/// Cells outside the phone columns are written back exactly as they were read.
pub fn enrich_table<F: SessionFactory>(
    table: &mut Table,
    output: &str,
    sessions: &mut SessionManager<F>,
    options: &EnrichOptions,
    tui: &mut EnrichTUI,
) -> Result<EnrichReport> {
    let rules = PhoneRules::new(&options.phone);
    let headers = enrich_headers(&table.headers);
    let limit = options.limit.unwrap_or(table.rows.len()).min(table.rows.len());
    let mut report = EnrichReport {
        candidates: table.rows[..limit].iter().filter(|r| needs_phone(r)).count(),
        ..Default::default()
    };
    info!(
        "Starting phone enrichment: {} rows, {} without phone, out={}",
        limit,
        report.candidates,
        output
    );
    tui.start()?;

    for index in 0..limit {
        if index > 0 && options.restart_every > 0 && index % options.restart_every == 0 {
            info!("Restarting browser after {} rows to stay fresh", index);
            sessions.release();
            report.sessions_recycled += 1;
        }

        let row = &table.rows[index];
        if !needs_phone(row) {
            continue;
        }
        let url = row.record.profile_url.trim().to_string();
        let name = row.resolved_name().to_string();

        let phone = match sessions.acquire() {
            Ok(page) => read_phone(page, &url, options.phone_timeout, &rules),
            Err(e) => Err(e),
        };
        pause(options.jitter);

        let phone = match phone {
            Ok(phone) => phone,
            Err(e) => {
                warn!("Phone lookup failed for {}: {}", url, e);
                if matches!(e, HarvestError::Session(_)) {
                    sessions.mark_degraded();
                }
                report.failed += 1;
                tui.update_progress(false, &name, "")?;
                continue;
            }
        };
        if phone.is_empty() {
            report.without_phone += 1;
            tui.update_progress(false, &name, "")?;
            continue;
        }

        let row = &mut table.rows[index];
        row.phone_e164 = rules.normalize(&phone);
        row.record.phone = phone;
        report.updated += 1;
        tui.update_progress(true, &name, &row.phone_e164)?;

        if options.checkpoint_every > 0 && report.updated % options.checkpoint_every == 0 {
            info!("Progress: updated_phones={} / processed_rows={}", report.updated, index + 1);
            write_table_preserving(output, &headers, table, &ENRICHED_COLUMNS)?;
        }
    }

    write_table_preserving(output, &headers, table, &ENRICHED_COLUMNS)?;
    sessions.release();
    tui.complete()?;
    info!("Phone enrichment finished. Total updated rows: {}", report.updated);
    Ok(report)
}
