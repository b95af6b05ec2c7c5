use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::StoreConfig;
use crate::models::CleanedRecord;
use crate::utils::{output_headers, Table};

pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub rows_sent: usize,
    pub skipped_without_url: usize,
    pub batches: usize,
}

/// One JSON object per row, keyed by interchange column.
pub fn row_payload(headers: &[String], row: &CleanedRecord) -> Payload {
    headers
        .iter()
        .map(|h| (h.clone(), Value::String(row.column(h).unwrap_or_default())))
        .collect()
}

/// Rows worth sending: those with a profile URL, the conflict key on the remote side.
pub fn payloads(table: &Table) -> (Vec<Payload>, usize) {
    let headers = output_headers(&table.headers);
    let mut skipped = 0;
    let sent: Vec<Payload> = table
        .rows
        .iter()
        .filter(|row| {
            let keep = !row.record.profile_url.trim().is_empty();
            if !keep {
                skipped += 1;
            }
            keep
        })
        .map(|row| row_payload(&headers, row))
        .collect();
    (sent, skipped)
}

pub struct UpsertClient {
    client: Client,
    config: StoreConfig,
}

impl UpsertClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("placefinder/0.1 (batch upsert)")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/rest/v1/{}?on_conflict=profile_url",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    /// Sends one batch. Conflicting rows are merged, the last write wins.
    pub fn send_batch(&self, batch_no: usize, rows: &[Payload]) -> Result<()> {
        debug!("Sending batch {} ({} rows) to {}", batch_no, rows.len(), self.endpoint());
        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .with_context(|| format!("Failed to send batch {}", batch_no))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("Batch {} rejected with HTTP {}: {}", batch_no, status, body);
        }
        Ok(())
    }

    pub fn upsert_table(&self, table: &Table) -> Result<UpsertReport> {
        let (rows, skipped) = payloads(table);
        if skipped > 0 {
            warn!("Skipping {} rows without profile_url", skipped);
        }
        let mut report = UpsertReport {
            skipped_without_url: skipped,
            ..Default::default()
        };

        let bar = ProgressBar::new(rows.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} rows {msg}")?.progress_chars("=> "),
        );
        for (i, chunk) in rows.chunks(self.config.batch_size.max(1)).enumerate() {
            bar.set_message(format!("batch {}", i + 1));
            self.send_batch(i + 1, chunk)?;
            bar.inc(chunk.len() as u64);
            report.batches += 1;
            report.rows_sent += chunk.len();
        }
        bar.finish_with_message("done");
        info!(
            "Upserted {} rows in {} batches into {}",
            report.rows_sent,
            report.batches,
            self.config.table
        );
        Ok(report)
    }
}
