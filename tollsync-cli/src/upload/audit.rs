//! Audit trail of upload handling, newest entry first

use anyhow::{Context, Result};

use crate::api::sheets::{TabularSource, ValueWrite};
use crate::config::AuditConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Relocated,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Relocated => "relocated",
            Outcome::Rejected => "rejected",
        }
    }
}

/// One audit row: `[timestamp, object, outcome, detail]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: String,
    pub object: String,
    pub outcome: Outcome,
    pub detail: String,
}

impl AuditEntry {
    fn cells(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.object.clone(),
            self.outcome.as_str().to_string(),
            self.detail.clone(),
        ]
    }
}

pub struct AuditLog<'a> {
    sheet: &'a dyn TabularSource,
    config: AuditConfig,
}

impl<'a> AuditLog<'a> {
    pub fn new(sheet: &'a dyn TabularSource, config: AuditConfig) -> Self {
        Self { sheet, config }
    }

    /// Insert a blank row under the header and write the entry into it
    pub async fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.sheet
            .insert_blank_row(self.config.sheet_id, 1)
            .await
            .context("Failed to insert audit row")?;

        let range = format!("'{}'!A2", self.config.sheet_name);
        self.sheet
            .write_batch(vec![ValueWrite::row(range, entry.cells())])
            .await
            .context("Failed to write audit entry")?;

        log::debug!("Audit: {} {} ({})", entry.object, entry.outcome.as_str(), entry.detail);
        Ok(())
    }
}
