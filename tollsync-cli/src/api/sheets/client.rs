//! Google Sheets v4 client for the tabular source

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Row, TableRange, TabularSource, ValueWrite, cell_to_string};
use crate::config::SheetsConfig;

/// Response body of `GET values/{range}`
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Sheets API client bound to one spreadsheet
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, config: &SheetsConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
        }
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<()> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Sheets request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("Sheets API returned {} for {}: {}", status, url, text);
            bail!("Sheets API returned {}: {}", status, text);
        }
        Ok(())
    }
}

#[async_trait]
impl TabularSource for SheetsClient {
    async fn read(&self, range: &TableRange) -> Result<Vec<Row>> {
        let url = format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(&range.to_string())
        );
        log::debug!("Reading range {}", range);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .with_context(|| format!("Failed to read range {}", range))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("Sheets API returned {} reading {}: {}", status, range, text);
            bail!("Sheets API returned {} reading {}: {}", status, range, text);
        }

        let body: ValueRange = response
            .json()
            .await
            .with_context(|| format!("Invalid response body reading {}", range))?;

        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn write_batch(&self, writes: Vec<ValueWrite>) -> Result<()> {
        if writes.is_empty() {
            log::debug!("No spreadsheet writes to submit");
            return Ok(());
        }

        let count = writes.len();
        let url = format!("{}/values:batchUpdate", self.spreadsheet_url());
        let body = json!({
            "valueInputOption": "RAW",
            "data": writes,
        });
        self.post_json(&url, &body)
            .await
            .with_context(|| format!("Failed to write {} spreadsheet ranges", count))?;

        log::debug!("Wrote {} spreadsheet ranges", count);
        Ok(())
    }

    async fn insert_blank_row(&self, sheet_id: i64, index: usize) -> Result<()> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let body = json!({
            "requests": [{
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": index,
                        "endIndex": index + 1,
                    },
                    "inheritFromBefore": false,
                }
            }]
        });
        self.post_json(&url, &body)
            .await
            .with_context(|| format!("Failed to insert row {} on sheet {}", index, sheet_id))
    }
}
