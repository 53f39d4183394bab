//! Spreadsheet source adapter.
//!
//! Quotes arrive as rows of a shared spreadsheet. The link the operator pastes
//! is checked against a configured pattern, the spreadsheet ID is pulled out of
//! it, and the configured range is read through the Sheets values endpoint.

use crate::config::SheetsConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Tabular rows read from a spreadsheet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// All rows of `range`, header row included
    async fn get_rows(&self, source_id: &str, range: &str) -> Result<Vec<Vec<String>>>;
}

/// Validates spreadsheet links and extracts the spreadsheet ID
#[derive(Debug, Clone)]
pub struct SheetLinkValidator {
    pattern: Regex,
}

impl SheetLinkValidator {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| IngestError::Validation(format!("invalid link pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// Spreadsheet ID of a valid link, `SourceRead` otherwise
    pub fn spreadsheet_id(&self, link: &str) -> Result<String> {
        if !self.pattern.is_match(link) {
            return Err(IngestError::source_read(link, "not a valid spreadsheet link"));
        }

        extract_spreadsheet_id(link)
            .ok_or_else(|| IngestError::source_read(link, "no spreadsheet ID in link"))
    }
}

/// The path segment following `/d/`
pub fn extract_spreadsheet_id(link: &str) -> Option<String> {
    let mut segments = link.split('/');
    segments.find(|s| *s == "d")?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(String::from)
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn into_rows(body: ValueRange) -> Vec<Vec<String>> {
    body.values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect()
}

/// Reads rows through the Google Sheets v4 values endpoint
pub struct GoogleSheetsSource {
    client: reqwest::Client,
    api_base_url: Url,
    api_key: Option<String>,
}

impl GoogleSheetsSource {
    pub fn new(config: &SheetsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let api_base_url = Url::parse(&config.api_base_url)?;
        if api_base_url.cannot_be_a_base() {
            anyhow::bail!("sheets API base URL cannot carry a path: {api_base_url}");
        }

        Ok(Self {
            client,
            api_base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// `{base}/{id}/values/{range}` with each segment percent-encoded
    fn values_url(&self, source_id: &str, range: &str) -> Result<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::source_read(source_id, "sheets API base URL has no path"))?
            .pop_if_empty()
            .extend([source_id, "values", range]);
        Ok(url)
    }
}

#[async_trait]
impl SpreadsheetSource for GoogleSheetsSource {
    #[instrument(skip(self), fields(spreadsheet_id = %source_id))]
    async fn get_rows(&self, source_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let mut request = self.client.get(self.values_url(source_id, range)?);
        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IngestError::source_read(source_id, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::source_read(
                source_id,
                format!("sheets API returned {status}"),
            ));
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| IngestError::source_read(source_id, e))?;

        let rows = into_rows(body);
        if rows.is_empty() {
            return Err(IngestError::source_read(source_id, "no data found"));
        }

        debug!(rows = rows.len(), "Spreadsheet rows fetched");
        Ok(rows)
    }
}
