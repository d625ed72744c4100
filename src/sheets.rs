//! Duplicate lookups against the Google Sheets lead log.
//!
//! The sheet is the system of record for accepted leads (an external
//! automation appends rows); this client only ever reads it. Lookups are
//! live per call, no local cache.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tracing::warn;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const LEADS_TAB: &str = "New Leads";

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Advisory duplicate check. `Ok(false)` when the email column cannot be
    /// located (fail open); `Err` on transport failure so the caller can
    /// distinguish "store unreachable" from "not a duplicate".
    async fn exists_by_email(&self, email: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: Client,
    spreadsheet_id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    pub fn from_env() -> Result<Self> {
        let spreadsheet_id = env::var("GOOGLE_SHEETS_SPREADSHEET_ID")
            .context("GOOGLE_SHEETS_SPREADSHEET_ID not set")?;
        let api_key =
            env::var("GOOGLE_SHEETS_API_KEY").context("GOOGLE_SHEETS_API_KEY not set")?;
        Ok(Self {
            client: Client::new(),
            spreadsheet_id,
            api_key,
        })
    }

    async fn fetch_range(&self, range: &str) -> Result<ValueRange> {
        let url = format!(
            "{SHEETS_BASE}/{}/values/{}?key={}",
            self.spreadsheet_id,
            urlencoding::encode(range),
            self.api_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Sheets request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Sheets API returned {} for range '{}'", status, range));
        }
        response.json().await.context("Invalid Sheets response")
    }

    /// 0-based index of the "email" header in row 1, if present.
    async fn email_column_index(&self) -> Result<Option<usize>> {
        let header_row = self.fetch_range(&format!("'{LEADS_TAB}'!1:1")).await?;
        let headers = header_row.values.into_iter().next().unwrap_or_default();
        Ok(headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("email")))
    }
}

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

#[async_trait]
impl LeadStore for SheetsClient {
    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let Some(index) = self.email_column_index().await? else {
            warn!("No 'email' header in tab '{}', skipping duplicate check", LEADS_TAB);
            return Ok(false);
        };

        let col = column_letter(index);
        let column = self.fetch_range(&format!("'{LEADS_TAB}'!{col}:{col}")).await?;

        let candidate = email.trim().to_lowercase();
        // Row 1 is the header.
        Ok(column
            .values
            .iter()
            .skip(1)
            .filter_map(|row| row.first())
            .any(|cell| cell.trim().to_lowercase() == candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_start_at_a() {
        assert_eq!(column_letter(0), 'A');
        assert_eq!(column_letter(3), 'D');
    }
}
