//! Thin client for the spreadsheet values API.
//!
//! Only the batched cell-range surface the sync needs: batch get, batch
//! update, one column, one cell. Writes go through `USER_ENTERED` semantics
//! so the spreadsheet applies its own type coercion to prices and notes.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sheet-qualified A1 range: `("Queue", "G5")` → `"Queue!G5"`.
pub fn qualify_range(sheet_name: &str, cell: &str) -> String {
    format!("{}!{}", sheet_name, cell)
}

/// One ranged write in a batch update.
#[derive(Debug, Clone, Serialize)]
pub struct ValueRange {
    pub range: String,
    pub values: Vec<Vec<Value>>,
}

/// Value semantics for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputOption {
    /// Store values as-is
    Raw,
    /// Let the spreadsheet parse the values as if typed in
    UserEntered,
}

impl ValueInputOption {
    fn as_str(self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<RangeValues>,
}

#[derive(Debug, Deserialize)]
struct RangeValues {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Client for one spreadsheet service endpoint.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    pub(crate) base_url: String,
    token: String,
}

impl SheetsClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Fetch one value per requested cell, in request order. Empty cells come
    /// back as `None`.
    pub async fn batch_get(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        cells: &[String],
    ) -> Result<Vec<Option<Value>>> {
        let url = format!(
            "{}/spreadsheets/{}/values:batchGet",
            self.base_url, sheet_id
        );
        let ranges: Vec<(&str, String)> = cells
            .iter()
            .map(|cell| ("ranges", qualify_range(sheet_name, cell)))
            .collect();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&ranges)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: BatchGetResponse = response.json().await?;

        Ok((0..cells.len())
            .map(|i| {
                parsed
                    .value_ranges
                    .get(i)
                    .and_then(|r| r.values.first())
                    .and_then(|row| row.first())
                    .cloned()
            })
            .collect())
    }

    /// Submit every ranged write as a single batch call.
    pub async fn batch_update(
        &self,
        sheet_id: &str,
        data: &[ValueRange],
        input_option: ValueInputOption,
    ) -> Result<()> {
        let url = format!(
            "{}/spreadsheets/{}/values:batchUpdate",
            self.base_url, sheet_id
        );
        let body = serde_json::json!({
            "valueInputOption": input_option.as_str(),
            "data": data,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Fetch a whole column range (e.g. `"B:B"` or `"P5:P"`) top to bottom.
    pub async fn column_values(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        col_range: &str,
    ) -> Result<Vec<Value>> {
        let range = qualify_range(sheet_name, col_range);
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            sheet_id,
            urlencoding::encode(&range)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("majorDimension", "COLUMNS")])
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: RangeValues = response.json().await?;

        Ok(parsed.values.into_iter().next().unwrap_or_default())
    }

    /// Read a single cell with unformatted rendering. `None` when blank.
    pub async fn get_cell(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        cell: &str,
    ) -> Result<Option<Value>> {
        let range = qualify_range(sheet_name, cell);
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            sheet_id,
            urlencoding::encode(&range)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")])
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: RangeValues = response.json().await?;

        Ok(parsed
            .values
            .first()
            .and_then(|row| row.first())
            .cloned())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::warn!("Sheets API error {}: {}", status, body);
        return Err(SyncError::HttpStatus(status));
    }
    Ok(response)
}
