//! Implements the `Sheet` trait using the `sheets::Client` to interact with Google sheets.

use crate::api::{a1, Sheet, TokenProvider};
use crate::error::{tagged, ErrorType, Res};
use crate::model::CellRef;
use anyhow::Context;
use sheets::types::{
    BatchClearValuesRequest, BatchUpdateValuesRequest, DateTimeRenderOption, Dimension,
    ValueInputOption, ValueRange, ValueRenderOption,
};
use sheets::ClientError;
use tokio::sync::Mutex;
use tracing::trace;

/// Implements the `Sheet` trait using the `sheets::Client`. It takes a `TokenProvider`, from which
/// it gets a fresh access token before each request.
pub(crate) struct GoogleSheet {
    token_provider: Mutex<TokenProvider>,
}

impl GoogleSheet {
    pub(crate) fn new(token_provider: TokenProvider) -> Self {
        Self {
            token_provider: Mutex::new(token_provider),
        }
    }

    /// Creates a sheets client with an access token that is refreshed if needed.
    async fn client(&self) -> Res<sheets::Client> {
        let mut token_provider = self.token_provider.lock().await;
        let access_token = token_provider.token_with_refresh().await?;

        // The sheets crate wants client_id, client_secret, redirect_uri and refresh_token, but we
        // only need the access token for API calls; refresh is handled by the TokenProvider.
        Ok(sheets::Client::new(
            String::new(),
            String::new(),
            String::new(),
            access_token.to_string(),
            String::new(),
        ))
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn primary_sheet_name(&self, spreadsheet_id: &str) -> Res<String> {
        trace!("primary_sheet_name for {spreadsheet_id}");
        let response = self
            .client()
            .await?
            .spreadsheets()
            .get(spreadsheet_id, false, &[])
            .await
            .map_err(map_client_error)
            .with_context(|| {
                format!("Failed to fetch metadata for spreadsheet '{spreadsheet_id}'")
            })?;

        response
            .body
            .sheets
            .first()
            .and_then(|sheet| sheet.properties.as_ref())
            .map(|properties| properties.title.clone())
            .filter(|title| !title.is_empty())
            .ok_or_else(|| {
                tagged(
                    ErrorType::NotFound,
                    format!("Spreadsheet '{spreadsheet_id}' has no sheets"),
                )
            })
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        range: &str,
    ) -> Res<Vec<Vec<String>>> {
        let range = a1(sheet_name, range);
        trace!("read_range {range} from {spreadsheet_id}");
        let response = self
            .client()
            .await?
            .spreadsheets()
            .values_get(
                spreadsheet_id,
                &range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to read {range} from '{spreadsheet_id}'"))?;
        Ok(response.body.values)
    }

    async fn clear_range(&self, spreadsheet_id: &str, sheet_name: &str, range: &str) -> Res<()> {
        let range = a1(sheet_name, range);
        trace!("clear_range {range} in {spreadsheet_id}");
        let request = BatchClearValuesRequest {
            ranges: vec![range.clone()],
        };
        self.client()
            .await?
            .spreadsheets()
            .values_batch_clear(spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to clear {range} in '{spreadsheet_id}'"))?;
        Ok(())
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start: CellRef,
        table: &[Vec<String>],
    ) -> Res<()> {
        let width = table.iter().map(Vec::len).max().unwrap_or(0);
        if table.is_empty() || width == 0 {
            return Ok(());
        }
        // The API wants a range that covers every value we send.
        let end = CellRef::new(start.row() + table.len() - 1, start.col() + width - 1);
        let range = a1(sheet_name, &format!("{start}:{end}"));
        trace!("write_range {range} in {spreadsheet_id}");

        let request = BatchUpdateValuesRequest {
            data: vec![ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: range.clone(),
                values: table
                    .iter()
                    .map(|row| row.iter().map(|v| user_entered(v)).collect())
                    .collect(),
            }],
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };

        self.client()
            .await?
            .spreadsheets()
            .values_batch_update(spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {range} in '{spreadsheet_id}'"))?;
        Ok(())
    }
}

/// Prepares a value for `USER_ENTERED` input so that the sheet stores exactly the text we read.
/// Numbers in their canonical form (`10`, `5.5`, `-3`) stay numbers. Anything else gets the
/// leading apostrophe that makes Sheets keep it as literal text, so that `=IMPORTXML(..)` is not a
/// formula, `0012` keeps its zeros, and `1/2` or `TRUE` are not turned into a date or a boolean.
fn user_entered(value: &str) -> String {
    let canonical_number = value
        .parse::<f64>()
        .is_ok_and(|n| n.is_finite() && n.to_string() == value);
    if value.is_empty() || canonical_number {
        value.to_string()
    } else {
        format!("'{value}")
    }
}

/// Converts a `sheets::ClientError` into an `anyhow::Error`. HTTP failures whose status tells us
/// what went wrong are tagged as `Access` or `NotFound`.
fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::HttpError { status, .. } => match status.as_u16() {
            401 | 403 => return tagged(ErrorType::Access, format!("Access denied: {e}")),
            404 => return tagged(ErrorType::NotFound, format!("Not found: {e}")),
            _ => "HttpError".to_string(),
        },
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_entered_keeps_amounts_numeric() {
        assert_eq!(user_entered("10"), "10");
        assert_eq!(user_entered("5.5"), "5.5");
        assert_eq!(user_entered("-3"), "-3");
        assert_eq!(user_entered(""), "");
    }

    #[test]
    fn test_user_entered_escapes_text() {
        assert_eq!(user_entered("Food"), "'Food");
        assert_eq!(
            user_entered("=IMPORTXML(\"http://x\", \"//a\")"),
            "'=IMPORTXML(\"http://x\", \"//a\")"
        );
        assert_eq!(user_entered("+1"), "'+1");
        assert_eq!(user_entered("@sum"), "'@sum");
        assert_eq!(user_entered("0012"), "'0012");
        assert_eq!(user_entered("1/2"), "'1/2");
        assert_eq!(user_entered("TRUE"), "'TRUE");
        assert_eq!(user_entered("1e3"), "'1e3");
        assert_eq!(user_entered(" 7"), "' 7");
        assert_eq!(user_entered("NaN"), "'NaN");
        assert_eq!(user_entered("'quoted"), "''quoted");
    }
}
