//! The remote services this program talks to, each behind a trait so that the pipeline can be run
//! against in-memory fakes:
//! - `Sheet`: read, clear and write values in Google spreadsheets
//! - `Llm`: send a prompt to a language model and get its text reply

mod files;
mod llm;
mod oauth;
mod sheet;
mod test_llm;
mod test_sheet;

use crate::error::Res;
use crate::model::CellRef;
use crate::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) use llm::ChatLlm;
pub(crate) use oauth::TokenProvider;
pub(crate) use sheet::GoogleSheet;
pub(crate) use test_llm::TestLlm;
pub(crate) use test_sheet::TestSheet;
#[cfg(test)]
pub(crate) use test_sheet::TestSpreadsheet;

/// The environment variable that switches the program to in-memory services.
pub const TEST_MODE_ENV: &str = "TALLY_IN_TEST_MODE";

/// OAuth scopes the Sheets token must carry.
pub(crate) const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// The bounded range read from every source.
pub(crate) const READ_RANGE: &str = "A1:Z100";

/// The destination range that is read for the overwrite check and the snapshot, then cleared
/// before the aggregate table is written.
pub(crate) const CLEAR_RANGE: &str = "A:Z";

/// Whether we are talking to Google and a real model service, or to in-memory stand-ins.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Testing,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Testing` when `TALLY_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Google,
        }
    }
}

/// Values in Google spreadsheets, addressed by spreadsheet id, tab name and A1 range. All methods
/// take `&self` so that several reads can be in flight at once.
#[async_trait::async_trait]
pub(crate) trait Sheet: Send + Sync {
    /// The title of the first tab of the spreadsheet.
    async fn primary_sheet_name(&self, spreadsheet_id: &str) -> Res<String>;

    /// The values in `range` as rows of strings. Trailing empty rows and cells are not returned,
    /// so an empty range gives an empty `Vec`.
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        range: &str,
    ) -> Res<Vec<Vec<String>>>;

    /// Deletes the values in `range`. Formatting is left alone.
    async fn clear_range(&self, spreadsheet_id: &str, sheet_name: &str, range: &str) -> Res<()>;

    /// Writes `table` with its top-left value at `start`. Cells outside the table's footprint are
    /// left alone.
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start: CellRef,
        table: &[Vec<String>],
    ) -> Res<()>;
}

/// A language model that answers a single prompt with text.
#[async_trait::async_trait]
pub(crate) trait Llm: Send + Sync {
    /// A short description for logs, e.g. the model name.
    fn name(&self) -> &str;

    /// Sends `prompt` as a single user message and returns the reply text.
    async fn complete(&self, prompt: &str) -> Res<String>;
}

/// Creates the `Sheet` implementation for `mode`.
pub(crate) async fn sheet(config: &Config, mode: Mode) -> Res<Arc<dyn Sheet>> {
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path()).await?;
            Ok(Arc::new(GoogleSheet::new(token_provider)))
        }
        Mode::Testing => Ok(Arc::new(TestSheet)),
    }
}

/// Creates the `Llm` implementation for `mode`.
pub(crate) fn llm(config: &Config, mode: Mode) -> Res<Arc<dyn Llm>> {
    match mode {
        Mode::Google => Ok(Arc::new(ChatLlm::from_config(config)?)),
        Mode::Testing => Ok(Arc::new(TestLlm::offline())),
    }
}

/// Extracts the spreadsheet id from a reference such as
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit#gid=0`. The id is the path segment
/// after `/d/`, ending at the next `/`, `?` or `#`. A reference without that pattern is taken
/// to be the id itself.
pub fn resolve_id(reference: &str) -> &str {
    let parts: Vec<&str> = reference.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i > 0 && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if !id.is_empty() {
                return id;
            }
        }
    }
    reference
}

/// Builds an A1 range string with a quoted tab name, e.g. `'My Tab'!A1:Z100`.
pub(crate) fn a1(sheet_name: &str, range: &str) -> String {
    format!("'{}'!{range}", sheet_name.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        assert_eq!(
            resolve_id(url),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );
        assert_eq!(
            resolve_id("https://docs.google.com/spreadsheets/d/ABC123"),
            "ABC123"
        );
        assert_eq!(
            resolve_id("https://docs.google.com/spreadsheets/d/ABC123?foo=bar"),
            "ABC123"
        );
        assert_eq!(
            resolve_id("https://docs.google.com/spreadsheets/d/ABC-12_3#gid=0"),
            "ABC-12_3"
        );
    }

    #[test]
    fn test_resolve_id_verbatim() {
        assert_eq!(resolve_id("ABC123"), "ABC123");
        assert_eq!(
            resolve_id("https://example.com/invalid"),
            "https://example.com/invalid"
        );
        assert_eq!(
            resolve_id("https://docs.google.com/spreadsheets/d/"),
            "https://docs.google.com/spreadsheets/d/"
        );
        assert_eq!(resolve_id(""), "");
    }

    #[test]
    fn test_a1_quotes_sheet_names() {
        assert_eq!(a1("Sheet1", READ_RANGE), "'Sheet1'!A1:Z100");
        assert_eq!(a1("Bob's Tab", "A1"), "'Bob''s Tab'!A1");
    }

    #[test]
    fn test_range_constants_parse() {
        use crate::model::CellRange;
        assert!(READ_RANGE.parse::<CellRange>().is_ok());
        assert!(CLEAR_RANGE.parse::<CellRange>().is_ok());
    }
}
