//! The tools offered by the MCP server.

use crate::commands;
use crate::mcp::mcp_utils::tool_result;
use crate::mcp::TallyServer;
use crate::pipeline::{AggregateRequest, AutoConfirm};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use rmcp::{tool, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters for the aggregate_expenses tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "AggregateExpensesParams")]
pub struct AggregateParams {
    /// The Google Sheets URLs (or bare spreadsheet ids) of the sheets holding expenses. The first
    /// tab of each is read.
    pub source_urls: Vec<String>,

    /// The Google Sheets URL (or bare spreadsheet id) of the sheet that receives the summary. Its
    /// first tab is cleared and overwritten.
    pub master_url: String,
}

impl From<AggregateParams> for AggregateRequest {
    fn from(params: AggregateParams) -> Self {
        AggregateRequest {
            sources: params.source_urls,
            master: params.master_url,
        }
    }
}

#[tool_router(vis = "pub(super)")]
impl TallyServer {
    /// Add up the expenses in several Google sheets and write a "Category, Amount" summary table
    /// to a destination sheet.
    ///
    /// For each source, the first tab is read (A1:Z100) and its header row is used to find the
    /// category column and the amount column. Category names that mean the same thing across
    /// sources are merged under one canonical name, amounts are summed per category, and the
    /// result is written to the first tab of the destination, sorted by category.
    ///
    /// # Caution
    ///
    /// The destination's columns A:Z are cleared before the table is written, even when it
    /// already holds data. Calling this tool is taken as consent to that. A JSON snapshot of the
    /// old contents and of the new table is saved locally first.
    ///
    /// Rows without a usable category or a plain numeric amount are skipped and counted in the
    /// result's `skipped_rows`.
    #[tool]
    async fn aggregate_expenses(
        &self,
        Parameters(params): Parameters<AggregateParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            "MCP: aggregate_expenses called with {} sources",
            params.source_urls.len()
        );
        let config = (*self.config).clone();
        let out = commands::aggregate(config, self.mode, params.into(), &AutoConfirm).await;
        tool_result(out)
    }
}
