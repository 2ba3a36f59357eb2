//! An MCP (Model Context Protocol) server with a single tool, `aggregate_expenses`, so that an
//! agent can run the aggregation on a user's behalf.

mod mcp_utils;
mod tools;

use crate::error::{ErrorType, IntoResult};
use crate::{Config, Mode};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{tool_handler, ServerHandler, ServiceExt};
use std::sync::Arc;
use tracing::info;

/// Answers MCP requests using the config the server was started with.
#[derive(Debug, Clone)]
pub struct TallyServer {
    mode: Mode,
    config: Arc<Config>,
    tool_router: ToolRouter<TallyServer>,
}

impl TallyServer {
    pub fn new(config: Config, mode: Mode) -> Self {
        Self {
            mode,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_handler]
impl ServerHandler for TallyServer {
    /// Returns server information sent to the MCP client during initialization. The
    /// `instructions` tell the agent what the server is for and what the tool will do to the
    /// destination sheet.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "tally".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(include_str!("docs/INTRO.md").into()),
        }
    }
}

/// Where the server reads requests and writes responses.
#[derive(Debug, Default)]
pub(crate) enum Io {
    #[default]
    Stdio,
    /// The server end of an in-memory duplex pipe.
    #[cfg(test)]
    Mock(tokio::io::DuplexStream),
}

/// Serves requests on `io` until the client disconnects.
pub(crate) async fn run_server(config: Config, mode: Mode, io: Io) -> crate::Result<()> {
    let server = TallyServer::new(config, mode);
    info!("Starting the MCP server");

    let service = match io {
        Io::Stdio => server
            .serve(stdio())
            .await
            .map_err(|e| anyhow::anyhow!("The MCP handshake failed: {e}"))
            .pub_result(ErrorType::Service)?,
        #[cfg(test)]
        Io::Mock(stream) => server
            .serve(stream)
            .await
            .map_err(|e| anyhow::anyhow!("The MCP handshake failed: {e}"))
            .pub_result(ErrorType::Service)?,
    };

    info!("MCP server ready");
    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("The MCP session ended with an error: {e}"))
        .pub_result(ErrorType::Service)?;

    info!("MCP client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use rmcp::model::CallToolRequestParam;
    use tokio::io::duplex;

    fn arguments(sources: &[&str], master: &str) -> serde_json::Map<String, serde_json::Value> {
        let value = serde_json::json!({
            "source_urls": sources,
            "master_url": master,
        });
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_mcp_server_integration() {
        let (client_io, server_io) = duplex(4096);
        let env = TestEnv::new().await;
        let config = env.config();
        let source_a = env.spreadsheet(
            "Sheet1",
            &[
                &["Item", "Category", "Cost"],
                &["Tape", "Equipment", "10"],
                &["Cups", "Food", "5.50"],
            ],
        );
        let source_b = env.spreadsheet(
            "Sheet1",
            &[&["Desc", "Type", "Price"], &["Mic", "Audio Gear", "20"]],
        );
        let master = env.spreadsheet("Summary", &[&["Category", "Amount"], &["Old", "1"]]);

        let server_handle =
            tokio::spawn(
                async move { run_server(config, Mode::Testing, Io::Mock(server_io)).await },
            );

        let client = ().serve(client_io).await.expect("Failed to create client");

        let tools = client
            .list_tools(Default::default())
            .await
            .expect("Failed to list tools");
        assert_eq!(tools.tools.len(), 1);
        assert_eq!(tools.tools[0].name, "aggregate_expenses");

        // A run that succeeds. The tool call is the caller's consent to overwrite.
        let result = client
            .call_tool(CallToolRequestParam {
                name: "aggregate_expenses".into(),
                arguments: Some(arguments(&[&source_a, &source_b], &master)),
            })
            .await
            .expect("aggregate_expenses call failed");
        assert!(
            !result.is_error.unwrap_or(false),
            "aggregate_expenses returned error: {:?}",
            result.content
        );
        let text = result.content[0].as_text().unwrap().text.clone();
        assert!(text.contains("Total: 35.50"), "{text}");
        assert_eq!(env.rows(&master).len(), 4);

        // A run that fails returns an error result rather than failing the call.
        let missing = uuid::Uuid::new_v4().to_string();
        let result = client
            .call_tool(CallToolRequestParam {
                name: "aggregate_expenses".into(),
                arguments: Some(arguments(&[&missing], &master)),
            })
            .await
            .expect("aggregate_expenses call failed");
        assert!(result.is_error.unwrap_or(false));
        let text = result.content[0].as_text().unwrap().text.clone();
        assert!(text.contains(&missing), "{text}");

        // The server stops once the client is gone.
        drop(client);

        let server_result = tokio::time::timeout(std::time::Duration::from_secs(5), server_handle)
            .await
            .expect("Server timed out")
            .expect("Server task panicked");

        assert!(
            server_result.is_ok(),
            "Server returned error: {:?}",
            server_result
        );
    }
}
