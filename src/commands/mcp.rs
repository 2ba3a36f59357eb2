
use crate::commands::Out;
use crate::mcp::Io;
use crate::{mcp, Config, Mode, Result};

/// Serves the `aggregate_expenses` tool over stdin/stdout until the client goes away. An MCP client
/// starts `tally mcp` as a subprocess.
pub async fn mcp(config: Config, mode: Mode) -> Result<Out<()>> {
    mcp::run_server(config, mode, Io::Stdio).await?;
    Ok("The MCP client disconnected".into())
}
