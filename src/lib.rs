//! sheet-tally: consolidate expense tables from many Google sheets into one summary sheet.
//!
//! The work is done by the aggregation pipeline (see `commands::aggregate`), which is reachable
//! from the `tally` CLI and from an MCP server.

mod ai;
mod api;
pub mod args;
mod backup;
pub mod commands;
mod config;
mod error;
mod mcp;
pub mod model;
pub mod pipeline;
mod utils;


pub use ai::AssistMode;
pub use api::{resolve_id, Mode};
pub use backup::Backup;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
