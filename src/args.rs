//! These structs provide the CLI interface for the tally CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// tally: Add up expenses from many Google sheets into one summary sheet.
///
/// Each source sheet is expected to hold a table of expenses with a header row. tally works out
/// which columns hold the category and the amount, merges category names that mean the same
/// thing, and writes one "Category, Amount" table to the destination sheet.
///
/// A language model (any OpenAI-compatible service, see config.json) answers the column and
/// category questions. When it is not reachable, tally falls back to matching header keywords
/// and leaves category names as they are.
///
/// There is also a mode in which an AI agent can use this program through the mcp subcommand.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need the OAuth client credentials for the
    /// Google Sheets API downloaded to a file; pass it as --client-secret. The OAuth token
    /// (token.json with a refresh token) is expected in $TALLY_HOME/.secrets/ afterwards.
    Init(InitArgs),
    /// Aggregate the source sheets into the destination sheet.
    Aggregate(AggregateArgs),
    /// Run as an MCP server over stdio.
    Mcp(McpArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where tally configuration, secrets and snapshots are held. Defaults to
    /// ~/tally
    #[arg(long, env = "TALLY_HOME", default_value_t = default_tally_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `tally init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The path to your downloaded OAuth client credentials. This file will be copied to the
    /// secrets directory in the home directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(client_secret: impl Into<PathBuf>) -> Self {
        Self {
            client_secret: client_secret.into(),
        }
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }
}

/// (Not shown): Args for the `tally aggregate` command.
#[derive(Debug, Parser, Clone)]
pub struct AggregateArgs {
    /// A source sheet URL or spreadsheet id. Repeat for more sources, or separate them with
    /// commas. When omitted you will be asked for them.
    #[arg(long = "source", value_delimiter = ',')]
    sources: Vec<String>,

    /// The destination sheet URL or spreadsheet id. When omitted you will be asked for it.
    #[arg(long)]
    master: Option<String>,

    /// Answer yes to every confirmation, including overwriting a destination that already holds
    /// data.
    #[arg(long, short)]
    yes: bool,
}

impl AggregateArgs {
    pub fn new(sources: Vec<String>, master: Option<String>, yes: bool) -> Self {
        Self {
            sources,
            master,
            yes,
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn master(&self) -> Option<&str> {
        self.master.as_deref()
    }

    pub fn yes(&self) -> bool {
        self.yes
    }
}

/// (Not shown): Args for the `tally mcp` command.
#[derive(Debug, Parser, Clone)]
pub struct McpArgs {}

fn default_tally_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("tally"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or TALLY_HOME instead of relying on the default tally \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("tally")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
