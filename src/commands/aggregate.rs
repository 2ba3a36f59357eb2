use crate::api;
use crate::commands::Out;
use crate::error::{tagged, ErrorType, IntoResult, Res};
use crate::pipeline::{AggregateRequest, Confirm, Pipeline, Report};
use crate::{Config, Mode, Result};
use anyhow::Context;
use std::fmt::{Debug, Formatter};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::info;

/// Aggregates the sources named in `request` into its destination.
///
/// `confirm` is asked before a destination that already holds data is overwritten, and before
/// category names are written without normalization. Declining either ends the run with an
/// `Aborted` report and leaves the destination unchanged.
pub async fn aggregate(
    config: Config,
    mode: Mode,
    request: AggregateRequest,
    confirm: &dyn Confirm,
) -> Result<Out<Report>> {
    let sheet = api::sheet(&config, mode)
        .await
        .context("Unable to set up access to Google Sheets")
        .pub_result(ErrorType::Config)?;
    let llm = api::llm(&config, mode).pub_result(ErrorType::Config)?;

    info!(
        "Aggregating {} sources into '{}'",
        request.sources.len(),
        request.master
    );
    let mut pipeline = Pipeline::new(sheet, llm, config.backup());
    let report = pipeline
        .run(&request, confirm)
        .await
        .pub_result(ErrorType::Internal)?;
    Ok(Out::new(report.message(), report))
}

type Input = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// Asks questions on the terminal. With `yes`, every confirmation is answered without asking.
///
/// Answers are read line by line from one buffered reader that lives as long as the `Console`,
/// so piped input holding several answers is consumed one answer per question.
pub struct Console {
    yes: bool,
    input: Mutex<Input>,
}

impl Debug for Console {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").field("yes", &self.yes).finish()
    }
}

impl Console {
    /// A console reading answers from stdin.
    pub fn new(yes: bool) -> Self {
        Self::with_input(yes, BufReader::new(tokio::io::stdin()))
    }

    /// A console reading answers from `input`.
    pub fn with_input(yes: bool, input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        let input: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(input);
        Self {
            yes,
            input: Mutex::new(input.lines()),
        }
    }

    /// Builds a request from the command line, asking for whatever is missing. Sources are
    /// entered as one comma-separated line.
    pub async fn request(
        &self,
        sources: &[String],
        master: Option<&str>,
    ) -> Result<AggregateRequest> {
        self.request_inner(sources, master)
            .await
            .pub_result(ErrorType::Request)
    }

    async fn request_inner(
        &self,
        sources: &[String],
        master: Option<&str>,
    ) -> Res<AggregateRequest> {
        let sources = if sources.is_empty() {
            split_list(&self.ask("Source sheet URLs or ids (comma-separated): ").await?)
        } else {
            sources.to_vec()
        };
        if sources.is_empty() {
            return Err(tagged(ErrorType::Request, "No source sheets were given"));
        }
        let master = match master {
            Some(master) => master.to_string(),
            None => self.ask("Destination sheet URL or id: ").await?,
        };
        if master.trim().is_empty() {
            return Err(tagged(ErrorType::Request, "No destination sheet was given"));
        }
        Ok(AggregateRequest { sources, master })
    }

    /// Prints `question` to stderr and reads the next line of input.
    async fn ask(&self, question: &str) -> Res<String> {
        {
            let mut stderr = std::io::stderr().lock();
            write!(stderr, "{question}").context("Unable to write to stderr")?;
            stderr.flush().context("Unable to flush stderr")?;
        }
        let line = self
            .input
            .lock()
            .await
            .next_line()
            .await
            .context("Unable to read from stdin")?;
        match line {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(tagged(ErrorType::Request, "No answer was given (end of input)")),
        }
    }
}

#[async_trait::async_trait]
impl Confirm for Console {
    async fn overwrite(&self, master_id: &str, data_rows: usize) -> anyhow::Result<bool> {
        if self.yes {
            return Ok(true);
        }
        let question = format!(
            "The destination '{master_id}' already has {data_rows} rows of data. Clear it and \
            write the new table? [y/N] "
        );
        Ok(is_yes(&self.ask(&question).await?))
    }

    async fn unnormalized(&self, categories: usize) -> anyhow::Result<bool> {
        if self.yes {
            return Ok(true);
        }
        let question = format!(
            "The model service is unavailable, so {categories} category names will be written \
            without merging similar ones. Continue? [y/N] "
        );
        Ok(is_yes(&self.ask(&question).await?))
    }
}

fn split_list(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
