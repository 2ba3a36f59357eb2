//! The aggregation run: read every source, work out its columns, pull out expense records,
//! merge categories across all sources, sum, and replace the destination's contents with the
//! result.
//!
//! A run moves through `Stage`s in a fixed order. It ends in `Done` after a write, in `Aborted`
//! when a confirmation is declined, or in `Failed` when any step returns an error. Nothing is
//! written to the destination unless the run reaches `Writing`.

use crate::ai::{Assist, AssistMode};
use crate::api::{resolve_id, Llm, Sheet, CLEAR_RANGE, READ_RANGE};
use crate::backup::{Backup, MASTER_PRE, MASTER_TABLE};
use crate::error::{tagged, ErrorType, Res};
use crate::model::{AggregateTable, CategoryMapping, CellRef, ExpenseRecord, Extraction};
use anyhow::Context;
use futures::future::try_join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where a run is.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    Reading,
    Classifying,
    Extracting,
    Normalizing,
    Summing,
    PreWriteCheck,
    Writing,
    Done,
    Aborted,
    Failed,
}

serde_plain::derive_display_from_serialize!(Stage);

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The destination now holds the aggregate table.
    Written,
    /// A confirmation was declined and the destination was left alone.
    Aborted,
}

serde_plain::derive_display_from_serialize!(Outcome);

/// Asks the person (or program) running the aggregation for permission.
#[async_trait::async_trait]
pub trait Confirm: Send + Sync {
    /// The destination already has `data_rows` rows below its header. May they be replaced?
    async fn overwrite(&self, master_id: &str, data_rows: usize) -> anyhow::Result<bool>;

    /// No model is available, so `categories` distinct category names will be written as they
    /// are. Is that acceptable?
    async fn unnormalized(&self, categories: usize) -> anyhow::Result<bool>;
}

/// Says yes to everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait::async_trait]
impl Confirm for AutoConfirm {
    async fn overwrite(&self, _: &str, _: usize) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn unnormalized(&self, _: usize) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// What a run was asked to do. References may be URLs or bare spreadsheet ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub sources: Vec<String>,
    pub master: String,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub outcome: Outcome,
    /// `heuristic` or `model`.
    pub mode: String,
    pub sources_read: usize,
    pub records: usize,
    /// Data rows that did not produce an expense record.
    pub skipped_rows: usize,
    /// Summed amount per canonical category, in ascending category order.
    pub categories: Vec<CategoryTotal>,
    pub total: f64,
    /// Snapshot files written before the destination was cleared.
    pub snapshots: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
}

impl Report {
    fn new(
        outcome: Outcome,
        mode: AssistMode,
        gathered: &Gathered,
        table: &AggregateTable,
    ) -> Self {
        Self {
            outcome,
            mode: mode.to_string(),
            sources_read: gathered.sources,
            records: gathered.records,
            skipped_rows: gathered.skipped,
            categories: table
                .iter()
                .map(|(category, amount)| CategoryTotal {
                    category: category.to_string(),
                    amount,
                })
                .collect(),
            total: table.total(),
            snapshots: Vec::new(),
        }
    }

    /// The total with two decimals and thousands separators.
    pub fn formatted_total(&self) -> String {
        format_num::format_num!(",.2", self.total)
    }

    /// A one-line summary for the console or a tool result.
    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Written => format!(
                "Wrote {} categories from {} sources to the destination. Total: {}",
                self.categories.len(),
                self.sources_read,
                self.formatted_total()
            ),
            Outcome::Aborted => format!(
                "Aborted without writing to the destination. Total: {}",
                self.formatted_total()
            ),
        }
    }
}

/// The records of every source and the categories seen in them.
#[derive(Debug, Default)]
struct Gathered {
    sources: usize,
    records: usize,
    skipped: usize,
    extractions: Vec<Extraction>,
    categories: BTreeSet<String>,
}

/// One source after it has been read.
struct SourceRows {
    id: String,
    rows: Vec<Vec<String>>,
}

/// Runs aggregations against the given services. The services are passed in so that tests can
/// substitute in-memory ones.
pub(crate) struct Pipeline {
    sheet: Arc<dyn Sheet>,
    llm: Arc<dyn Llm>,
    backup: Backup,
    stage: Stage,
}

impl Pipeline {
    pub(crate) fn new(sheet: Arc<dyn Sheet>, llm: Arc<dyn Llm>, backup: Backup) -> Self {
        Self {
            sheet,
            llm,
            backup,
            stage: Stage::Start,
        }
    }

    #[cfg(test)]
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs one aggregation. On error the stage is left at `Failed` and the destination has not
    /// been touched, unless the failure happened while writing (see the logged recovery hint).
    pub(crate) async fn run(
        &mut self,
        request: &AggregateRequest,
        confirm: &dyn Confirm,
    ) -> Res<Report> {
        self.stage = Stage::Start;
        match self.run_inner(request, confirm).await {
            Ok(report) => Ok(report),
            Err(e) => {
                debug!("Run failed during {}", self.stage);
                self.advance(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner(
        &mut self,
        request: &AggregateRequest,
        confirm: &dyn Confirm,
    ) -> Res<Report> {
        let source_ids: Vec<&str> = request
            .sources
            .iter()
            .map(|s| resolve_id(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        if source_ids.is_empty() {
            return Err(tagged(ErrorType::Request, "At least one source is required"));
        }
        let master_id = resolve_id(request.master.trim());
        if master_id.is_empty() {
            return Err(tagged(ErrorType::Request, "A destination is required"));
        }

        self.advance(Stage::Reading);
        let sources = self.read_sources(&source_ids).await?;

        self.advance(Stage::Classifying);
        let assist = Assist::select(self.llm.clone()).await;
        let mut mappings = Vec::with_capacity(sources.len());
        for source in &sources {
            let headers: &[String] = source.rows.first().map(Vec::as_slice).unwrap_or(&[]);
            let mapping = assist
                .classify(headers)
                .await
                .with_context(|| format!("Unable to classify the columns of '{}'", source.id))?;
            info!(
                "Source '{}': category column {:?}, amount column {:?}",
                source.id, mapping.category, mapping.amount
            );
            mappings.push(mapping);
        }

        self.advance(Stage::Extracting);
        let mut gathered = Gathered {
            sources: sources.len(),
            ..Gathered::default()
        };
        for (source, mapping) in sources.iter().zip(mappings) {
            let extraction = Extraction::from_rows(&source.rows, mapping);
            if extraction.skipped > 0 {
                warn!(
                    "Source '{}': skipped {} rows without a usable category and amount",
                    source.id, extraction.skipped
                );
            }
            gathered.records += extraction.records.len();
            gathered.skipped += extraction.skipped;
            gathered
                .categories
                .extend(extraction.records.iter().map(|r| r.category.clone()));
            gathered.extractions.push(extraction);
        }

        self.advance(Stage::Normalizing);
        if assist.mode() == AssistMode::Heuristic
            && !gathered.categories.is_empty()
            && !confirm.unnormalized(gathered.categories.len()).await?
        {
            let identity = CategoryMapping::identity(&gathered.categories);
            let table = AggregateTable::sum(records(&gathered), &identity);
            self.advance(Stage::Aborted);
            return Ok(Report::new(Outcome::Aborted, assist.mode(), &gathered, &table));
        }
        let mapping = assist.normalize(&gathered.categories).await?;

        self.advance(Stage::Summing);
        let table = AggregateTable::sum(records(&gathered), &mapping);
        info!(
            "{} records in {} categories, total {}",
            gathered.records,
            table.len(),
            format_num::format_num!(",.2", table.total())
        );

        self.advance(Stage::PreWriteCheck);
        let master_sheet = self
            .sheet
            .primary_sheet_name(master_id)
            .await
            .with_context(|| format!("Unable to open the destination '{master_id}'"))?;
        // Read exactly what the clear will remove.
        let existing = self
            .sheet
            .read_range(master_id, &master_sheet, CLEAR_RANGE)
            .await
            .with_context(|| format!("Unable to read the destination '{master_id}'"))?;
        let data_rows = existing.iter().skip(1).filter(|row| !is_blank(row)).count();
        if data_rows > 0 && !confirm.overwrite(master_id, data_rows).await? {
            info!("Leaving the destination '{master_id}' unchanged");
            self.advance(Stage::Aborted);
            return Ok(Report::new(Outcome::Aborted, assist.mode(), &gathered, &table));
        }

        self.advance(Stage::Writing);
        let rows = table.to_rows();
        let mut report = Report::new(Outcome::Written, assist.mode(), &gathered, &table);
        report.snapshots.push(self.backup.save_json(MASTER_PRE, &existing).await?);
        let table_snapshot = self.backup.save_json(MASTER_TABLE, &rows).await?;
        report.snapshots.push(table_snapshot.clone());

        self.sheet
            .clear_range(master_id, &master_sheet, CLEAR_RANGE)
            .await
            .with_context(|| format!("Unable to clear the destination '{master_id}'"))?;
        if let Err(e) = self
            .sheet
            .write_range(master_id, &master_sheet, CellRef::new(0, 0), &rows)
            .await
        {
            error!(
                "The destination '{master_id}' was cleared but not written. The table that \
                should be there is saved at {}",
                table_snapshot.display()
            );
            return Err(e.context(format!("Unable to write the destination '{master_id}'")));
        }

        self.advance(Stage::Done);
        Ok(report)
    }

    /// Reads every source at once. The first failure fails the whole read.
    async fn read_sources(&self, ids: &[&str]) -> Res<Vec<SourceRows>> {
        let sheet = self.sheet.as_ref();
        try_join_all(ids.iter().map(|&id| read_source(sheet, id))).await
    }

    fn advance(&mut self, stage: Stage) {
        debug!("{} -> {stage}", self.stage);
        self.stage = stage;
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|value| value.trim().is_empty())
}

async fn read_source(sheet: &dyn Sheet, id: &str) -> Res<SourceRows> {
    let sheet_name = sheet
        .primary_sheet_name(id)
        .await
        .with_context(|| format!("Unable to open the source '{id}'"))?;
    let rows = sheet
        .read_range(id, &sheet_name, READ_RANGE)
        .await
        .with_context(|| format!("Unable to read the source '{id}'"))?;
    debug!("Read {} rows from '{id}' ({sheet_name})", rows.len());
    Ok(SourceRows {
        id: id.to_string(),
        rows,
    })
}

fn records(gathered: &Gathered) -> impl Iterator<Item = &ExpenseRecord> {
    gathered.extractions.iter().flat_map(|e| e.records.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestLlm, TestSheet};
    use crate::error::IntoResult;
    use crate::test::TestEnv;

    struct Answers {
        overwrite: bool,
        unnormalized: bool,
    }

    #[async_trait::async_trait]
    impl Confirm for Answers {
        async fn overwrite(&self, _: &str, _: usize) -> anyhow::Result<bool> {
            Ok(self.overwrite)
        }

        async fn unnormalized(&self, _: usize) -> anyhow::Result<bool> {
            Ok(self.unnormalized)
        }
    }

    fn pipeline(env: &TestEnv, llm: TestLlm) -> Pipeline {
        Pipeline::new(Arc::new(TestSheet), Arc::new(llm), env.config().backup())
    }

    fn request(sources: &[&str], master: &str) -> AggregateRequest {
        AggregateRequest {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            master: master.to_string(),
        }
    }

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect()
    }

    /// The two sources used by most tests: 10 + 5.5 + 20.
    fn two_sources(env: &TestEnv) -> (String, String) {
        let a = env.spreadsheet(
            "Sheet1",
            &[
                &["Item", "Category", "Cost"],
                &["Tape", "Equipment", "10"],
                &["Cups", "Food", "5.50"],
            ],
        );
        let b = env.spreadsheet(
            "Gear",
            &[&["Desc", "Type", "Price"], &["Mic", "Audio Gear", "20"]],
        );
        (a, b)
    }

    #[tokio::test]
    async fn test_two_sources_heuristic() {
        let env = TestEnv::new().await;
        let (a, b) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[]);

        let mut pipeline = pipeline(&env, TestLlm::offline());
        let report = pipeline
            .run(&request(&[&a, &b], &master), &AutoConfirm)
            .await
            .unwrap();

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.outcome, Outcome::Written);
        assert_eq!(report.mode, "heuristic");
        assert_eq!(report.sources_read, 2);
        assert_eq!(report.records, 3);
        assert_eq!(report.skipped_rows, 0);
        assert_eq!(report.total, 35.5);
        assert_eq!(report.formatted_total(), "35.50");
        assert_eq!(
            env.rows(&master),
            strings(&[
                &["Category", "Amount"],
                &["Audio Gear", "20"],
                &["Equipment", "10"],
                &["Food", "5.5"],
            ])
        );
        assert_eq!(report.snapshots.len(), 2);
        assert!(report.snapshots.iter().all(|p| p.is_file()));
    }

    #[tokio::test]
    async fn test_declined_overwrite_leaves_destination() {
        let env = TestEnv::new().await;
        let (a, b) = two_sources(&env);
        let old: &[&[&str]] = &[&["Category", "Amount"], &["Old", "1"], &["Older", "2"]];
        let master = env.spreadsheet("Summary", old);

        let mut pipeline = pipeline(&env, TestLlm::offline());
        let answers = Answers {
            overwrite: false,
            unnormalized: true,
        };
        let report = pipeline
            .run(&request(&[&a, &b], &master), &answers)
            .await
            .unwrap();

        assert_eq!(pipeline.stage(), Stage::Aborted);
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.total, 35.5);
        assert!(report.snapshots.is_empty());
        assert_eq!(env.rows(&master), strings(old));
    }

    #[tokio::test]
    async fn test_header_only_destination_needs_no_confirmation() {
        let env = TestEnv::new().await;
        let (a, _) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[&["Category", "Amount"]]);

        let answers = Answers {
            overwrite: false,
            unnormalized: true,
        };
        let report = pipeline(&env, TestLlm::offline())
            .run(&request(&[&a], &master), &answers)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::Written);
        assert_eq!(env.rows(&master).len(), 3);
    }

    fn far_down_destination() -> Vec<&'static [&'static str]> {
        let header: &[&str] = &["Category", "Amount"];
        let blank: &[&str] = &[];
        let mut rows = vec![header];
        rows.extend(std::iter::repeat(blank).take(149));
        rows.push(&["Precious", "999"]);
        rows
    }

    #[tokio::test]
    async fn test_data_below_the_read_bound_needs_confirmation() {
        let env = TestEnv::new().await;
        let (a, _) = two_sources(&env);
        let old = far_down_destination();
        let master = env.spreadsheet("Summary", &old);

        let answers = Answers {
            overwrite: false,
            unnormalized: true,
        };
        let report = pipeline(&env, TestLlm::offline())
            .run(&request(&[&a], &master), &answers)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::Aborted);
        let rows = env.rows(&master);
        assert_eq!(rows.len(), 151);
        assert_eq!(rows[150], vec!["Precious", "999"]);
    }

    #[tokio::test]
    async fn test_snapshot_holds_data_below_the_read_bound() {
        let env = TestEnv::new().await;
        let (a, _) = two_sources(&env);
        let master = env.spreadsheet("Summary", &far_down_destination());

        let report = pipeline(&env, TestLlm::offline())
            .run(&request(&[&a], &master), &AutoConfirm)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::Written);
        let pre = std::fs::read_to_string(&report.snapshots[0]).unwrap();
        assert!(pre.contains("Precious"), "{pre}");
    }

    #[tokio::test]
    async fn test_declined_unnormalized_output() {
        let env = TestEnv::new().await;
        let (a, b) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[]);

        let mut pipeline = pipeline(&env, TestLlm::offline());
        let answers = Answers {
            overwrite: true,
            unnormalized: false,
        };
        let report = pipeline
            .run(&request(&[&a, &b], &master), &answers)
            .await
            .unwrap();
        assert_eq!(pipeline.stage(), Stage::Aborted);
        assert_eq!(report.outcome, Outcome::Aborted);
        assert!(env.rows(&master).is_empty());
    }

    #[tokio::test]
    async fn test_short_row_is_skipped() {
        let env = TestEnv::new().await;
        let source = env.spreadsheet(
            "Sheet1",
            &[
                &["Item", "Category", "Cost"],
                &["Lonely"],
                &["Tape", "Equipment", "10"],
                &["Glue", " ", "3"],
                &["Pens", "Office", "n/a"],
            ],
        );
        let master = env.spreadsheet("Summary", &[]);

        let report = pipeline(&env, TestLlm::offline())
            .run(&request(&[&source], &master), &AutoConfirm)
            .await
            .unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.skipped_rows, 3);
        assert_eq!(report.total, 10.0);
        assert_eq!(
            env.rows(&master),
            strings(&[&["Category", "Amount"], &["Equipment", "10"]])
        );
    }

    #[tokio::test]
    async fn test_identity_keeps_near_duplicates_apart() {
        let env = TestEnv::new().await;
        let source = env.spreadsheet(
            "Sheet1",
            &[
                &["Category", "Amount"],
                &["Food", "1"],
                &["food", "2"],
                &["Catering", "4"],
                &["Food", "8"],
            ],
        );
        let master = env.spreadsheet("Summary", &[]);

        let report = pipeline(&env, TestLlm::offline())
            .run(&request(&[&source], &master), &AutoConfirm)
            .await
            .unwrap();
        let names: Vec<&str> = report.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Catering", "Food", "food"]);
        assert_eq!(report.categories[1].amount, 9.0);
    }

    #[tokio::test]
    async fn test_model_classifies_and_merges() {
        let env = TestEnv::new().await;
        let a = env.spreadsheet(
            "Sheet1",
            &[&["Item", "Kind", "Spent"], &["Sandwich", "Food", "3"]],
        );
        let b = env.spreadsheet("Sheet1", &[&["Label", "Value"], &["Catering", "4"]]);
        let master = env.spreadsheet("Summary", &[]);

        let llm = TestLlm::scripted([
            "READY",
            r#"{"category": 1, "amount": 2}"#,
            "```json\n{\"category\": 0, \"amount\": 1}\n```",
            r#"{"Food": "Food", "Catering": "Food"}"#,
        ]);
        // Unnormalized output is only questioned in heuristic mode.
        let answers = Answers {
            overwrite: true,
            unnormalized: false,
        };
        let report = pipeline(&env, llm)
            .run(&request(&[&a, &b], &master), &answers)
            .await
            .unwrap();
        assert_eq!(report.mode, "model");
        assert_eq!(report.total, 7.0);
        assert_eq!(
            env.rows(&master),
            strings(&[&["Category", "Amount"], &["Food", "7"]])
        );
    }

    #[tokio::test]
    async fn test_bad_classification_reply_fails_the_run() {
        let env = TestEnv::new().await;
        let (a, _) = two_sources(&env);
        let old: &[&[&str]] = &[&["Category", "Amount"], &["Old", "1"]];
        let master = env.spreadsheet("Summary", old);

        let mut pipeline = pipeline(&env, TestLlm::scripted(["READY", "Column 1 is the category"]));
        let e = pipeline
            .run(&request(&[&a], &master), &AutoConfirm)
            .await
            .pub_result(ErrorType::Internal)
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Classification);
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert_eq!(env.rows(&master), strings(old));
    }

    #[tokio::test]
    async fn test_bad_normalization_reply_fails_the_run() {
        let env = TestEnv::new().await;
        let (a, _) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[]);

        let llm = TestLlm::scripted(["READY", r#"{"category": 1, "amount": 2}"#, "not json"]);
        let e = pipeline(&env, llm)
            .run(&request(&[&a], &master), &AutoConfirm)
            .await
            .pub_result(ErrorType::Internal)
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Normalization);
        assert!(env.rows(&master).is_empty());
    }

    #[tokio::test]
    async fn test_one_missing_source_fails_the_run() {
        let env = TestEnv::new().await;
        let (a, _) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[]);
        let missing_id = uuid::Uuid::new_v4();
        let missing = format!("https://docs.google.com/spreadsheets/d/{missing_id}/edit");

        let e = pipeline(&env, TestLlm::offline())
            .run(&request(&[&a, &missing], &master), &AutoConfirm)
            .await
            .pub_result(ErrorType::Internal)
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::NotFound);
        assert!(e.to_string().contains("Unable to open the source"));
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let env = TestEnv::new().await;
        let e = pipeline(&env, TestLlm::offline())
            .run(&request(&[" "], "master"), &AutoConfirm)
            .await
            .pub_result(ErrorType::Internal)
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Request);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_table_snapshot() {
        let env = TestEnv::new().await;
        let (a, b) = two_sources(&env);
        let master =
            env.spreadsheet_with("Summary", &[&["Old", "1"]], |s| s.with_failing_writes());

        let mut pipeline = pipeline(&env, TestLlm::offline());
        let result = pipeline.run(&request(&[&a, &b], &master), &AutoConfirm).await;
        assert!(result.is_err());
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(env.rows(&master).is_empty());

        let mut snapshots = Vec::new();
        let mut dir = tokio::fs::read_dir(env.config().backups()).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            snapshots.push(entry.file_name().to_string_lossy().to_string());
        }
        let table = snapshots
            .iter()
            .find(|name| name.starts_with(MASTER_TABLE))
            .unwrap();
        let saved: Vec<Vec<String>> = serde_json::from_str(
            &std::fs::read_to_string(env.config().backups().join(table)).unwrap(),
        )
        .unwrap();
        assert_eq!(saved[0], vec!["Category", "Amount"]);
        assert_eq!(saved.len(), 4);
    }

    #[tokio::test]
    async fn test_written_table_reads_back() {
        let env = TestEnv::new().await;
        let (a, b) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[]);

        pipeline(&env, TestLlm::offline())
            .run(&request(&[&a, &b], &master), &AutoConfirm)
            .await
            .unwrap();

        let id = resolve_id(&master);
        let read = TestSheet.read_range(id, "Summary", READ_RANGE).await.unwrap();
        assert_eq!(read, env.rows(&master));
        assert_eq!(read[0], vec!["Category", "Amount"]);
    }

    #[tokio::test]
    async fn test_rerun_is_deterministic() {
        let env = TestEnv::new().await;
        let (a, b) = two_sources(&env);
        let master = env.spreadsheet("Summary", &[]);

        let first = pipeline(&env, TestLlm::offline())
            .run(&request(&[&b, &a], &master), &AutoConfirm)
            .await
            .unwrap();
        let after_first = env.rows(&master);
        let second = pipeline(&env, TestLlm::offline())
            .run(&request(&[&a, &b], &master), &AutoConfirm)
            .await
            .unwrap();
        assert_eq!(first.categories, second.categories);
        assert_eq!(env.rows(&master), after_first);
    }
}
