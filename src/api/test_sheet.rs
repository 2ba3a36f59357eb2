//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets (see `TALLY_IN_TEST_MODE`).

use crate::api::Sheet;
use crate::error::{tagged, ErrorType, Res};
use crate::model::{CellRange, CellRef};
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Spreadsheet ids that are always present in the in-memory store.
pub(crate) const SEED_SOURCE_A: &str = "test-source-a";
pub(crate) const SEED_SOURCE_B: &str = "test-source-b";
pub(crate) const SEED_MASTER: &str = "test-master";

/// One in-memory spreadsheet: an ordered list of tabs, each holding rows of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TestSpreadsheet {
    tabs: Vec<(String, Vec<Vec<String>>)>,
    fail_writes: bool,
}

impl TestSpreadsheet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a tab holding `rows`.
    pub(crate) fn with_tab<S: AsRef<str>>(mut self, name: &str, rows: &[Vec<S>]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| v.as_ref().to_string()).collect())
            .collect();
        self.tabs.push((name.to_string(), rows));
        self
    }

    /// Appends a tab whose rows are parsed from CSV text.
    pub(crate) fn with_csv_tab(self, name: &str, csv_data: &str) -> Res<Self> {
        let rows = load_csv(csv_data)?;
        Ok(self.with_tab(name, &rows))
    }

    /// Makes every write to this spreadsheet fail, while clears still succeed.
    #[cfg(test)]
    pub(crate) fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// The rows of the tab named `name`.
    pub(crate) fn tab(&self, name: &str) -> Option<&[Vec<String>]> {
        self.tabs
            .iter()
            .find(|(tab_name, _)| tab_name == name)
            .map(|(_, rows)| rows.as_slice())
    }

    /// The rows of the first tab.
    #[cfg(test)]
    pub(crate) fn first_tab(&self) -> Option<&[Vec<String>]> {
        self.tabs.first().map(|(_, rows)| rows.as_slice())
    }

    fn tab_mut(&mut self, spreadsheet_id: &str, name: &str) -> Res<&mut Vec<Vec<String>>> {
        self.tabs
            .iter_mut()
            .find(|(tab_name, _)| tab_name == name)
            .map(|(_, rows)| rows)
            .ok_or_else(|| missing_tab(spreadsheet_id, name))
    }
}

/// An implementation of the `Sheet` trait that does not use Google sheets. All instances share
/// one process-wide store keyed by spreadsheet id, so tests should use unique ids.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TestSheet;

impl TestSheet {
    /// Adds or replaces the spreadsheet stored under `spreadsheet_id`.
    #[cfg(test)]
    pub(crate) fn insert(spreadsheet_id: &str, spreadsheet: TestSpreadsheet) {
        store().insert(spreadsheet_id.to_string(), spreadsheet);
    }

    /// A copy of the spreadsheet stored under `spreadsheet_id`.
    #[cfg(test)]
    pub(crate) fn get(spreadsheet_id: &str) -> Option<TestSpreadsheet> {
        store().get(spreadsheet_id).cloned()
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn primary_sheet_name(&self, spreadsheet_id: &str) -> Res<String> {
        let store = store();
        let spreadsheet = store
            .get(spreadsheet_id)
            .ok_or_else(|| missing_spreadsheet(spreadsheet_id))?;
        match spreadsheet.tabs.first() {
            Some((name, _)) => Ok(name.clone()),
            None => Err(tagged(
                ErrorType::NotFound,
                format!("Spreadsheet '{spreadsheet_id}' has no sheets"),
            )),
        }
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        range: &str,
    ) -> Res<Vec<Vec<String>>> {
        let range: CellRange = range.parse()?;
        let store = store();
        let rows = store
            .get(spreadsheet_id)
            .ok_or_else(|| missing_spreadsheet(spreadsheet_id))?
            .tab(sheet_name)
            .ok_or_else(|| missing_tab(spreadsheet_id, sheet_name))?;

        let start = range.start();
        let mut values = Vec::new();
        for (r, row) in rows.iter().enumerate().skip(start.row()) {
            if !range.contains(r, start.col()) {
                break;
            }
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .skip(start.col())
                .take_while(|(c, _)| range.contains(r, *c))
                .map(|(_, v)| v.clone())
                .collect();
            values.push(cells);
        }
        trim(&mut values);
        Ok(values)
    }

    async fn clear_range(&self, spreadsheet_id: &str, sheet_name: &str, range: &str) -> Res<()> {
        let range: CellRange = range.parse()?;
        let mut store = store();
        let rows = store
            .get_mut(spreadsheet_id)
            .ok_or_else(|| missing_spreadsheet(spreadsheet_id))?
            .tab_mut(spreadsheet_id, sheet_name)?;
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                if range.contains(r, c) {
                    value.clear();
                }
            }
        }
        trim(rows);
        Ok(())
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start: CellRef,
        table: &[Vec<String>],
    ) -> Res<()> {
        let mut store = store();
        let spreadsheet = store
            .get_mut(spreadsheet_id)
            .ok_or_else(|| missing_spreadsheet(spreadsheet_id))?;
        if spreadsheet.fail_writes {
            bail!("Simulated write failure for spreadsheet '{spreadsheet_id}'");
        }
        let rows = spreadsheet.tab_mut(spreadsheet_id, sheet_name)?;
        for (i, values) in table.iter().enumerate() {
            let r = start.row() + i;
            if rows.len() <= r {
                rows.resize_with(r + 1, Vec::new);
            }
            let row = &mut rows[r];
            for (j, value) in values.iter().enumerate() {
                let c = start.col() + j;
                if row.len() <= c {
                    row.resize(c + 1, String::new());
                }
                row[c] = value.clone();
            }
        }
        trim(rows);
        Ok(())
    }
}

fn store() -> MutexGuard<'static, HashMap<String, TestSpreadsheet>> {
    static STORE: OnceLock<Mutex<HashMap<String, TestSpreadsheet>>> = OnceLock::new();
    STORE
        .get_or_init(|| Mutex::new(seed_data()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Removes trailing empty cells from each row, then trailing empty rows, the way the Sheets API
/// leaves them out of a values response.
fn trim(rows: &mut Vec<Vec<String>>) {
    for row in rows.iter_mut() {
        while row.last().is_some_and(|v| v.is_empty()) {
            row.pop();
        }
    }
    while rows.last().is_some_and(|row| row.is_empty()) {
        rows.pop();
    }
}

fn missing_spreadsheet(spreadsheet_id: &str) -> anyhow::Error {
    tagged(
        ErrorType::NotFound,
        format!("Requested entity was not found: spreadsheet '{spreadsheet_id}'"),
    )
}

fn missing_tab(spreadsheet_id: &str, sheet_name: &str) -> anyhow::Error {
    tagged(
        ErrorType::NotFound,
        format!("Unable to parse range: sheet '{sheet_name}' not found in '{spreadsheet_id}'"),
    )
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Unable to parse CSV seed data")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Provides the seed spreadsheets. Seed data is constant, so a parse failure leaves that
/// spreadsheet out rather than failing every caller.
fn seed_data() -> HashMap<String, TestSpreadsheet> {
    let seeds = [
        (SEED_SOURCE_A, "Expenses", SOURCE_A_DATA),
        (SEED_SOURCE_B, "Sheet1", SOURCE_B_DATA),
        (SEED_MASTER, "Summary", MASTER_DATA),
    ];
    let mut map = HashMap::new();
    for (id, tab, data) in seeds {
        match TestSpreadsheet::new().with_csv_tab(tab, data) {
            Ok(spreadsheet) => {
                map.insert(id.to_string(), spreadsheet);
            }
            Err(e) => tracing::warn!("Skipping seed spreadsheet '{id}': {e:#}"),
        }
    }
    map
}

/// Seed expenses from a household ledger.
const SOURCE_A_DATA: &str = r##"Date,Description,Category,Amount
10/1/2025,City Water District,Utilities,45.88
10/3/2025,Shell Station #4521,Gas & Fuel,61.45
10/5/2025,Costco Wholesale,Groceries,118.56
10/7/2025,Olive Garden,Restaurants,42.30
10/10/2025,Safeway #1534,groceries,95.82
10/12/2025,Panera Bread,Restaurants,12.40
"##;

/// Seed expenses from a card statement with its own column names and category spellings.
const SOURCE_B_DATA: &str = r##"Merchant,Expense Category,Cost,Notes
Whole Foods Market,Grocery,87.43,
Starbucks #2847,Coffee,6.75,morning
Chevron Gas,Fuel,48.90,
Comcast Internet,Utilities,89.99,
Blue Bottle Coffee,Coffee,8.50,
Refund,Grocery,n/a,ignored
"##;

/// Seed destination that already holds an older summary.
const MASTER_DATA: &str = r##"Category,Amount
Groceries,100
Utilities,50
"##;
