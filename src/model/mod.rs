//! Types that represent the data flowing through one aggregation run: column mappings, expense
//! records, category mappings and the aggregate table.
mod aggregate;
mod cell;
mod mapping;
mod record;

pub use aggregate::{AggregateTable, HEADER};
pub use cell::{column_letters, CellRange, CellRef};
pub use mapping::{CategoryMapping, ColumnMapping};
pub use record::{ExpenseRecord, Extraction};
