//! Tabular data sources
//!
//! The pipeline reads raw yearly tables through [`TabularStore`]; two
//! adapters are provided, an in-memory map and a directory of CSV files.

mod csv_dir;
mod memory;

pub use csv_dir::{write_csv, CsvDirectoryStore};
pub use memory::InMemoryStore;

use crate::error::Result;
use polars::prelude::*;
use polars::sql::SQLContext;

/// Name under which the optional frame of a query is visible
pub const TEMP_TABLE: &str = "temp_table";

/// A source of named tables that can also answer SQL queries
pub trait TabularStore {
    /// Load a whole table
    fn fetch_table(&self, name: &str) -> Result<DataFrame>;

    /// Run `sql` against the store's tables.
    ///
    /// When `temp` is given it is registered as [`TEMP_TABLE`] for this
    /// query only.
    fn execute_query(&self, sql: &str, temp: Option<&DataFrame>) -> Result<DataFrame>;
}

/// Run a query over `tables` in a fresh SQL context
pub(crate) fn run_sql<'a>(
    tables: impl IntoIterator<Item = (&'a str, DataFrame)>,
    sql: &str,
    temp: Option<&DataFrame>,
) -> Result<DataFrame> {
    let mut ctx = SQLContext::new();
    for (name, df) in tables {
        ctx.register(name, df.lazy());
    }
    if let Some(df) = temp {
        ctx.register(TEMP_TABLE, df.clone().lazy());
    }

    let result = ctx.execute(sql)?.collect()?;
    tracing::debug!(rows = result.height(), "query finished");
    Ok(result)
}
