use super::{run_sql, TabularStore};
use crate::error::{LagwatchError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Tables held in memory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: BTreeMap<String, DataFrame>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, df: DataFrame) -> Self {
        self.insert(name, df);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, df: DataFrame) {
        self.tables.insert(name.into(), df);
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl TabularStore for InMemoryStore {
    fn fetch_table(&self, name: &str) -> Result<DataFrame> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| LagwatchError::DataError(format!("table '{}' not found", name)))
    }

    fn execute_query(&self, sql: &str, temp: Option<&DataFrame>) -> Result<DataFrame> {
        run_sql(
            self.tables.iter().map(|(name, df)| (name.as_str(), df.clone())),
            sql,
            temp,
        )
    }
}
