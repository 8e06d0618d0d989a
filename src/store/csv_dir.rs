use super::{run_sql, TabularStore};
use crate::error::{LagwatchError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A directory where each `<name>.csv` file is a table
#[derive(Debug, Clone)]
pub struct CsvDirectoryStore {
    root: PathBuf,
    infer_schema_length: usize,
}

impl CsvDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            infer_schema_length: 100,
        }
    }

    /// Rows scanned to infer column types
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.csv", name))
    }

    /// Names of the tables in the directory, sorted
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl TabularStore for CsvDirectoryStore {
    fn fetch_table(&self, name: &str) -> Result<DataFrame> {
        let path = self.table_path(name);
        let file = File::open(&path).map_err(|e| {
            LagwatchError::DataError(format!("table '{}' ({}): {}", name, path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()?;

        tracing::debug!(table = name, rows = df.height(), cols = df.width(), "loaded table");
        Ok(df)
    }

    fn execute_query(&self, sql: &str, temp: Option<&DataFrame>) -> Result<DataFrame> {
        let mut tables = Vec::new();
        for name in self.table_names()? {
            let df = self.fetch_table(&name)?;
            tables.push((name, df));
        }
        run_sql(tables.iter().map(|(n, df)| (n.as_str(), df.clone())), sql, temp)
    }
}

/// Write a frame to `path` as CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
