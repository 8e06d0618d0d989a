//! End-to-end harmonization of the raw yearly tables

use crate::config::PipelineConfig;
use crate::error::{LagwatchError, Result};
use crate::preprocessing::{FrameTransform, NullImputer, OutlierEngine, OutlierReport, TypeStandardizer};
use crate::schema::{
    concat_diagonal, link_next_period, DataQualityFinding, ProfileRegistry, SchemaContract,
    SchemaNormalizer, LAG_NEXT,
};
use crate::store::TabularStore;
use polars::prelude::*;
use std::time::Instant;

/// Column recording which survey year a row came from
pub const YEAR_COLUMN: &str = "year";

/// Training-ready table plus what was learned while building it
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub frame: DataFrame,
    /// Outlier statistics of the merged data before treatment
    pub outlier_report: OutlierReport,
    pub findings: Vec<DataQualityFinding>,
}

/// Runs normalization, standardization, cross-year linking, outlier
/// treatment and imputation in that order
#[derive(Debug)]
pub struct HarmonizationPipeline {
    config: PipelineConfig,
    normalizer: SchemaNormalizer,
    standardizer: TypeStandardizer,
    outliers: OutlierEngine,
    imputer: NullImputer,
}

impl HarmonizationPipeline {
    /// Build a pipeline, loading extra year profiles if configured
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = ProfileRegistry::builtin();
        if let Some(path) = &config.profile_file {
            registry = registry.with_json_file(path)?;
        }
        for year in &config.years {
            registry.get(*year)?;
        }

        Ok(Self {
            normalizer: SchemaNormalizer::new(registry),
            standardizer: TypeStandardizer::new().with_decimals(config.decimals),
            outliers: OutlierEngine::new().with_multiplier(config.iqr_multiplier),
            imputer: NullImputer::new(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn transforms(&self) -> [&dyn FrameTransform; 2] {
        [&self.outliers, &self.imputer]
    }

    /// Columns the merged frame must carry before treatment starts
    pub fn contract(&self) -> SchemaContract {
        let mut contract = SchemaContract::new();
        for transform in self.transforms() {
            contract.extend(transform.declared_columns());
        }
        contract
    }

    /// Normalize and standardize one year
    fn load_year(&self, store: &dyn TabularStore, year: u16) -> Result<(DataFrame, Vec<DataQualityFinding>)> {
        let raw = store.fetch_table(&self.config.table_name(year))?;
        let normalized = self.normalizer.normalize(year, &raw)?;
        let mut frame = self.standardizer.standardize(&normalized.frame)?;

        let years = Series::new(YEAR_COLUMN.into(), vec![i32::from(year); frame.height()]);
        frame.with_column(years)?;

        tracing::info!(
            year,
            rows = frame.height(),
            cols = frame.width(),
            findings = normalized.findings.len(),
            "year harmonized"
        );
        Ok((frame, normalized.findings))
    }

    /// Merge harmonized years: each year is linked to the next one, then all
    /// years are stacked. The last year has no successor and keeps a null
    /// `lag_next`.
    pub fn merge_years(&self, years: Vec<DataFrame>) -> Result<DataFrame> {
        let mut linked = Vec::with_capacity(years.len());
        for (idx, frame) in years.iter().enumerate() {
            match years.get(idx + 1) {
                Some(next) => linked.push(link_next_period(frame, next, &self.config.id_column)?),
                None => {
                    let mut last = frame.clone();
                    if last.column(LAG_NEXT).is_err() {
                        last.with_column(Series::full_null(LAG_NEXT.into(), last.height(), &DataType::Float64))?;
                    }
                    linked.push(last);
                }
            }
        }
        concat_diagonal(&linked)
    }

    /// Run the pipeline over a store
    pub fn run(&self, store: &dyn TabularStore) -> Result<PreparedDataset> {
        let start = Instant::now();

        let mut years = Vec::with_capacity(self.config.years.len());
        let mut findings = Vec::new();
        for &year in &self.config.years {
            let (frame, year_findings) = self.load_year(store, year)?;
            years.push(frame);
            findings.extend(year_findings);
        }

        let merged = self.merge_years(years)?;
        if merged.height() == 0 {
            return Err(LagwatchError::DataError("no rows in any configured year".to_string()));
        }

        let contract = self.contract();
        let merged = contract.fill_missing(&merged)?;
        contract.validate(&merged)?;

        let outlier_report = self.outliers.detect(&merged)?;
        let mut frame = merged;
        for transform in self.transforms() {
            frame = transform.apply(&frame)?;
            tracing::debug!(stage = transform.name(), "stage applied");
        }

        tracing::info!(
            rows = frame.height(),
            cols = frame.width(),
            findings = findings.len(),
            outliers = outlier_report.total_outliers(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dataset prepared"
        );

        Ok(PreparedDataset {
            frame,
            outlier_report,
            findings,
        })
    }
}
