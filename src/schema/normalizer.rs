//! Schema normalization for one source year

use super::mapping::{PhaseRule, ProfileRegistry, YearProfile};
use crate::error::{LagwatchError, Result};
use crate::utils::{column_names, is_numeric_dtype, is_text_dtype};
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A value that could not be normalized and was set to null
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityFinding {
    pub year: u16,
    pub column: String,
    pub row: usize,
    pub raw_value: String,
}

impl fmt::Display for DataQualityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row {}: column '{}' has unparseable value {:?}",
            self.year, self.row, self.column, self.raw_value
        )
    }
}

/// Output of normalizing one year's frame
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub year: u16,
    pub frame: DataFrame,
    pub findings: Vec<DataQualityFinding>,
}

/// Applies year profiles to raw frames
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    registry: ProfileRegistry,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(ProfileRegistry::builtin())
    }
}

impl SchemaNormalizer {
    /// Create a normalizer over a profile registry
    pub fn new(registry: ProfileRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Normalize a raw frame for the given year.
    ///
    /// Renames, drops, value substitutions and phase parsing all work on a
    /// copy; the caller's frame is left untouched.
    pub fn normalize(&self, year: u16, raw: &DataFrame) -> Result<NormalizedFrame> {
        let profile = self.registry.get(year)?;

        let mut frame = rename_columns(profile, raw)?;
        frame = drop_columns(profile, &frame)?;
        apply_value_rules(profile, &mut frame)?;

        let findings = match &profile.phase {
            Some(rule) => normalize_phase(year, rule, &mut frame)?,
            None => Vec::new(),
        };

        for finding in &findings {
            tracing::warn!(
                year = finding.year,
                column = %finding.column,
                row = finding.row,
                raw = %finding.raw_value,
                "phase label has no leading number"
            );
        }

        tracing::debug!(
            year,
            rows = frame.height(),
            columns = frame.width(),
            findings = findings.len(),
            "normalized raw frame"
        );

        Ok(NormalizedFrame { year, frame, findings })
    }
}

fn rename_columns(profile: &YearProfile, raw: &DataFrame) -> Result<DataFrame> {
    let mut targets: HashMap<&str, &str> = HashMap::new();
    for col in raw.get_columns() {
        let name = col.name().as_str();
        let canonical = profile.canonical_name(name);
        if let Some(previous) = targets.insert(canonical, name) {
            return Err(LagwatchError::SchemaError(format!(
                "year {}: columns '{}' and '{}' both map to '{}'",
                profile.year, previous, name, canonical
            )));
        }
    }

    let renamed: Vec<Column> = raw
        .get_columns()
        .iter()
        .map(|col| {
            let canonical = profile.canonical_name(col.name().as_str());
            Column::from(col.as_materialized_series().clone().with_name(canonical.into()))
        })
        .collect();

    Ok(DataFrame::new(renamed)?)
}

fn drop_columns(profile: &YearProfile, frame: &DataFrame) -> Result<DataFrame> {
    let mut result = frame.clone();
    for name in column_names(frame) {
        if profile.drops.contains(&name) {
            result = result.drop(&name)?;
        }
    }
    Ok(result)
}

fn apply_value_rules(profile: &YearProfile, frame: &mut DataFrame) -> Result<()> {
    let mut by_column: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
    for rule in &profile.value_rules {
        by_column
            .entry(rule.column.as_str())
            .or_default()
            .insert(rule.from.as_str(), rule.to.as_str());
    }

    for (column, lookup) in by_column {
        let replaced = {
            let Ok(col) = frame.column(column) else {
                continue;
            };
            let series = col.as_materialized_series();
            if !is_text_dtype(series.dtype()) {
                continue;
            }
            let values: Vec<Option<String>> = series
                .str()?
                .into_iter()
                .map(|opt| {
                    opt.map(|v| match lookup.get(v.trim()) {
                        Some(to) => to.to_string(),
                        None => v.to_string(),
                    })
                })
                .collect();
            Series::new(series.name().clone(), values)
        };
        frame.with_column(replaced)?;
    }

    Ok(())
}

/// Parse phase labels into integers.
///
/// Returns the parsed values and `(row, raw)` pairs for labels with no
/// leading number after substitution. Nulls stay null and are not reported.
pub fn parse_phase_labels(
    rule: &PhaseRule,
    labels: &StringChunked,
) -> Result<(Vec<Option<i32>>, Vec<(usize, String)>)> {
    let pattern = Regex::new(&rule.pattern).map_err(|e| {
        LagwatchError::ConfigError(format!("invalid phase pattern '{}': {}", rule.pattern, e))
    })?;

    let mut failures = Vec::new();
    let values = labels
        .into_iter()
        .enumerate()
        .map(|(row, opt)| {
            let raw = opt?;
            let mut text = raw.trim().to_string();
            for replacement in &rule.replacements {
                text = text.replace(&replacement.from, &replacement.to);
            }
            let parsed = pattern
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok());
            if parsed.is_none() {
                failures.push((row, raw.to_string()));
            }
            parsed
        })
        .collect();

    Ok((values, failures))
}

fn normalize_phase(
    year: u16,
    rule: &PhaseRule,
    frame: &mut DataFrame,
) -> Result<Vec<DataQualityFinding>> {
    let Ok(col) = frame.column(&rule.column) else {
        return Ok(Vec::new());
    };
    let series = col.as_materialized_series().clone();

    let (parsed, findings) = if is_text_dtype(series.dtype()) {
        let (values, failures) = parse_phase_labels(rule, series.str()?)?;
        let findings: Vec<DataQualityFinding> = failures
            .into_iter()
            .map(|(row, raw_value)| DataQualityFinding {
                year,
                column: rule.column.clone(),
                row,
                raw_value,
            })
            .collect();
        (Series::new(series.name().clone(), values), findings)
    } else if is_numeric_dtype(series.dtype()) || series.dtype() == &DataType::Null {
        (series.cast(&DataType::Int32)?, Vec::new())
    } else {
        return Err(LagwatchError::SchemaError(format!(
            "year {}: phase column '{}' has unsupported dtype {}",
            year,
            rule.column,
            series.dtype()
        )));
    };

    frame.with_column(parsed)?;
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_2022() -> DataFrame {
        df!(
            "RA" => &["RA-1", "RA-2", "RA-3", "RA-4"],
            "Fase" => &[Some("FASE 3"), Some("ALFA"), Some("7"), None],
            "Gênero" => &["Menina", "Menino", "Feminino", "Masculino"],
            "Pedra 22" => &["Agata", "Quartzo", "Ametista", "Topázio"],
            "Nome" => &["a", "b", "c", "d"],
            "Avaliador1" => &["x", "y", "z", "w"],
            "Extra" => &[1, 2, 3, 4],
        )
        .unwrap()
    }

    #[test]
    fn test_phase_labels_become_integers() {
        let normalizer = SchemaNormalizer::default();
        let out = normalizer.normalize(2022, &raw_2022()).unwrap();

        let fase = out.frame.column("fase").unwrap().as_materialized_series().i32().unwrap().clone();
        assert_eq!(fase.get(0), Some(3));
        assert_eq!(fase.get(1), Some(0));
        assert_eq!(fase.get(2), Some(7));
        assert_eq!(fase.get(3), None);
        assert!(out.findings.is_empty());
    }

    #[test]
    fn test_renames_drops_and_passthrough() {
        let normalizer = SchemaNormalizer::default();
        let out = normalizer.normalize(2022, &raw_2022()).unwrap();
        let names = column_names(&out.frame);

        assert!(names.contains(&"stone".to_string()));
        assert!(names.contains(&"gender".to_string()));
        assert!(names.contains(&"Extra".to_string()));
        assert!(!names.contains(&"name".to_string()));
        assert!(!names.contains(&"Avaliador1".to_string()));
        assert!(!names.contains(&"Pedra 22".to_string()));
    }

    #[test]
    fn test_value_rules_standardize_text() {
        let normalizer = SchemaNormalizer::default();
        let out = normalizer.normalize(2022, &raw_2022()).unwrap();

        let gender = out.frame.column("gender").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(gender.get(0), Some("Feminino"));
        assert_eq!(gender.get(1), Some("Masculino"));
        assert_eq!(gender.get(2), Some("Feminino"));

        let stone = out.frame.column("stone").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(stone.get(0), Some("Ágata"));
        assert_eq!(stone.get(1), Some("Quartzo"));
    }

    #[test]
    fn test_value_rules_ignore_surrounding_whitespace() {
        let raw = df!(
            "RA" => &["RA-1", "RA-2"],
            "Gênero" => &["Menina ", "  Menino"],
        )
        .unwrap();
        let out = SchemaNormalizer::default().normalize(2022, &raw).unwrap();

        let gender = out.frame.column("gender").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(gender.get(0), Some("Feminino"));
        assert_eq!(gender.get(1), Some("Masculino"));
    }

    #[test]
    fn test_malformed_phase_is_reported() {
        let raw = df!(
            "Fase" => &["FASE 2", "Turma especial", "1A"],
        )
        .unwrap();

        let out = SchemaNormalizer::default().normalize(2024, &raw).unwrap();
        let fase = out.frame.column("fase").unwrap().as_materialized_series().i32().unwrap().clone();

        assert_eq!(fase.get(0), Some(2));
        assert_eq!(fase.get(1), None);
        assert_eq!(fase.get(2), Some(1));
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].row, 1);
        assert_eq!(out.findings[0].raw_value, "Turma especial");
    }

    #[test]
    fn test_input_frame_is_not_mutated() {
        let raw = raw_2022();
        let _ = SchemaNormalizer::default().normalize(2022, &raw).unwrap();
        assert!(raw.column("Fase").is_ok());
        assert!(raw.column("Nome").is_ok());
    }

    #[test]
    fn test_numeric_phase_is_cast() {
        let raw = df!("Fase" => &[Some(1i64), None, Some(8)]).unwrap();
        let out = SchemaNormalizer::default().normalize(2023, &raw).unwrap();
        let fase = out.frame.column("fase").unwrap();
        assert_eq!(fase.dtype(), &DataType::Int32);
    }

    #[test]
    fn test_colliding_renames_are_rejected() {
        let raw = df!(
            "Idade" => &[10.0],
            "age" => &[11.0],
        )
        .unwrap();
        let result = SchemaNormalizer::default().normalize(2023, &raw);
        assert!(matches!(result, Err(LagwatchError::SchemaError(_))));
    }
}
