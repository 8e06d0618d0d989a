//! Type coercion and categorical encoding

use crate::error::Result;
use crate::schema::NUMERIC_COLUMNS;
use crate::utils::{is_numeric_dtype, is_text_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed text -> integer code table for one categorical column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingDictionary {
    column: String,
    codes: BTreeMap<String, i32>,
}

impl EncodingDictionary {
    /// Create a dictionary for a column
    pub fn new<'a>(column: &str, entries: impl IntoIterator<Item = (&'a str, i32)>) -> Self {
        Self {
            column: column.to_string(),
            codes: entries
                .into_iter()
                .map(|(text, code)| (text.to_string(), code))
                .collect(),
        }
    }

    /// Ordinal stone tiers, Quartzo < Ágata < Ametista < Topázio
    pub fn stone() -> Self {
        Self::new(
            "stone",
            [
                ("Quartzo", 1),
                ("Ágata", 2),
                ("Agata", 2),
                ("Ametista", 3),
                ("Topázio", 4),
            ],
        )
    }

    pub fn gender() -> Self {
        Self::new("gender", [("Feminino", 0), ("Masculino", 1)])
    }

    pub fn education_institution() -> Self {
        Self::new(
            "education_institution",
            [
                ("Pública", 0),
                ("Privada", 1),
                ("Privada - Programa de Apadrinhamento", 2),
                ("Privada *Parcerias com Bolsa 100%", 3),
                ("Privada - Pagamento por *Empresa Parceira", 4),
                ("Escola JP II", 5),
                ("Rede Decisão", 6),
                ("Bolsista Universitário *Formado (a)", 7),
                ("Concluiu o 3º EM", 8),
                ("Nenhuma das opções acima", 9),
            ],
        )
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Code for a text value; unseen text has none
    pub fn encode(&self, text: &str) -> Option<i32> {
        self.codes.get(text.trim()).copied()
    }

    /// All (text, code) entries
    pub fn entries(&self) -> impl Iterator<Item = (&str, i32)> {
        self.codes.iter().map(|(text, code)| (text.as_str(), *code))
    }
}

/// Coerces canonical numeric columns to f64 and encodes categorical text.
///
/// A categorical column that is no longer text-typed is only cast to Int32,
/// so running the standardizer twice leaves the codes untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeStandardizer {
    numeric_columns: Vec<String>,
    dictionaries: Vec<EncodingDictionary>,
    decimals: Option<u32>,
}

impl Default for TypeStandardizer {
    fn default() -> Self {
        Self {
            numeric_columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
            dictionaries: vec![
                EncodingDictionary::gender(),
                EncodingDictionary::education_institution(),
                EncodingDictionary::stone(),
            ],
            decimals: Some(2),
        }
    }
}

impl TypeStandardizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list of numeric columns
    pub fn with_numeric_columns(mut self, columns: &[&str]) -> Self {
        self.numeric_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add or replace the dictionary for its column
    pub fn with_dictionary(mut self, dictionary: EncodingDictionary) -> Self {
        self.dictionaries.retain(|d| d.column != dictionary.column);
        self.dictionaries.push(dictionary);
        self
    }

    /// Round numeric columns to this many decimals; `None` keeps full precision
    pub fn with_decimals(mut self, decimals: Option<u32>) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn dictionaries(&self) -> &[EncodingDictionary] {
        &self.dictionaries
    }

    /// Standardize a frame. Columns not present are skipped.
    pub fn standardize(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for name in &self.numeric_columns {
            let Ok(col) = df.column(name) else {
                continue;
            };
            let coerced = self.coerce_numeric(col.as_materialized_series())?;
            result.with_column(coerced)?;
        }

        for dictionary in &self.dictionaries {
            let Ok(col) = df.column(&dictionary.column) else {
                continue;
            };
            let encoded = encode_series(col.as_materialized_series(), dictionary)?;
            result.with_column(encoded)?;
        }

        tracing::debug!(
            rows = result.height(),
            numeric = self.numeric_columns.len(),
            encoded = self.dictionaries.len(),
            "standardized column types"
        );
        Ok(result)
    }

    fn coerce_numeric(&self, series: &Series) -> Result<Series> {
        let values: Float64Chunked = if is_text_dtype(series.dtype()) {
            series.str()?.into_iter().map(|opt| opt.and_then(parse_decimal)).collect()
        } else {
            series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|opt| opt.filter(|v| v.is_finite()))
                .collect()
        };

        let values = match self.decimals {
            Some(decimals) => {
                let factor = 10f64.powi(decimals as i32);
                values
                    .into_iter()
                    .map(|opt| opt.map(|v| (v * factor).round() / factor))
                    .collect()
            }
            None => values,
        };

        Ok(values.with_name(series.name().clone()).into_series())
    }
}

/// Parse a number written with either a decimal point or a decimal comma
fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn encode_series(series: &Series, dictionary: &EncodingDictionary) -> Result<Series> {
    if !is_text_dtype(series.dtype()) {
        if series.dtype() == &DataType::Int32 {
            return Ok(series.clone());
        }
        if !is_numeric_dtype(series.dtype()) && series.dtype() != &DataType::Null {
            tracing::warn!(
                column = dictionary.column(),
                dtype = %series.dtype(),
                "categorical column is neither text nor numeric; casting"
            );
        }
        return Ok(series.cast(&DataType::Int32)?);
    }

    let mut unmapped = 0usize;
    let codes: Int32Chunked = series
        .str()?
        .into_iter()
        .map(|opt| {
            let text = opt?;
            let code = dictionary.encode(text);
            if code.is_none() {
                unmapped += 1;
            }
            code
        })
        .collect();

    if unmapped > 0 {
        tracing::debug!(column = dictionary.column(), unmapped, "unmapped category values set to null");
    }

    Ok(codes.with_name(series.name().clone()).into_series())
}
