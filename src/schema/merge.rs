//! Cross-year linking and stacking

use super::{LAG_CURRENT, LAG_NEXT};
use crate::error::{LagwatchError, Result};
use crate::utils::{column_as_f64, is_text_dtype};
use polars::prelude::*;
use std::collections::HashMap;

/// Student ids of a frame as text, whatever the stored dtype
fn id_keys(df: &DataFrame, id_column: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(id_column).map_err(|_| {
        LagwatchError::SchemaError(format!("id column '{}' missing", id_column))
    })?;
    let series = column.as_materialized_series();
    let text = if is_text_dtype(series.dtype()) {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };

    Ok(text
        .str()?
        .into_iter()
        .map(|opt| opt.map(|v| v.trim().to_string()))
        .collect())
}

/// Attach the following year's lag to each student of `current`.
///
/// Rows are matched on `id_column`; students absent from `next` get a null
/// `lag_next`. When an id repeats in `next` the first row wins. Any existing
/// `lag_next` column in `current` is replaced. A `next` frame with no
/// `lag_current` column links every student to a null.
pub fn link_next_period(
    current: &DataFrame,
    next: &DataFrame,
    id_column: &str,
) -> Result<DataFrame> {
    if next.column(LAG_CURRENT).is_err() {
        if current.column(id_column).is_err() {
            return Err(LagwatchError::SchemaError(format!("id column '{}' missing", id_column)));
        }
        tracing::warn!(
            rows = current.height(),
            "next period has no {} column, lag_next left null",
            LAG_CURRENT
        );
        let mut result = current.clone();
        result.with_column(Series::full_null(LAG_NEXT.into(), current.height(), &DataType::Float64))?;
        return Ok(result);
    }

    let next_ids = id_keys(next, id_column)?;
    let next_lags = column_as_f64(next, LAG_CURRENT)?;

    let mut lookup: HashMap<String, Option<f64>> = HashMap::with_capacity(next_ids.len());
    for (id, lag) in next_ids.into_iter().zip(next_lags.into_iter()) {
        if let Some(id) = id {
            lookup.entry(id).or_insert(lag);
        }
    }

    let linked: Vec<Option<f64>> = id_keys(current, id_column)?
        .into_iter()
        .map(|id| id.and_then(|key| lookup.get(&key).copied().flatten()))
        .collect();

    let matched = linked.iter().filter(|v| v.is_some()).count();
    tracing::debug!(
        rows = current.height(),
        matched,
        "linked next-period lag"
    );

    let mut result = current.clone();
    result.with_column(Series::new(LAG_NEXT.into(), linked))?;
    Ok(result)
}

/// Stack frames vertically over the union of their columns.
///
/// Column order follows first appearance. A column missing from a frame is
/// filled with nulls; when frames disagree on a dtype, the first non-null
/// dtype seen wins and later frames are cast to it (failed casts become null).
///
/// Polars' diagonal concat requires matching dtypes per column, so yearly
/// extracts that store a column as text in one year and as a number in
/// another are stacked here instead.
pub fn concat_diagonal(frames: &[DataFrame]) -> Result<DataFrame> {
    let Some(first) = frames.first() else {
        return Ok(DataFrame::empty());
    };
    if frames.len() == 1 {
        return Ok(first.clone());
    }

    let mut order: Vec<String> = Vec::new();
    let mut dtypes: HashMap<String, DataType> = HashMap::new();
    for frame in frames {
        for col in frame.get_columns() {
            let name = col.name().to_string();
            match dtypes.get(&name) {
                None => {
                    order.push(name.clone());
                    dtypes.insert(name, col.dtype().clone());
                }
                Some(DataType::Null) if col.dtype() != &DataType::Null => {
                    dtypes.insert(name, col.dtype().clone());
                }
                Some(_) => {}
            }
        }
    }

    let mut columns = Vec::with_capacity(order.len());
    for name in &order {
        let dtype = &dtypes[name];
        let mut stacked: Option<Series> = None;
        for frame in frames {
            let part = match frame.column(name) {
                Ok(col) => col.as_materialized_series().cast(dtype)?,
                Err(_) => Series::full_null(name.as_str().into(), frame.height(), dtype),
            };
            match stacked.as_mut() {
                Some(acc) => {
                    acc.append(&part)?;
                }
                None => stacked = Some(part),
            }
        }
        if let Some(series) = stacked {
            columns.push(Column::from(series));
        }
    }

    let merged = DataFrame::new(columns)?;
    tracing::debug!(
        frames = frames.len(),
        rows = merged.height(),
        columns = merged.width(),
        "stacked frames"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_next_period_matches_ids() {
        let current = df!(
            "ra" => &["RA-1", "RA-2", "RA-3"],
            "lag_current" => &[0.0, -1.0, -2.0],
        )
        .unwrap();
        let next = df!(
            "ra" => &["RA-2", "RA-1", "RA-9"],
            "lag_current" => &[-2.0, 0.0, 1.0],
        )
        .unwrap();

        let linked = link_next_period(&current, &next, "ra").unwrap();
        let lag_next = linked.column("lag_next").unwrap().f64().unwrap().clone();

        assert_eq!(lag_next.get(0), Some(0.0));
        assert_eq!(lag_next.get(1), Some(-2.0));
        assert_eq!(lag_next.get(2), None);
    }

    #[test]
    fn test_link_next_period_numeric_ids() {
        let current = df!("ra" => &[10i64, 11], "lag_current" => &[1i32, 0]).unwrap();
        let next = df!("ra" => &[11i64, 10], "lag_current" => &[2i32, 3]).unwrap();

        let linked = link_next_period(&current, &next, "ra").unwrap();
        let lag_next = linked.column("lag_next").unwrap().f64().unwrap().clone();
        assert_eq!(lag_next.get(0), Some(3.0));
        assert_eq!(lag_next.get(1), Some(2.0));
    }

    #[test]
    fn test_link_without_next_lag_column() {
        let current = df!("ra" => &["RA-1", "RA-2"], "lag_current" => &[0.0, -1.0]).unwrap();
        let next = df!("ra" => &["RA-1"], "inde" => &[7.0]).unwrap();

        let linked = link_next_period(&current, &next, "ra").unwrap();
        let lag_next = linked.column("lag_next").unwrap();
        assert_eq!(lag_next.dtype(), &DataType::Float64);
        assert_eq!(lag_next.null_count(), 2);
    }

    #[test]
    fn test_link_requires_id_column() {
        let current = df!("lag_current" => &[1.0]).unwrap();
        let next = df!("ra" => &["a"], "lag_current" => &[1.0]).unwrap();
        assert!(matches!(
            link_next_period(&current, &next, "ra"),
            Err(LagwatchError::SchemaError(_))
        ));
    }

    #[test]
    fn test_concat_diagonal_fills_missing_columns() {
        let a = df!("ra" => &["1", "2"], "inde" => &[7.0, 8.0]).unwrap();
        let b = df!("ra" => &["3"], "stone" => &["Quartzo"]).unwrap();

        let merged = concat_diagonal(&[a, b]).unwrap();
        assert_eq!(merged.height(), 3);
        assert_eq!(column_names_of(&merged), vec!["ra", "inde", "stone"]);

        let inde = merged.column("inde").unwrap().f64().unwrap().clone();
        assert_eq!(inde.get(2), None);
        let stone = merged.column("stone").unwrap().str().unwrap().clone();
        assert_eq!(stone.get(0), None);
        assert_eq!(stone.get(2), Some("Quartzo"));
    }

    #[test]
    fn test_concat_diagonal_casts_to_first_dtype() {
        let a = df!("age" => &[12.5]).unwrap();
        let b = df!("age" => &[13i32]).unwrap();

        let merged = concat_diagonal(&[a, b]).unwrap();
        let age = merged.column("age").unwrap();
        assert_eq!(age.dtype(), &DataType::Float64);
        assert_eq!(age.f64().unwrap().get(1), Some(13.0));
    }

    fn column_names_of(df: &DataFrame) -> Vec<String> {
        crate::utils::column_names(df)
    }
}
