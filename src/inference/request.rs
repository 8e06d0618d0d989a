//! Per-student prediction requests

use crate::error::{LagwatchError, Result};
use crate::training::TrainedModel;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Indicators for one student; `stone` is the encoded ordinal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentFeatures {
    pub ieg: f64,
    pub iaa: f64,
    pub ips: f64,
    pub ida: f64,
    pub ian: f64,
    pub ipv: f64,
    pub inde: f64,
    pub stone: f64,
    pub age: f64,
}

impl StudentFeatures {
    fn values(&self) -> [(&'static str, f64); 9] {
        [
            ("ieg", self.ieg),
            ("iaa", self.iaa),
            ("ips", self.ips),
            ("ida", self.ida),
            ("ian", self.ian),
            ("ipv", self.ipv),
            ("inde", self.inde),
            ("stone", self.stone),
            ("age", self.age),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentPrediction {
    pub will_worsen: bool,
    pub probability: f64,
}

/// Frame with one row per student, columns named like the model features
pub fn students_to_frame(students: &[StudentFeatures]) -> Result<DataFrame> {
    let Some(first) = students.first() else {
        return Ok(DataFrame::empty());
    };

    let columns = first
        .values()
        .iter()
        .enumerate()
        .map(|(j, (name, _))| {
            let values: Vec<f64> = students.iter().map(|s| s.values()[j].1).collect();
            Column::from(Series::new((*name).into(), values))
        })
        .collect::<Vec<Column>>();

    Ok(DataFrame::new(columns)?)
}

/// Score a batch of students at `threshold`
pub fn predict_students(
    model: &TrainedModel,
    students: &[StudentFeatures],
    threshold: f64,
) -> Result<Vec<StudentPrediction>> {
    if students.is_empty() {
        return Err(LagwatchError::InvalidInput("no students to score".to_string()));
    }
    for (row, student) in students.iter().enumerate() {
        if let Some((name, value)) = student.values().into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(LagwatchError::InvalidInput(format!(
                "student {}: '{}' is not a finite number ({})",
                row, name, value
            )));
        }
    }

    let frame = students_to_frame(students)?;
    let probabilities = model.predict_probability(&frame)?;

    Ok(probabilities
        .into_iter()
        .map(|probability| StudentPrediction {
            will_worsen: probability >= threshold,
            probability,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StudentFeatures {
        StudentFeatures {
            ieg: 7.5,
            iaa: 8.0,
            ips: 6.5,
            ida: 7.2,
            ian: 8.5,
            ipv: 6.0,
            inde: 7.3,
            stone: 3.0,
            age: 14.0,
        }
    }

    #[test]
    fn test_frame_has_feature_columns() {
        let df = students_to_frame(&[sample(), sample()]).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 9);
        assert_eq!(df.column("stone").unwrap().f64().unwrap().get(0), Some(3.0));
    }

    #[test]
    fn test_deserializes_from_json() {
        let json = r#"{"ieg":7.5,"iaa":8.0,"ips":6.5,"ida":7.2,"ian":8.5,"ipv":6.0,"inde":7.3,"stone":3,"age":14}"#;
        let parsed: StudentFeatures = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, sample());
    }
}
