use serde::Serialize;

use crate::features::{FeatureVector, FEATURE_COUNT};

/// Column-median imputation, fitted once on training rows and reused for
/// every later transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedianImputer {
    fill: [f64; FEATURE_COUNT],
}

impl MedianImputer {
    /// Columns with no observed value are filled with 0.
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let mut fill = [0.0; FEATURE_COUNT];
        for (col, slot) in fill.iter_mut().enumerate() {
            let mut seen: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
            match median(&mut seen) {
                Some(m) => *slot = m,
                None => tracing::warn!("feature column {} has no observed values; filling with 0", col),
            }
        }
        Self { fill }
    }

    pub fn fill_values(&self) -> &[f64; FEATURE_COUNT] {
        &self.fill
    }

    pub fn transform_row(&self, row: &FeatureVector) -> Vec<f64> {
        row.iter()
            .zip(self.fill.iter())
            .map(|(v, f)| v.unwrap_or(*f))
            .collect()
    }

    pub fn transform(&self, rows: &[FeatureVector]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(first: Option<f64>) -> FeatureVector {
        let mut r = [Some(1.0); FEATURE_COUNT];
        r[0] = first;
        r
    }

    #[test]
    fn fills_with_training_median() {
        let train = vec![row(Some(3.0)), row(None), row(Some(1.0)), row(Some(10.0))];
        let imp = MedianImputer::fit(&train);
        assert_eq!(imp.fill_values()[0], 3.0);

        let out = imp.transform(&train);
        assert_eq!(out.len(), 4);
        assert_eq!(out[1][0], 3.0);
        assert_eq!(out[2][0], 1.0);
    }

    #[test]
    fn even_count_median_averages() {
        let train = vec![row(Some(2.0)), row(Some(4.0))];
        assert_eq!(MedianImputer::fit(&train).fill_values()[0], 3.0);
    }

    #[test]
    fn reapplied_imputer_ignores_new_rows() {
        let train = vec![row(Some(2.0)), row(Some(4.0)), row(Some(6.0))];
        let imp = MedianImputer::fit(&train);
        // a prediction-time row with a missing value gets the training median,
        // not a statistic of the prediction batch
        let out = imp.transform(&[row(None), row(Some(100.0)), row(Some(100.0))]);
        assert_eq!(out[0][0], 4.0);
    }

    #[test]
    fn all_missing_column_gets_zero() {
        let imp = MedianImputer::fit(&[row(None), row(None)]);
        assert_eq!(imp.fill_values()[0], 0.0);
        assert_eq!(imp.transform_row(&row(None))[0], 0.0);
    }
}
