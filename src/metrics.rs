use serde::Serialize;
use std::fmt;

/// Regression error summary for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
    pub samples: usize,
}

impl Metrics {
    /// Compute metrics of `predicted` against `actual`.
    ///
    /// R² follows the usual convention for a constant target: 1 when the
    /// residuals are also zero, 0 otherwise. Empty input yields all zeros.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                mae: 0.0,
                mse: 0.0,
                rmse: 0.0,
                r2: 0.0,
                samples: 0,
            };
        }
        let nf = n as f64;
        let mean = actual[..n].iter().sum::<f64>() / nf;

        let mut abs = 0.0;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (a, p) in actual.iter().zip(predicted) {
            let r = a - p;
            abs += r.abs();
            ss_res += r * r;
            ss_tot += (a - mean) * (a - mean);
        }

        let mse = ss_res / nf;
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            mae: abs / nf,
            mse,
            rmse: mse.sqrt(),
            r2,
            samples: n,
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Mean Absolute Error (MAE): {:.3} seconds", self.mae)?;
        writeln!(f, "  Mean Squared Error (MSE): {:.3} seconds²", self.mse)?;
        writeln!(f, "  Root Mean Squared Error (RMSE): {:.3} seconds", self.rmse)?;
        write!(f, "  R-squared (R²) Score: {:.3}", self.r2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let m = Metrics::compute(&[3.0, -0.5, 2.0, 7.0], &[2.5, 0.0, 2.0, 8.0]);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.mse - 0.375).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((m.r2 - 0.948_608_137_044_968).abs() < 1e-9);
        assert_eq!(m.samples, 4);
    }

    #[test]
    fn perfect_prediction() {
        let y = [74.8, 74.9, 75.1];
        let m = Metrics::compute(&y, &y);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn constant_target() {
        assert_eq!(Metrics::compute(&[5.0, 5.0], &[5.0, 5.0]).r2, 1.0);
        assert_eq!(Metrics::compute(&[5.0, 5.0], &[4.0, 6.0]).r2, 0.0);
    }

    #[test]
    fn empty_input() {
        assert_eq!(Metrics::compute(&[], &[]).samples, 0);
    }
}
