use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::TrainError;

const REPEATS: u64 = 5;

fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Permutation importance: the mean rise in squared error when one column is
/// shuffled, clamped at zero and normalised to sum to 1 (all zeros when no
/// column matters). A constant column always scores exactly 0.
pub fn permutation_importances<F>(
    x: &[Vec<f64>],
    y: &[f64],
    seed: u64,
    predict: F,
) -> Result<Vec<f64>, TrainError>
where
    F: Fn(&[Vec<f64>]) -> Result<Vec<f64>, TrainError>,
{
    let n_features = x.first().map_or(0, |r| r.len());
    let baseline = mse(y, &predict(x)?);

    let mut raw = vec![0.0; n_features];
    for (f, slot) in raw.iter_mut().enumerate() {
        let column: Vec<f64> = x.iter().map(|r| r[f]).collect();
        let mut rise = 0.0;
        for repeat in 0..REPEATS {
            let mut shuffled = column.clone();
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(f as u64 * REPEATS + repeat));
            shuffled.shuffle(&mut rng);
            let permuted: Vec<Vec<f64>> = x
                .iter()
                .zip(&shuffled)
                .map(|(r, v)| {
                    let mut r = r.clone();
                    r[f] = *v;
                    r
                })
                .collect();
            rise += mse(y, &predict(&permuted)?) - baseline;
        }
        *slot = (rise / REPEATS as f64).max(0.0);
    }

    let total: f64 = raw.iter().sum();
    Ok(if total > 0.0 {
        raw.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; n_features]
    })
}
