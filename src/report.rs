use serde::Serialize;
use std::fmt::Write as _;

use crate::features::FEATURE_NAMES;
use crate::metrics::Metrics;
use crate::model::ModelFamily;
use crate::pipeline::{FamilyResult, RunOutcome};
use crate::types::{DriverIdentity, Provenance, WeatherSnapshot};

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];
const BAR_WIDTH: usize = 30;
const PLOT_WIDTH: usize = 40;
const PLOT_HEIGHT: usize = 16;

// ---------- Ranking ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPrediction {
    /// 1-based predicted finishing position.
    pub position: usize,
    #[serde(flatten)]
    pub identity: DriverIdentity,
    pub predicted_time: f64,
}

/// Order drivers by predicted time, fastest first.
///
/// Equal times fall back to grid position, then to input order.
pub fn rank(identities: &[DriverIdentity], predictions: &[f64]) -> Vec<RankedPrediction> {
    let mut order: Vec<usize> = (0..identities.len().min(predictions.len())).collect();
    order.sort_by(|&a, &b| {
        predictions[a]
            .total_cmp(&predictions[b])
            .then(identities[a].grid_position.cmp(&identities[b].grid_position))
            .then(a.cmp(&b))
    });
    order
        .into_iter()
        .enumerate()
        .map(|(pos, i)| RankedPrediction {
            position: pos + 1,
            identity: identities[i].clone(),
            predicted_time: predictions[i],
        })
        .collect()
}

/// The first three rows of a ranking (fewer if fewer drivers).
pub fn podium(ranked: &[RankedPrediction]) -> &[RankedPrediction] {
    &ranked[..ranked.len().min(3)]
}

// ---------- Text rendering ----------

pub fn render_ranking(ranked: &[RankedPrediction]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<4} {:<22} {:<18} {:>9}  {:>4}",
        "Pos", "Code", "Driver", "Team", "Pred (s)", "Grid"
    );
    for r in ranked {
        let _ = writeln!(
            out,
            "{:>3}  {:<4} {:<22} {:<18} {:>9.3}  {:>4}",
            r.position,
            r.identity.code,
            r.identity.full_name,
            r.identity.team,
            r.predicted_time,
            r.identity.grid_position
        );
    }
    out
}

pub fn render_podium(ranked: &[RankedPrediction]) -> String {
    let mut out = String::from("🏆 Predicted Top 3 🏆\n");
    for (medal, r) in MEDALS.iter().zip(podium(ranked)) {
        let _ = writeln!(
            out,
            "{} P{}: {} ({}) ({:.3} s)",
            medal, r.position, r.identity.full_name, r.identity.team, r.predicted_time
        );
    }
    out
}

/// One line per family: MAE, RMSE and R², or the reason it produced no model.
pub fn render_comparison(outcome: &RunOutcome) -> String {
    let mut out = String::from("Model comparison\n");
    let _ = writeln!(
        out,
        "{:<18} {:>8} {:>8} {:>8} {:>5}  {}",
        "Model", "MAE", "RMSE", "R²", "Rows", "Eval"
    );
    for f in &outcome.families {
        match &f.result {
            Ok(r) => {
                let m = &r.evaluation.metrics;
                let _ = writeln!(
                    out,
                    "{:<18} {:>8.3} {:>8.3} {:>8.3} {:>5}  {}",
                    f.family.label(),
                    m.mae,
                    m.rmse,
                    m.r2,
                    m.samples,
                    if r.evaluation.held_out { "held-out" } else { "in-sample" }
                );
            }
            Err(e) => {
                let _ = writeln!(out, "{:<18} not trained: {}", f.family.label(), e);
            }
        }
    }
    out
}

/// Warnings for every input that came from a fallback instead of its provider.
pub fn provenance_warnings(outcome: &RunOutcome) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Provenance::Fallback { reason } = &outcome.session {
        warnings.push(format!(
            "⚠️  Session data unavailable ({}); predictions use the synthetic fallback laps",
            reason
        ));
    }
    if let Provenance::Fallback { reason } = &outcome.weather.provenance {
        warnings.push(format!(
            "⚠️  Weather unavailable ({}); using defaults {:.1}°C, rain {:.0}%",
            reason,
            outcome.weather.value.temperature_c,
            outcome.weather.value.rain_probability * 100.0
        ));
    }
    warnings
}

/// Predicted against actual mean lap time, in record order.
pub fn render_predicted_vs_actual(
    identities: &[DriverIdentity],
    actual: &[f64],
    predicted: &[f64],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:>10} {:>10} {:>8}",
        "Code", "Actual", "Predicted", "Error"
    );
    for ((id, a), p) in identities.iter().zip(actual).zip(predicted) {
        let _ = writeln!(out, "{:<4} {:>10.3} {:>10.3} {:>+8.3}", id.code, a, p, p - a);
    }
    out
}

/// Text scatter of predicted (vertical) against actual (horizontal) lap
/// time on shared axes; `·` marks the perfect-prediction diagonal.
pub fn render_scatter(actual: &[f64], predicted: &[f64]) -> String {
    let values = actual.iter().chain(predicted).copied();
    let lo = values.clone().fold(f64::INFINITY, f64::min);
    let hi = values.fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return String::new();
    }
    let span = if hi - lo > 1e-9 { hi - lo } else { 1.0 };
    let cell = |v: f64, cells: usize| (((v - lo) / span) * (cells - 1) as f64).round() as usize;

    let mut grid = vec![vec![' '; PLOT_WIDTH]; PLOT_HEIGHT];
    for c in 0..PLOT_WIDTH {
        let r = ((c as f64 / (PLOT_WIDTH - 1) as f64) * (PLOT_HEIGHT - 1) as f64).round() as usize;
        grid[PLOT_HEIGHT - 1 - r][c] = '·';
    }
    for (a, p) in actual.iter().zip(predicted) {
        let c = cell(*a, PLOT_WIDTH).min(PLOT_WIDTH - 1);
        let r = cell(*p, PLOT_HEIGHT).min(PLOT_HEIGHT - 1);
        grid[PLOT_HEIGHT - 1 - r][c] = '●';
    }

    let mut out = String::from("Predicted (s)\n");
    for (i, line) in grid.iter().enumerate() {
        let label = match i {
            0 => format!("{:>8.3}", lo + span),
            _ if i == PLOT_HEIGHT - 1 => format!("{:>8.3}", lo),
            _ => " ".repeat(8),
        };
        let _ = writeln!(out, "{} ┤{}", label, line.iter().collect::<String>());
    }
    let _ = writeln!(out, "{} └{}", " ".repeat(8), "─".repeat(PLOT_WIDTH));
    let _ = writeln!(
        out,
        "{}  {:<8.3}{:^w$}{:>8.3}",
        " ".repeat(8),
        lo,
        "Actual (s)",
        lo + span,
        w = PLOT_WIDTH - 16
    );
    out
}

/// Horizontal bars of normalised importances, longest first.
pub fn render_importances(importances: &[(&'static str, f64)]) -> String {
    let mut sorted = importances.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    let width = FEATURE_NAMES.iter().map(|n| n.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (name, value) in sorted {
        let filled = (value.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
        let _ = writeln!(
            out,
            "{:<width$} {}{} {:.3}",
            name,
            "█".repeat(filled),
            "·".repeat(BAR_WIDTH - filled),
            value,
            width = width
        );
    }
    out
}

fn render_family(
    out: &mut String,
    family: ModelFamily,
    result: &FamilyResult,
    outcome: &RunOutcome,
    diagnostics: bool,
) {
    let _ = writeln!(out, "\n=== {} ===", family.label());
    out.push_str(&render_ranking(&result.ranking));
    out.push('\n');
    out.push_str(&render_podium(&result.ranking));
    let _ = writeln!(
        out,
        "\n🔍 Model Evaluation Metrics ({} {} rows):",
        result.evaluation.metrics.samples,
        if result.evaluation.held_out { "held-out" } else { "in-sample" }
    );
    let _ = writeln!(out, "{}", result.evaluation.metrics);

    if diagnostics {
        out.push_str("\nPredicted vs actual (all drivers):\n");
        out.push_str(&render_predicted_vs_actual(
            outcome.table.identities(),
            &outcome.targets,
            &result.fitted,
        ));
        out.push('\n');
        out.push_str(&render_scatter(&outcome.targets, &result.fitted));
        out.push_str("\nFeature importance:\n");
        out.push_str(&render_importances(&result.evaluation.model.feature_importances()));
    }
}

/// Full console report of one run.
pub fn render_text(outcome: &RunOutcome, diagnostics: bool) -> String {
    let mut out = String::new();
    let o = &outcome.options;
    let _ = writeln!(
        out,
        "🏁 {} {} round {} ({}) predicted finishing order",
        o.year, o.track, o.round, o.session
    );
    let _ = writeln!(
        out,
        "Drivers: {}  Laps: {}  Weather: {:.1}°C, rain {:.0}%",
        outcome.table.len(),
        outcome.lap_count,
        outcome.weather.value.temperature_c,
        outcome.weather.value.rain_probability * 100.0
    );
    for w in provenance_warnings(outcome) {
        let _ = writeln!(out, "{}", w);
    }

    for f in &outcome.families {
        match &f.result {
            Ok(result) => render_family(&mut out, f.family, result, outcome, diagnostics),
            Err(e) => {
                let _ = writeln!(out, "\n=== {} ===\n❌ No model trained: {}", f.family.label(), e);
            }
        }
    }

    out.push('\n');
    out.push_str(&render_comparison(outcome));
    out
}

// ---------- JSON ----------

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub track: &'a str,
    pub year: u16,
    pub round: u8,
    pub session: &'static str,
    pub session_data: &'a Provenance,
    pub lap_count: usize,
    pub weather: &'a WeatherSnapshot,
    pub weather_source: &'a Provenance,
    pub models: Vec<JsonModel<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonModel<'a> {
    pub family: ModelFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<&'a Metrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_out: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ranking: Vec<&'a RankedPrediction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub podium: Vec<&'a RankedPrediction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_importances: Vec<(&'static str, f64)>,
}

impl<'a> JsonReport<'a> {
    pub fn new(outcome: &'a RunOutcome) -> Self {
        let models = outcome
            .families
            .iter()
            .map(|f| match &f.result {
                Ok(r) => JsonModel {
                    family: f.family,
                    error: None,
                    metrics: Some(&r.evaluation.metrics),
                    held_out: Some(r.evaluation.held_out),
                    ranking: r.ranking.iter().collect(),
                    podium: podium(&r.ranking).iter().collect(),
                    feature_importances: r.evaluation.model.feature_importances(),
                },
                Err(e) => JsonModel {
                    family: f.family,
                    error: Some(e.to_string()),
                    metrics: None,
                    held_out: None,
                    ranking: Vec::new(),
                    podium: Vec::new(),
                    feature_importances: Vec::new(),
                },
            })
            .collect();

        Self {
            track: &outcome.options.track,
            year: outcome.options.year,
            round: outcome.options.round,
            session: outcome.options.session.code(),
            session_data: &outcome.session,
            lap_count: outcome.lap_count,
            weather: &outcome.weather.value,
            weather_source: &outcome.weather.provenance,
            models,
        }
    }
}

pub fn render_json(outcome: &RunOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport::new(outcome))
}
