use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use race_predictor::{
    config::Config,
    loader::{OfflineSessions, OpenF1Client, SessionCache, SessionProvider},
    model::ModelFamily,
    pipeline::{self, RunOptions},
    report,
    types::SessionType,
    weather::{OfflineWeather, OpenWeatherClient, WeatherProvider},
};

/// Predict a race finishing order from session timing, weather and track data.
#[derive(Parser, Debug)]
#[command(name = "race_predictor", version, about)]
struct Args {
    /// Track name as configured (e.g. mexico, monaco)
    #[arg(long, default_value = "mexico")]
    track: String,

    #[arg(long, default_value_t = 2024)]
    year: u16,

    /// 1-based round of the season
    #[arg(long, default_value_t = 20)]
    round: u8,

    /// Session code: R, Q, S, SQ, FP1, FP2 or FP3
    #[arg(long, default_value = "R")]
    session: SessionType,

    /// Model family to train; repeat for several (default: all)
    #[arg(long = "model", value_enum)]
    models: Vec<ModelFamily>,

    /// Never touch the network; cached sessions are still used
    #[arg(long)]
    offline: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Add predicted-vs-actual tables and scatter plots, and feature importances
    #[arg(long)]
    diagnostics: bool,

    /// JSON configuration replacing the built-in one
    #[arg(long, env = "RACE_PREDICTOR_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    tracing::info!(
        "predicting {} {} round {} ({})",
        args.year,
        args.track,
        args.round,
        args.session
    );

    let (sessions, weather): (Box<dyn SessionProvider>, Box<dyn WeatherProvider>) = if args.offline {
        tracing::info!("offline mode: providers disabled");
        (Box::new(OfflineSessions), Box::new(OfflineWeather))
    } else {
        (
            Box::new(OpenF1Client::new(&config.session).context("building session client")?),
            Box::new(OpenWeatherClient::new(&config).context("building weather client")?),
        )
    };
    let cache = config.session.cache_dir.clone().map(SessionCache::new);

    let options = RunOptions {
        track: args.track,
        year: args.year,
        round: args.round,
        session: args.session,
        families: args.models,
    };
    let outcome = pipeline::run(
        &config,
        options,
        sessions.as_ref(),
        weather.as_ref(),
        cache.as_ref(),
    )
    .await
    .context("prediction run failed")?;

    if args.json {
        println!("{}", report::render_json(&outcome).context("serializing report")?);
    } else {
        print!("{}", report::render_text(&outcome, args.diagnostics));
    }
    Ok(())
}
