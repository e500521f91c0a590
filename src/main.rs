use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

mod config;
mod data;
mod ensemble;
mod error;
mod features;
mod heuristic;
mod predictor;
mod profiles;
mod store;

use config::Config;
use data::ErgastApi;
use heuristic::{GaussianNoise, HeuristicScorer, NoiseSource, SilentNoise};
use predictor::{ForecastSource, RacePredictor};
use store::ModelStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let date = config.race_date()?;

    let provider = ErgastApi::new(Some(&config.api_url))?;
    let scorer = if config.wet_specialists.is_empty() {
        HeuristicScorer::new()
    } else {
        HeuristicScorer::with_wet_specialists(config.wet_specialists.clone())
    };

    let mut predictor = RacePredictor::load(
        &provider,
        &config.seasons,
        ModelStore::new(&config.model_dir),
        scorer,
    )
    .await;

    if predictor.is_degraded() {
        warn!("Running in degraded mode: some inputs came from built-in seed data");
    }

    // An explicit --train that fails is fatal; a merely missing artifact is
    // not, the forecast just falls back to the heuristic scorer.
    if config.train {
        predictor.train()?;
        info!("Ensemble trained and saved to {}", config.model_dir);
    }
    if config.heuristic_only {
        predictor = predictor.without_model();
        info!("Ensemble disabled; forecasting with the heuristic scorer only");
    }

    let mut noise: Box<dyn NoiseSource> = match config.noise_seed {
        Some(seed) => Box::new(GaussianNoise::new(seed, config.noise_sigma)),
        None if config.noise_sigma > 0.0 => {
            Box::new(GaussianNoise::new(rand::random(), config.noise_sigma))
        }
        None => Box::new(SilentNoise),
    };

    let forecast = predictor
        .forecast(&provider, &config.track, date, noise.as_mut())
        .await?;

    let source = match forecast.source {
        ForecastSource::Ensemble => "ensemble",
        ForecastSource::Heuristic => "heuristic",
    };
    println!("Podium forecast for {} on {} ({source}):", forecast.track, forecast.date);
    for (i, entry) in forecast.entries.iter().enumerate() {
        println!(
            "  {}. {} ({}) {:.1}%",
            i + 1,
            entry.competitor,
            entry.team,
            entry.probability * 100.0
        );
    }
    println!("{}", forecast.explanation);
    if forecast.degraded {
        println!("note: some inputs came from built-in seed data");
    }

    Ok(())
}
