use clap::Parser;

/// Race outcome predictor
#[derive(Parser, Debug, Clone)]
#[command(name = "gridcast", version, about)]
pub struct Config {
    /// Track to forecast (e.g. "Monaco")
    #[arg(long, env = "TRACK", default_value = "Monaco")]
    pub track: String,

    /// Race date, YYYY-MM-DD
    #[arg(long, env = "RACE_DATE", default_value = "2025-05-25")]
    pub date: String,

    /// Seasons to pull results from (repeatable)
    #[arg(long = "season", env = "SEASONS", value_delimiter = ',', default_values_t = [2025])]
    pub seasons: Vec<u32>,

    /// Directory for persisted model artifacts
    #[arg(long, env = "MODEL_DIR", default_value = "models")]
    pub model_dir: String,

    /// Ergast-compatible API base URL
    #[arg(
        long,
        env = "ERGAST_API_URL",
        default_value = "https://api.jolpi.ca/ergast/f1"
    )]
    pub api_url: String,

    /// Seed for the heuristic noise term; omit for a random seed
    #[arg(long, env = "NOISE_SEED")]
    pub noise_seed: Option<u64>,

    /// Standard deviation of the heuristic noise term
    #[arg(long, env = "NOISE_SIGMA", default_value = "0.05")]
    pub noise_sigma: f64,

    /// Skip the ensemble even when a trained model exists
    #[arg(long, env = "HEURISTIC_ONLY", default_value = "false")]
    pub heuristic_only: bool,

    /// Retrain the ensemble before forecasting
    #[arg(long, env = "TRAIN", default_value = "false")]
    pub train: bool,

    /// Drivers who gain in the wet (repeatable); overrides the default list
    #[arg(long = "wet-specialist", env = "WET_SPECIALISTS", value_delimiter = ',')]
    pub wet_specialists: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.seasons.is_empty() {
            anyhow::bail!("at least one --season is required");
        }
        if chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").is_err() {
            anyhow::bail!("--date must be YYYY-MM-DD, got {:?}", self.date);
        }
        if !(0.0..=0.5).contains(&self.noise_sigma) {
            anyhow::bail!("noise_sigma must be between 0.0 and 0.5");
        }
        Ok(())
    }

    pub fn race_date(&self) -> anyhow::Result<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid --date {:?}: {e}", self.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::parse_from(["gridcast"])
    }

    #[test]
    fn defaults_validate() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn bad_date_is_rejected() {
        let mut config = base();
        config.date = "25-05-2025".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_seasons_are_rejected() {
        let mut config = base();
        config.seasons.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_noise_is_rejected() {
        let mut config = base();
        config.noise_sigma = 0.9;
        assert!(config.validate().is_err());
    }
}
