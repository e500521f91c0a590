//! The predictor: owns the loaded catalog, profiles, and optional trained
//! ensemble, and produces podium forecasts for a venue and date.

use chrono::NaiveDate;
use ndarray::Array1;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::data::records::{TrackInfo, TrackKind, WeatherSample};
use crate::data::{fetch_weather, DataCatalog, DataProvider};
use crate::ensemble::EnsembleModel;
use crate::error::PredictorError;
use crate::features::{FeatureBuilder, FeatureTable, FEATURE_NAMES, MAX_FIELD_SIZE};
use crate::heuristic::{rank, HeuristicScore, HeuristicScorer, NoiseSource};
use crate::profiles::{build_driver_profiles, build_team_profiles, DriverProfile, TeamProfile};
use crate::store::ModelStore;

/// How many finishers a forecast names.
const PODIUM_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSource {
    /// Trained ensemble ranked the field
    Ensemble,
    /// No trained model; heuristic scores ranked the field
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct PredictedFinish {
    pub competitor: String,
    pub team: String,
    /// Podium probability (ensemble) or blended confidence (heuristic), [0, 1]
    pub probability: f64,
}

#[derive(Debug, Clone)]
pub struct RaceForecast {
    pub track: String,
    pub date: NaiveDate,
    pub entries: Vec<PredictedFinish>,
    pub source: ForecastSource,
    /// True when any input table or the weather came from seed data
    pub degraded: bool,
    /// Plain-language rationale for the top pick
    pub explanation: String,
}

/// Owns every piece of predictor state; nothing lives in globals, so two
/// instances never share or clobber each other's data.
pub struct RacePredictor {
    catalog: DataCatalog,
    drivers: BTreeMap<String, DriverProfile>,
    teams: BTreeMap<String, TeamProfile>,
    scorer: HeuristicScorer,
    ensemble: Option<EnsembleModel>,
    store: ModelStore,
}

impl RacePredictor {
    /// Load the catalog and build all profiles. Any previously persisted
    /// ensemble is picked up; its absence is not an error.
    pub async fn load(
        provider: &dyn DataProvider,
        seasons: &[u32],
        store: ModelStore,
        scorer: HeuristicScorer,
    ) -> Self {
        let catalog = DataCatalog::load(provider, seasons).await;
        let drivers = build_driver_profiles(&catalog);
        let teams = build_team_profiles(&catalog);
        let ensemble = store.load();
        if ensemble.is_none() {
            info!("No trained model on disk; forecasts will use the heuristic scorer");
        }
        RacePredictor {
            catalog,
            drivers,
            teams,
            scorer,
            ensemble,
            store,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.catalog.is_degraded()
    }

    pub fn has_model(&self) -> bool {
        self.ensemble.is_some()
    }

    /// Drop any loaded ensemble so forecasts use the heuristic path only.
    /// The persisted artifact stays on disk.
    pub fn without_model(mut self) -> Self {
        self.ensemble = None;
        self
    }

    /// Train the ensemble on the loaded results and persist it.
    pub fn train(&mut self) -> Result<(), PredictorError> {
        let table = self.feature_table()?;
        info!(
            "Training on {} feature rows ({} records dropped)",
            table.rows.len(),
            table.dropped
        );
        let ensemble = EnsembleModel::train(&table)?;
        self.store.save(&ensemble)?;
        self.ensemble = Some(ensemble);
        Ok(())
    }

    fn feature_table(&self) -> Result<FeatureTable, PredictorError> {
        FeatureBuilder::build(&self.catalog.event_records())
    }

    /// Forecast the podium for one venue and date.
    ///
    /// The ensemble ranks the field when a trained model exists; otherwise
    /// the heuristic scorer does. Either way the heuristic factors feed the
    /// explanation for the top pick.
    pub async fn forecast(
        &self,
        provider: &dyn DataProvider,
        track_name: &str,
        date: NaiveDate,
        noise: &mut dyn NoiseSource,
    ) -> Result<RaceForecast, PredictorError> {
        let (weather, weather_degraded) = fetch_weather(provider, track_name, date).await;
        let track = self.resolve_track(track_name);

        let heuristic_ranked = rank(self.scorer.score_field(
            &self.drivers,
            &self.teams,
            &self.catalog.car_metrics,
            &track,
            &weather,
            noise,
        ));
        if heuristic_ranked.is_empty() {
            return Err(PredictorError::Feature(
                "no competitors available to score".to_string(),
            ));
        }

        let (entries, source) = match &self.ensemble {
            Some(model) => (self.rank_with_ensemble(model, &heuristic_ranked)?, ForecastSource::Ensemble),
            None => (self.podium_from_heuristic(&heuristic_ranked), ForecastSource::Heuristic),
        };

        let explanation =
            explain_top_pick(&entries, &heuristic_ranked, &weather, &self.drivers, &self.teams);
        Ok(RaceForecast {
            track: track_name.to_string(),
            date,
            entries,
            source,
            degraded: self.catalog.is_degraded() || weather_degraded,
            explanation,
        })
    }

    fn resolve_track(&self, name: &str) -> TrackInfo {
        match self.catalog.tracks.get(name) {
            Some(t) => t.clone(),
            None => {
                warn!("Unknown track {name:?}; assuming a typical permanent circuit");
                TrackInfo {
                    kind: TrackKind::Circuit,
                    length_km: 5.0,
                    turns: 15,
                    overtaking_opportunities: 0.5,
                    weather_sensitivity: 0.5,
                }
            }
        }
    }

    /// Rank by podium probability from the ensemble, filling from the
    /// heuristic order for drivers the model has never seen.
    fn rank_with_ensemble(
        &self,
        model: &EnsembleModel,
        heuristic_ranked: &[HeuristicScore],
    ) -> Result<Vec<PredictedFinish>, PredictorError> {
        let table = self.feature_table()?;
        let latest = table.latest_per_competitor();
        let grids = self.catalog.latest_qualifying_positions();

        let mut scored: Vec<PredictedFinish> = Vec::new();
        for (driver, row) in &latest {
            let features = self.inference_row(driver, row.values, &grids);
            let probs = model.predict_proba(&features);
            // Class 1 is the podium outcome.
            let podium = probs.get(1).copied().unwrap_or(0.0);
            scored.push(PredictedFinish {
                competitor: driver.clone(),
                team: self.team_of(driver),
                probability: podium,
            });
        }

        // The model only knows drivers with history; when the field is thin,
        // heuristic candidates join the pool BEFORE the final sort so the
        // output stays probability-descending.
        if scored.len() < PODIUM_SIZE {
            for h in heuristic_ranked {
                if scored.iter().any(|e| e.competitor == h.competitor) {
                    continue;
                }
                scored.push(PredictedFinish {
                    competitor: h.competitor.clone(),
                    team: self.team_of(&h.competitor),
                    probability: h.score,
                });
            }
        }
        scored.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(PODIUM_SIZE);
        Ok(scored)
    }

    /// Expected grid for the upcoming event replaces the historical grid
    /// feature: latest qualifying, else championship standing, else the back
    /// of the field.
    fn inference_row(
        &self,
        driver: &str,
        mut values: [f64; FEATURE_NAMES.len()],
        grids: &BTreeMap<String, u32>,
    ) -> Array1<f64> {
        let grid = grids
            .get(driver)
            .copied()
            .map(f64::from)
            .or_else(|| {
                self.drivers
                    .get(driver)
                    .and_then(|d| d.standing_position)
                    .map(f64::from)
            })
            .unwrap_or(MAX_FIELD_SIZE);
        values[0] = grid;
        Array1::from_vec(values.to_vec())
    }

    fn podium_from_heuristic(&self, ranked: &[HeuristicScore]) -> Vec<PredictedFinish> {
        ranked
            .iter()
            .take(PODIUM_SIZE)
            .map(|s| PredictedFinish {
                competitor: s.competitor.clone(),
                team: self.team_of(&s.competitor),
                probability: s.score,
            })
            .collect()
    }

    fn team_of(&self, driver: &str) -> String {
        self.drivers
            .get(driver)
            .map(|d| d.team.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

fn explain_top_pick(
    entries: &[PredictedFinish],
    heuristic_ranked: &[HeuristicScore],
    weather: &WeatherSample,
    drivers: &BTreeMap<String, DriverProfile>,
    teams: &BTreeMap<String, TeamProfile>,
) -> String {
    let Some(top) = entries.first() else {
        return String::new();
    };
    let mut text = match heuristic_ranked
        .iter()
        .find(|h| h.competitor == top.competitor)
    {
        Some(f) => format!(
            "{} leads the forecast: recent finishes rate {:.2}, car {:.2}, form {:.2}",
            f.competitor, f.position_factor, f.car_factor, f.driver_form
        ),
        None => format!("{} leads the forecast", top.competitor),
    };
    if let Some(driver) = drivers.get(&top.competitor) {
        if let Some(position) = driver.standing_position {
            text.push_str(&format!(
                "; championship P{position} on {:.0} points",
                driver.current_points
            ));
        }
    }
    if let Some(team) = teams.get(&top.team) {
        text.push_str(&format!(
            " for {} ({:.0} constructor points)",
            team.name, team.current_points
        ));
    }
    if weather.rain_probability > 0.5 {
        text.push_str(&format!(
            ", with rain likely ({:.0}%) shifting the order",
            weather.rain_probability * 100.0
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::{
        CarMetrics, CompetitorInfo, QualifyingResult, RaceResult, StandingEntry, TrackInfo,
        WeatherSample,
    };
    use crate::heuristic::SilentNoise;
    use anyhow::Result;
    use async_trait::async_trait;

    /// Provider with nothing live: every table routes to the seeds.
    struct Offline;

    #[async_trait]
    impl DataProvider for Offline {
        fn name(&self) -> &str {
            "Offline"
        }
        async fn competitors(&self) -> Result<BTreeMap<String, CompetitorInfo>> {
            anyhow::bail!("offline")
        }
        async fn driver_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
            anyhow::bail!("offline")
        }
        async fn team_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
            anyhow::bail!("offline")
        }
        async fn race_results(&self, _season: u32) -> Result<Vec<RaceResult>> {
            anyhow::bail!("offline")
        }
        async fn qualifying(&self, _season: u32) -> Result<Vec<QualifyingResult>> {
            anyhow::bail!("offline")
        }
        async fn car_metrics(&self) -> Result<BTreeMap<String, CarMetrics>> {
            anyhow::bail!("offline")
        }
        async fn tracks(&self) -> Result<BTreeMap<String, TrackInfo>> {
            anyhow::bail!("offline")
        }
        async fn weather(&self, _track: &str, _date: NaiveDate) -> Result<WeatherSample> {
            anyhow::bail!("offline")
        }
    }

    fn temp_store(tag: &str) -> ModelStore {
        let dir = std::env::temp_dir().join(format!(
            "gridcast-predictor-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        ModelStore::new(dir)
    }

    fn race_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 25).unwrap()
    }

    #[tokio::test]
    async fn heuristic_forecast_when_no_model_exists() {
        let predictor = RacePredictor::load(
            &Offline,
            &[2025],
            temp_store("heuristic"),
            HeuristicScorer::new(),
        )
        .await;
        let forecast = predictor
            .forecast(&Offline, "Monaco", race_date(), &mut SilentNoise)
            .await
            .unwrap();

        assert_eq!(forecast.source, ForecastSource::Heuristic);
        assert!(forecast.degraded, "offline provider means seed data everywhere");
        assert_eq!(forecast.entries.len(), 3);
        // Probability-descending, all in [0, 1], no duplicates.
        for pair in forecast.entries.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
            assert_ne!(pair[0].competitor, pair[1].competitor);
        }
        for e in &forecast.entries {
            assert!((0.0..=1.0).contains(&e.probability));
        }
        assert!(forecast.explanation.contains(&forecast.entries[0].competitor));
        // Standings enrich the rationale: championship position and points
        // for the driver, points for the team.
        assert!(forecast.explanation.contains("championship P"));
        assert!(forecast.explanation.contains("constructor points"));
    }

    #[tokio::test]
    async fn trained_forecast_uses_the_ensemble() {
        let mut predictor = RacePredictor::load(
            &Offline,
            &[2025],
            temp_store("trained"),
            HeuristicScorer::new(),
        )
        .await;
        predictor.train().unwrap();
        assert!(predictor.has_model());

        let forecast = predictor
            .forecast(&Offline, "Silverstone", race_date(), &mut SilentNoise)
            .await
            .unwrap();
        assert_eq!(forecast.source, ForecastSource::Ensemble);
        assert_eq!(forecast.entries.len(), 3);
        for pair in forecast.entries.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[tokio::test]
    async fn persisted_model_survives_a_reload() {
        let dir = std::env::temp_dir().join(format!(
            "gridcast-predictor-reload-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);

        let mut first = RacePredictor::load(
            &Offline,
            &[2025],
            ModelStore::new(dir.clone()),
            HeuristicScorer::new(),
        )
        .await;
        first.train().unwrap();

        let second = RacePredictor::load(
            &Offline,
            &[2025],
            ModelStore::new(dir),
            HeuristicScorer::new(),
        )
        .await;
        assert!(second.has_model(), "artifact should load on construction");
    }

    /// Roster and stats are down, but two drivers have live race history.
    /// The trained model then covers fewer drivers than the podium needs.
    struct ThinHistory;

    #[async_trait]
    impl DataProvider for ThinHistory {
        fn name(&self) -> &str {
            "ThinHistory"
        }
        async fn competitors(&self) -> Result<BTreeMap<String, CompetitorInfo>> {
            anyhow::bail!("offline")
        }
        async fn driver_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
            anyhow::bail!("offline")
        }
        async fn team_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
            anyhow::bail!("offline")
        }
        async fn race_results(&self, season: u32) -> Result<Vec<RaceResult>> {
            let mut races = Vec::new();
            for round in 1..=6u32 {
                let mut results = BTreeMap::new();
                for (driver, pos, grid, points) in
                    [("Front", 1, 1, 25.0), ("Back", 15, 18, 0.0)]
                {
                    results.insert(
                        driver.to_string(),
                        crate::data::records::DriverResult {
                            position: Some(pos),
                            grid: Some(grid),
                            points,
                            status: crate::data::records::RaceStatus::Finished,
                            team: None,
                        },
                    );
                }
                races.push(RaceResult {
                    season,
                    round,
                    race_name: format!("Round {round}"),
                    results,
                });
            }
            Ok(races)
        }
        async fn qualifying(&self, _season: u32) -> Result<Vec<QualifyingResult>> {
            Ok(vec![])
        }
        async fn car_metrics(&self) -> Result<BTreeMap<String, CarMetrics>> {
            anyhow::bail!("offline")
        }
        async fn tracks(&self) -> Result<BTreeMap<String, TrackInfo>> {
            anyhow::bail!("offline")
        }
        async fn weather(&self, _track: &str, _date: NaiveDate) -> Result<WeatherSample> {
            anyhow::bail!("offline")
        }
    }

    #[tokio::test]
    async fn thin_ensemble_field_stays_probability_descending() {
        let mut predictor = RacePredictor::load(
            &ThinHistory,
            &[2025],
            temp_store("thin-field"),
            HeuristicScorer::new(),
        )
        .await;
        predictor.train().unwrap();

        let forecast = predictor
            .forecast(&ThinHistory, "Monaco", race_date(), &mut SilentNoise)
            .await
            .unwrap();
        assert_eq!(forecast.source, ForecastSource::Ensemble);
        assert_eq!(forecast.entries.len(), 3);
        for pair in forecast.entries.windows(2) {
            assert!(
                pair[0].probability >= pair[1].probability,
                "output not probability-descending: {} {} < {} {}",
                pair[0].competitor,
                pair[0].probability,
                pair[1].competitor,
                pair[1].probability
            );
            assert_ne!(pair[0].competitor, pair[1].competitor);
        }
    }

    #[tokio::test]
    async fn unknown_track_still_forecasts() {
        let predictor = RacePredictor::load(
            &Offline,
            &[2025],
            temp_store("unknown-track"),
            HeuristicScorer::new(),
        )
        .await;
        let forecast = predictor
            .forecast(&Offline, "Nowhere Raceway", race_date(), &mut SilentNoise)
            .await
            .unwrap();
        assert_eq!(forecast.entries.len(), 3);
    }
}
