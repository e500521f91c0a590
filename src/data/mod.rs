pub mod ergast;
pub mod provider;
pub mod records;
pub mod seeds;

pub use ergast::ErgastApi;
pub use provider::DataProvider;

use anyhow::Result;
use chrono::NaiveDate;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::PredictorError;
use records::{
    CarMetrics, CompetitorInfo, EventRecord, QualifyingResult, RaceResult, StandingEntry,
    TrackInfo, WeatherSample,
};

/// Every externally sourced table, loaded once per refresh cycle with the
/// seed-fallback policy applied per table.
#[derive(Debug, Clone)]
pub struct DataCatalog {
    pub competitors: BTreeMap<String, CompetitorInfo>,
    pub driver_standings: BTreeMap<String, StandingEntry>,
    pub team_standings: BTreeMap<String, StandingEntry>,
    /// Completed races, ordered by (season, round) ascending
    pub races: Vec<RaceResult>,
    pub qualifying: Vec<QualifyingResult>,
    pub car_metrics: BTreeMap<String, CarMetrics>,
    pub tracks: BTreeMap<String, TrackInfo>,
    /// Names of tables that fell back to seed data
    pub degraded_tables: Vec<&'static str>,
}

/// Apply the fallback rule for a single table: the seed activates iff the
/// fetch failed or returned an empty collection, and activation is logged.
fn fall_back<T>(
    table: &'static str,
    fetched: Result<T>,
    is_empty: impl Fn(&T) -> bool,
    seed: impl FnOnce() -> T,
    degraded: &mut Vec<&'static str>,
) -> T {
    match fetched {
        Ok(value) if !is_empty(&value) => value,
        Ok(_) => {
            let err = PredictorError::data_unavailable(table, "live fetch returned empty");
            warn!("{err}; substituting seed table (degraded mode)");
            degraded.push(table);
            seed()
        }
        Err(e) => {
            let err = PredictorError::data_unavailable(table, e);
            warn!("{err}; substituting seed table (degraded mode)");
            degraded.push(table);
            seed()
        }
    }
}

/// Fetch one table per season concurrently and merge by ordered
/// concatenation. A failed season is logged and skipped; it never aborts the
/// other slices.
async fn fetch_seasons<T, F, Fut>(table: &str, seasons: &[u32], fetch: F) -> Vec<T>
where
    F: Fn(u32) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<T>>>,
{
    let futures: Vec<_> = seasons.iter().map(|&s| fetch(s)).collect();
    let mut merged = Vec::new();
    for (season, result) in seasons.iter().zip(join_all(futures).await) {
        match result {
            Ok(slice) => merged.extend(slice),
            Err(e) => warn!("{table} fetch for season {season} failed, skipping slice: {e}"),
        }
    }
    merged
}

impl DataCatalog {
    /// Load every table from the provider, substituting seeds where needed.
    /// Season-scoped tables fan out across `seasons` and merge in order.
    pub async fn load(provider: &dyn DataProvider, seasons: &[u32]) -> Self {
        info!(
            "Loading data catalog from {} for seasons {:?}",
            provider.name(),
            seasons
        );
        let mut degraded = Vec::new();

        let competitors = fall_back(
            "competitors",
            provider.competitors().await,
            BTreeMap::is_empty,
            seeds::competitors,
            &mut degraded,
        );
        let driver_standings = fall_back(
            "driver_standings",
            provider.driver_standings().await,
            BTreeMap::is_empty,
            seeds::driver_standings,
            &mut degraded,
        );
        let team_standings = fall_back(
            "team_standings",
            provider.team_standings().await,
            BTreeMap::is_empty,
            seeds::team_standings,
            &mut degraded,
        );

        let races = fall_back(
            "race_results",
            Ok(fetch_seasons("race_results", seasons, |s| provider.race_results(s)).await),
            Vec::is_empty,
            seeds::race_results,
            &mut degraded,
        );
        let qualifying = fall_back(
            "qualifying",
            Ok(fetch_seasons("qualifying", seasons, |s| provider.qualifying(s)).await),
            Vec::is_empty,
            seeds::qualifying_results,
            &mut degraded,
        );

        let car_metrics = fall_back(
            "car_metrics",
            provider.car_metrics().await,
            BTreeMap::is_empty,
            seeds::car_metrics,
            &mut degraded,
        );
        let tracks = fall_back(
            "tracks",
            provider.tracks().await,
            BTreeMap::is_empty,
            seeds::tracks,
            &mut degraded,
        );

        if !degraded.is_empty() {
            warn!("Catalog loaded in degraded mode; seeded tables: {degraded:?}");
        }

        DataCatalog {
            competitors,
            driver_standings,
            team_standings,
            races,
            qualifying,
            car_metrics,
            tracks,
            degraded_tables: degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_tables.is_empty()
    }

    /// Competitor -> team mapping, preferring the latest result row's
    /// constructor over the roster entry.
    pub fn team_mapping(&self) -> BTreeMap<String, String> {
        let mut mapping: BTreeMap<String, String> = self
            .competitors
            .iter()
            .map(|(name, info)| (name.clone(), info.team.clone()))
            .collect();
        for race in &self.races {
            for (driver, result) in &race.results {
                if let Some(team) = &result.team {
                    mapping.insert(driver.clone(), team.clone());
                }
            }
        }
        mapping
    }

    /// Flatten all races into per-competitor event records, ordered by
    /// (season, round) ascending.
    pub fn event_records(&self) -> Vec<EventRecord> {
        let teams = self.team_mapping();
        let mut races: Vec<&RaceResult> = self.races.iter().collect();
        races.sort_by_key(|r| (r.season, r.round));
        races
            .iter()
            .flat_map(|r| r.to_event_records(&teams))
            .collect()
    }

    /// Latest known qualifying position per competitor, if any.
    pub fn latest_qualifying_positions(&self) -> BTreeMap<String, u32> {
        let mut latest: BTreeMap<String, (u32, u32, u32)> = BTreeMap::new();
        for quali in &self.qualifying {
            for (driver, entry) in &quali.results {
                let key = (quali.season, quali.round, entry.position);
                match latest.get(driver) {
                    Some(&(s, r, _)) if (s, r) >= (quali.season, quali.round) => {}
                    _ => {
                        latest.insert(driver.clone(), key);
                    }
                }
            }
        }
        latest.into_iter().map(|(d, (_, _, p))| (d, p)).collect()
    }
}

/// Fetch weather with the same fallback policy as the table loads.
/// Returns the sample plus whether the seed was substituted.
pub async fn fetch_weather(
    provider: &dyn DataProvider,
    track: &str,
    date: NaiveDate,
) -> (WeatherSample, bool) {
    match provider.weather(track, date).await {
        Ok(sample) => (sample, false),
        Err(e) => {
            let err = PredictorError::data_unavailable("weather", e);
            warn!("{err}; substituting seed sample (degraded mode)");
            (seeds::weather(), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    /// Provider stub: empty tables everywhere, with one season of results
    /// failing and another succeeding.
    struct StubProvider {
        good_season: u32,
    }

    #[async_trait]
    impl DataProvider for StubProvider {
        fn name(&self) -> &str {
            "Stub"
        }

        async fn competitors(&self) -> Result<BTreeMap<String, CompetitorInfo>> {
            Ok(BTreeMap::new())
        }

        async fn driver_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
            Err(anyhow!("network down"))
        }

        async fn team_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
            Ok(BTreeMap::new())
        }

        async fn race_results(&self, season: u32) -> Result<Vec<RaceResult>> {
            if season == self.good_season {
                Ok(vec![RaceResult {
                    season,
                    round: 1,
                    race_name: "Live Race".to_string(),
                    results: BTreeMap::new(),
                }])
            } else {
                Err(anyhow!("season {season} unavailable"))
            }
        }

        async fn qualifying(&self, _season: u32) -> Result<Vec<QualifyingResult>> {
            Ok(vec![])
        }

        async fn car_metrics(&self) -> Result<BTreeMap<String, CarMetrics>> {
            Ok(BTreeMap::new())
        }

        async fn tracks(&self) -> Result<BTreeMap<String, TrackInfo>> {
            Ok(BTreeMap::new())
        }

        async fn weather(&self, _track: &str, _date: NaiveDate) -> Result<WeatherSample> {
            Err(anyhow!("no weather"))
        }
    }

    #[tokio::test]
    async fn empty_tables_activate_seed_fallback() {
        let catalog = DataCatalog::load(&StubProvider { good_season: 0 }, &[2025]).await;
        // Empty roster fetch must yield the non-empty seed table, not {}.
        assert!(!catalog.competitors.is_empty());
        assert!(catalog.is_degraded());
        assert!(catalog.degraded_tables.contains(&"competitors"));
        // Errors and empties route through the same fallback path.
        assert!(catalog.degraded_tables.contains(&"driver_standings"));
    }

    #[tokio::test]
    async fn failed_season_slice_is_isolated() {
        let catalog = DataCatalog::load(&StubProvider { good_season: 2025 }, &[2024, 2025]).await;
        // 2024 failed but 2025 survived: results come from live data.
        assert_eq!(catalog.races.len(), 1);
        assert_eq!(catalog.races[0].race_name, "Live Race");
        assert!(!catalog.degraded_tables.contains(&"race_results"));
    }

    #[tokio::test]
    async fn weather_error_recovers_via_seed() {
        let provider = StubProvider { good_season: 0 };
        let date = NaiveDate::from_ymd_opt(2025, 5, 25).unwrap();
        let (sample, degraded) = fetch_weather(&provider, "Monaco", date).await;
        assert!(degraded);
        assert!((sample.rain_probability - 0.2).abs() < 1e-12);
    }

    #[test]
    fn team_mapping_prefers_result_row() {
        let mut catalog_races = seeds::race_results();
        // Tag one result row with an explicit constructor.
        if let Some(res) = catalog_races[0].results.get_mut("Lando Norris") {
            res.team = Some("McLaren".to_string());
        }
        let catalog = DataCatalog {
            competitors: seeds::competitors(),
            driver_standings: seeds::driver_standings(),
            team_standings: seeds::team_standings(),
            races: catalog_races,
            qualifying: vec![],
            car_metrics: seeds::car_metrics(),
            tracks: seeds::tracks(),
            degraded_tables: vec![],
        };
        let mapping = catalog.team_mapping();
        assert_eq!(mapping.get("Lando Norris").map(String::as_str), Some("McLaren"));
        // Roster-only drivers still resolve.
        assert_eq!(
            mapping.get("Kevin Magnussen").map(String::as_str),
            Some("Haas F1 Team")
        );
    }
}
