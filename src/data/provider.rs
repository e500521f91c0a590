use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::records::{
    CarMetrics, CompetitorInfo, QualifyingResult, RaceResult, StandingEntry, TrackInfo,
    WeatherSample,
};

/// Trait that every upstream data source must implement.
///
/// Implementations may fail or return empty tables; the catalog layer decides
/// whether to substitute seed data. Adapters validate and default-fill at this
/// boundary so the core never sees loosely shaped responses.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Current roster: competitor name -> info.
    async fn competitors(&self) -> Result<BTreeMap<String, CompetitorInfo>>;

    /// Championship standings for competitors.
    async fn driver_standings(&self) -> Result<BTreeMap<String, StandingEntry>>;

    /// Championship standings for teams.
    async fn team_standings(&self) -> Result<BTreeMap<String, StandingEntry>>;

    /// All completed race classifications for one season.
    async fn race_results(&self, season: u32) -> Result<Vec<RaceResult>>;

    /// All qualifying classifications for one season.
    async fn qualifying(&self, season: u32) -> Result<Vec<QualifyingResult>>;

    /// Per-team car performance subscores.
    async fn car_metrics(&self) -> Result<BTreeMap<String, CarMetrics>>;

    /// Venue characteristics for the current calendar.
    async fn tracks(&self) -> Result<BTreeMap<String, TrackInfo>>;

    /// Forecast conditions for one venue and date.
    async fn weather(&self, track: &str, date: NaiveDate) -> Result<WeatherSample>;
}
