use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a competitor's race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Finished,
    /// Did not finish (mechanical failure, accident, ...)
    Dnf,
    /// Did not start
    Dns,
    Disqualified,
}

impl RaceStatus {
    /// Classify an upstream status string. Anything that is not an explicit
    /// finish or non-start counts as a DNF.
    pub fn from_str(s: &str) -> Self {
        let lower = s.to_lowercase();
        if lower == "finished" || lower.starts_with('+') || lower.contains("lap") {
            // Ergast reports lapped finishers as "+1 Lap" etc.
            RaceStatus::Finished
        } else if lower.contains("did not start") || lower == "dns" {
            RaceStatus::Dns
        } else if lower.contains("disqualified") || lower == "dsq" {
            RaceStatus::Disqualified
        } else {
            RaceStatus::Dnf
        }
    }

    pub fn is_finish(self) -> bool {
        self == RaceStatus::Finished
    }
}

/// A competitor as listed on the current roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorInfo {
    /// Upstream driver identifier
    pub id: String,
    /// Permanent car number; doubles as a crude experience proxy upstream
    pub number: u32,
    pub team: String,
}

/// One row of a championship standings table (driver or team).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingEntry {
    pub position: u32,
    pub points: f64,
    pub wins: u32,
}

/// A single competitor's classified result within one race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverResult {
    /// Classified finish position; `None` for non-classified entries
    pub position: Option<u32>,
    /// Starting grid slot
    pub grid: Option<u32>,
    pub points: f64,
    pub status: RaceStatus,
    /// Constructor as reported on the result row, when the source carries it
    pub team: Option<String>,
}

/// Full classification of one race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResult {
    pub season: u32,
    pub round: u32,
    pub race_name: String,
    /// Competitor name -> result
    pub results: BTreeMap<String, DriverResult>,
}

/// One competitor's qualifying session outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifyingEntry {
    pub position: u32,
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
}

/// Full qualifying classification of one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifyingResult {
    pub season: u32,
    pub round: u32,
    pub race_name: String,
    pub results: BTreeMap<String, QualifyingEntry>,
}

/// Per-team car performance subscores, each in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarMetrics {
    pub aero_efficiency: f64,
    pub power_unit_reliability: f64,
    pub tire_management: f64,
    pub downforce_level: f64,
    pub car_development: f64,
    pub race_pace: f64,
    pub qualifying_pace: f64,
    pub reliability: f64,
}

impl CarMetrics {
    /// Mean of the eight subscores; the heuristic scorer's car factor.
    pub fn overall(&self) -> f64 {
        (self.aero_efficiency
            + self.power_unit_reliability
            + self.tire_management
            + self.downforce_level
            + self.car_development
            + self.race_pace
            + self.qualifying_pace
            + self.reliability)
            / 8.0
    }

    /// Neutral midfield car, used when a team has no metrics at all.
    pub fn neutral() -> Self {
        CarMetrics {
            aero_efficiency: 0.5,
            power_unit_reliability: 0.5,
            tire_management: 0.5,
            downforce_level: 0.5,
            car_development: 0.5,
            race_pace: 0.5,
            qualifying_pace: 0.5,
            reliability: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Circuit,
    StreetCircuit,
}

/// Static characteristics of a venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub kind: TrackKind,
    /// Lap length in km
    pub length_km: f64,
    pub turns: u32,
    /// How easy passing is at this venue, 0 (parade) to 1 (easy)
    pub overtaking_opportunities: f64,
    /// How strongly conditions reshuffle the order here, 0 to 1
    pub weather_sensitivity: f64,
}

/// Forecast conditions for one venue/date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSample {
    pub temperature_c: f64,
    /// Relative humidity in [0, 1]
    pub humidity: f64,
    pub wind_speed_kph: f64,
    pub rain_probability: f64,
}

/// One (competitor, event) observation, flattened from a `RaceResult`.
/// Immutable once ingested; the feature builder consumes these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub season: u32,
    pub round: u32,
    pub event_name: String,
    pub competitor_id: String,
    pub constructor_id: String,
    pub grid_position: Option<u32>,
    pub finish_position: Option<u32>,
    pub points: f64,
    pub status: RaceStatus,
}

impl RaceResult {
    /// Flatten this race into per-competitor event records, resolving the
    /// constructor through the roster mapping ("Unknown" when absent).
    pub fn to_event_records(&self, teams: &BTreeMap<String, String>) -> Vec<EventRecord> {
        self.results
            .iter()
            .map(|(driver, res)| EventRecord {
                season: self.season,
                round: self.round,
                event_name: self.race_name.clone(),
                competitor_id: driver.clone(),
                constructor_id: res
                    .team
                    .clone()
                    .or_else(|| teams.get(driver).cloned())
                    .unwrap_or_else(|| "Unknown".to_string()),
                grid_position: res.grid,
                finish_position: res.position,
                points: res.points,
                status: res.status,
            })
            .collect()
    }
}
