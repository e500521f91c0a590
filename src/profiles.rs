//! Competitor and team profiles, rebuilt from the catalog on each refresh.
//!
//! Recency windows are fixed-capacity ring buffers: pushing beyond capacity
//! evicts the oldest sample, so "last 5" holds by construction.

use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::data::records::EventRecord;
use crate::data::{seeds, DataCatalog};
use crate::features::{MAX_FIELD_SIZE, NON_FINISH_SENTINEL};

/// How many recent results a profile retains.
pub const RECENT_CAPACITY: usize = 5;

/// Fixed-capacity window over recent samples, oldest evicted on insert.
#[derive(Debug, Clone, Default)]
pub struct RecentWindow {
    buf: VecDeque<f64>,
    capacity: usize,
}

impl RecentWindow {
    pub fn new(capacity: usize) -> Self {
        RecentWindow {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn from_samples(capacity: usize, samples: &[f64]) -> Self {
        let mut window = Self::new(capacity);
        for &s in samples {
            window.push(s);
        }
        window
    }

    pub fn push(&mut self, value: f64) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Samples oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.buf.iter().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.iter().sum::<f64>() / self.buf.len() as f64)
    }

    /// Mean of the most recent `n` samples (fewer if the window is shorter).
    pub fn tail_mean(&self, n: usize) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        let take = n.min(self.buf.len());
        let sum: f64 = self.buf.iter().rev().take(take).sum();
        Some(sum / take as f64)
    }

    /// Linearly recency-weighted mean: the newest sample carries the highest
    /// weight, the oldest the lowest.
    pub fn recency_weighted_mean(&self) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (i, v) in self.buf.iter().enumerate() {
            let w = (i + 1) as f64;
            weighted += w * v;
            total += w;
        }
        Some(weighted / total)
    }
}

/// Per-competitor state feeding the heuristic scorer.
#[derive(Debug, Clone)]
pub struct DriverProfile {
    pub name: String,
    pub team: String,
    pub experience_years: u32,
    pub career_wins: u32,
    /// Recent finish positions (1 = win; non-finishes hold the sentinel)
    pub recent_results: RecentWindow,
    pub current_points: f64,
    pub standing_position: Option<u32>,
}

/// Per-team state feeding the heuristic scorer.
#[derive(Debug, Clone)]
pub struct TeamProfile {
    pub name: String,
    pub championships: u32,
    pub career_wins: u32,
    /// Recent per-race performance scores in [0, 1]
    pub recent_performance: RecentWindow,
    pub current_points: f64,
}

/// Build driver profiles from the catalog, enriching roster entries with the
/// static career table and standings.
pub fn build_driver_profiles(catalog: &DataCatalog) -> BTreeMap<String, DriverProfile> {
    let careers = seeds::driver_careers();
    let teams = catalog.team_mapping();
    let records = catalog.event_records();

    let mut profiles: BTreeMap<String, DriverProfile> = catalog
        .competitors
        .keys()
        .map(|name| {
            let standing = catalog.driver_standings.get(name);
            let (experience, career_wins) = careers.get(name).copied().unwrap_or_else(|| {
                // Unknown driver: middling experience, season wins as career floor
                (5, standing.map(|s| s.wins).unwrap_or(0))
            });
            (
                name.clone(),
                DriverProfile {
                    name: name.clone(),
                    team: teams
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| "Unknown".to_string()),
                    experience_years: experience,
                    career_wins,
                    recent_results: RecentWindow::new(RECENT_CAPACITY),
                    current_points: standing.map(|s| s.points).unwrap_or(0.0),
                    standing_position: standing.map(|s| s.position),
                },
            )
        })
        .collect();

    // Replay results oldest-first so eviction leaves the freshest races.
    for record in &records {
        if let Some(profile) = profiles.get_mut(&record.competitor_id) {
            profile.recent_results.push(effective_position(record));
        }
    }

    // Drivers with no history this season fall back to a back-of-grid window,
    // matching the seed shape.
    for profile in profiles.values_mut() {
        if profile.recent_results.is_empty() {
            profile.recent_results =
                RecentWindow::from_samples(RECENT_CAPACITY, &[MAX_FIELD_SIZE; RECENT_CAPACITY]);
        }
    }

    debug!("Built {} driver profiles", profiles.len());
    profiles
}

/// Build team profiles: championship history from the career table, recent
/// per-race performance from the season's results.
pub fn build_team_profiles(catalog: &DataCatalog) -> BTreeMap<String, TeamProfile> {
    let careers = seeds::team_careers();
    let teams = catalog.team_mapping();

    let team_names: std::collections::BTreeSet<String> = teams
        .values()
        .cloned()
        .chain(catalog.team_standings.keys().cloned())
        .collect();

    let mut profiles: BTreeMap<String, TeamProfile> = team_names
        .into_iter()
        .map(|name| {
            let standing = catalog.team_standings.get(&name);
            let (championships, career_wins, seed_form) = careers
                .get(&name)
                .cloned()
                .unwrap_or_else(|| (0, standing.map(|s| s.wins).unwrap_or(0), vec![0.5, 0.5]));
            (
                name.clone(),
                TeamProfile {
                    name,
                    championships,
                    career_wins,
                    recent_performance: RecentWindow::from_samples(RECENT_CAPACITY, &seed_form),
                    current_points: standing.map(|s| s.points).unwrap_or(0.0),
                },
            )
        })
        .collect();

    // Live races override the seeded form window: one performance score per
    // race, 1 = the team's drivers averaged a win, 0 = full back of the field.
    let mut races: Vec<&crate::data::records::RaceResult> = catalog.races.iter().collect();
    races.sort_by_key(|r| (r.season, r.round));
    let mut live_form: BTreeMap<String, RecentWindow> = BTreeMap::new();
    for race in races {
        let mut positions: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for (driver, result) in &race.results {
            let team = result
                .team
                .as_deref()
                .or_else(|| teams.get(driver).map(String::as_str))
                .unwrap_or("Unknown");
            let pos = result
                .position
                .map(f64::from)
                .unwrap_or(NON_FINISH_SENTINEL);
            positions.entry(team).or_default().push(pos);
        }
        for (team, pos) in positions {
            let mean = pos.iter().sum::<f64>() / pos.len() as f64;
            let score = (1.0 - mean / MAX_FIELD_SIZE).clamp(0.0, 1.0);
            live_form
                .entry(team.to_string())
                .or_insert_with(|| RecentWindow::new(RECENT_CAPACITY))
                .push(score);
        }
    }
    for (team, window) in live_form {
        if let Some(profile) = profiles.get_mut(&team) {
            profile.recent_performance = window;
        }
    }

    debug!("Built {} team profiles", profiles.len());
    profiles
}

/// Position used for recency windows: classified position, or the sentinel
/// one slot worse than a full field for DNF/DNS/DSQ.
fn effective_position(record: &EventRecord) -> f64 {
    match record.finish_position {
        Some(p) if record.status.is_finish() => f64::from(p),
        _ => NON_FINISH_SENTINEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn window_evicts_oldest_on_insert() {
        let mut w = RecentWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        let items: Vec<f64> = w.iter().collect();
        assert_eq!(items, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn tail_mean_uses_most_recent_samples() {
        let w = RecentWindow::from_samples(5, &[20.0, 20.0, 1.0, 2.0, 3.0]);
        assert_relative_eq!(w.tail_mean(3).unwrap(), 2.0, epsilon = 1e-12);
        // Shorter history than requested: average what exists.
        let short = RecentWindow::from_samples(5, &[4.0]);
        assert_relative_eq!(short.tail_mean(3).unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn recency_weighted_mean_favours_newest() {
        let w = RecentWindow::from_samples(5, &[10.0, 1.0]);
        // Weights 1 and 2: (10 + 2) / 3 = 4.0
        assert_relative_eq!(w.recency_weighted_mean().unwrap(), 4.0, epsilon = 1e-12);
    }

    #[tokio::test]
    async fn profiles_built_from_seed_catalog() {
        struct Empty;
        #[async_trait::async_trait]
        impl crate::data::DataProvider for Empty {
            fn name(&self) -> &str {
                "Empty"
            }
            async fn competitors(
                &self,
            ) -> anyhow::Result<BTreeMap<String, crate::data::records::CompetitorInfo>>
            {
                Ok(BTreeMap::new())
            }
            async fn driver_standings(
                &self,
            ) -> anyhow::Result<BTreeMap<String, crate::data::records::StandingEntry>>
            {
                Ok(BTreeMap::new())
            }
            async fn team_standings(
                &self,
            ) -> anyhow::Result<BTreeMap<String, crate::data::records::StandingEntry>>
            {
                Ok(BTreeMap::new())
            }
            async fn race_results(
                &self,
                _season: u32,
            ) -> anyhow::Result<Vec<crate::data::records::RaceResult>> {
                Ok(vec![])
            }
            async fn qualifying(
                &self,
                _season: u32,
            ) -> anyhow::Result<Vec<crate::data::records::QualifyingResult>> {
                Ok(vec![])
            }
            async fn car_metrics(
                &self,
            ) -> anyhow::Result<BTreeMap<String, crate::data::records::CarMetrics>> {
                Ok(BTreeMap::new())
            }
            async fn tracks(
                &self,
            ) -> anyhow::Result<BTreeMap<String, crate::data::records::TrackInfo>> {
                Ok(BTreeMap::new())
            }
            async fn weather(
                &self,
                _track: &str,
                _date: chrono::NaiveDate,
            ) -> anyhow::Result<crate::data::records::WeatherSample> {
                anyhow::bail!("none")
            }
        }

        let catalog = DataCatalog::load(&Empty, &[2025]).await;
        let drivers = build_driver_profiles(&catalog);
        let teams = build_team_profiles(&catalog);

        let norris = drivers.get("Lando Norris").unwrap();
        assert_eq!(norris.team, "McLaren");
        // Two seeded races, both wins.
        assert_relative_eq!(norris.recent_results.mean().unwrap(), 1.0, epsilon = 1e-12);

        let mclaren = teams.get("McLaren").unwrap();
        assert_eq!(mclaren.championships, 8);
        // Live form replaces the seeded window: P1 + P2 both races -> 1 - 1.5/20
        assert_relative_eq!(
            mclaren.recent_performance.mean().unwrap(),
            1.0 - 1.5 / 20.0,
            epsilon = 1e-12
        );
    }
}
