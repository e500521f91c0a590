//! Deterministic multi-factor scorer: always available, no training step.
//!
//! Each competitor gets a weighted blend of five factors in [0, 1], a weather
//! multiplier, and a bounded noise term from an injectable source. With a
//! silent noise source the scorer is a pure function of its inputs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

use crate::data::records::{CarMetrics, TrackInfo, WeatherSample};
use crate::features::MAX_FIELD_SIZE;
use crate::profiles::{DriverProfile, TeamProfile};

// Factor weights, summing to 1.
const W_POSITION: f64 = 0.45;
const W_CAR: f64 = 0.25;
const W_DRIVER_FORM: f64 = 0.15;
const W_TRACK_FAMILIARITY: f64 = 0.05;
const W_TEAM_FORM: f64 = 0.05;

/// Races that count toward the position factor.
const POSITION_LOOKBACK: usize = 3;

/// Wet-weather multipliers, applied when rain probability exceeds 0.5.
const WET_BOOST: f64 = 1.1;
const WET_PENALTY: f64 = 0.9;
const RAIN_THRESHOLD: f64 = 0.5;

/// Drivers with a known edge in the wet, used unless overridden.
pub const DEFAULT_WET_SPECIALISTS: [&str; 3] =
    ["Lewis Hamilton", "Max Verstappen", "Fernando Alonso"];

/// Source of the per-competitor noise term. Injectable so scoring can be
/// fully deterministic under test.
pub trait NoiseSource {
    fn sample(&mut self) -> f64;
}

/// Gaussian noise (Box-Muller), clamped to three standard deviations so a
/// single unlucky draw cannot dominate the blended score.
pub struct GaussianNoise {
    rng: StdRng,
    sigma: f64,
}

impl GaussianNoise {
    pub fn new(seed: u64, sigma: f64) -> Self {
        GaussianNoise {
            rng: StdRng::seed_from_u64(seed),
            sigma,
        }
    }
}

impl NoiseSource for GaussianNoise {
    fn sample(&mut self) -> f64 {
        // Box-Muller transform over two uniform draws.
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        (z * self.sigma).clamp(-3.0 * self.sigma, 3.0 * self.sigma)
    }
}

/// No noise at all; scoring becomes a pure function.
pub struct SilentNoise;

impl NoiseSource for SilentNoise {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// One competitor's blended score with its factor breakdown.
#[derive(Debug, Clone)]
pub struct HeuristicScore {
    pub competitor: String,
    pub score: f64,
    pub position_factor: f64,
    pub car_factor: f64,
    pub driver_form: f64,
    pub track_familiarity: f64,
    pub team_form: f64,
    pub weather_factor: f64,
}

pub struct HeuristicScorer {
    wet_specialists: Vec<String>,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        HeuristicScorer {
            wet_specialists: DEFAULT_WET_SPECIALISTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_wet_specialists(names: Vec<String>) -> Self {
        HeuristicScorer {
            wet_specialists: names,
        }
    }

    /// Score every driver profile against one venue and forecast.
    ///
    /// Returned scores are in [0, 1]. Iteration order follows the profile
    /// map, so ties later rank in that same order.
    pub fn score_field(
        &self,
        drivers: &BTreeMap<String, DriverProfile>,
        teams: &BTreeMap<String, TeamProfile>,
        cars: &BTreeMap<String, CarMetrics>,
        track: &TrackInfo,
        weather: &WeatherSample,
        noise: &mut dyn NoiseSource,
    ) -> Vec<HeuristicScore> {
        drivers
            .values()
            .map(|driver| self.score_one(driver, teams, cars, track, weather, noise))
            .collect()
    }

    fn score_one(
        &self,
        driver: &DriverProfile,
        teams: &BTreeMap<String, TeamProfile>,
        cars: &BTreeMap<String, CarMetrics>,
        track: &TrackInfo,
        weather: &WeatherSample,
        noise: &mut dyn NoiseSource,
    ) -> HeuristicScore {
        let position_factor = position_factor(driver);
        let car_factor = cars
            .get(&driver.team)
            .map(CarMetrics::overall)
            .unwrap_or_else(|| CarMetrics::neutral().overall())
            .clamp(0.0, 1.0);
        let driver_form = driver_form(driver, noise);
        let track_familiarity = track_familiarity(driver, track, noise);
        let team_form = team_form(teams.get(&driver.team));
        let weather_factor = self.weather_factor(&driver.name, weather);

        let blended = W_POSITION * position_factor
            + W_CAR * car_factor
            + W_DRIVER_FORM * driver_form
            + W_TRACK_FAMILIARITY * track_familiarity
            + W_TEAM_FORM * team_form;
        let score = (blended * weather_factor + noise.sample()).clamp(0.0, 1.0);

        debug!(
            "{}: pos={:.3} car={:.3} form={:.3} track={:.3} team={:.3} wx={:.2} -> {:.3}",
            driver.name,
            position_factor,
            car_factor,
            driver_form,
            track_familiarity,
            team_form,
            weather_factor,
            score
        );

        HeuristicScore {
            competitor: driver.name.clone(),
            score,
            position_factor,
            car_factor,
            driver_form,
            track_familiarity,
            team_form,
            weather_factor,
        }
    }

    fn weather_factor(&self, driver: &str, weather: &WeatherSample) -> f64 {
        if weather.rain_probability <= RAIN_THRESHOLD {
            return 1.0;
        }
        if self.wet_specialists.iter().any(|s| s == driver) {
            WET_BOOST
        } else {
            WET_PENALTY
        }
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rank scores descending. The sort is stable, so equal scores keep their
/// input order instead of flapping between runs.
pub fn rank(mut scores: Vec<HeuristicScore>) -> Vec<HeuristicScore> {
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scores
}

/// Recent average finish mapped onto [0, 1]: P1 average scores near 1, a
/// back-of-field average near 0.
fn position_factor(driver: &DriverProfile) -> f64 {
    let avg = driver
        .recent_results
        .tail_mean(POSITION_LOOKBACK)
        .unwrap_or(MAX_FIELD_SIZE);
    (1.0 - avg / MAX_FIELD_SIZE).clamp(0.0, 1.0)
}

/// Recent form blended with career win rate, 70/30, plus the noise term.
/// Newer results weigh more in the form component.
fn driver_form(driver: &DriverProfile, noise: &mut dyn NoiseSource) -> f64 {
    let win_rate = if driver.experience_years == 0 {
        0.0
    } else {
        driver.career_wins as f64 / (driver.experience_years as f64 * MAX_FIELD_SIZE)
    };
    let recent_form = driver
        .recent_results
        .recency_weighted_mean()
        .map(|m| 1.0 - m / MAX_FIELD_SIZE)
        .unwrap_or(0.5);
    (0.7 * recent_form.clamp(0.0, 1.0) + 0.3 * win_rate.clamp(0.0, 1.0) + noise.sample())
        .clamp(0.0, 1.0)
}

/// Tighter tracks punish inexperience: familiarity falls with turn count and
/// rises with career length.
fn track_familiarity(driver: &DriverProfile, track: &TrackInfo, noise: &mut dyn NoiseSource) -> f64 {
    let difficulty = f64::from(track.turns) / MAX_FIELD_SIZE;
    let experience = (f64::from(driver.experience_years) / MAX_FIELD_SIZE).min(1.0);
    (1.0 - difficulty * (1.0 - experience) + noise.sample()).clamp(0.0, 1.0)
}

/// Recent team performance blended with its historical win rate, 70/30.
/// No noise term here; only the driver factors and the final blend carry
/// one. A team without a profile scores a neutral midfield value.
fn team_form(team: Option<&TeamProfile>) -> f64 {
    let Some(team) = team else {
        return 0.5;
    };
    let races = if team.championships > 0 {
        f64::from(team.championships) * MAX_FIELD_SIZE
    } else {
        MAX_FIELD_SIZE
    };
    let win_rate = (f64::from(team.career_wins) / races).clamp(0.0, 1.0);
    let recent = team
        .recent_performance
        .recency_weighted_mean()
        .unwrap_or(0.5);
    (0.7 * recent.clamp(0.0, 1.0) + 0.3 * win_rate).clamp(0.0, 1.0)
}
