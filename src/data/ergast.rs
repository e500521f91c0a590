use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::debug;

use super::provider::DataProvider;
use super::records::{
    CarMetrics, CompetitorInfo, DriverResult, QualifyingEntry, QualifyingResult, RaceResult,
    RaceStatus, StandingEntry, TrackInfo, TrackKind, WeatherSample,
};

/// Data provider backed by the Ergast-compatible motorsport API.
/// Docs: <https://ergast.com/mrd/>
pub struct ErgastApi {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
}

impl ErgastApi {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ErgastApi {
            http,
            base_url: base_url
                .unwrap_or("https://api.jolpi.ca/ergast/f1")
                .to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Fetching {}", url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Ergast request failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("Ergast error: {}", resp.status());
        }
        resp.json().await.context("Failed to parse Ergast response")
    }
}

fn full_name(driver: &serde_json::Value) -> Option<String> {
    let given = driver["givenName"].as_str()?;
    let family = driver["familyName"].as_str()?;
    Some(format!("{given} {family}"))
}

fn as_u32(v: &serde_json::Value) -> Option<u32> {
    v.as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| v.as_u64().map(|n| n as u32))
}

fn as_f64(v: &serde_json::Value) -> Option<f64> {
    v.as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| v.as_f64())
}

fn parse_standings(raw: &serde_json::Value, key: &str) -> BTreeMap<String, StandingEntry> {
    let lists = &raw["MRData"]["StandingsTable"]["StandingsLists"];
    let rows = match lists[0][key].as_array() {
        Some(a) => a,
        None => return BTreeMap::new(),
    };
    rows.iter()
        .filter_map(|row| {
            let name = if key == "DriverStandings" {
                full_name(&row["Driver"])?
            } else {
                row["Constructor"]["name"].as_str()?.to_string()
            };
            Some((
                name,
                StandingEntry {
                    position: as_u32(&row["position"])?,
                    points: as_f64(&row["points"]).unwrap_or(0.0),
                    wins: as_u32(&row["wins"]).unwrap_or(0),
                },
            ))
        })
        .collect()
}

fn parse_races(raw: &serde_json::Value, season: u32) -> Vec<RaceResult> {
    let races = match raw["MRData"]["RaceTable"]["Races"].as_array() {
        Some(a) => a,
        None => return vec![],
    };
    races
        .iter()
        .filter_map(|race| {
            let race_name = race["raceName"].as_str()?.to_string();
            let round = as_u32(&race["round"])?;
            let rows = race["Results"].as_array()?;
            let results = rows
                .iter()
                .filter_map(|row| {
                    let driver = full_name(&row["Driver"])?;
                    Some((
                        driver,
                        DriverResult {
                            position: as_u32(&row["position"]),
                            grid: as_u32(&row["grid"]),
                            points: as_f64(&row["points"]).unwrap_or(0.0),
                            status: RaceStatus::from_str(
                                row["status"].as_str().unwrap_or("Finished"),
                            ),
                            team: row["Constructor"]["name"].as_str().map(String::from),
                        },
                    ))
                })
                .collect();
            Some(RaceResult {
                season,
                round,
                race_name,
                results,
            })
        })
        .collect()
}

fn parse_qualifying(raw: &serde_json::Value, season: u32) -> Vec<QualifyingResult> {
    let races = match raw["MRData"]["RaceTable"]["Races"].as_array() {
        Some(a) => a,
        None => return vec![],
    };
    races
        .iter()
        .filter_map(|race| {
            let race_name = race["raceName"].as_str()?.to_string();
            let round = as_u32(&race["round"])?;
            let rows = race["QualifyingResults"].as_array()?;
            let results = rows
                .iter()
                .filter_map(|row| {
                    let driver = full_name(&row["Driver"])?;
                    Some((
                        driver,
                        QualifyingEntry {
                            position: as_u32(&row["position"])?,
                            q1: row["Q1"].as_str().map(String::from),
                            q2: row["Q2"].as_str().map(String::from),
                            q3: row["Q3"].as_str().map(String::from),
                        },
                    ))
                })
                .collect();
            Some(QualifyingResult {
                season,
                round,
                race_name,
                results,
            })
        })
        .collect()
}

#[async_trait]
impl DataProvider for ErgastApi {
    fn name(&self) -> &str {
        "Ergast"
    }

    async fn competitors(&self) -> Result<BTreeMap<String, CompetitorInfo>> {
        let raw = self.get_json("current/drivers.json").await?;
        let drivers = match raw["MRData"]["DriverTable"]["Drivers"].as_array() {
            Some(a) => a,
            None => return Ok(BTreeMap::new()),
        };
        Ok(drivers
            .iter()
            .filter_map(|d| {
                let name = full_name(d)?;
                Some((
                    name,
                    CompetitorInfo {
                        id: d["driverId"].as_str().unwrap_or_default().to_string(),
                        number: as_u32(&d["permanentNumber"]).unwrap_or(0),
                        // Roster rows carry no team; the results table fills it in
                        team: d["team"].as_str().unwrap_or("Unknown").to_string(),
                    },
                ))
            })
            .collect())
    }

    async fn driver_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
        let raw = self.get_json("current/driverStandings.json").await?;
        Ok(parse_standings(&raw, "DriverStandings"))
    }

    async fn team_standings(&self) -> Result<BTreeMap<String, StandingEntry>> {
        let raw = self.get_json("current/constructorStandings.json").await?;
        Ok(parse_standings(&raw, "ConstructorStandings"))
    }

    async fn race_results(&self, season: u32) -> Result<Vec<RaceResult>> {
        let raw = self.get_json(&format!("{season}/results.json")).await?;
        Ok(parse_races(&raw, season))
    }

    async fn qualifying(&self, season: u32) -> Result<Vec<QualifyingResult>> {
        let raw = self.get_json(&format!("{season}/qualifying.json")).await?;
        Ok(parse_qualifying(&raw, season))
    }

    async fn car_metrics(&self) -> Result<BTreeMap<String, CarMetrics>> {
        // No public car-performance feed exists; an empty table routes the
        // catalog to the seed data.
        Ok(BTreeMap::new())
    }

    async fn tracks(&self) -> Result<BTreeMap<String, TrackInfo>> {
        let raw = self.get_json("current.json").await?;
        let races = match raw["MRData"]["RaceTable"]["Races"].as_array() {
            Some(a) => a,
            None => return Ok(BTreeMap::new()),
        };
        Ok(races
            .iter()
            .filter_map(|race| {
                let name = race["Circuit"]["circuitName"]
                    .as_str()
                    .or_else(|| race["raceName"].as_str())?
                    .to_string();
                // The schedule feed has no layout details; defaults describe
                // a typical permanent circuit.
                Some((
                    name,
                    TrackInfo {
                        kind: TrackKind::Circuit,
                        length_km: 5.0,
                        turns: 15,
                        overtaking_opportunities: 0.5,
                        weather_sensitivity: 0.5,
                    },
                ))
            })
            .collect())
    }

    async fn weather(&self, track: &str, _date: NaiveDate) -> Result<WeatherSample> {
        anyhow::bail!("no weather backend configured for {track}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_results_fills_defaults_and_team() {
        let raw = json!({
            "MRData": { "RaceTable": { "Races": [{
                "raceName": "Australian Grand Prix",
                "round": "1",
                "Results": [
                    {
                        "position": "1",
                        "grid": "4",
                        "points": "25",
                        "status": "Finished",
                        "Driver": { "givenName": "Lando", "familyName": "Norris" },
                        "Constructor": { "name": "McLaren" }
                    },
                    {
                        "position": "18",
                        "points": "0",
                        "status": "Engine",
                        "Driver": { "givenName": "Kevin", "familyName": "Magnussen" },
                        "Constructor": { "name": "Haas F1 Team" }
                    }
                ]
            }]}}
        });
        let races = parse_races(&raw, 2025);
        assert_eq!(races.len(), 1);
        let norris = races[0].results.get("Lando Norris").unwrap();
        assert_eq!(norris.grid, Some(4));
        assert_eq!(norris.team.as_deref(), Some("McLaren"));
        let magnussen = races[0].results.get("Kevin Magnussen").unwrap();
        assert_eq!(magnussen.grid, None);
        assert_eq!(magnussen.status, RaceStatus::Dnf);
    }

    #[test]
    fn parse_standings_handles_missing_list() {
        let raw = json!({ "MRData": { "StandingsTable": { "StandingsLists": [] } } });
        assert!(parse_standings(&raw, "DriverStandings").is_empty());
    }

    #[test]
    fn parse_qualifying_reads_session_times() {
        let raw = json!({
            "MRData": { "RaceTable": { "Races": [{
                "raceName": "Monaco Grand Prix",
                "round": "6",
                "QualifyingResults": [{
                    "position": "1",
                    "Q1": "1:12.345",
                    "Q3": "1:10.270",
                    "Driver": { "givenName": "Charles", "familyName": "Leclerc" }
                }]
            }]}}
        });
        let quali = parse_qualifying(&raw, 2025);
        let leclerc = quali[0].results.get("Charles Leclerc").unwrap();
        assert_eq!(leclerc.position, 1);
        assert_eq!(leclerc.q2, None);
        assert_eq!(leclerc.q3.as_deref(), Some("1:10.270"));
    }
}
