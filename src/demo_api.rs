use chrono::{Datelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};

use crate::api::{ApiError, F1Api};
use crate::state::{Prediction, PredictionPick, ResultRow, RoundId, RoundInfo, SessionKind, Year};

const FIRST_DEMO_YEAR: Year = 2019;

const GRAND_PRIX: [&str; 12] = [
    "Bahrain Grand Prix",
    "Saudi Arabian Grand Prix",
    "Australian Grand Prix",
    "Japanese Grand Prix",
    "Miami Grand Prix",
    "Monaco Grand Prix",
    "Spanish Grand Prix",
    "British Grand Prix",
    "Belgian Grand Prix",
    "Italian Grand Prix",
    "Singapore Grand Prix",
    "Abu Dhabi Grand Prix",
];

const GRID: [(&str, &str); 10] = [
    ("VER", "Red Bull Racing"),
    ("PER", "Red Bull Racing"),
    ("LEC", "Ferrari"),
    ("SAI", "Ferrari"),
    ("HAM", "Mercedes"),
    ("RUS", "Mercedes"),
    ("NOR", "McLaren"),
    ("PIA", "McLaren"),
    ("ALO", "Aston Martin"),
    ("STR", "Aston Martin"),
];

const COMPOUNDS: [&str; 3] = ["SOFT", "MEDIUM", "HARD"];

/// In-process backend with generated but stable data, for running without a server.
#[derive(Debug, Clone)]
pub struct DemoApi {
    seed: u64,
    last_year: Year,
}

impl DemoApi {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed: seed.unwrap_or(2026),
            last_year: Utc::now().year().max(FIRST_DEMO_YEAR),
        }
    }

    pub fn with_last_year(seed: u64, last_year: Year) -> Self {
        Self {
            seed,
            last_year: last_year.max(FIRST_DEMO_YEAR),
        }
    }

    fn rng_for(&self, year: Year, round: RoundId, salt: u64) -> StdRng {
        let mixed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add((year as u64) << 16)
            .wrapping_add(u64::from(round) << 4)
            .wrapping_add(salt);
        StdRng::seed_from_u64(mixed)
    }

    fn known(&self, year: Year, round: RoundId) -> bool {
        (FIRST_DEMO_YEAR..=self.last_year).contains(&year)
            && round >= 1
            && (round as usize) <= GRAND_PRIX.len()
    }

    fn finishing_order(&self, year: Year, round: RoundId) -> Vec<(&'static str, &'static str)> {
        let mut order = GRID.to_vec();
        order.shuffle(&mut self.rng_for(year, round, 1));
        order
    }
}

impl F1Api for DemoApi {
    fn years(&self) -> Result<Vec<Year>, ApiError> {
        Ok((FIRST_DEMO_YEAR..=self.last_year).collect())
    }

    fn rounds(&self, year: Year) -> Result<Vec<RoundInfo>, ApiError> {
        if !(FIRST_DEMO_YEAR..=self.last_year).contains(&year) {
            return Err(ApiError::Http {
                status: 400,
                message: Some("unknown season".to_string()),
                path: format!("/api/rounds?year={year}"),
            });
        }
        Ok(GRAND_PRIX
            .iter()
            .enumerate()
            .map(|(idx, name)| RoundInfo {
                round: idx as RoundId + 1,
                name: name.to_string(),
            })
            .collect())
    }

    fn session(
        &self,
        year: Year,
        round: RoundId,
        session: SessionKind,
    ) -> Result<Vec<ResultRow>, ApiError> {
        if !self.known(year, round) {
            return Ok(Vec::new());
        }
        let order = self.finishing_order(year, round);
        let salt = match session {
            SessionKind::Race => 2,
            SessionKind::Qualifying => 3,
        };
        let mut rng = self.rng_for(year, round, salt);
        let base_lap = rng.gen_range(78.0..96.0);

        let rows = order
            .iter()
            .enumerate()
            .map(|(idx, (driver, team))| {
                let mut fields = Map::new();
                fields.insert("position".to_string(), json!(idx + 1));
                fields.insert("driver".to_string(), json!(driver));
                fields.insert("team".to_string(), json!(team));
                let best = base_lap + idx as f64 * 0.11 + rng.gen_range(0.0..0.25);
                fields.insert("best_lap".to_string(), json!(round_millis(best)));
                match session {
                    SessionKind::Race => {
                        let retired = rng.gen_bool(0.06);
                        let laps = if retired { rng.gen_range(10..50) } else { 57 };
                        fields.insert("laps".to_string(), json!(laps));
                        let compound = COMPOUNDS.choose(&mut rng).copied().unwrap_or("MEDIUM");
                        fields.insert("main_compound".to_string(), json!(compound));
                        let status = if retired { "Retired" } else { "Finished" };
                        fields.insert("status".to_string(), json!(status));
                    }
                    SessionKind::Qualifying => {
                        fields.insert("q1".to_string(), json!(round_millis(best + 0.8)));
                        let q2 = (idx < 15).then(|| round_millis(best + 0.4));
                        let q3 = (idx < 10).then(|| round_millis(best));
                        fields.insert("q2".to_string(), q2.map_or(Value::Null, |v| json!(v)));
                        fields.insert("q3".to_string(), q3.map_or(Value::Null, |v| json!(v)));
                        fields.insert("status".to_string(), Value::Null);
                    }
                }
                ResultRow::new(fields)
            })
            .collect();
        Ok(rows)
    }

    fn fetch_latest_prediction(&self) -> Result<Prediction, ApiError> {
        let round = GRAND_PRIX.len() as RoundId;
        let order = self.finishing_order(self.last_year, round);
        let mut rng = self.rng_for(self.last_year, round, 9);
        let mut remaining = 1.0_f64;
        let top3 = order
            .iter()
            .take(3)
            .map(|(driver, _)| {
                let prob = (remaining * rng.gen_range(0.35..0.6) * 1000.0).round() / 1000.0;
                remaining -= prob;
                PredictionPick {
                    driver: driver.to_string(),
                    prob,
                }
            })
            .collect::<Vec<_>>();
        Ok(Prediction {
            year: self.last_year,
            round,
            top3,
            model_version: Some("demo-0.1".to_string()),
            train_range: Some(format!("{FIRST_DEMO_YEAR}-{}", self.last_year - 1)),
            created_at: Some(Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
        })
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_data_is_stable_for_a_seed() {
        let api = DemoApi::with_last_year(7, 2024);
        let a = api.session(2024, 3, SessionKind::Race).expect("rows");
        let b = api.session(2024, 3, SessionKind::Race).expect("rows");
        assert_eq!(a, b);
        assert_eq!(a.len(), GRID.len());
        assert_eq!(a[0].get("position"), &json!(1));
    }

    #[test]
    fn qualifying_rows_carry_segment_times() {
        let api = DemoApi::with_last_year(7, 2024);
        let rows = api.session(2024, 1, SessionKind::Qualifying).expect("rows");
        assert!(rows.iter().all(|r| !r.get("q1").is_null()));
        assert!(rows.iter().all(|r| r.get("laps").is_null()));
    }

    #[test]
    fn unknown_season_is_an_http_error() {
        let api = DemoApi::with_last_year(7, 2024);
        let err = api.rounds(1990).unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(api.session(2024, 99, SessionKind::Race).expect("ok").is_empty());
    }

    #[test]
    fn prediction_targets_last_round_of_latest_season() {
        let api = DemoApi::with_last_year(7, 2024);
        let prediction = api.latest_prediction().into_prediction().expect("prediction");
        assert_eq!(prediction.year, 2024);
        assert_eq!(prediction.round, GRAND_PRIX.len() as RoundId);
        assert_eq!(prediction.top3.len(), 3);
        let total: f64 = prediction.top3.iter().map(|p| p.prob).sum();
        assert!(total <= 1.0);
    }
}
