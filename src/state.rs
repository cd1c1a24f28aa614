use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::format::round_label;

pub type Year = i32;
pub type RoundId = u32;

pub const DEFAULT_LOG_LINES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub round: RoundId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionKind {
    #[default]
    Race,
    Qualifying,
}

impl SessionKind {
    pub fn code(self) -> &'static str {
        match self {
            SessionKind::Race => "R",
            SessionKind::Qualifying => "Q",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "R" => Some(SessionKind::Race),
            "Q" => Some(SessionKind::Qualifying),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionKind::Race => "Race",
            SessionKind::Qualifying => "Quali",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SessionKind::Race => SessionKind::Qualifying,
            SessionKind::Qualifying => SessionKind::Race,
        }
    }
}

/// One competitor's record for a session, keyed by column name.
///
/// Missing keys read as `null`, so views can treat "absent" and "null" the same way.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow {
    fields: Map<String, Value>,
}

impl ResultRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> &Value {
        self.fields.get(key).unwrap_or(&Value::Null)
    }

    pub fn driver(&self) -> Option<&str> {
        self.get("driver").as_str()
    }
}

impl From<Value> for ResultRow {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPick {
    pub driver: String,
    #[serde(default)]
    pub prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub year: Year,
    pub round: RoundId,
    #[serde(default)]
    pub top3: Vec<PredictionPick>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub train_range: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The (year, round, session) triple a results request is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultsKey {
    pub year: Year,
    pub round: RoundId,
    pub session: SessionKind,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub years: Vec<Year>,
    pub rounds: Vec<RoundInfo>,
    pub year: Option<Year>,
    pub round: Option<RoundId>,
    pub session: SessionKind,
    pub rows: Vec<ResultRow>,
    pub prediction: Option<Prediction>,
    pub loading_page: bool,
    pub loading_results: bool,
    pub loading_prediction: bool,
    pub error: String,
    pub results_seq: u64,
    pub logs: VecDeque<String>,
    pub max_logs: usize,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_LINES)
    }

    pub fn with_log_capacity(max_logs: usize) -> Self {
        Self {
            years: Vec::new(),
            rounds: Vec::new(),
            year: None,
            round: None,
            session: SessionKind::Race,
            rows: Vec::new(),
            prediction: None,
            loading_page: false,
            loading_results: false,
            loading_prediction: false,
            error: String::new(),
            results_seq: 0,
            logs: VecDeque::new(),
            max_logs: max_logs.max(1),
        }
    }

    /// True while a page or results load is in flight.
    pub fn busy(&self) -> bool {
        self.loading_page || self.loading_results
    }

    /// Round and session selectors need a full selection; the year selector and refresh only
    /// wait for [`DashboardState::busy`].
    pub fn controls_disabled(&self) -> bool {
        self.busy() || self.year.is_none() || self.round.is_none()
    }

    pub fn current_key(&self) -> Option<ResultsKey> {
        Some(ResultsKey {
            year: self.year?,
            round: self.round?,
            session: self.session,
        })
    }

    pub fn selected_round_name(&self) -> &str {
        let Some(round) = self.round else {
            return "";
        };
        self.rounds
            .iter()
            .find(|r| r.round == round)
            .map(|r| r.name.as_str())
            .unwrap_or("")
    }

    pub fn header_label(&self) -> String {
        let (Some(year), Some(round)) = (self.year, self.round) else {
            return "—".to_string();
        };
        let name = self.selected_round_name();
        if name.is_empty() {
            format!("{year} • {}", round_label(round))
        } else {
            format!("{year} • {} • {name}", round_label(round))
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > self.max_logs {
            self.logs.pop_front();
        }
    }
}

pub fn default_year(years: &[Year]) -> Option<Year> {
    years.iter().copied().max()
}

pub fn default_round(rounds: &[RoundInfo]) -> Option<RoundId> {
    rounds.iter().map(|r| r.round).max()
}

/// Updates reported by the fetch worker, applied in arrival order.
#[derive(Debug, Clone)]
pub enum Delta {
    SetYears {
        years: Vec<Year>,
        selected: Option<Year>,
    },
    SetRounds {
        year: Year,
        rounds: Vec<RoundInfo>,
        selected: Option<RoundId>,
    },
    RoundsFailed {
        year: Year,
        error: String,
    },
    ResultsStarted {
        seq: u64,
        key: ResultsKey,
    },
    SetResults {
        seq: u64,
        key: ResultsKey,
        rows: Vec<ResultRow>,
    },
    ResultsFailed {
        seq: u64,
        key: ResultsKey,
        error: String,
    },
    BootstrapFailed(String),
    PageSettled,
    PredictionStarted,
    SetPrediction(Option<Prediction>),
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    Bootstrap { seq: u64 },
    LoadSeason {
        year: Year,
        session: SessionKind,
        seq: u64,
    },
    FetchResults { key: ResultsKey, seq: u64 },
}

pub fn apply_delta(state: &mut DashboardState, delta: Delta) {
    match delta {
        Delta::SetYears { years, selected } => {
            state.years = years;
            state.year = selected;
        }
        Delta::SetRounds {
            year,
            rounds,
            selected,
        } => {
            if state.year != Some(year) {
                state.push_log(format!("[INFO] Dropped rounds for {year}; season changed"));
                return;
            }
            state.rounds = rounds;
            state.round = selected;
            if selected.is_none() {
                // Nothing to fetch results for, so a pending load will never finish on its own.
                state.loading_results = false;
            }
        }
        Delta::RoundsFailed { year, error } => {
            if state.year != Some(year) {
                return;
            }
            state.rounds.clear();
            state.round = None;
            state.rows.clear();
            state.loading_results = false;
            state.push_log(format!("[WARN] Rounds fetch failed: {error}"));
            state.error = error;
        }
        Delta::ResultsStarted { seq, .. } => {
            if seq != state.results_seq {
                return;
            }
            state.loading_results = true;
            state.error.clear();
            state.rows.clear();
        }
        Delta::SetResults { seq, key, rows } => {
            if seq != state.results_seq {
                state.push_log(format!("[INFO] Dropped stale results for {}", key_label(key)));
                return;
            }
            state.rows = rows;
            state.error.clear();
            state.loading_results = false;
        }
        Delta::ResultsFailed { seq, key, error } => {
            if seq != state.results_seq {
                state.push_log(format!("[INFO] Dropped stale failure for {}", key_label(key)));
                return;
            }
            state.rows.clear();
            state.loading_results = false;
            state.push_log(format!("[WARN] Results fetch failed: {error}"));
            state.error = error;
        }
        Delta::BootstrapFailed(error) => {
            state.push_log(format!("[WARN] Startup failed: {error}"));
            state.error = error;
        }
        Delta::PageSettled => {
            state.loading_page = false;
        }
        Delta::PredictionStarted => {
            state.loading_prediction = true;
        }
        Delta::SetPrediction(prediction) => {
            state.prediction = prediction;
            state.loading_prediction = false;
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn key_label(key: ResultsKey) -> String {
    format!("{} {} {}", key.year, round_label(key.round), key.session.code())
}
