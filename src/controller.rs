use std::sync::mpsc::Sender;

use crate::state::{
    DashboardState, Delta, ProviderCommand, ResultsKey, RoundId, SessionKind, Year, apply_delta,
};

/// Owns the dashboard selection state and turns user commands into fetch requests.
///
/// Fetches run elsewhere (see `provider`); their outcomes come back through [`Controller::apply`].
pub struct Controller {
    state: DashboardState,
    cmd_tx: Option<Sender<ProviderCommand>>,
}

impl Controller {
    pub fn new(cmd_tx: Option<Sender<ProviderCommand>>) -> Self {
        Self::with_state(DashboardState::new(), cmd_tx)
    }

    pub fn with_state(state: DashboardState, cmd_tx: Option<Sender<ProviderCommand>>) -> Self {
        Self { state, cmd_tx }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn controls_disabled(&self) -> bool {
        self.state.controls_disabled()
    }

    pub fn apply(&mut self, delta: Delta) {
        apply_delta(&mut self.state, delta);
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.state.push_log(msg);
    }

    pub fn bootstrap(&mut self) {
        self.state.loading_page = true;
        self.state.error.clear();
        self.state.session = SessionKind::Race;
        let seq = self.next_seq();
        if !self.dispatch(ProviderCommand::Bootstrap { seq }) {
            self.state.loading_page = false;
            self.state.error = "fetch worker unavailable".to_string();
        }
    }

    pub fn select_year(&mut self, year: Year) {
        if !self.idle("year change") {
            return;
        }
        if self.state.year == Some(year) && self.state.round.is_some() {
            return;
        }
        self.load_season(year);
    }

    pub fn select_round(&mut self, round: RoundId) {
        if !self.unlocked("round change") || self.state.round == Some(round) {
            return;
        }
        let Some(year) = self.state.year else {
            return;
        };
        self.state.round = Some(round);
        self.fetch_results(year, round, self.state.session);
    }

    pub fn select_session(&mut self, session: SessionKind) {
        if !self.unlocked("session change") || self.state.session == session {
            return;
        }
        let (Some(year), Some(round)) = (self.state.year, self.state.round) else {
            return;
        };
        self.state.session = session;
        self.fetch_results(year, round, session);
    }

    /// Re-fetches results for the current selection. Without a round it reloads the selected
    /// season, and without a year it restarts the whole startup sequence.
    pub fn refresh(&mut self) {
        if !self.idle("refresh") {
            return;
        }
        match (self.state.year, self.state.current_key()) {
            (_, Some(key)) => self.fetch_results(key.year, key.round, key.session),
            (Some(year), None) => self.load_season(year),
            (None, None) => self.bootstrap(),
        }
    }

    /// Moves the year selection one step; `forward` goes toward newer seasons.
    pub fn step_year(&mut self, forward: bool) {
        let mut years = self.state.years.clone();
        years.sort_unstable();
        if let Some(next) = step(&years, self.state.year, forward) {
            self.select_year(next);
        }
    }

    pub fn step_round(&mut self, forward: bool) {
        let mut rounds: Vec<RoundId> = self.state.rounds.iter().map(|r| r.round).collect();
        rounds.sort_unstable();
        if let Some(next) = step(&rounds, self.state.round, forward) {
            self.select_round(next);
        }
    }

    pub fn toggle_session(&mut self) {
        self.select_session(self.state.session.toggled());
    }

    pub fn fetch_results(&mut self, year: Year, round: RoundId, session: SessionKind) {
        self.state.loading_results = true;
        self.state.error.clear();
        self.state.rows.clear();
        let seq = self.next_seq();
        let key = ResultsKey {
            year,
            round,
            session,
        };
        if !self.dispatch(ProviderCommand::FetchResults { key, seq }) {
            self.state.loading_results = false;
        }
    }

    fn load_season(&mut self, year: Year) {
        self.state.year = Some(year);
        self.state.error.clear();
        // The old season's rounds must not be used for anything from here on.
        self.state.rounds.clear();
        self.state.round = None;
        self.state.rows.clear();
        self.state.loading_results = true;
        let seq = self.next_seq();
        let session = self.state.session;
        if !self.dispatch(ProviderCommand::LoadSeason { year, session, seq }) {
            self.state.loading_results = false;
        }
    }

    fn idle(&mut self, action: &str) -> bool {
        if self.state.busy() {
            self.state
                .push_log(format!("[WARN] Ignored {action} while loading"));
            return false;
        }
        true
    }

    fn unlocked(&mut self, action: &str) -> bool {
        if !self.idle(action) {
            return false;
        }
        if self.state.current_key().is_none() {
            self.state
                .push_log(format!("[WARN] Ignored {action}; no round selected"));
            return false;
        }
        true
    }

    fn next_seq(&mut self) -> u64 {
        self.state.results_seq = self.state.results_seq.wrapping_add(1);
        self.state.results_seq
    }

    fn dispatch(&mut self, cmd: ProviderCommand) -> bool {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[WARN] Fetch worker unavailable");
            return false;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Fetch request failed");
            return false;
        }
        true
    }
}

fn step<T: Copy + PartialEq>(sorted: &[T], current: Option<T>, forward: bool) -> Option<T> {
    let idx = current.and_then(|c| sorted.iter().position(|v| *v == c));
    let next = match (idx, forward) {
        (Some(i), true) => (i + 1).min(sorted.len().saturating_sub(1)),
        (Some(i), false) => i.saturating_sub(1),
        (None, true) => 0,
        (None, false) => sorted.len().checked_sub(1)?,
    };
    sorted.get(next).copied()
}
