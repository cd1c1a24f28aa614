use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use serde_json::json;

use f1_terminal::api::{ApiError, F1Api, LATEST_PREDICTION_PATH};
use f1_terminal::controller::Controller;
use f1_terminal::demo_api::DemoApi;
use f1_terminal::provider::{execute, spawn_provider};
use f1_terminal::state::{
    Delta, Prediction, PredictionPick, ProviderCommand, ResultRow, RoundId, RoundInfo, SessionKind,
    Year,
};

enum PredictionReply {
    NotFound,
    Offline,
    Ready(Prediction),
}

struct ScriptedApi {
    years: Result<Vec<Year>, ApiError>,
    rounds: HashMap<Year, Result<Vec<RoundInfo>, ApiError>>,
    prediction: PredictionReply,
    fail_next_sessions: Cell<usize>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedApi {
    fn new() -> Self {
        let mut rounds = HashMap::new();
        rounds.insert(2023, Ok(round_list(&[1, 22])));
        rounds.insert(2022, Ok(round_list(&[1, 2, 3])));
        rounds.insert(2021, Ok(round_list(&[1, 2])));
        Self {
            years: Ok(vec![2021, 2022, 2023]),
            rounds,
            prediction: PredictionReply::NotFound,
            fail_next_sessions: Cell::new(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl F1Api for ScriptedApi {
    fn years(&self) -> Result<Vec<Year>, ApiError> {
        self.record("years".to_string());
        self.years.clone()
    }

    fn rounds(&self, year: Year) -> Result<Vec<RoundInfo>, ApiError> {
        self.record(format!("rounds {year}"));
        self.rounds.get(&year).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn session(
        &self,
        year: Year,
        round: RoundId,
        session: SessionKind,
    ) -> Result<Vec<ResultRow>, ApiError> {
        self.record(format!("session {year} {round} {}", session.code()));
        let pending = self.fail_next_sessions.get();
        if pending > 0 {
            self.fail_next_sessions.set(pending - 1);
            return Err(ApiError::Http {
                status: 500,
                message: Some("boom".to_string()),
                path: format!(
                    "/api/session?year={year}&round={round}&session={}",
                    session.code()
                ),
            });
        }
        Ok(vec![
            ResultRow::from(json!({"position": 1, "driver": "VER", "best_lap": 83.456})),
            ResultRow::from(json!({"position": 2, "driver": "NOR", "best_lap": null})),
        ])
    }

    fn fetch_latest_prediction(&self) -> Result<Prediction, ApiError> {
        self.record("prediction".to_string());
        match &self.prediction {
            PredictionReply::NotFound => Err(ApiError::Http {
                status: 404,
                message: Some("not found".to_string()),
                path: LATEST_PREDICTION_PATH.to_string(),
            }),
            PredictionReply::Offline => Err(ApiError::Network {
                path: LATEST_PREDICTION_PATH.to_string(),
                message: "connection refused".to_string(),
            }),
            PredictionReply::Ready(p) => Ok(p.clone()),
        }
    }
}

fn round_list(ids: &[RoundId]) -> Vec<RoundInfo> {
    ids.iter()
        .map(|&round| RoundInfo {
            round,
            name: format!("Grand Prix {round}"),
        })
        .collect()
}

fn new_controller() -> (Controller, Receiver<ProviderCommand>) {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    (Controller::new(Some(cmd_tx)), cmd_rx)
}

fn pump(controller: &mut Controller, cmd_rx: &Receiver<ProviderCommand>, api: &ScriptedApi) {
    while let Ok(cmd) = cmd_rx.try_recv() {
        execute(api, cmd, &mut |delta| controller.apply(delta));
    }
}

fn booted(api: &ScriptedApi) -> (Controller, Receiver<ProviderCommand>) {
    let (mut controller, cmd_rx) = new_controller();
    controller.bootstrap();
    pump(&mut controller, &cmd_rx, api);
    api.clear_calls();
    (controller, cmd_rx)
}

#[test]
fn bootstrap_selects_latest_year_and_round() {
    let api = ScriptedApi::new();
    let (mut controller, cmd_rx) = new_controller();

    controller.bootstrap();
    assert!(controller.state().loading_page);
    assert!(controller.controls_disabled());

    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(
        api.calls(),
        ["years", "rounds 2023", "session 2023 22 R", "prediction"]
    );
    let state = controller.state();
    assert_eq!(state.year, Some(2023));
    assert_eq!(state.round, Some(22));
    assert_eq!(state.session, SessionKind::Race);
    assert_eq!(state.rows.len(), 2);
    assert!(!state.loading_page);
    assert!(!state.loading_results);
    assert!(!state.loading_prediction);
    assert!(!controller.controls_disabled());
    assert_eq!(state.header_label(), "2023 • R22 • Grand Prix 22");
}

#[test]
fn missing_prediction_is_not_an_error() {
    let api = ScriptedApi::new();
    let (controller, _cmd_rx) = booted(&api);
    assert!(controller.state().prediction.is_none());
    assert!(controller.state().error.is_empty());
}

#[test]
fn unreachable_prediction_is_absorbed() {
    let mut api = ScriptedApi::new();
    api.prediction = PredictionReply::Offline;
    let (controller, _cmd_rx) = booted(&api);
    assert!(controller.state().prediction.is_none());
    assert!(controller.state().error.is_empty());
    assert_eq!(controller.state().rows.len(), 2);
}

#[test]
fn available_prediction_is_stored() {
    let mut api = ScriptedApi::new();
    api.prediction = PredictionReply::Ready(Prediction {
        year: 2023,
        round: 22,
        top3: vec![PredictionPick {
            driver: "VER".to_string(),
            prob: 0.61,
        }],
        model_version: Some("v1".to_string()),
        train_range: None,
        created_at: None,
    });
    let (controller, _cmd_rx) = booted(&api);
    let prediction = controller.state().prediction.as_ref().expect("prediction");
    assert_eq!(prediction.top3[0].driver, "VER");
}

#[test]
fn years_failure_aborts_chain_but_still_tries_prediction() {
    let mut api = ScriptedApi::new();
    api.years = Err(ApiError::Network {
        path: "/api/years".to_string(),
        message: "connection refused".to_string(),
    });
    let (mut controller, cmd_rx) = new_controller();
    controller.bootstrap();
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["years", "prediction"]);
    let state = controller.state();
    assert!(!state.loading_page);
    assert_eq!(
        state.error,
        "request to /api/years failed: connection refused"
    );
    assert_eq!(state.year, None);
    assert!(controller.controls_disabled());

    api.years = Ok(vec![2021, 2022, 2023]);
    api.clear_calls();
    controller.refresh();
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(
        api.calls(),
        ["years", "rounds 2023", "session 2023 22 R", "prediction"]
    );
    assert!(controller.state().error.is_empty());
    assert_eq!(controller.state().year, Some(2023));
}

#[test]
fn rounds_failure_skips_results_fetch() {
    let mut api = ScriptedApi::new();
    api.rounds.insert(
        2023,
        Err(ApiError::Http {
            status: 502,
            message: None,
            path: "/api/rounds?year=2023".to_string(),
        }),
    );
    let (mut controller, cmd_rx) = new_controller();
    controller.bootstrap();
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["years", "rounds 2023", "prediction"]);
    assert_eq!(controller.state().error, "HTTP 502 for /api/rounds?year=2023");
    assert!(controller.state().rows.is_empty());
    assert!(!controller.state().loading_page);
}

#[test]
fn changing_year_fetches_rounds_once_before_results() {
    let api = ScriptedApi::new();
    let (mut controller, cmd_rx) = booted(&api);

    controller.select_year(2022);
    assert!(controller.state().rounds.is_empty());
    assert_eq!(controller.state().round, None);
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["rounds 2022", "session 2022 3 R"]);
    let state = controller.state();
    assert_eq!(state.year, Some(2022));
    assert_eq!(state.round, Some(3));
    assert_eq!(state.rounds.len(), 3);
    assert!(!state.loading_results);
}

#[test]
fn changing_year_keeps_current_session() {
    let api = ScriptedApi::new();
    let (mut controller, cmd_rx) = booted(&api);

    controller.select_session(SessionKind::Qualifying);
    pump(&mut controller, &cmd_rx, &api);
    controller.select_year(2021);
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(
        api.calls(),
        ["session 2023 22 Q", "rounds 2021", "session 2021 2 Q"]
    );
}

#[test]
fn year_without_rounds_unlocks_loading() {
    let mut api = ScriptedApi::new();
    api.rounds.insert(2022, Ok(Vec::new()));
    let (mut controller, cmd_rx) = booted(&api);

    controller.select_year(2022);
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["rounds 2022"]);
    assert!(!controller.state().loading_results);
    assert_eq!(controller.state().round, None);
    assert!(controller.state().error.is_empty());
}

#[test]
fn year_change_rounds_failure_leaves_a_retry_path() {
    let mut api = ScriptedApi::new();
    api.rounds.insert(
        2022,
        Err(ApiError::Http {
            status: 503,
            message: None,
            path: "/api/rounds?year=2022".to_string(),
        }),
    );
    let (mut controller, cmd_rx) = booted(&api);

    controller.select_year(2022);
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["rounds 2022"]);
    let state = controller.state();
    assert_eq!(state.error, "HTTP 503 for /api/rounds?year=2022");
    assert!(state.rows.is_empty());
    assert_eq!(state.year, Some(2022));
    assert_eq!(state.round, None);
    assert!(!state.loading_results);

    api.rounds.insert(2022, Ok(round_list(&[1, 2, 3])));
    api.clear_calls();
    controller.refresh();
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["rounds 2022", "session 2022 3 R"]);
    assert!(controller.state().error.is_empty());
    assert_eq!(controller.state().round, Some(3));
    assert_eq!(controller.state().rows.len(), 2);

    api.clear_calls();
    controller.select_year(2023);
    pump(&mut controller, &cmd_rx, &api);
    assert_eq!(api.calls(), ["rounds 2023", "session 2023 22 R"]);
}

#[test]
fn year_change_after_rounds_failure_switches_season() {
    let mut api = ScriptedApi::new();
    api.rounds.insert(
        2022,
        Err(ApiError::Network {
            path: "/api/rounds?year=2022".to_string(),
            message: "connection reset".to_string(),
        }),
    );
    let (mut controller, cmd_rx) = booted(&api);

    controller.select_year(2022);
    pump(&mut controller, &cmd_rx, &api);
    assert!(controller.controls_disabled());

    api.clear_calls();
    controller.select_year(2021);
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["rounds 2021", "session 2021 2 R"]);
    assert!(controller.state().error.is_empty());
    assert!(!controller.controls_disabled());
}

#[test]
fn year_change_results_failure_clears_rows_and_refresh_recovers() {
    let api = ScriptedApi::new();
    let (mut controller, cmd_rx) = booted(&api);

    api.fail_next_sessions.set(1);
    controller.select_year(2022);
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["rounds 2022", "session 2022 3 R"]);
    let state = controller.state();
    assert!(state.rows.is_empty());
    assert_eq!(
        state.error,
        "HTTP 500 for /api/session?year=2022&round=3&session=R: boom"
    );
    assert_eq!(state.round, Some(3));
    assert!(!controller.controls_disabled());

    api.clear_calls();
    controller.refresh();
    pump(&mut controller, &cmd_rx, &api);

    assert_eq!(api.calls(), ["session 2022 3 R"]);
    assert!(controller.state().error.is_empty());
    assert_eq!(controller.state().rows.len(), 2);
}

#[test]
fn select_round_and_step_round() {
    let api = ScriptedApi::new();
    let (mut controller, cmd_rx) = booted(&api);

    controller.step_round(false);
    pump(&mut controller, &cmd_rx, &api);
    assert_eq!(controller.state().round, Some(1));

    controller.select_round(22);
    pump(&mut controller, &cmd_rx, &api);
    assert_eq!(api.calls(), ["session 2023 1 R", "session 2023 22 R"]);
}

#[test]
fn results_failure_clears_rows_and_refresh_recovers() {
    let api = ScriptedApi::new();
    let (mut controller, cmd_rx) = booted(&api);
    assert_eq!(controller.state().rows.len(), 2);

    api.fail_next_sessions.set(1);
    controller.refresh();
    pump(&mut controller, &cmd_rx, &api);

    assert!(controller.state().rows.is_empty());
    assert_eq!(
        controller.state().error,
        "HTTP 500 for /api/session?year=2023&round=22&session=R: boom"
    );
    assert!(!controller.state().loading_results);
    assert!(!controller.controls_disabled());

    controller.refresh();
    pump(&mut controller, &cmd_rx, &api);

    assert!(controller.state().error.is_empty());
    assert_eq!(controller.state().rows.len(), 2);
    assert_eq!(
        api.calls(),
        ["session 2023 22 R", "session 2023 22 R"]
    );
}

#[test]
fn stale_results_are_ignored() {
    let api = ScriptedApi::new();
    let (mut controller, _cmd_rx) = booted(&api);
    let before = controller.state().rows.clone();

    controller.apply(Delta::SetResults {
        seq: controller.state().results_seq.wrapping_sub(1),
        key: controller.state().current_key().expect("selection"),
        rows: Vec::new(),
    });
    assert_eq!(controller.state().rows, before);
}

#[test]
fn demo_backend_boots_through_worker_thread() {
    let api = DemoApi::with_last_year(11, 2024);
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = spawn_provider(api, tx, cmd_rx);

    let mut controller = Controller::new(Some(cmd_tx));
    controller.bootstrap();
    while let Ok(delta) = rx.recv_timeout(Duration::from_secs(5)) {
        let done = matches!(delta, Delta::SetPrediction(_));
        controller.apply(delta);
        if done {
            break;
        }
    }

    let state = controller.state();
    assert_eq!(state.year, Some(2024));
    assert_eq!(state.round, Some(12));
    assert_eq!(state.rows.len(), 10);
    assert!(state.prediction.is_some());
    assert!(!state.loading_page);

    drop(controller);
    handle.join().expect("worker exits when commands stop");
}
