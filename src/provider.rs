use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::api::{F1Api, PredictionLookup};
use crate::state::{
    Delta, ProviderCommand, ResultsKey, RoundId, SessionKind, Year, default_round, default_year,
    key_label,
};

/// Runs fetch commands one at a time on a background thread until the command channel closes.
pub fn spawn_provider<A>(api: A, tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) -> JoinHandle<()>
where
    A: F1Api + Send + 'static,
{
    thread::spawn(move || {
        for cmd in cmd_rx {
            execute(&api, cmd, &mut |delta| {
                let _ = tx.send(delta);
            });
        }
    })
}

/// Executes one command's whole fetch chain, reporting every step through `emit`.
///
/// Within a chain the rounds fetch always settles before any results fetch is issued.
pub fn execute<A>(api: &A, cmd: ProviderCommand, emit: &mut dyn FnMut(Delta))
where
    A: F1Api + ?Sized,
{
    match cmd {
        ProviderCommand::Bootstrap { seq } => {
            run_bootstrap_chain(api, seq, emit);
            emit(Delta::PageSettled);
            load_prediction(api, emit);
        }
        ProviderCommand::LoadSeason { year, session, seq } => {
            if let Some(round) = load_rounds(api, year, emit) {
                load_results(api, ResultsKey { year, round, session }, seq, emit);
            }
        }
        ProviderCommand::FetchResults { key, seq } => load_results(api, key, seq, emit),
    }
}

fn run_bootstrap_chain<A>(api: &A, seq: u64, emit: &mut dyn FnMut(Delta))
where
    A: F1Api + ?Sized,
{
    let years = match api.years() {
        Ok(years) => years,
        Err(err) => {
            emit(Delta::BootstrapFailed(err.to_string()));
            return;
        }
    };
    let selected = default_year(&years);
    emit(Delta::Log(format!("[INFO] {} seasons available", years.len())));
    emit(Delta::SetYears { years, selected });

    let Some(year) = selected else {
        emit(Delta::Log("[WARN] Backend returned no seasons".to_string()));
        return;
    };
    let Some(round) = load_rounds(api, year, emit) else {
        return;
    };
    load_results(
        api,
        ResultsKey {
            year,
            round,
            session: SessionKind::Race,
        },
        seq,
        emit,
    );
}

fn load_rounds<A>(api: &A, year: Year, emit: &mut dyn FnMut(Delta)) -> Option<RoundId>
where
    A: F1Api + ?Sized,
{
    match api.rounds(year) {
        Ok(rounds) => {
            let selected = default_round(&rounds);
            if selected.is_none() {
                emit(Delta::Log(format!("[WARN] No rounds listed for {year}")));
            }
            emit(Delta::SetRounds {
                year,
                rounds,
                selected,
            });
            selected
        }
        Err(err) => {
            emit(Delta::RoundsFailed {
                year,
                error: err.to_string(),
            });
            None
        }
    }
}

fn load_results<A>(api: &A, key: ResultsKey, seq: u64, emit: &mut dyn FnMut(Delta))
where
    A: F1Api + ?Sized,
{
    emit(Delta::ResultsStarted { seq, key });
    match api.session(key.year, key.round, key.session) {
        Ok(rows) => {
            emit(Delta::Log(format!(
                "[INFO] {} rows for {}",
                rows.len(),
                key_label(key)
            )));
            emit(Delta::SetResults { seq, key, rows });
        }
        Err(err) => emit(Delta::ResultsFailed {
            seq,
            key,
            error: err.to_string(),
        }),
    }
}

fn load_prediction<A>(api: &A, emit: &mut dyn FnMut(Delta))
where
    A: F1Api + ?Sized,
{
    emit(Delta::PredictionStarted);
    let lookup = api.latest_prediction();
    match &lookup {
        PredictionLookup::Available(p) => emit(Delta::Log(format!(
            "[INFO] Prediction loaded for {} R{:02}",
            p.year, p.round
        ))),
        PredictionLookup::NotPublished => {
            emit(Delta::Log("[INFO] No prediction published yet".to_string()))
        }
        PredictionLookup::Unavailable(reason) => {
            emit(Delta::Log(format!("[INFO] Prediction unavailable: {reason}")))
        }
    }
    emit(Delta::SetPrediction(lookup.into_prediction()));
}
