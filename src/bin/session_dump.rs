use anyhow::{Context, Result, bail};

use f1_terminal::api::{F1Api, HttpApi};
use f1_terminal::config::{ApiSource, Config};
use f1_terminal::demo_api::DemoApi;
use f1_terminal::format::round_label;
use f1_terminal::state::{SessionKind, default_round, default_year};
use f1_terminal::ui::plain_table;

fn main() -> Result<()> {
    let config = Config::load();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let session = match arg_value(&args, "--session") {
        Some(code) => SessionKind::from_code(&code)
            .with_context(|| format!("unknown session {code:?}, expected R or Q"))?,
        None => SessionKind::Race,
    };
    let year = parse_arg::<i32>(&args, "--year")?;
    let round = parse_arg::<u32>(&args, "--round")?;

    let api: Box<dyn F1Api> = match config.source {
        ApiSource::Http => Box::new(HttpApi::new(&config.api_base)?),
        ApiSource::Demo => Box::new(DemoApi::new(config.demo_seed)),
    };

    let year = match year {
        Some(year) => year,
        None => {
            let years = api.years().context("failed to list seasons")?;
            default_year(&years).context("backend returned no seasons")?
        }
    };
    let rounds = api
        .rounds(year)
        .with_context(|| format!("failed to list rounds for {year}"))?;
    let round = match round.or_else(|| default_round(&rounds)) {
        Some(round) => round,
        None => bail!("no rounds listed for {year}"),
    };
    let name = rounds
        .iter()
        .find(|r| r.round == round)
        .map(|r| r.name.as_str())
        .unwrap_or("");

    let rows = api
        .session(year, round, session)
        .with_context(|| format!("failed to fetch {year} {}", round_label(round)))?;

    println!("{year} {} {name} ({})", round_label(round), session.label());
    if rows.is_empty() {
        println!("No data for this session");
    } else {
        println!("{}", plain_table(session, &rows));
    }

    if let Some(prediction) = api.latest_prediction().into_prediction() {
        println!();
        println!(
            "Latest prediction: {} {}",
            prediction.year,
            round_label(prediction.round)
        );
        for (idx, pick) in prediction.top3.iter().enumerate() {
            println!("  {}) {} {:.1}%", idx + 1, pick.driver, pick.prob * 100.0);
        }
    }

    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match arg_value(args, flag) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => bail!("invalid value for {flag}: {raw}"),
        },
        None => Ok(None),
    }
}
