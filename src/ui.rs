use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};

use crate::format::{
    format_created_at, format_probability, format_seconds_to_time, round_label, safe, safe_str,
};
use crate::state::{DashboardState, Prediction, ResultRow, SessionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorFocus {
    #[default]
    Year,
    Round,
    Session,
}

impl SelectorFocus {
    pub fn next(self) -> Self {
        match self {
            SelectorFocus::Year => SelectorFocus::Round,
            SelectorFocus::Round => SelectorFocus::Session,
            SelectorFocus::Session => SelectorFocus::Year,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            SelectorFocus::Year => SelectorFocus::Session,
            SelectorFocus::Round => SelectorFocus::Year,
            SelectorFocus::Session => SelectorFocus::Round,
        }
    }
}

/// Screen-only state that never affects what is fetched.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub focus: SelectorFocus,
    pub help_overlay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Text,
    LapTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultColumn {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: CellKind,
    pub width: u16,
}

const fn col(key: &'static str, label: &'static str, kind: CellKind, width: u16) -> ResultColumn {
    ResultColumn {
        key,
        label,
        kind,
        width,
    }
}

const RACE_COLUMNS: [ResultColumn; 7] = [
    col("position", "Pos", CellKind::Text, 4),
    col("driver", "Driver", CellKind::Text, 7),
    col("team", "Team", CellKind::Text, 18),
    col("best_lap", "Best lap", CellKind::LapTime, 9),
    col("laps", "Laps", CellKind::Text, 5),
    col("main_compound", "Compound", CellKind::Text, 9),
    col("status", "Status", CellKind::Text, 12),
];

const QUALI_COLUMNS: [ResultColumn; 8] = [
    col("position", "Pos", CellKind::Text, 4),
    col("driver", "Driver", CellKind::Text, 7),
    col("team", "Team", CellKind::Text, 18),
    col("q1", "Q1", CellKind::LapTime, 9),
    col("q2", "Q2", CellKind::LapTime, 9),
    col("q3", "Q3", CellKind::LapTime, 9),
    col("best_lap", "Best lap", CellKind::LapTime, 9),
    col("status", "Status", CellKind::Text, 12),
];

pub fn results_columns(session: SessionKind) -> &'static [ResultColumn] {
    match session {
        SessionKind::Race => &RACE_COLUMNS,
        SessionKind::Qualifying => &QUALI_COLUMNS,
    }
}

pub fn cell_text(column: &ResultColumn, row: &ResultRow) -> String {
    let value = row.get(column.key);
    match column.kind {
        CellKind::LapTime => format_seconds_to_time(value),
        CellKind::Text => safe(value),
    }
}

pub fn table_cells(session: SessionKind, rows: &[ResultRow]) -> Vec<Vec<String>> {
    let columns = results_columns(session);
    rows.iter()
        .map(|row| columns.iter().map(|c| cell_text(c, row)).collect())
        .collect()
}

/// Plain-text rendition of a results table with padded columns.
pub fn plain_table(session: SessionKind, rows: &[ResultRow]) -> String {
    let columns = results_columns(session);
    let cells = table_cells(session, rows);
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            cells
                .iter()
                .map(|r| r[idx].chars().count())
                .chain(std::iter::once(c.label.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = vec![pad_line(
        &columns.iter().map(|c| c.label).collect::<Vec<_>>(),
        &widths,
    )];
    for row in &cells {
        lines.push(pad_line(
            &row.iter().map(String::as_str).collect::<Vec<_>>(),
            &widths,
        ));
    }
    lines.join("\n")
}

fn pad_line(values: &[&str], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(v, &w)| format!("{v:<w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

pub fn prediction_lines(prediction: Option<&Prediction>, loading: bool) -> Vec<String> {
    if loading {
        return vec!["Loading…".to_string()];
    }
    let Some(p) = prediction else {
        return vec![
            "No prediction data yet.".to_string(),
            String::new(),
            "Shown once the backend publishes".to_string(),
            "/api/predictions/latest.".to_string(),
        ];
    };

    let mut lines = Vec::new();
    for (idx, pick) in p.top3.iter().enumerate() {
        lines.push(format!(
            "{}) {:<8}{:>8}",
            idx + 1,
            pick.driver,
            format_probability(pick.prob)
        ));
        lines.push(format!("   {} {}", p.year, round_label(p.round)));
    }
    lines.push(String::new());
    lines.push(format!("Model:   {}", safe_str(p.model_version.as_deref())));
    lines.push(format!("Train:   {}", safe_str(p.train_range.as_deref())));
    let created = p
        .created_at
        .as_deref()
        .map(format_created_at)
        .unwrap_or_else(|| "-".to_string());
    lines.push(format!("Created: {created}"));
    lines
}

fn selector_lines(state: &DashboardState, ui: &UiState) -> Vec<Line<'static>> {
    let busy = state.busy();
    let disabled = state.controls_disabled();
    let dim = |off: bool| {
        if off {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        }
    };
    let base = dim(disabled);
    let focused = |focus: SelectorFocus| {
        let off = match focus {
            SelectorFocus::Year => busy || state.years.is_empty(),
            SelectorFocus::Round | SelectorFocus::Session => disabled,
        };
        if ui.focus == focus && !off {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            dim(off)
        }
    };

    let year = state
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "-".to_string());
    let span = match (state.years.iter().min(), state.years.iter().max()) {
        (Some(lo), Some(hi)) => format!("  ({lo}–{hi})"),
        _ => String::new(),
    };
    let round = match state.round {
        Some(r) => {
            let name = state.selected_round_name();
            if name.is_empty() {
                round_label(r)
            } else {
                format!("{} — {name}", round_label(r))
            }
        }
        None => "-".to_string(),
    };
    let radio = |kind: SessionKind| {
        let mark = if state.session == kind { "(•)" } else { "( )" };
        format!("{mark} {}", kind.label())
    };

    vec![
        Line::from(vec![
            Span::styled("Year     ", base),
            Span::styled(format!("‹ {year} ›"), focused(SelectorFocus::Year)),
            Span::styled(span, base),
        ]),
        Line::from(vec![
            Span::styled("Round    ", base),
            Span::styled(format!("‹ {round} ›"), focused(SelectorFocus::Round)),
        ]),
        Line::from(vec![
            Span::styled("Session  ", base),
            Span::styled(
                format!(
                    "{}  {}",
                    radio(SessionKind::Race),
                    radio(SessionKind::Qualifying)
                ),
                focused(SelectorFocus::Session),
            ),
        ]),
        Line::from(Span::styled(
            if busy {
                "Refresh  (locked)"
            } else {
                "Refresh  Enter"
            },
            dim(busy),
        )),
    ]
}

pub fn draw(frame: &mut Frame, state: &DashboardState, ui: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(format!(" F1 PREDICTOR | {}", state.header_label()))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(34)])
        .split(chunks[1]);

    render_main(frame, body[0], state, ui);
    render_prediction(frame, body[1], state);

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(
        "Tab Focus | ←/→ Change | r Race/Quali | Enter Refresh | ? Help | q Quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if ui.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn render_main(frame: &mut Frame, area: Rect, state: &DashboardState, ui: &UiState) {
    let error_height = if state.error.is_empty() { 0 } else { 1 };
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(error_height),
            Constraint::Min(1),
        ])
        .split(area);

    let selectors = Paragraph::new(selector_lines(state, ui))
        .block(Block::default().title("Selection").borders(Borders::ALL));
    frame.render_widget(selectors, sections[0]);

    if !state.error.is_empty() {
        let error = Paragraph::new(format!(" {}", state.error))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
        frame.render_widget(error, sections[1]);
    }

    render_results(frame, sections[2], state);
}

fn render_results(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(format!("Results · {}", state.session.label()))
        .borders(Borders::ALL);

    if state.loading_results || state.loading_page {
        let loading = Paragraph::new("Loading results…")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(loading, area);
        return;
    }
    if state.rows.is_empty() {
        let empty = Paragraph::new("No data for this session")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let columns = results_columns(state.session);
    let header = Row::new(columns.iter().map(|c| Cell::from(c.label)))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = table_cells(state.session, &state.rows)
        .into_iter()
        .map(|cells| Row::new(cells.into_iter().map(Cell::from)));
    let widths = columns.iter().map(|c| Constraint::Length(c.width));

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

fn render_prediction(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let lines = prediction_lines(state.prediction.as_ref(), state.loading_prediction);
    let style = if state.prediction.is_none() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let sidebar = Paragraph::new(lines.join("\n")).style(style).block(
        Block::default()
            .title("Latest prediction · Top-3")
            .borders(Borders::ALL),
    );
    frame.render_widget(sidebar, area);
}

fn console_text(state: &DashboardState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "F1 Terminal - Help",
        "",
        "  Tab / Shift-Tab   Focus year, round, session",
        "  ← / → or h / l    Change focused selection",
        "  r                 Toggle Race / Quali",
        "  Enter / F5        Refresh results",
        "  ?                 Toggle help",
        "  q                 Quit",
        "",
        "Selections are locked while data is loading.",
    ]
    .join("\n");

    let help = Paragraph::new(text).block(Block::default().title("Help").borders(Borders::ALL));
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
