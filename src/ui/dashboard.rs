use gemtype::store::{HistorySummary, StoredResult};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::{
    ui::{
        charting::{compute_chart_params, format_label},
        Palette,
    },
    App,
};

/// Rows shown in the history table, newest first
const HISTORY_ROWS: usize = 10;

fn present_row(entry: &StoredResult) -> Row<'static> {
    let r = &entry.result;
    Row::new(vec![
        Cell::from(entry.taken_at.format("%Y-%m-%d %H:%M").to_string()),
        Cell::from(r.level.to_string()),
        Cell::from(r.duration.to_string()),
        Cell::from(r.wpm.to_string()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format!("{}%", r.accuracy)),
        Cell::from(r.mistakes.to_string()),
    ])
}

fn summary_text(summary: &HistorySummary) -> String {
    format!(
        "{} tests   best {} wpm   avg {:.1} wpm   avg {:.1}% acc",
        summary.tests_taken, summary.best_wpm, summary.average_wpm, summary.average_accuracy
    )
}

/// Render the per-user history dashboard
pub fn render_dashboard(app: &App, f: &mut Frame) {
    let area = f.area();
    let palette = Palette::for_theme(app.display.theme);
    let data = &app.dashboard;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),  // title + summary
            Constraint::Min(6),     // chart
            Constraint::Length(14), // history
            Constraint::Length(2),  // instructions
        ])
        .split(area);

    let instructions = Paragraph::new("(b/backspace) back  (r) new test  (esc) quit")
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(instructions, chunks[3]);

    let Some(identity) = &data.identity else {
        let hint = Paragraph::new(
            "Sign in to see your history. Set GEMTYPE_USER_ID or add an account to the config file.",
        )
        .block(Block::default().borders(Borders::ALL).title("Dashboard"))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray))
        .wrap(Wrap { trim: true });
        f.render_widget(hint, chunks[0]);
        return;
    };

    let who = identity.email.as_deref().unwrap_or(&identity.user_id);
    let title = Paragraph::new(summary_text(&data.summary))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Dashboard: {who}")),
        )
        .style(
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    if data.history.is_empty() {
        let msg = data
            .note
            .clone()
            .unwrap_or_else(|| "No saved tests yet. Finish a test to start your history.".into());
        let no_data = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: true });
        f.render_widget(no_data, chunks[1]);
        return;
    }

    let coords: Vec<(f64, f64)> = data
        .history
        .iter()
        .enumerate()
        .map(|(i, e)| ((i + 1) as f64, e.result.wpm as f64))
        .collect();
    let (x_bounds, y_bounds) = compute_chart_params(&coords);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let datasets = vec![Dataset::default()
        .marker(Marker::Braille)
        .style(Style::default().fg(palette.accent))
        .graph_type(GraphType::Line)
        .data(&coords)];
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("WPM over time"))
        .x_axis(
            Axis::default()
                .title("test")
                .bounds(x_bounds)
                .labels(vec![
                    Span::styled("1", bold),
                    Span::styled(format_label(x_bounds[1]), bold),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds(y_bounds)
                .labels(vec![
                    Span::styled(format_label(y_bounds[0]), bold),
                    Span::styled(format_label(y_bounds[1]), bold),
                ]),
        );
    f.render_widget(chart, chunks[1]);

    let header = Row::new(vec![
        Cell::from("Taken"),
        Cell::from("Level"),
        Cell::from("Time"),
        Cell::from("WPM"),
        Cell::from("Accuracy"),
        Cell::from("Errors"),
    ])
    .style(
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
    );
    let rows: Vec<Row> = data
        .history
        .iter()
        .rev()
        .take(HISTORY_ROWS)
        .map(present_row)
        .collect();
    let widths = [
        Constraint::Length(17),
        Constraint::Length(13),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(9),
        Constraint::Min(8),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Recent tests"))
        .column_spacing(2);
    f.render_widget(table, chunks[2]);
}
