//! Risk assessment result view.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};

use crate::domain::{Diagnosis, Prediction};
use crate::tui::styles::MedicalTheme;

/// Gauge caption, marking placeholder probabilities as estimates.
#[must_use]
pub fn probability_label(prediction: &Prediction) -> String {
    if prediction.is_estimated() {
        format!("{:.1}% (estimated)", prediction.percent())
    } else {
        format!("{:.1}%", prediction.percent())
    }
}

/// Render the diagnosis result
pub fn render_result(f: &mut Frame, area: Rect, diagnosis: &Diagnosis) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area);

    render_result_header(f, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .margin(1)
        .split(chunks[1]);

    render_risk_gauge(f, columns[0], diagnosis);
    render_recommendations(f, columns[1], diagnosis);
    render_result_footer(f, chunks[2]);
}

fn render_result_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Prediction Analysis", MedicalTheme::title()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_risk_gauge(f: &mut Frame, area: Rect, diagnosis: &Diagnosis) {
    let block = Block::default()
        .title(Span::styled(" Heart Disease Risk % ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border_focused());

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Gauge
            Constraint::Length(2), // Caption
            Constraint::Min(0),
        ])
        .margin(1)
        .split(inner);

    let prediction = &diagnosis.prediction;
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).border_style(MedicalTheme::border()))
        .gauge_style(MedicalTheme::gauge(prediction))
        .percent(prediction.percent().round().clamp(0.0, 100.0) as u16)
        .label(probability_label(prediction));
    f.render_widget(gauge, chunks[0]);

    let mut caption = vec![Line::from(vec![
        Span::styled("Model: ", MedicalTheme::text_secondary()),
        Span::styled(diagnosis.model_kind.clone(), MedicalTheme::text()),
    ])];
    if prediction.is_estimated() {
        caption.push(Line::from(Span::styled(
            "Model has no probability estimate; value is a fixed placeholder",
            MedicalTheme::warning(),
        )));
    }
    f.render_widget(
        Paragraph::new(caption).alignment(Alignment::Center),
        chunks[1],
    );
}

fn render_recommendations(f: &mut Frame, area: Rect, diagnosis: &Diagnosis) {
    let risk_style = MedicalTheme::risk_level(diagnosis.risk_level);

    let block = Block::default()
        .title(Span::styled(
            format!(" {} ", diagnosis.risk_level.headline()),
            risk_style.add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(risk_style);

    let items: Vec<ListItem> = diagnosis
        .risk_level
        .recommendations()
        .iter()
        .map(|r| {
            ListItem::new(Line::from(vec![
                Span::styled(" • ", risk_style),
                Span::styled(*r, MedicalTheme::text()),
            ]))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn render_result_footer(f: &mut Frame, area: Rect) {
    let content = Line::from(vec![
        Span::styled("[Enter] ", MedicalTheme::key_hint()),
        Span::styled("Back to Form ", MedicalTheme::key_desc()),
        Span::styled("[R] ", MedicalTheme::key_hint()),
        Span::styled("New Patient ", MedicalTheme::key_desc()),
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
        Span::styled("Quit", MedicalTheme::key_desc()),
    ]);

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}
