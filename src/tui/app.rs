//! Main TUI application state machine.
//!
//! Handles:
//! - Screen navigation
//! - Input event handling
//! - Running the prediction inline on submit

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::adapters::artifacts::ArtifactLoader;
use crate::application::ArtifactPredictionService;
use crate::config::AppConfig;
use crate::domain::Diagnosis;
use crate::CardioriskError;

use super::ui::{
    patient::{render_patient_form, PatientFormState},
    render_disclaimer,
    result::render_result,
};

/// Current screen/view in the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    PatientForm,
    Result,
}

/// Main application state
pub struct App {
    screen: Screen,

    should_quit: bool,

    service: ArtifactPredictionService,

    /// Whether the loaded artifacts carried a valid signature
    model_verified: bool,

    patient_form_state: PatientFormState,

    /// Last completed assessment, shown on the result screen
    diagnosis: Option<Diagnosis>,
}

impl App {
    /// Load model artifacts per `config` and build the application.
    ///
    /// # Errors
    /// Returns error if the artifacts are missing, malformed or fail
    /// signature verification.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let artifacts = ArtifactLoader::from_config(config)
            .load(&config.model_path)
            .with_context(|| format!("Failed to load model from {:?}", config.model_path))?;
        let verified = artifacts.verified;
        let service = ArtifactPredictionService::from_artifacts(artifacts)?;

        tracing::info!(
            "Model ready: kind={}, columns={}, verified={}",
            service.model_kind(),
            service.schema().len(),
            verified
        );

        Ok(Self::with_service(service, verified))
    }

    /// Create application with an injected prediction service.
    #[must_use]
    pub fn with_service(service: ArtifactPredictionService, model_verified: bool) -> Self {
        Self {
            screen: Screen::PatientForm,
            should_quit: false,
            service,
            model_verified,
            patient_form_state: PatientFormState::default(),
            diagnosis: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn status_line(&self) -> String {
        format!(
            "{} model, {} features, {}",
            self.service.model_kind(),
            self.service.schema().len(),
            if self.model_verified {
                "signature verified"
            } else {
                "UNSIGNED"
            }
        )
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            let status = self.status_line();
            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(3)])
                    .split(f.area());

                match (&self.screen, &self.diagnosis) {
                    (Screen::Result, Some(diagnosis)) => render_result(f, chunks[0], diagnosis),
                    _ => render_patient_form(f, chunks[0], &self.patient_form_state, &status),
                }

                render_disclaimer(f, chunks[1]);
            })?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if key == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::PatientForm => self.handle_patient_form_key(key),
            Screen::Result => self.handle_result_key(key),
        }
    }

    fn handle_patient_form_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Up | KeyCode::BackTab => self.patient_form_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.patient_form_state.next_field(),
            KeyCode::Left => self.patient_form_state.adjust(false),
            KeyCode::Right => self.patient_form_state.adjust(true),
            KeyCode::Char('r') | KeyCode::Char('R') => self.patient_form_state.reset(),
            KeyCode::Char(c) => self.patient_form_state.input_char(c),
            KeyCode::Backspace => self.patient_form_state.delete_char(),
            KeyCode::Enter => self.submit_patient_form(),
            _ => {}
        }
    }

    fn handle_result_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Enter | KeyCode::Backspace => {
                self.screen = Screen::PatientForm;
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.patient_form_state.reset();
                self.diagnosis = None;
                self.screen = Screen::PatientForm;
            }
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            _ => {}
        }
    }

    fn submit_patient_form(&mut self) {
        let input = match self.patient_form_state.to_clinical_input() {
            Ok(input) => input,
            Err(e) => {
                self.patient_form_state.error_message = Some(e.to_string());
                return;
            }
        };

        match self.service.predict(&input) {
            Ok(diagnosis) => {
                self.diagnosis = Some(diagnosis);
                self.screen = Screen::Result;
            }
            Err(CardioriskError::Validation(e)) => {
                self.patient_form_state.error_message = Some(e.to_string());
            }
            Err(e) => {
                tracing::error!("Prediction failed: {}", e);
                self.patient_form_state.error_message = Some(format!("Prediction failed: {e}"));
            }
        }
    }
}
