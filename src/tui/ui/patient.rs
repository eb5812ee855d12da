//! Patient data input form.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::domain::patient::{
    NumericSpec, AGE, CHOLESTEROL, FASTING_BS, MAX_HR, OLDPEAK, RESTING_BP,
};
use crate::domain::{
    Categorical, ChestPainType, ExerciseAngina, RawClinicalInput, RestingEcg, Sex, StSlope,
    ValidationError,
};
use crate::tui::styles::MedicalTheme;

/// Longest numeric entry accepted from the keyboard.
const MAX_NUMERIC_CHARS: usize = 6;

/// Continuous measurements on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Age,
    RestingBp,
    Cholesterol,
    MaxHr,
    Oldpeak,
}

impl NumericField {
    #[must_use]
    pub const fn spec(self) -> NumericSpec {
        match self {
            Self::Age => AGE,
            Self::RestingBp => RESTING_BP,
            Self::Cholesterol => CHOLESTEROL,
            Self::MaxHr => MAX_HR,
            Self::Oldpeak => OLDPEAK,
        }
    }

    fn value_of(self, input: &RawClinicalInput) -> f64 {
        match self {
            Self::Age => input.age,
            Self::RestingBp => input.resting_bp,
            Self::Cholesterol => input.cholesterol,
            Self::MaxHr => input.max_hr,
            Self::Oldpeak => input.oldpeak,
        }
    }

    fn set(self, input: &mut RawClinicalInput, value: f64) {
        match self {
            Self::Age => input.age = value,
            Self::RestingBp => input.resting_bp = value,
            Self::Cholesterol => input.cholesterol = value,
            Self::MaxHr => input.max_hr = value,
            Self::Oldpeak => input.oldpeak = value,
        }
    }
}

/// One-of-N attributes on the form, including the fasting blood sugar flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceField {
    Sex,
    ChestPain,
    FastingBs,
    RestingEcg,
    ExerciseAngina,
    StSlope,
}

fn spellings<T: Categorical>() -> Vec<&'static str> {
    T::ALL.iter().map(|v| v.as_str()).collect()
}

impl ChoiceField {
    fn options(self) -> Vec<&'static str> {
        match self {
            Self::Sex => spellings::<Sex>(),
            Self::ChestPain => spellings::<ChestPainType>(),
            Self::FastingBs => vec!["0", "1"],
            Self::RestingEcg => spellings::<RestingEcg>(),
            Self::ExerciseAngina => spellings::<ExerciseAngina>(),
            Self::StSlope => spellings::<StSlope>(),
        }
    }

    fn current(self, input: &RawClinicalInput) -> &'static str {
        match self {
            Self::Sex => input.sex.as_str(),
            Self::ChestPain => input.chest_pain.as_str(),
            Self::FastingBs => {
                if input.fasting_bs == 1 {
                    "1"
                } else {
                    "0"
                }
            }
            Self::RestingEcg => input.resting_ecg.as_str(),
            Self::ExerciseAngina => input.exercise_angina.as_str(),
            Self::StSlope => input.st_slope.as_str(),
        }
    }

    fn apply(self, input: &mut RawClinicalInput, raw: &str) -> Result<(), ValidationError> {
        match self {
            Self::Sex => input.sex = raw.parse()?,
            Self::ChestPain => input.chest_pain = raw.parse()?,
            Self::FastingBs => {
                input.fasting_bs = raw
                    .parse()
                    .map_err(|_| ValidationError::new(FASTING_BS, "must be 0 or 1"))?;
            }
            Self::RestingEcg => input.resting_ecg = raw.parse()?,
            Self::ExerciseAngina => input.exercise_angina = raw.parse()?,
            Self::StSlope => input.st_slope = raw.parse()?,
        }
        Ok(())
    }
}

/// What a form row edits.
#[derive(Debug, Clone)]
pub enum FieldInput {
    /// Free numeric entry with arrow-key stepping, clamped to the field's range.
    Numeric { field: NumericField, buffer: String },
    /// One of a fixed set of spellings, cycled with the arrow keys.
    Choice {
        field: ChoiceField,
        options: Vec<&'static str>,
        selected: usize,
    },
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub hint: &'static str,
    pub input: FieldInput,
}

impl FormField {
    fn numeric(field: NumericField, hint: &'static str, input: &RawClinicalInput) -> Self {
        let spec = field.spec();
        Self {
            label: spec.label,
            hint,
            input: FieldInput::Numeric {
                field,
                buffer: format_value(&spec, field.value_of(input)),
            },
        }
    }

    fn choice(
        field: ChoiceField,
        label: &'static str,
        hint: &'static str,
        input: &RawClinicalInput,
    ) -> Self {
        let options = field.options();
        let current = field.current(input);
        let selected = options.iter().position(|o| *o == current).unwrap_or(0);
        Self {
            label,
            hint,
            input: FieldInput::Choice {
                field,
                options,
                selected,
            },
        }
    }

    /// Text currently shown for the field.
    #[must_use]
    pub fn display(&self) -> &str {
        match &self.input {
            FieldInput::Numeric { buffer, .. } => buffer,
            FieldInput::Choice {
                options, selected, ..
            } => options[*selected],
        }
    }
}

fn format_value(spec: &NumericSpec, value: f64) -> String {
    if spec.step.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Patient form state
pub struct PatientFormState {
    pub fields: Vec<FormField>,
    pub selected_field: usize,
    pub error_message: Option<String>,
}

impl Default for PatientFormState {
    fn default() -> Self {
        Self::from_input(&RawClinicalInput::default())
    }
}

impl PatientFormState {
    /// A form pre-filled with `input`.
    #[must_use]
    pub fn from_input(input: &RawClinicalInput) -> Self {
        Self {
            fields: vec![
                FormField::numeric(NumericField::Age, "years (18-100)", input),
                FormField::choice(ChoiceField::Sex, "Sex", "M / F", input),
                FormField::choice(
                    ChoiceField::ChestPain,
                    "Chest Pain Type",
                    "ATA / NAP / TA / ASY",
                    input,
                ),
                FormField::numeric(NumericField::RestingBp, "mmHg (80-200)", input),
                FormField::numeric(NumericField::Cholesterol, "mg/dL (100-600)", input),
                FormField::choice(
                    ChoiceField::FastingBs,
                    "Fasting Blood Sugar > 120 mg/dL",
                    "0 = no, 1 = yes",
                    input,
                ),
                FormField::choice(
                    ChoiceField::RestingEcg,
                    "Resting ECG",
                    "Normal / ST / LVH",
                    input,
                ),
                FormField::numeric(NumericField::MaxHr, "bpm (60-220)", input),
                FormField::choice(
                    ChoiceField::ExerciseAngina,
                    "Exercise Induced Angina",
                    "Y / N",
                    input,
                ),
                FormField::numeric(NumericField::Oldpeak, "ST depression (0-6)", input),
                FormField::choice(ChoiceField::StSlope, "ST Slope", "Up / Flat / Down", input),
            ],
            selected_field: 0,
            error_message: None,
        }
    }

    /// Move to the next field
    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % self.fields.len();
    }

    /// Move to the previous field
    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = self.fields.len() - 1;
        } else {
            self.selected_field -= 1;
        }
    }

    /// `←`/`→`: step a numeric field (clamped) or cycle a choice.
    pub fn adjust(&mut self, forward: bool) {
        self.error_message = None;
        match &mut self.fields[self.selected_field].input {
            FieldInput::Numeric { field, buffer } => {
                let spec = field.spec();
                let current = buffer.parse::<f64>().unwrap_or(spec.default);
                let delta = if forward { spec.step } else { -spec.step };
                let next = spec.clamp(current + delta);
                *buffer = format_value(&spec, next);
            }
            FieldInput::Choice {
                options, selected, ..
            } => {
                let n = options.len();
                *selected = if forward {
                    (*selected + 1) % n
                } else {
                    (*selected + n - 1) % n
                };
            }
        }
    }

    /// Type into a numeric field. Choices ignore typed characters.
    pub fn input_char(&mut self, c: char) {
        if let FieldInput::Numeric { field, buffer } = &mut self.fields[self.selected_field].input
        {
            let allowed = c.is_ascii_digit() || (c == '.' && field.spec().step.fract() != 0.0);
            if allowed && buffer.len() < MAX_NUMERIC_CHARS {
                buffer.push(c);
                self.error_message = None;
            }
        }
    }

    /// Delete the last character
    pub fn delete_char(&mut self) {
        if let FieldInput::Numeric { buffer, .. } = &mut self.fields[self.selected_field].input {
            buffer.pop();
        }
    }

    /// Restore every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Validate and convert to a `RawClinicalInput`.
    ///
    /// # Errors
    /// Returns the first field that does not parse or is out of range.
    pub fn to_clinical_input(&self) -> Result<RawClinicalInput, ValidationError> {
        let mut input = RawClinicalInput::default();

        for form_field in &self.fields {
            match &form_field.input {
                FieldInput::Numeric { field, buffer } => {
                    let spec = field.spec();
                    let value: f64 = buffer
                        .parse()
                        .map_err(|_| ValidationError::new(spec.feature, "invalid number"))?;
                    spec.check(value)?;
                    field.set(&mut input, value);
                }
                FieldInput::Choice {
                    field,
                    options,
                    selected,
                } => field.apply(&mut input, options[*selected])?,
            }
        }

        input.validate()?;
        Ok(input)
    }
}

/// Render the patient data input form
pub fn render_patient_form(f: &mut Frame, area: Rect, state: &PatientFormState, status: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form
            Constraint::Length(3), // Footer/error
        ])
        .split(area);

    render_form_header(f, chunks[0], status);
    render_form_fields(f, chunks[1], state);
    render_form_footer(f, chunks[2], state);
}

fn render_form_header(f: &mut Frame, area: Rect, status: &str) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Heart Disease Risk Predictor", MedicalTheme::title()),
        Span::styled(" │ ", MedicalTheme::text_secondary()),
        Span::styled(status.to_string(), MedicalTheme::text_muted()),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_form_fields(f: &mut Frame, area: Rect, state: &PatientFormState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .margin(1)
        .split(area);

    let mid = (state.fields.len() + 1) / 2;

    render_field_column(f, columns[0], &state.fields[..mid], 0, state.selected_field);
    render_field_column(
        f,
        columns[1],
        &state.fields[mid..],
        mid,
        state.selected_field,
    );
}

fn render_field_column(
    f: &mut Frame,
    area: Rect,
    fields: &[FormField],
    offset: usize,
    selected: usize,
) {
    let field_height = 3;
    let constraints: Vec<Constraint> = fields
        .iter()
        .map(|_| Constraint::Length(field_height))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (i, field) in fields.iter().enumerate() {
        let is_selected = offset + i == selected;
        let (border_style, title_style) = if is_selected {
            (MedicalTheme::border_focused(), MedicalTheme::focused())
        } else {
            (MedicalTheme::border(), MedicalTheme::text_secondary())
        };

        let block = Block::default()
            .title(Span::styled(format!(" {} ", field.label), title_style))
            .borders(Borders::ALL)
            .border_style(border_style);

        let mut spans = vec![Span::raw(" ")];
        match &field.input {
            FieldInput::Numeric { .. } => {
                let text = field.display();
                if text.is_empty() {
                    spans.push(Span::styled(field.hint, MedicalTheme::text_muted()));
                } else {
                    spans.push(Span::styled(text.to_string(), MedicalTheme::text()));
                }
                if is_selected {
                    spans.push(Span::styled("▌", MedicalTheme::focused()));
                }
                spans.push(Span::styled(
                    format!("  {}", field.hint),
                    MedicalTheme::text_muted(),
                ));
            }
            FieldInput::Choice {
                options, selected, ..
            } => {
                for (idx, option) in options.iter().enumerate() {
                    let style = if idx == *selected {
                        MedicalTheme::selected()
                    } else {
                        MedicalTheme::text_muted()
                    };
                    spans.push(Span::styled(format!(" {option} "), style));
                    spans.push(Span::raw(" "));
                }
            }
        }

        f.render_widget(Paragraph::new(Line::from(spans)).block(block), chunks[i]);
    }
}

fn render_form_footer(f: &mut Frame, area: Rect, state: &PatientFormState) {
    let content = if let Some(err) = &state.error_message {
        Line::from(vec![
            Span::styled("! ", MedicalTheme::danger()),
            Span::styled(err.clone(), MedicalTheme::danger()),
        ])
    } else {
        Line::from(vec![
            Span::styled("[↑↓] ", MedicalTheme::key_hint()),
            Span::styled("Navigate ", MedicalTheme::key_desc()),
            Span::styled("[←→] ", MedicalTheme::key_hint()),
            Span::styled("Adjust ", MedicalTheme::key_desc()),
            Span::styled("[Enter] ", MedicalTheme::key_hint()),
            Span::styled("Analyze Heart Health ", MedicalTheme::key_desc()),
            Span::styled("[R] ", MedicalTheme::key_hint()),
            Span::styled("Reset ", MedicalTheme::key_desc()),
            Span::styled("[Esc] ", MedicalTheme::key_hint()),
            Span::styled("Quit", MedicalTheme::key_desc()),
        ])
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}
