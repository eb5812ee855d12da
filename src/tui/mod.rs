//! TUI module: Terminal User Interface using Ratatui.
//!
//! Provides a medical-themed interface for:
//! - Clinical data entry
//! - Heart disease risk result with recommendations

mod app;
mod styles;
mod ui;

pub use app::App;
pub use styles::MedicalTheme;
