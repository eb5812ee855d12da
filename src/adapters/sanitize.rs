//! Log sanitization for clinical values and identifiers.
//!
//! Formatted log lines pass through [`SanitizingMakeWriter`], which redacts:
//! - numeric clinical measurements written as `name=value` / `"name": value`
//!   (age, blood pressure, cholesterol, ...)
//! - categorical clinical attributes written the same way (sex, chest pain, ...)
//! - UUIDs, e-mail addresses and long hex strings (key material)
//!
//! Prefer not logging patient values at all; this is the fallback for the
//! cases that slip through (e.g. a `Debug` dump of a `RawClinicalInput`).
//!
//! Inputs are capped at `CARDIORISK_SANITIZE_MAX_BYTES` (default 16 KiB).

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct Pattern {
    regex: Regex,
    replacement: &'static str,
}

struct Patterns {
    set: RegexSet,
    patterns: Vec<Pattern>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("CARDIORISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn get_patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let rules: Vec<(&'static str, &'static str)> = vec![
            // Numeric measurements, both field and feature spellings.
            (
                r#"(?i)\b(age|resting_?bp|cholesterol|fasting_?bs|max_?hr|oldpeak)("?\s*[:=]\s*)-?\d+(?:\.\d+)?"#,
                "${1}${2}[REDACTED]",
            ),
            // Categorical attributes.
            (
                r#"(?i)\b(sex|chest_?pain(?:_?type)?|resting_?ecg|exercise_?angina|st_?slope)("?\s*[:=]\s*"?)[A-Za-z]+"#,
                "${1}${2}[REDACTED]",
            ),
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-UUID]",
            ),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
        ];

        // The rules are compile-time constants; a failure here is a programming error.
        let set = RegexSet::new(rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let patterns = rules
            .into_iter()
            .map(|(pattern, replacement)| Pattern {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        Patterns { set, patterns }
    })
}

/// Redact clinical values and identifiers from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.set.matches(prefix).into_iter() {
        let pattern = &patterns.patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement)
            .into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains anything `sanitize` would redact.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let (prefix, _) = truncate_to_char_boundary(input, max_sanitize_bytes());
    get_patterns().set.is_match(prefix)
}

/// A `tracing_subscriber` writer wrapper that sanitizes each formatted log
/// line before it reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let sanitized = sanitize(&String::from_utf8_lossy(&line));
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // Bound buffering of a huge line with no newline.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}

impl<W> Drop for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn drop(&mut self) {
        // Writers are created per event; emit any unterminated tail.
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_redacts_numeric_measurements() {
        let sanitized = sanitize("input: age=63 cholesterol: 280 oldpeak=2.5");
        assert!(!sanitized.contains("63"));
        assert!(!sanitized.contains("280"));
        assert!(!sanitized.contains("2.5"));
        assert!(sanitized.contains("cholesterol: [REDACTED]"));
    }

    #[test]
    fn test_redacts_json_and_feature_spellings() {
        let sanitized = sanitize(r#"{"resting_bp":150,"MaxHR":110,"sex":"F"}"#);
        assert!(sanitized.contains(r#""resting_bp":[REDACTED]"#));
        assert!(sanitized.contains(r#""MaxHR":[REDACTED]"#));
        assert!(sanitized.contains(r#""sex":"[REDACTED]"#));
    }

    #[test]
    fn test_redacts_debug_dump() {
        let sanitized = sanitize("RawClinicalInput { age: 40.0, sex: Male, chest_pain: Asy }");
        assert!(!sanitized.contains("40.0"));
        assert!(!sanitized.contains("Male"));
        assert!(!sanitized.contains("Asy"));
    }

    #[test]
    fn test_leaves_prediction_summary_alone() {
        let line = "Prediction complete: label=1, probability=80.0%, source=Model, risk=HIGH";
        assert_eq!(sanitize(line), line);
        assert!(!contains_sensitive(line));
    }

    #[test]
    fn test_redacts_identifiers() {
        let sanitized = sanitize("id 550e8400-e29b-41d4-a716-446655440000 by doc@hospital.org");
        assert!(sanitized.contains("[REDACTED-UUID]"));
        assert!(sanitized.contains("[REDACTED-EMAIL]"));

        let sanitized = sanitize("key 0123456789abcdef0123456789abcdef");
        assert!(sanitized.contains("[REDACTED-KEY]"));
    }

    #[test]
    fn test_truncates_large_inputs() {
        let sanitized = sanitize_with_limit("é".repeat(20).as_str(), 7);
        assert!(sanitized.ends_with("[TRUNCATED]"));
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("sink lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_emits_unterminated_tail_on_drop() {
        let sink = Sink::default();
        let captured = sink.0.clone();
        let make = SanitizingMakeWriter::new(move || sink.clone());
        {
            let mut writer = make.make_writer();
            writer.write_all(b"cholesterol=310").expect("write");
        }
        let out = String::from_utf8(captured.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(out, "cholesterol=[REDACTED]");
    }

    #[test]
    fn test_writer_sanitizes_lines() {
        let sink = Sink::default();
        let make = SanitizingMakeWriter::new(move || sink.clone());
        let captured = {
            let mut writer = make.make_writer();
            writer.write_all(b"submitted age=").expect("write");
            writer.write_all(b"55 ok\n").expect("write");
            writer.flush().expect("flush");
            writer.inner.0.clone()
        };
        let out = String::from_utf8(captured.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(out, "submitted age=[REDACTED] ok\n");
    }
}
