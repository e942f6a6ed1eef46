//! Shared output layer for pretty/text/JSON parity across CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: aligned tables for humans, tab-separated rows for pipes and
//! agents, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format`
//! 2. `--json`
//! 3. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 4. `output` in the user config file
//! 5. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.
//!
//! Steps 2-5 are folded into `EffectiveConfig::resolved_output` by
//! `runway_core::config::resolve_config`.

use clap::ValueEnum;
use runway_core::error::ErrorCode;
use runway_search::SearchError;
use serde::Serialize;
use std::io::{self, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<20} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (tables, sections, visual framing).
    Pretty,
    /// Token-efficient tab-separated text for agents and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    fn from_resolved(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some(Self::Pretty),
            "text" | "table" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolve the output mode from the `--format` flag and the value resolved
/// from config, env and TTY detection.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, resolved: &str) -> OutputMode {
    format_flag
        .or_else(|| OutputMode::from_resolved(resolved))
        .unwrap_or(OutputMode::Text)
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_mode(&mut out, mode, value, text_fn, pretty_fn)
}

/// Render a serializable value; pretty and text share one renderer.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => human_fn(value, &mut out)?,
    }
    Ok(())
}

fn write_mode<T: Serialize>(
    out: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, out)?,
        OutputMode::Pretty => pretty_fn(value, out)?,
    }
    Ok(())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (`E####`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Failure class for search errors (`embedding_failure`, `timeout`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
            kind: None,
        }
    }

    /// Error carrying the code's hint as the suggestion.
    pub fn from_code(code: ErrorCode, detail: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{}: {detail}", code.message()),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
            kind: None,
        }
    }
}

impl From<&SearchError> for CliError {
    fn from(err: &SearchError) -> Self {
        let report = err.report();
        Self {
            message: report.message,
            suggestion: report.hint.map(str::to_string),
            error_code: Some(report.code.to_string()),
            kind: Some(report.kind.as_str().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rendered(f: impl FnOnce(&mut dyn Write) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    // ── resolution ──────────────────────────────────────────────────────────

    #[test]
    fn format_flag_wins_over_resolved_value() {
        assert_eq!(
            resolve_output_mode(Some(OutputMode::Pretty), "json"),
            OutputMode::Pretty
        );
    }

    #[test]
    fn resolved_value_is_case_insensitive() {
        assert_eq!(resolve_output_mode(None, "JSON"), OutputMode::Json);
        assert_eq!(resolve_output_mode(None, "table"), OutputMode::Text);
        assert_eq!(resolve_output_mode(None, "human"), OutputMode::Pretty);
    }

    #[test]
    fn unknown_resolved_value_is_text() {
        assert_eq!(resolve_output_mode(None, "fancy"), OutputMode::Text);
    }

    // ── rendering ───────────────────────────────────────────────────────────

    #[test]
    fn json_mode_writes_pretty_json() {
        #[derive(Serialize)]
        struct Data {
            count: u32,
        }
        let out = rendered(|w| {
            write_mode(w, OutputMode::Json, &Data { count: 3 }, |_, _| Ok(()), |_, _| Ok(()))
        });
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["count"], 3);
    }

    #[test]
    fn text_and_pretty_use_their_own_renderers() {
        let text = rendered(|w| {
            write_mode(
                w,
                OutputMode::Text,
                &1,
                |v, w| writeln!(w, "text {v}"),
                |v, w| writeln!(w, "pretty {v}"),
            )
        });
        assert_eq!(text, "text 1\n");
        let pretty = rendered(|w| {
            write_mode(
                w,
                OutputMode::Pretty,
                &1,
                |v, w| writeln!(w, "text {v}"),
                |v, w| writeln!(w, "pretty {v}"),
            )
        });
        assert_eq!(pretty, "pretty 1\n");
    }

    // ── errors ──────────────────────────────────────────────────────────────

    #[test]
    fn code_error_carries_hint() {
        let err = CliError::from_code(ErrorCode::CatalogNotFound, "/tmp/x.db");
        assert_eq!(err.error_code.as_deref(), Some("E1001"));
        assert!(err.message.contains("/tmp/x.db"));
        assert!(err.suggestion.is_some());
        assert!(err.kind.is_none());
    }

    #[test]
    fn search_error_maps_kind_and_code() {
        let err = CliError::from(&SearchError::Timeout {
            budget: Duration::from_millis(10),
        });
        assert_eq!(err.kind.as_deref(), Some("timeout"));
        assert_eq!(err.error_code.as_deref(), Some("E5001"));
    }

    #[test]
    fn json_error_is_wrapped() {
        let err = CliError::from_code(ErrorCode::InvalidRecord, "line 3");
        let out = rendered(|w| write_error(w, OutputMode::Json, &err));
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["error"]["error_code"], "E2001");
        assert!(value["error"].get("kind").is_none());
    }

    #[test]
    fn human_error_shows_code_and_suggestion() {
        let err = CliError::from_code(ErrorCode::SearchTimeout, "deadline");
        let out = rendered(|w| write_error(w, OutputMode::Text, &err));
        assert!(out.starts_with("error[E5001]: "));
        assert!(out.contains("  suggestion: "));

        let plain = rendered(|w| write_error(w, OutputMode::Pretty, &CliError::new("boom")));
        assert_eq!(plain, "error: boom\n");
    }

    #[test]
    fn pretty_helpers_align() {
        let out = rendered(|w| {
            pretty_section(w, "Catalog")?;
            pretty_kv(w, "airports", "3")?;
            Ok(())
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Catalog");
        assert_eq!(lines[1].len(), PRETTY_RULE_WIDTH);
        assert!(lines[2].starts_with("airports:"));
        assert!(lines[2].ends_with(" 3"));
    }
}
