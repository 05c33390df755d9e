//! Ariadne-based diagnostic rendering for semantic errors.
//!
//! HULK diagnostics are line-granular: the label covers the whole source
//! line an error was reported on. When no source text is available, or the
//! error sits on a synthetic line, a plain two-line form is produced
//! instead. JSON mode emits one object per diagnostic on a single line.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use hulk_common::LineIndex;

use crate::error::TypeError;

/// Options controlling diagnostic output format.
#[derive(Clone, Debug)]
pub struct DiagnosticOptions {
    /// Colorized terminal output.
    pub color: bool,
    /// One JSON object per diagnostic instead of human-readable text.
    pub json: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            color: true,
            json: false,
        }
    }
}

impl DiagnosticOptions {
    /// Plain text without ANSI escapes. Used by tests and non-tty output.
    pub fn colorless() -> Self {
        Self {
            color: false,
            json: false,
        }
    }

    pub fn json_mode() -> Self {
        Self {
            color: false,
            json: true,
        }
    }
}

// ── Error Codes ────────────────────────────────────────────────────────

/// Assign a unique error code to each TypeError variant.
pub fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::Undefined { .. } => "E0001",
        TypeError::AlreadyDefined { .. } => "E0002",
        TypeError::ArityMismatch { .. } => "E0003",
        TypeError::ArgumentMismatch { .. } => "E0004",
        TypeError::OperatorMismatch { .. } => "E0005",
        TypeError::DeclaredInferred { .. } => "E0006",
        TypeError::ReassignMismatch { .. } => "E0007",
        TypeError::ConflictingUsage { .. } => "E0008",
        TypeError::CircularInheritance { .. } => "E0009",
        TypeError::CircularTypeReference { .. } => "E0010",
        TypeError::InvalidParent { .. } => "E0011",
        TypeError::PrivateAttribute { .. } => "E0012",
        TypeError::MissingMember { .. } => "E0013",
        TypeError::IllegalKeyword { .. } => "E0014",
        TypeError::Uninferable { .. } => "E0015",
        TypeError::VoidInitializer { .. } => "E0016",
        TypeError::ConditionNotBoolean { .. } => "E0017",
        TypeError::InvalidOverride { .. } => "E0018",
        TypeError::InvalidCast { .. } => "E0019",
        TypeError::InvalidInstantiation { .. } => "E0020",
    }
}

// ── Labels and Hints ───────────────────────────────────────────────────

fn label_text(err: &TypeError) -> String {
    match err {
        TypeError::Undefined { name, .. } => format!("'{}' used here", name),
        TypeError::AlreadyDefined { .. } => "redeclared here".to_string(),
        TypeError::ArityMismatch { expected, .. } => format!("expected {} argument(s)", expected),
        TypeError::ArgumentMismatch { expected, found, .. } => {
            format!("expected {}, found {}", expected, found)
        }
        TypeError::OperatorMismatch { op, .. } => format!("no rule for '{}' here", op),
        TypeError::DeclaredInferred { declared, .. } => format!("expected {}", declared),
        TypeError::ReassignMismatch { initialized, .. } => format!("expected {}", initialized),
        TypeError::ConflictingUsage { first, second, .. } => {
            format!("used as {} and {}", first, second)
        }
        TypeError::CircularInheritance { .. } | TypeError::CircularTypeReference { .. } => {
            "cycle closes here".to_string()
        }
        TypeError::InvalidParent { parent, .. } => format!("'{}' cannot be inherited", parent),
        TypeError::PrivateAttribute { .. } => "accessed outside its type".to_string(),
        TypeError::MissingMember { member, .. } => format!("'{}' not found", member),
        TypeError::IllegalKeyword { keyword, .. } => format!("'{}' not allowed here", keyword),
        TypeError::Uninferable { .. } => "type unknown".to_string(),
        TypeError::VoidInitializer { .. } => "initializer has type Void".to_string(),
        TypeError::ConditionNotBoolean { found, .. } => format!("found {}", found),
        TypeError::InvalidOverride { .. } => "signature differs from parent".to_string(),
        TypeError::InvalidCast { to, .. } => format!("not a descendant cast to {}", to),
        TypeError::InvalidInstantiation { .. } => "built-in type".to_string(),
    }
}

/// Suggested fix, when one is obvious.
fn help_text(err: &TypeError) -> Option<&'static str> {
    match err {
        TypeError::Uninferable { .. } => Some("add a type annotation"),
        TypeError::PrivateAttribute { .. } => Some("attributes are only reachable through 'self'; add a getter method"),
        TypeError::InvalidOverride { .. } => {
            Some("an override must keep the parent's parameter and return types")
        }
        TypeError::CircularInheritance { .. } => Some("break the cycle by changing one parent"),
        TypeError::InvalidParent { .. } => {
            Some("only user-defined types and Object can be inherited")
        }
        _ => None,
    }
}

// ── Main Rendering Function ────────────────────────────────────────────

/// Render a semantic error into a diagnostic string.
///
/// `source` is the original program text, if the caller has it. The
/// returned string ends with a newline in text modes and has none in JSON
/// mode.
pub fn render_diagnostic(
    error: &TypeError,
    source: Option<&str>,
    filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let code = error_code(error);
    let msg = error.to_string();
    let line = error.line();

    let index = source.map(LineIndex::new);
    let range = index.as_ref().and_then(|idx| idx.line_range(line));

    if options.json {
        let spans = match &range {
            Some(r) => serde_json::json!([{
                "start": r.start,
                "end": r.end,
                "label": label_text(error),
            }]),
            None => serde_json::json!([]),
        };
        let json = serde_json::json!({
            "code": code,
            "severity": "error",
            "message": msg,
            "file": filename,
            "line": line.0,
            "spans": spans,
            "help": help_text(error),
        });
        return json.to_string();
    }

    let (Some(source), Some(range)) = (source, range) else {
        let mut out = format!("error[{}]: {}\n", code, msg);
        if line.is_synthetic() {
            out.push_str(&format!("  --> {}\n", filename));
        } else {
            out.push_str(&format!("  --> {}:{}\n", filename, line));
        }
        if let Some(help) = help_text(error) {
            out.push_str(&format!("  = help: {}\n", help));
        }
        return out;
    };

    let source_len = source.len();
    // Clamp a range to be valid within source bounds.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        // Ensure non-empty span for ariadne (it needs at least 1-char span).
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };
    let span = clamp(range);

    let config = Config::default().with_color(options.color);
    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(code)
        .with_message(&msg)
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(label_text(error))
                .with_color(Color::Red),
        );
    if let Some(help) = help_text(error) {
        builder.set_help(help);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    report
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}
