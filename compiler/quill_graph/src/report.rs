//! Rendering `EvalError`s as source diagnostics.
//!
//! The primary label sits in the module the error was raised in: the
//! innermost import edge's target, or the module that was run. Each import
//! edge adds a label at the import statement. The call trace becomes the
//! note and the import chain the help line, since a report holds one of each.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind};
use quill_eval::EvalError;

type SourceSpan = (String, Range<usize>);

/// Render `error`, raised while running `root_id`.
///
/// `source_of` supplies module sources by id; spans in modules it does not
/// know are left unlabelled. Output is plain text without color codes.
pub fn render(
    error: &EvalError,
    root_id: &str,
    source_of: impl Fn(&str) -> Option<String>,
) -> String {
    let origin = error
        .import_trace
        .first()
        .map_or(root_id, |edge| edge.target.as_str());

    let mut files: Vec<(String, String)> = Vec::new();
    let mut known = |id: &str| -> bool {
        if files.iter().any(|(file, _)| file == id) {
            return true;
        }
        match source_of(id) {
            Some(source) => {
                files.push((id.to_string(), source));
                true
            }
            None => false,
        }
    };

    let mut labels: Vec<(SourceSpan, String, Color)> = Vec::new();
    if let Some(span) = error.span {
        if known(origin) {
            labels.push((
                (origin.to_string(), span.to_range()),
                "raised here".to_string(),
                Color::Red,
            ));
        }
    }
    for edge in &error.import_trace {
        let Some(span) = edge.span else { continue };
        if known(&edge.from) {
            labels.push((
                (edge.from.clone(), span.to_range()),
                format!("while importing `{}`", edge.target),
                Color::Blue,
            ));
        }
    }

    let (anchor_id, anchor_offset) = labels
        .first()
        .map_or((root_id.to_string(), 0), |((id, range), _, _)| (id.clone(), range.start));
    let mut report = Report::build(ReportKind::Error, anchor_id, anchor_offset)
        .with_config(Config::default().with_color(false))
        .with_message(error.kind.to_string());
    for (span, message, color) in labels {
        report = report.with_label(Label::new(span).with_message(message).with_color(color));
    }
    if let Some(trace) = &error.call_trace {
        report = report.with_note(trace.to_string().trim_end());
    }
    if !error.import_trace.is_empty() {
        let chain: Vec<String> = error.import_trace.iter().map(ToString::to_string).collect();
        report = report.with_help(format!("import chain: {}", chain.join(", ")));
    }

    let mut out = Vec::new();
    if report.finish().write(ariadne::sources(files), &mut out).is_err() {
        return error.to_string();
    }
    String::from_utf8_lossy(&out).into_owned()
}
