//! Optional naga parse of resolved shader code.

use std::fmt::Write as _;

use naga::front::wgsl::ParseError;

use crate::emitter::DeclKind;
use crate::error::EmitError;

/// Parse the resolved code stored for declaration `name` of `kind`.
///
/// A parse failure becomes [`EmitError::InvalidWgsl`] whose message names the
/// declaration, gives naga's diagnostic, and lists the resolved source with line
/// numbers, the failing line marked.
pub fn validate_resolved_wgsl(
    kind: DeclKind,
    name: &str,
    source: &str,
) -> Result<naga::Module, EmitError> {
    naga::front::wgsl::parse_str(source).map_err(|e| EmitError::InvalidWgsl {
        name: name.to_string(),
        message: parse_report(kind, name, source, &e),
    })
}

fn parse_report(kind: DeclKind, name: &str, source: &str, error: &ParseError) -> String {
    let failing_line = error.location(source).map(|loc| loc.line_number as usize);

    let mut out = format!("{kind} {name} resolved to invalid WGSL: {}\n", error.message());
    if let Some(line) = failing_line {
        let _ = writeln!(out, "  at line {line}");
    }
    out.push_str("\nResolved WGSL:\n---\n");
    for (idx, text) in source.lines().enumerate() {
        let marker = if Some(idx + 1) == failing_line { '>' } else { ' ' };
        let _ = writeln!(out, "{marker}{:4} | {text}", idx + 1);
    }
    out.push_str("---\n");
    out
}
