//! Textual substitution of user defines and built-in math constants.
//!
//! Matching is by whole identifier. Text inside string literals is left alone, and
//! an identifier followed by `:` is a declaration (`const PI: f32 = ...`) rather
//! than a use, so it is left alone too.

use indexmap::IndexMap;
use tracing::warn;

use crate::error::EmitError;

pub const MAX_SUBSTITUTION_PASSES: usize = 16;
pub const MAX_SUBSTITUTION_BYTES: usize = 1 << 20;

/// Horizontal whitespace allowed between an identifier and a declaring `:`.
const MAX_DECL_GAP: usize = 16;

/// Built-in constants, longest name first.
pub const MATH_CONSTANTS: &[(&str, &str)] = &[
    ("TAU", "6.283185307179586"),
    ("PI", "3.141592653589793"),
    ("E", "2.718281828459045"),
];

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn math_constant(word: &str) -> Option<&'static str> {
    MATH_CONSTANTS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, value)| *value)
}

fn is_declaration(bytes: &[u8], ident_end: usize) -> bool {
    let mut i = ident_end;
    let limit = (ident_end + MAX_DECL_GAP).min(bytes.len());
    while i < limit && matches!(bytes[i], b' ' | b'\t') {
        i += 1;
    }
    bytes.get(i) == Some(&b':')
}

/// Substitute until a pass makes no change, or [`MAX_SUBSTITUTION_PASSES`] passes ran.
///
/// Not converging (usually a define that refers to itself) is tolerated and the
/// last result is returned. Exceeding [`MAX_SUBSTITUTION_BYTES`] is an error.
pub fn substitute(code: &str, defines: &IndexMap<String, String>) -> Result<String, EmitError> {
    let mut current = code.to_string();
    for _ in 0..MAX_SUBSTITUTION_PASSES {
        match substitute_once(&current, defines)? {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
    warn!(
        passes = MAX_SUBSTITUTION_PASSES,
        "define substitution did not converge; a define probably refers to itself"
    );
    Ok(current)
}

/// One left-to-right scan. Returns `None` when nothing was replaced.
fn substitute_once(
    code: &str,
    defines: &IndexMap<String, String>,
) -> Result<Option<String>, EmitError> {
    let overflow = EmitError::SubstitutionOverflow {
        limit: MAX_SUBSTITUTION_BYTES,
    };
    if code.len() > MAX_SUBSTITUTION_BYTES {
        return Err(overflow);
    }

    let bytes = code.as_bytes();
    let mut out = String::new();
    let mut copied = 0usize;
    let mut in_string = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && bytes.get(i + 1) == Some(&b'"') {
            in_string = !in_string;
            i += 2;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            i += 1;
            continue;
        }
        if in_string || !is_ident_byte(b) {
            i += 1;
            continue;
        }

        // Consume the whole identifier (or number) run so matches never start mid-word.
        let start = i;
        while i < bytes.len() && is_ident_byte(bytes[i]) {
            i += 1;
        }
        if b.is_ascii_digit() {
            continue;
        }
        let word = &code[start..i];
        let replacement = match defines.get(word) {
            Some(v) => v.as_str(),
            None => match math_constant(word) {
                Some(v) => v,
                None => continue,
            },
        };
        if is_declaration(bytes, i) {
            continue;
        }

        out.push_str(&code[copied..start]);
        out.push_str(replacement);
        copied = i;
        if out.len() > MAX_SUBSTITUTION_BYTES {
            return Err(overflow);
        }
    }

    if copied == 0 {
        return Ok(None);
    }
    out.push_str(&code[copied..]);
    if out.len() > MAX_SUBSTITUTION_BYTES {
        return Err(overflow);
    }
    if out == code {
        return Ok(None);
    }
    Ok(Some(out))
}
