use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sentinel prefix for string-literal references to a `wgsl` fragment.
pub const WGSL_REF_PREFIX: &str = "$wgsl.";

/// An analyzed program as handed over by the semantic analyzer.
///
/// Every declaration map keeps declaration order; the emission pass relies on it
/// for deterministic output.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProgramDSL {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub defines: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub wgsl: IndexMap<String, DeclNode>,
    #[serde(default, rename = "shaderModules")]
    pub shader_modules: IndexMap<String, DeclNode>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

/// Property bag of a single declaration.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct DeclNode {
    pub props: IndexMap<String, PropValue>,
}

/// A pre-validated property value.
///
/// Bare identifiers are spelled `{"ident": "name"}` in JSON so they stay
/// distinguishable from string literals.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PropValue {
    Ident { ident: String },
    Str(String),
    Number(f64),
    Bool(bool),
    List(Vec<PropValue>),
}

impl PropValue {
    pub fn ident(name: impl Into<String>) -> Self {
        PropValue::Ident { ident: name.into() }
    }

    pub fn string(s: impl Into<String>) -> Self {
        PropValue::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Name of the `wgsl` fragment this value refers to, if it is a reference.
    ///
    /// Accepts a bare identifier or a `"$wgsl.<name>"` string literal.
    pub fn wgsl_reference(&self) -> Option<&str> {
        match self {
            PropValue::Ident { ident } => Some(ident.as_str()),
            PropValue::Str(s) => s
                .strip_prefix(WGSL_REF_PREFIX)
                .filter(|name| !name.is_empty()),
            _ => None,
        }
    }
}

impl DeclNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: PropValue) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }
}

impl ProgramDSL {
    /// Define values as substitution text.
    ///
    /// Strings are taken verbatim, numbers and booleans use their JSON spelling.
    /// Non-scalar values have no textual form and are skipped.
    pub fn define_values(&self) -> IndexMap<String, String> {
        self.defines
            .iter()
            .filter_map(|(name, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((name.clone(), text))
            })
            .collect()
    }
}

pub fn load_program_from_path(path: impl AsRef<std::path::Path>) -> Result<ProgramDSL> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read program json at {}", path.display()))?;
    parse_program(&text).with_context(|| format!("in {}", path.display()))
}

pub fn parse_program(text: &str) -> Result<ProgramDSL> {
    serde_json::from_str(text).context("failed to parse program json")
}
