//! Emission pass for WGSL fragments and shader modules.
//!
//! This module is organized into several submodules:
//! - `registry`: module table (name → id, blob, direct deps)
//! - `imports`: import-list extraction from declarations
//! - `scheduler`: dependency-first ordering with cycle drain
//! - `resolve`: transitive-closure flattening and the resolved-code cache
//! - `substitute`: define / math constant substitution
//! - `source`: inline vs file-backed fragment source
//! - `gate`: shader handle allocation
//!
//! The main entry point is `emit_program`.

pub mod gate;
pub mod imports;
pub mod registry;
pub mod resolve;
pub mod scheduler;
pub mod source;
pub mod substitute;

use std::borrow::Cow;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    bytecode::{Artifact, FLAG_RUNTIME_DEDUP, ModuleId, ShaderSource},
    dsl::{DeclNode, ProgramDSL, PropValue},
    error::EmitError,
    validation::validate_resolved_wgsl,
};

pub use gate::{DeclKind, ShaderGate, ShaderHandle, ShaderState};
pub use imports::{ImportList, MAX_IMPORTS, imports_of};
pub use registry::{ModuleEntry, ModuleRegistry};
pub use resolve::{MAX_IMPORT_DEPTH, ResolvedCodeCache, resolve_code, transitive_closure};
pub use scheduler::{Schedule, schedule};
pub use source::{MAX_SOURCE_FILE_BYTES, load_source};
pub use substitute::substitute;

/// What `createShaderModule` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    /// A blob of fully resolved code per shader.
    #[default]
    Legacy,
    /// A dependency-table module; the loader resolves imports at load time.
    Runtime,
}

impl FromStr for EmitMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(EmitMode::Legacy),
            "runtime" => Ok(EmitMode::Runtime),
            other => bail!("unknown emit mode: {other} (supported: legacy, runtime)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmitOptions {
    /// Directory `./` and `../` fragment paths are resolved against.
    pub base_dir: PathBuf,
    pub mode: EmitMode,
    /// Parse every stored shader's resolved code with naga before handing out its handle.
    pub validate_wgsl: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            mode: EmitMode::default(),
            validate_wgsl: false,
        }
    }
}

impl EmitOptions {
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read emit options at {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid emit options json in {}", path.display()))
    }
}

/// Everything one emission pass produced.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub artifact: Artifact,
    pub registry: ModuleRegistry,
    pub resolved: ResolvedCodeCache,
    pub shaders: ShaderGate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    pub kind: DeclKind,
    pub name: String,
    #[serde(rename = "dataOffset")]
    pub data_offset: u32,
    pub deps: Vec<ModuleId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShaderSummary {
    pub handle: ShaderHandle,
    pub kind: DeclKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmitSummary {
    pub mode: EmitMode,
    pub modules: Vec<ModuleSummary>,
    pub shaders: Vec<ShaderSummary>,
    #[serde(rename = "dataBlobs")]
    pub data_blobs: usize,
    pub strings: usize,
}

impl CompiledProgram {
    pub fn resolved_code(&self, fragment: &str) -> Option<Cow<'_, str>> {
        self.resolved.get_str(fragment)
    }

    pub fn shader_handle(&self, kind: DeclKind, name: &str) -> Option<ShaderHandle> {
        self.shaders.handle_of(kind, name)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.artifact.to_bytes()
    }

    pub fn summary(&self) -> EmitSummary {
        let mode = if self.artifact.flags & FLAG_RUNTIME_DEDUP != 0 {
            EmitMode::Runtime
        } else {
            EmitMode::Legacy
        };
        EmitSummary {
            mode,
            modules: self
                .registry
                .entries()
                .iter()
                .map(|e| ModuleSummary {
                    id: e.id,
                    kind: e.kind,
                    name: e.name.clone(),
                    data_offset: e.data_offset,
                    deps: e.deps.clone(),
                })
                .collect(),
            shaders: self
                .shaders
                .iter()
                .map(|(kind, name, handle)| ShaderSummary {
                    handle,
                    kind,
                    name: name.to_string(),
                })
                .collect(),
            data_blobs: self.artifact.data.len(),
            strings: self.artifact.strings.len(),
        }
    }
}

/// Run the emission pass over every `wgsl` fragment and `shaderModule` of `program`.
pub fn emit_program(
    program: &ProgramDSL,
    options: &EmitOptions,
) -> Result<CompiledProgram, EmitError> {
    Emitter::new(program, options).run()
}

/// State owned by one emission pass; dropped (or turned into a
/// `CompiledProgram`) when the pass ends.
struct Emitter<'p> {
    program: &'p ProgramDSL,
    options: &'p EmitOptions,
    defines: IndexMap<String, String>,
    registry: ModuleRegistry,
    resolved: ResolvedCodeCache,
    gate: ShaderGate,
    artifact: Artifact,
}

impl<'p> Emitter<'p> {
    fn new(program: &'p ProgramDSL, options: &'p EmitOptions) -> Self {
        Self {
            program,
            options,
            defines: program.define_values(),
            registry: ModuleRegistry::new(),
            resolved: ResolvedCodeCache::default(),
            gate: ShaderGate::default(),
            artifact: Artifact::default(),
        }
    }

    fn run(mut self) -> Result<CompiledProgram, EmitError> {
        let program = self.program;
        self.emit_wgsl_fragments()?;
        for (name, node) in &program.shader_modules {
            self.emit_shader_module(name, node)?;
        }
        self.artifact.opcodes.end();
        if self.options.mode == EmitMode::Runtime {
            self.artifact.flags |= FLAG_RUNTIME_DEDUP;
        }

        info!(
            fragments = program.wgsl.len(),
            shader_modules = program.shader_modules.len(),
            modules = self.registry.len(),
            shaders = self.gate.count(),
            "emitted shader modules"
        );

        Ok(CompiledProgram {
            artifact: self.artifact,
            registry: self.registry,
            resolved: self.resolved,
            shaders: self.gate,
        })
    }

    fn emit_wgsl_fragments(&mut self) -> Result<(), EmitError> {
        let program = self.program;
        let fragments = &program.wgsl;

        let mut imports = ImportList::new();
        let deps: Vec<Vec<usize>> = fragments
            .values()
            .map(|node| {
                imports_of(node, &mut imports);
                imports
                    .iter()
                    .map(|name| fragments.get_index_of(*name).unwrap_or(usize::MAX))
                    .collect()
            })
            .collect();

        let plan = schedule(&deps);
        for idx in plan.order {
            let Some((name, node)) = fragments.get_index(idx) else {
                continue;
            };
            self.emit_fragment(name, node)?;
        }
        Ok(())
    }

    fn emit_fragment(&mut self, name: &str, node: &DeclNode) -> Result<(), EmitError> {
        let raw = node
            .property("value")
            .and_then(PropValue::as_str)
            .unwrap_or_default();
        let source = load_source(raw, &self.options.base_dir)?;
        let code = substitute(&source, &self.defines)?;
        if code.is_empty() {
            debug!(fragment = name, "empty wgsl fragment; no module or shader handle");
            return Ok(());
        }

        let deps = self.import_ids(name, node);
        let id = self.register_module(DeclKind::Wgsl, name, code.as_bytes(), deps.clone())?;
        let resolved = resolve_code(&self.registry, &self.artifact.data, &deps, code.as_bytes());
        self.resolved.insert(name, resolved.clone());

        self.commit_shader(DeclKind::Wgsl, name, &resolved, Some(id))
    }

    fn emit_shader_module(&mut self, name: &str, node: &DeclNode) -> Result<(), EmitError> {
        let Some(code) = node.property("code") else {
            debug!(shader_module = name, "shader module without code");
            return Ok(());
        };

        if let Some(target) = code.wgsl_reference() {
            let Some(resolved) = self.resolved.get(target).map(<[u8]>::to_vec) else {
                debug!(
                    shader_module = name,
                    fragment = target,
                    "shader module references a fragment with no stored code"
                );
                return Ok(());
            };
            let module = self.registry.id_of(target);
            return self.commit_shader(DeclKind::ShaderModule, name, &resolved, module);
        }

        let raw = code.as_str().unwrap_or_default();
        let source = load_source(raw, &self.options.base_dir)?;
        let own = substitute(&source, &self.defines)?;
        if own.is_empty() {
            debug!(shader_module = name, "empty shader module; no shader handle");
            return Ok(());
        }

        let deps = self.import_ids(name, node);
        let resolved = resolve_code(&self.registry, &self.artifact.data, &deps, own.as_bytes());
        let module = match self.options.mode {
            EmitMode::Runtime => Some(self.register_module(
                DeclKind::ShaderModule,
                name,
                own.as_bytes(),
                deps,
            )?),
            EmitMode::Legacy => None,
        };
        self.commit_shader(DeclKind::ShaderModule, name, &resolved, module)
    }

    /// Module ids for `node`'s imports, first occurrence kept. Imports without a
    /// stored module (undeclared, empty, or not yet emitted in a cycle) are dropped.
    fn import_ids(&self, name: &str, node: &DeclNode) -> Vec<ModuleId> {
        let mut imports = ImportList::new();
        imports_of(node, &mut imports);

        let mut ids = Vec::with_capacity(imports.len());
        for import in imports {
            match self.registry.id_of(import) {
                Some(id) => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                None => debug!(from = name, import, "dropping import with no stored module"),
            }
        }
        ids
    }

    fn register_module(
        &mut self,
        kind: DeclKind,
        name: &str,
        code: &[u8],
        deps: Vec<ModuleId>,
    ) -> Result<ModuleId, EmitError> {
        let blob = self.artifact.data.add_blob(code)?;
        let Some(data_offset) = self.artifact.data.offset(blob) else {
            unreachable!("blob {blob} has no span right after being added");
        };
        let name_id = self.artifact.strings.intern(name);
        let table_id = self.artifact.dependencies.add_module_entry(blob, &deps);
        let id = self
            .registry
            .register(kind, name, name_id, blob, data_offset, deps);
        debug_assert_eq!(id, table_id, "dependency table out of step with registry");
        Ok(id)
    }

    fn commit_shader(
        &mut self,
        kind: DeclKind,
        name: &str,
        resolved: &[u8],
        module: Option<ModuleId>,
    ) -> Result<(), EmitError> {
        if self.options.validate_wgsl && !resolved.is_empty() {
            validate_resolved_wgsl(kind, name, &String::from_utf8_lossy(resolved))?;
        }

        let mode = self.options.mode;
        let data = &mut self.artifact.data;
        let opcodes = &mut self.artifact.opcodes;
        let state = self.gate.commit(kind, name, resolved, |handle| {
            let source = match (mode, module) {
                (EmitMode::Runtime, Some(id)) => ShaderSource::Module(id),
                _ => ShaderSource::Blob(data.add_blob(resolved)?),
            };
            opcodes.create_shader_module(handle, source);
            Ok(())
        })?;

        if state == ShaderState::CodeEmpty {
            debug!(%kind, name, "no code to store; no shader handle");
        }
        Ok(())
    }
}
