//! Shader handle allocation.
//!
//! A handle is only taken once a shader's code is known to be non-empty and has
//! been stored, so handles in the opcode stream always form a gap-free run from 0.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::EmitError;

pub type ShaderHandle = u32;

/// Declaration kind a shader handle was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclKind {
    Wgsl,
    ShaderModule,
}

impl std::fmt::Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclKind::Wgsl => f.write_str("wgsl"),
            DeclKind::ShaderModule => f.write_str("shaderModule"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderState {
    /// Nothing to store; no handle was consumed.
    CodeEmpty,
    Stored(ShaderHandle),
}

#[derive(Clone, Debug, Default)]
pub struct ShaderGate {
    next: ShaderHandle,
    handles: IndexMap<(DeclKind, String), ShaderHandle>,
}

impl ShaderGate {
    /// Store `code` under the next handle.
    ///
    /// `store` receives the handle that will be committed and must write the code
    /// and its `createShaderModule` op. The counter only advances once `store`
    /// succeeds; empty code never reaches `store`.
    pub fn commit<F>(
        &mut self,
        kind: DeclKind,
        name: &str,
        code: &[u8],
        store: F,
    ) -> Result<ShaderState, EmitError>
    where
        F: FnOnce(ShaderHandle) -> Result<(), EmitError>,
    {
        if code.is_empty() {
            return Ok(ShaderState::CodeEmpty);
        }
        let handle = self.next;
        store(handle)?;
        self.next += 1;
        self.handles.insert((kind, name.to_string()), handle);
        Ok(ShaderState::Stored(handle))
    }

    pub fn handle_of(&self, kind: DeclKind, name: &str) -> Option<ShaderHandle> {
        self.handles.get(&(kind, name.to_string())).copied()
    }

    /// Issued handles in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (DeclKind, &str, ShaderHandle)> + '_ {
        self.handles
            .iter()
            .map(|((kind, name), &handle)| (*kind, name.as_str(), handle))
    }

    pub fn count(&self) -> u32 {
        self.next
    }
}
