use std::collections::HashMap;

use super::gate::DeclKind;
use crate::bytecode::{BlobId, ModuleId, StringId};

/// Durable record of one emitted fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleEntry {
    pub id: ModuleId,
    /// `Wgsl` for fragments, `ShaderModule` for inline shader modules.
    pub kind: DeclKind,
    pub name: String,
    pub name_id: StringId,
    pub blob: BlobId,
    /// Offset of the raw (substituted) code in the data section.
    pub data_offset: u32,
    /// Direct dependencies; every id here is smaller than `id`.
    pub deps: Vec<ModuleId>,
}

/// Module table for one emission pass. Entries are never removed or mutated.
///
/// Names are scoped by declaration kind, so a fragment and a shader module may
/// share a name. Imports only ever see fragments.
#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
    by_name: HashMap<(DeclKind, String), ModuleId>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module and return its id (the current entry count).
    ///
    /// Registering a name twice, or depending on an id that does not exist yet,
    /// is a bug in the caller.
    pub fn register(
        &mut self,
        kind: DeclKind,
        name: &str,
        name_id: StringId,
        blob: BlobId,
        data_offset: u32,
        deps: Vec<ModuleId>,
    ) -> ModuleId {
        let key = (kind, name.to_string());
        assert!(
            !self.by_name.contains_key(&key),
            "{kind} module {name} registered twice"
        );
        let id = self.entries.len() as ModuleId;
        assert!(
            deps.iter().all(|&d| d < id),
            "module {name} depends on an unregistered module id"
        );
        self.by_name.insert(key, id);
        self.entries.push(ModuleEntry {
            id,
            kind,
            name: name.to_string(),
            name_id,
            blob,
            data_offset,
            deps,
        });
        id
    }

    /// Module id of the `wgsl` fragment `name`.
    pub fn id_of(&self, name: &str) -> Option<ModuleId> {
        self.lookup(DeclKind::Wgsl, name)
    }

    pub fn lookup(&self, kind: DeclKind, name: &str) -> Option<ModuleId> {
        self.by_name.get(&(kind, name.to_string())).copied()
    }

    pub fn entry(&self, id: ModuleId) -> Option<&ModuleEntry> {
        self.entries.get(id as usize)
    }

    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
