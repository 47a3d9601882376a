use std::collections::HashMap;

use super::write_varint;
use crate::error::EmitError;

pub type BlobId = u32;
pub type StringId = u32;
pub type ModuleId = u32;

/// Append-only blob storage. Blob ids are stable for the life of the section.
#[derive(Debug, Clone, Default)]
pub struct DataSection {
    bytes: Vec<u8>,
    // (offset, len) per blob
    spans: Vec<(u32, u32)>,
}

impl DataSection {
    pub fn add_blob(&mut self, blob: &[u8]) -> Result<BlobId, EmitError> {
        let limit = u64::from(u32::MAX);
        let end = self.bytes.len() as u64 + blob.len() as u64;
        if end > limit {
            return Err(EmitError::DataSectionOverflow { limit });
        }
        let id = self.spans.len() as BlobId;
        self.spans.push((self.bytes.len() as u32, blob.len() as u32));
        self.bytes.extend_from_slice(blob);
        Ok(id)
    }

    pub fn blob(&self, id: BlobId) -> Option<&[u8]> {
        let &(offset, len) = self.spans.get(id as usize)?;
        let start = offset as usize;
        self.bytes.get(start..start + len as usize)
    }

    pub fn offset(&self, id: BlobId) -> Option<u32> {
        self.spans.get(id as usize).map(|&(offset, _)| offset)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Total size of all blobs; the offset the next blob will get.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + self.spans.len() * 2 + 4);
        write_varint(&mut out, self.spans.len() as u32);
        for &(offset, len) in &self.spans {
            write_varint(&mut out, len);
            let start = offset as usize;
            out.extend_from_slice(&self.bytes[start..start + len as usize]);
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, StringId>,
}

impl StringTable {
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = self.strings.len() as StringId;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), id);
        id
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, self.strings.len() as u32);
        for s in &self.strings {
            write_varint(&mut out, s.len() as u32);
            out.extend_from_slice(s.as_bytes());
        }
        out
    }
}

/// One serialized WGSL module: its raw code blob and direct dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub blob: BlobId,
    pub deps: Vec<ModuleId>,
}

/// Dependency table consumed by the runtime loader, which resolves and
/// deduplicates shared fragments at load time.
#[derive(Debug, Clone, Default)]
pub struct DependencyTable {
    entries: Vec<DependencyEntry>,
}

impl DependencyTable {
    pub fn add_module_entry(&mut self, blob: BlobId, deps: &[ModuleId]) -> ModuleId {
        let id = self.entries.len() as ModuleId;
        self.entries.push(DependencyEntry {
            blob,
            deps: deps.to_vec(),
        });
        id
    }

    pub fn entry(&self, id: ModuleId) -> Option<&DependencyEntry> {
        self.entries.get(id as usize)
    }

    pub fn entries(&self) -> &[DependencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, self.entries.len() as u32);
        for e in &self.entries {
            write_varint(&mut out, e.blob);
            write_varint(&mut out, e.deps.len() as u32);
            for &d in &e.deps {
                write_varint(&mut out, d);
            }
        }
        out
    }
}
