//! Output sections of a PNGB artifact.
//!
//! - `opcodes`: the command stream and its encoder/decoder
//! - `sections`: data blobs, string table, and the WGSL dependency table
//! - `Artifact`: the container that stitches the sections together

pub mod opcodes;
pub mod sections;

pub use opcodes::{Instruction, OpcodeStream, ShaderSource, decode_instructions};
pub use sections::{BlobId, DataSection, DependencyTable, ModuleId, StringId, StringTable};

pub const MAGIC: &[u8; 4] = b"PNGB";
pub const FORMAT_VERSION: u16 = 1;

/// Set when shader modules reference dependency-table entries instead of
/// pre-resolved blobs.
pub const FLAG_RUNTIME_DEDUP: u16 = 1 << 0;

/// Fixed-size header: magic, version, flags, four section lengths.
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4 * 4;

/// Append a LEB128-encoded unsigned integer.
pub fn write_varint(out: &mut Vec<u8>, mut v: u32) {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Read a LEB128-encoded unsigned integer starting at `*pos`.
///
/// Returns `None` on truncation, or when the encoding runs past five bytes or
/// carries bits beyond `u32::MAX`.
pub fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        if shift >= 32 {
            return None;
        }
        // Only the low 4 payload bits of the fifth byte fit in a u32.
        if shift == 28 && byte & 0x70 != 0 {
            return None;
        }
        result |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Artifact {
    pub strings: StringTable,
    pub data: DataSection,
    pub dependencies: DependencyTable,
    pub opcodes: OpcodeStream,
    pub flags: u16,
}

impl Artifact {
    pub fn to_bytes(&self) -> Vec<u8> {
        let strings = self.strings.to_bytes();
        let data = self.data.to_bytes();
        let deps = self.dependencies.to_bytes();
        let ops = self.opcodes.as_bytes();

        let mut out = Vec::with_capacity(
            HEADER_LEN + strings.len() + data.len() + deps.len() + ops.len(),
        );
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        for section in [strings.as_slice(), data.as_slice(), deps.as_slice(), ops] {
            out.extend_from_slice(&(section.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(&strings);
        out.extend_from_slice(&data);
        out.extend_from_slice(&deps);
        out.extend_from_slice(ops);
        out
    }
}
