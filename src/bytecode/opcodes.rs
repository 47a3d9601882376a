use anyhow::{Result, anyhow, bail};

use super::{BlobId, ModuleId, read_varint, write_varint};

pub const OP_CREATE_SHADER_MODULE: u8 = 0x10;
pub const OP_END: u8 = 0xFF;

const SOURCE_BLOB: u8 = 0;
const SOURCE_MODULE: u8 = 1;

/// Where a shader module's code lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderSource {
    /// A data blob holding fully resolved code.
    Blob(BlobId),
    /// A dependency-table entry; the loader resolves its imports.
    Module(ModuleId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    CreateShaderModule { handle: u32, source: ShaderSource },
    End,
}

#[derive(Debug, Clone, Default)]
pub struct OpcodeStream {
    bytes: Vec<u8>,
}

impl OpcodeStream {
    pub fn create_shader_module(&mut self, handle: u32, source: ShaderSource) {
        self.bytes.push(OP_CREATE_SHADER_MODULE);
        write_varint(&mut self.bytes, handle);
        match source {
            ShaderSource::Blob(id) => {
                self.bytes.push(SOURCE_BLOB);
                write_varint(&mut self.bytes, id);
            }
            ShaderSource::Module(id) => {
                self.bytes.push(SOURCE_MODULE);
                write_varint(&mut self.bytes, id);
            }
        }
    }

    pub fn end(&mut self) {
        self.bytes.push(OP_END);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

pub fn decode_instructions(bytes: &[u8]) -> Result<Vec<Instruction>> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let op = bytes[pos];
        pos += 1;
        match op {
            OP_CREATE_SHADER_MODULE => {
                let handle = read_varint(bytes, &mut pos)
                    .ok_or_else(|| anyhow!("truncated shader handle at byte {pos}"))?;
                let tag = *bytes
                    .get(pos)
                    .ok_or_else(|| anyhow!("truncated shader source tag at byte {pos}"))?;
                pos += 1;
                let id = read_varint(bytes, &mut pos)
                    .ok_or_else(|| anyhow!("truncated shader source id at byte {pos}"))?;
                let source = match tag {
                    SOURCE_BLOB => ShaderSource::Blob(id),
                    SOURCE_MODULE => ShaderSource::Module(id),
                    other => bail!("unknown shader source tag {other:#04x}"),
                };
                out.push(Instruction::CreateShaderModule { handle, source });
            }
            OP_END => out.push(Instruction::End),
            other => bail!("unknown opcode {other:#04x} at byte {}", pos - 1),
        }
    }
    Ok(out)
}
