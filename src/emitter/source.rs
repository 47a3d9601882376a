//! Loading a fragment's raw value: inline source or a file next to the program.

use std::borrow::Cow;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::EmitError;

pub const MAX_SOURCE_FILE_BYTES: usize = 256 * 1024;

/// Only these prefixes mark a path; `//`-leading text is a comment, not a path.
pub fn is_source_path(raw: &str) -> bool {
    raw.starts_with("./") || raw.starts_with("../")
}

/// Return the fragment source for `raw`, reading it from `base_dir` if it is a path.
pub fn load_source<'a>(raw: &'a str, base_dir: &Path) -> Result<Cow<'a, str>, EmitError> {
    if !is_source_path(raw) {
        return Ok(Cow::Borrowed(raw));
    }
    let path = base_dir.join(raw);
    read_bounded(&path).map(Cow::Owned)
}

fn read_bounded(path: &Path) -> Result<String, EmitError> {
    let read_err = |source: std::io::Error| EmitError::FileRead {
        path: path.to_path_buf(),
        source,
    };
    let too_large = |size: u64| EmitError::FileTooLarge {
        path: path.to_path_buf(),
        size,
        limit: MAX_SOURCE_FILE_BYTES,
    };

    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let size = file.metadata().map_err(read_err)?.len();
    if size > MAX_SOURCE_FILE_BYTES as u64 {
        return Err(too_large(size));
    }

    // The file can grow between the metadata call and the read; keep reading until
    // EOF, one byte past the limit at most.
    let mut buf = vec![0u8; MAX_SOURCE_FILE_BYTES + 1];
    let mut filled = 0usize;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        }
    }
    if filled > MAX_SOURCE_FILE_BYTES {
        return Err(too_large(filled as u64));
    }
    buf.truncate(filled);

    String::from_utf8(buf).map_err(|_| EmitError::InvalidUtf8 {
        path: path.to_path_buf(),
    })
}
