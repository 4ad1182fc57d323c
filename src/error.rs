use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RepackError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("error while remapping class file {path}: {source}")]
    ClassRemap {
        path: String,
        source: ClassFormatError,
    },

    #[error("could not add {entry} from {input}: {source}")]
    Entry {
        entry: String,
        input: PathBuf,
        source: Box<RepackError>,
    },

    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid {file}: {reason}")]
    InvalidConfig { file: PathBuf, reason: String },

    #[error("input not found: {0}")]
    InputNotFound(PathBuf),
}

impl RepackError {
    /// Attaches the originating entry and input archive to an error.
    pub fn in_entry(self, entry: &str, input: &std::path::Path) -> Self {
        match self {
            // already carries its own location
            e @ RepackError::Entry { .. } => e,
            other => RepackError::Entry {
                entry: entry.to_string(),
                input: input.to_path_buf(),
                source: Box::new(other),
            },
        }
    }
}

/// Structural defects found while parsing or re-serializing a class file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassFormatError {
    #[error("unexpected end of class data at offset {0}")]
    Truncated(usize),

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstant { tag: u8, index: u16 },

    #[error("constant pool index {index} is not a {expected}")]
    BadConstant { index: u16, expected: &'static str },

    #[error("malformed type descriptor or signature: {0}")]
    BadSignature(String),

    #[error("{0} trailing bytes after class data")]
    TrailingBytes(usize),

    #[error("attribute {name} is malformed")]
    BadAttribute { name: String },

    #[error("constant pool would exceed 65535 entries")]
    PoolOverflow,

    #[error("{what} too long to encode ({len} bytes)")]
    TooLong { what: &'static str, len: usize },
}
