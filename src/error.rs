//! Crate-wide error type.
//!
//! One flat `thiserror` enum covers every error kind from the error
//! handling design: each kind is printed as a single line and terminates
//! the current command (see [`crate::cli`]).

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, FatModError>;

#[derive(Debug, thiserror::Error)]
pub enum FatModError {
    #[error("could not open disk image {path}: {source}")]
    IoOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read/write at offset {offset}: expected {expected} bytes, got {actual}")]
    IoShort {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("I/O error: {0}")]
    IoWrite(#[from] std::io::Error),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid arguments. Please enter -h for help")]
    InvalidArguments,

    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("offset exceeds current file size")]
    InvalidOffset,

    #[error("File not found!")]
    NotFound,

    #[error("File already exists!")]
    AlreadyExists,

    #[error("directory is full")]
    DirectoryFull,

    #[error("no free cluster available")]
    NoSpace,

    #[error("corrupt FAT chain: {0}")]
    BadChain(String),
}
