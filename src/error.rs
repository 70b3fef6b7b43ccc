use std::path::PathBuf;
use thiserror::Error;

/// Conditions callers need to tell apart from ordinary I/O or index failures.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("start and rows must be non-negative (start={start}, rows={rows})")]
    InvalidPage { start: i64, rows: i64 },
    #[error("no index at {0:?}")]
    IndexMissing(PathBuf),
    #[error("timed out waiting for rebuild of {0:?}")]
    RebuildTimeout(PathBuf),
}
