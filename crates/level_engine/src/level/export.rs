use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::atomic_io::write_text_atomic;
use crate::codec::{encode_level_string, EncodeError};
use crate::config::SourceLayout;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to write level file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Encodes `body` and writes it as the per-level file for `level_id` under
/// `root`. Returns the written path.
pub fn write_level_file(
    root: &Path,
    layout: &SourceLayout,
    level_id: i64,
    body: &str,
) -> Result<PathBuf, ExportError> {
    let path = root.join(layout.level_file(level_id));
    let encoded = encode_level_string(body)?;
    write_text_atomic(&path, &encoded).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;

    info!(
        level_id,
        path = %path.display(),
        body_len = body.len(),
        encoded_len = encoded.len(),
        "level_file_written"
    );
    Ok(path)
}
