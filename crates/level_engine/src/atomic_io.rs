use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Writes `bytes` next to `path` first and renames the result into place, so
/// readers see either the old file or the complete new one.
pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging_path = staging_path_for(path);
    if let Err(error) = write_and_sync(&staging_path, bytes) {
        let _ = fs::remove_file(&staging_path);
        return Err(error);
    }
    swap_into_place(&staging_path, path)
}

pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    write_bytes_atomic(path, text.as_bytes())
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn swap_into_place(staging_path: &Path, final_path: &Path) -> io::Result<()> {
    // rename does not overwrite on every platform
    match fs::remove_file(final_path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(staging_path);
            return Err(error);
        }
    }

    fs::rename(staging_path, final_path).inspect_err(|_| {
        let _ = fs::remove_file(staging_path);
    })
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("level");
    let staging_name = format!(".{file_name}.{}.partial", process::id());
    match path.parent() {
        Some(parent) => parent.join(staging_name),
        None => PathBuf::from(staging_name),
    }
}
