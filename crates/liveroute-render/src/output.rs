use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replaces `path` with `data` via a staging file in the same directory, so
/// a browser reloading the map never sees a truncated artifact.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("cannot create map directory {dir:?}"))?;

    let staging = staging_path(path, dir);
    let staged = File::create(&staging)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .with_context(|| format!("cannot stage {staging:?}"));
    if let Err(err) = staged {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }

    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(err).with_context(|| format!("cannot move {staging:?} into place at {path:?}"));
    }

    // Persist the rename itself; best effort on platforms without dir handles.
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
    Ok(())
}

// Hidden sibling, unique per process and thread.
fn staging_path(path: &Path, dir: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    let thread = format!("{:?}", std::thread::current().id())
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    dir.join(format!(".{name}.{}-{thread}.tmp", std::process::id()))
}
