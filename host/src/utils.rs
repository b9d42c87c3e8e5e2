use anyhow::{anyhow, Context, Result};
use guardian_email_core::RawEmail;
use log::{debug, warn};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

/// Extension of the raw messages picked up from an email directory.
pub const EMAIL_EXTENSION: &str = "eml";

pub fn read_email_file(path: &Path) -> Result<RawEmail> {
    let mut file = File::open(path).map_err(|e| anyhow!("Failed to open email file: {}", e))?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|e| anyhow!("Failed to read email contents: {}", e))?;
    Ok(RawEmail::from_bytes(&contents))
}

/// `.eml` files directly under `dir`, sorted by file name.
///
/// A missing or unreadable directory is the one condition that stops a run.
pub fn list_email_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Email directory {} not found", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == EMAIL_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    debug!("Found {} email files in {}", files.len(), dir.display());
    Ok(files)
}

/// Reads each file as it is pulled. Unreadable files are logged and skipped.
pub fn load_emails(files: Vec<PathBuf>) -> impl Iterator<Item = (String, RawEmail)> {
    files.into_iter().filter_map(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match read_email_file(&path) {
            Ok(email) => Some((name, email)),
            Err(e) => {
                warn!("{}: {}", name, e);
                None
            }
        }
    })
}

/// Writes `value` as indented JSON, creating parent directories.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    Ok(())
}
