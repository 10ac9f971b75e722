use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub fn ensure_dirs(
    exports_dir: &PathBuf,
    uploads_dir: &PathBuf,
    templates_dir: &PathBuf,
) -> std::io::Result<()> {
    std::fs::create_dir_all(exports_dir)?;
    std::fs::create_dir_all(uploads_dir)?;
    std::fs::create_dir_all(templates_dir)?;
    Ok(())
}

/// Name for an uploaded signature image. The uuid fragment keeps two uploads
/// in the same millisecond apart.
pub fn signature_filename(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png");
    format!(
        "signature-{}-{}.{}",
        Utc::now().timestamp_millis(),
        &Uuid::new_v4().to_string()[..8],
        ext
    )
}

/// Deletes regular files in `dir` older than `max_age`. Returns how many
/// were removed.
pub fn sweep_stale(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        if meta.modified()? < cutoff && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
