use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::{ConversionRequest, ConversionStrategy, StrategyError};

/// Headless LibreOffice conversion.
///
/// soffice derives its output filename from the input basename instead of
/// accepting a destination path, so each attempt converts into a private
/// temp directory, locates whatever was produced there, and renames it to
/// the requested destination. The temp directory lives next to the
/// destination so the rename never crosses filesystems, and it doubles as
/// per-request isolation when conversions overlap.
pub struct SofficeHeadless {
    binary: PathBuf,
    timeout: Duration,
}

impl SofficeHeadless {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl ConversionStrategy for SofficeHeadless {
    fn name(&self) -> &'static str {
        "soffice-headless"
    }

    fn available(&self) -> bool {
        // relative names resolve through PATH at spawn time
        !self.binary.is_absolute() || self.binary.exists()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, request: &ConversionRequest) -> Result<(), StrategyError> {
        let work_dir = match request.destination.parent() {
            Some(parent) => tempfile::tempdir_in(parent)?,
            None => tempfile::tempdir()?,
        };

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(work_dir.path())
            .arg(&request.source)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(StrategyError::Process {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let produced = locate_produced_pdf(work_dir.path(), &request.source)
            .ok_or(StrategyError::MissingOutput)?;
        tokio::fs::rename(&produced, &request.destination).await?;
        Ok(())
    }
}

/// The expected name is `<input stem>.pdf`; if the convention shifts between
/// soffice versions, a lone PDF in the work directory is still accepted.
fn locate_produced_pdf(dir: &Path, source: &Path) -> Option<PathBuf> {
    if let Some(stem) = source.file_stem() {
        let expected = dir.join(stem).with_extension("pdf");
        if expected.exists() {
            return Some(expected);
        }
    }

    let mut pdfs: Vec<_> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "pdf"))
        .collect();
    if pdfs.len() == 1 {
        pdfs.pop()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_pdf_named_after_source_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cert.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("other.pdf"), b"%PDF").unwrap();

        let found = locate_produced_pdf(dir.path(), Path::new("/exports/cert.xlsx")).unwrap();
        assert_eq!(found, dir.path().join("cert.pdf"));
    }

    #[test]
    fn falls_back_to_lone_pdf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("renamed-by-tool.pdf"), b"%PDF").unwrap();

        let found = locate_produced_pdf(dir.path(), Path::new("/exports/cert.xlsx")).unwrap();
        assert_eq!(found, dir.path().join("renamed-by-tool.pdf"));
    }

    #[test]
    fn ambiguous_or_empty_directory_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(locate_produced_pdf(dir.path(), Path::new("cert.xlsx")).is_none());

        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        assert!(locate_produced_pdf(dir.path(), Path::new("cert.xlsx")).is_none());
    }
}
