// Multi-strategy document conversion with ordered fallback.
//
// Strategies are registered once at startup, most capable first, with the
// guaranteed-success field renderer last. Each attempt is isolated: an error,
// a timeout, or a missing output file is recorded and the next strategy runs.
// A strategy only counts as successful once the destination file exists on
// disk with non-zero size; exit codes are not trusted.
mod automation;
mod fallback;
mod soffice;

pub use automation::ExcelAutomation;
pub use fallback::MinimalRender;
pub use soffice::SofficeHeadless;

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::certificate::CertificateFields;

/// One conversion job. Built per request and discarded with it.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Form data for strategies that re-render instead of converting.
    pub fields: CertificateFields,
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("converter exited with {status}: {stderr}")]
    Process {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("converter produced no output file")]
    MissingOutput,
    #[error("converter produced an empty output file")]
    EmptyOutput,
    #[error("render failed: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Infrastructure failures detected before any strategy runs. Everything
/// that happens after that point is captured per attempt instead.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),
}

#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this host can run the strategy at all. Checked once when the
    /// registry is built, not per request.
    fn available(&self) -> bool {
        true
    }

    /// Upper bound for a single attempt. The pipeline drops the attempt
    /// future when it elapses, which kills any child process spawned with
    /// kill_on_drop.
    fn timeout(&self) -> Duration;

    async fn attempt(&self, request: &ConversionRequest) -> Result<(), StrategyError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub strategy: String,
    /// None when the attempt succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Converted {
        strategy: &'static str,
        output: PathBuf,
    },
    Exhausted,
}

#[derive(Debug)]
pub struct PipelineResult {
    /// Every attempt in order, the successful one included.
    pub attempts: Vec<AttemptRecord>,
    pub outcome: PipelineOutcome,
}

impl PipelineResult {
    pub fn ok(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Converted { .. })
    }
}

pub struct ConversionPipeline {
    strategies: Vec<Box<dyn ConversionStrategy>>,
}

impl ConversionPipeline {
    /// Builds the registry in the given priority order, dropping strategies
    /// this host cannot run.
    pub fn new(strategies: Vec<Box<dyn ConversionStrategy>>) -> Self {
        let strategies: Vec<_> = strategies
            .into_iter()
            .filter(|s| {
                if s.available() {
                    true
                } else {
                    tracing::info!("conversion strategy {} unavailable on this host", s.name());
                    false
                }
            })
            .collect();
        Self { strategies }
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    pub async fn run(&self, request: &ConversionRequest) -> Result<PipelineResult, ConvertError> {
        self.run_with_deadline(request, None).await
    }

    /// Runs strategies in order until one verifiably succeeds. When the
    /// caller deadline expires the current attempt is aborted and the
    /// pipeline reports exhaustion without trying further strategies.
    pub async fn run_with_deadline(
        &self,
        request: &ConversionRequest,
        deadline: Option<Instant>,
    ) -> Result<PipelineResult, ConvertError> {
        if !request.source.exists() {
            return Err(ConvertError::SourceMissing(request.source.clone()));
        }

        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let budget = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        tracing::warn!(
                            strategy = strategy.name(),
                            "conversion deadline reached, giving up"
                        );
                        break;
                    }
                    strategy.timeout().min(remaining)
                }
                None => strategy.timeout(),
            };

            tracing::info!(strategy = strategy.name(), "attempting conversion");
            let attempt = tokio::time::timeout(budget, strategy.attempt(request)).await;

            let diagnostic = match attempt {
                Ok(Ok(())) => verify_output(&request.destination)
                    .err()
                    .map(|e| e.to_string()),
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("timed out after {}s", budget.as_secs())),
            };

            match diagnostic {
                None => {
                    tracing::info!(strategy = strategy.name(), "conversion succeeded");
                    attempts.push(AttemptRecord {
                        strategy: strategy.name().to_string(),
                        diagnostic: None,
                    });
                    return Ok(PipelineResult {
                        attempts,
                        outcome: PipelineOutcome::Converted {
                            strategy: strategy.name(),
                            output: request.destination.clone(),
                        },
                    });
                }
                Some(diag) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        "conversion attempt failed: {}",
                        diag
                    );
                    discard_partial_output(&request.destination);
                    attempts.push(AttemptRecord {
                        strategy: strategy.name().to_string(),
                        diagnostic: Some(diag),
                    });
                    // deadline expiry mid-attempt means no further strategies
                    if matches!(deadline, Some(d) if Instant::now() >= d) {
                        break;
                    }
                }
            }
        }

        Ok(PipelineResult {
            attempts,
            outcome: PipelineOutcome::Exhausted,
        })
    }
}

/// A destination only counts as produced when it exists with non-zero size.
fn verify_output(path: &Path) -> Result<(), StrategyError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(StrategyError::EmptyOutput),
        Err(_) => Err(StrategyError::MissingOutput),
    }
}

/// Failed strategies may leave partial files behind; remove them so a stale
/// artifact is never served as the final document.
fn discard_partial_output(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("could not remove partial output {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Succeeds {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConversionStrategy for Succeeds {
        fn name(&self) -> &'static str {
            self.name
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
        async fn attempt(&self, request: &ConversionRequest) -> Result<(), StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(&request.destination, b"%PDF-1.4")?;
            Ok(())
        }
    }

    struct Fails {
        name: &'static str,
    }

    #[async_trait]
    impl ConversionStrategy for Fails {
        fn name(&self) -> &'static str {
            self.name
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
        async fn attempt(&self, _request: &ConversionRequest) -> Result<(), StrategyError> {
            Err(StrategyError::Render("boom".to_string()))
        }
    }

    struct WritesEmpty;

    #[async_trait]
    impl ConversionStrategy for WritesEmpty {
        fn name(&self) -> &'static str {
            "writes-empty"
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
        async fn attempt(&self, request: &ConversionRequest) -> Result<(), StrategyError> {
            std::fs::write(&request.destination, b"")?;
            Ok(())
        }
    }

    struct Stalls;

    #[async_trait]
    impl ConversionStrategy for Stalls {
        fn name(&self) -> &'static str {
            "stalls"
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }
        async fn attempt(&self, _request: &ConversionRequest) -> Result<(), StrategyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl ConversionStrategy for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }
        fn available(&self) -> bool {
            false
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
        async fn attempt(&self, _request: &ConversionRequest) -> Result<(), StrategyError> {
            unreachable!("never registered")
        }
    }

    fn request_in(dir: &tempfile::TempDir) -> ConversionRequest {
        let source = dir.path().join("cert.xlsx");
        std::fs::write(&source, b"workbook").unwrap();
        ConversionRequest {
            source,
            destination: dir.path().join("cert.pdf"),
            fields: CertificateFields {
                mode: "EN 53".to_string(),
                serial_no: "SN-1".to_string(),
                tested_date: "2026-08-01".to_string(),
                year: "2026".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let pipeline = ConversionPipeline::new(vec![
            Box::new(Succeeds { name: "one", calls: first.clone() }),
            Box::new(Succeeds { name: "two", calls: second.clone() }),
        ]);

        let result = pipeline.run(&request_in(&dir)).await.unwrap();

        assert!(result.ok());
        assert!(matches!(
            result.outcome,
            PipelineOutcome::Converted { strategy: "one", .. }
        ));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn kth_success_records_k_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = ConversionPipeline::new(vec![
            Box::new(Fails { name: "one" }),
            Box::new(Fails { name: "two" }),
            Box::new(Succeeds { name: "three", calls }),
        ]);

        let result = pipeline.run(&request_in(&dir)).await.unwrap();

        assert!(matches!(
            result.outcome,
            PipelineOutcome::Converted { strategy: "three", .. }
        ));
        assert_eq!(result.attempts.len(), 3);
        assert!(result.attempts[0].diagnostic.is_some());
        assert!(result.attempts[1].diagnostic.is_some());
        assert!(result.attempts[2].diagnostic.is_none());
    }

    #[tokio::test]
    async fn exhaustion_keeps_source_and_removes_partials() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ConversionPipeline::new(vec![
            Box::new(Fails { name: "one" }),
            Box::new(WritesEmpty),
        ]);
        let request = request_in(&dir);

        let result = pipeline.run(&request).await.unwrap();

        assert!(!result.ok());
        assert_eq!(result.attempts.len(), pipeline.strategy_count());
        assert!(request.source.exists(), "intermediate artifact must survive");
        assert!(!request.destination.exists(), "partial output must be removed");
    }

    #[tokio::test]
    async fn empty_output_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ConversionPipeline::new(vec![Box::new(WritesEmpty)]);

        let result = pipeline.run(&request_in(&dir)).await.unwrap();

        assert!(!result.ok());
        assert!(result.attempts[0]
            .diagnostic
            .as_deref()
            .unwrap()
            .contains("empty"));
    }

    #[tokio::test]
    async fn timeout_is_recorded_and_next_strategy_runs() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = ConversionPipeline::new(vec![
            Box::new(Stalls),
            Box::new(Succeeds { name: "rescue", calls: calls.clone() }),
        ]);

        let result = pipeline.run(&request_in(&dir)).await.unwrap();

        assert!(result.attempts[0]
            .diagnostic
            .as_deref()
            .unwrap()
            .contains("timed out"));
        assert!(matches!(
            result.outcome,
            PipelineOutcome::Converted { strategy: "rescue", .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_source_fails_before_any_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = ConversionPipeline::new(vec![Box::new(Succeeds {
            name: "one",
            calls: calls.clone(),
        })]);
        let request = ConversionRequest {
            source: dir.path().join("does-not-exist.xlsx"),
            destination: dir.path().join("cert.pdf"),
            fields: request_in(&dir).fields,
        };

        let err = pipeline.run(&request).await.unwrap_err();

        assert!(matches!(err, ConvertError::SourceMissing(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unavailable_strategies_are_never_registered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = ConversionPipeline::new(vec![
            Box::new(Unavailable),
            Box::new(Succeeds { name: "one", calls }),
        ]);
        assert_eq!(pipeline.strategy_count(), 1);
    }

    #[tokio::test]
    async fn expired_deadline_moves_to_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = ConversionPipeline::new(vec![
            Box::new(Stalls),
            Box::new(Succeeds { name: "late", calls: calls.clone() }),
        ]);
        let deadline = Instant::now() + Duration::from_millis(20);

        let result = pipeline
            .run_with_deadline(&request_in(&dir), Some(deadline))
            .await
            .unwrap();

        assert!(!result.ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "deadline skips later strategies");
    }
}
