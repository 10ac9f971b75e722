use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

use super::{ConversionRequest, ConversionStrategy, StrategyError};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Drives the native office suite through its automation interface via an
/// external interpreter script. Only usable where that suite is installed,
/// so the capability is gated to Windows hosts that also have the script on
/// disk; the script is shipped with the deployment, never generated at
/// runtime. The script owns opening and quitting the application instance.
pub struct ExcelAutomation {
    interpreter: PathBuf,
    script: PathBuf,
    timeout: Duration,
}

impl ExcelAutomation {
    pub fn new(interpreter: PathBuf, script: PathBuf, timeout: Duration) -> Self {
        Self {
            interpreter,
            script,
            timeout,
        }
    }
}

#[async_trait]
impl ConversionStrategy for ExcelAutomation {
    fn name(&self) -> &'static str {
        "excel-automation"
    }

    fn available(&self) -> bool {
        cfg!(target_os = "windows") && self.script.exists()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, request: &ConversionRequest) -> Result<(), StrategyError> {
        let output = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(&request.source)
            .arg(&request.destination)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(StrategyError::Process {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // The COM export can flush after the interpreter exits, so poll for
        // the file instead of assuming synchronous completion. The pipeline
        // timeout bounds this loop.
        loop {
            if let Ok(meta) = tokio::fs::metadata(&request.destination).await {
                if meta.len() > 0 {
                    return Ok(());
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
