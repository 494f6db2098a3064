use std::path::PathBuf;
use std::process::ExitCode;

use glbridge_runtime::BootError;

/// All errors produced by glbridge-run.
///
/// Infrastructure errors (exit code 2) mean the module never ran; run
/// errors (exit code 1) mean it ran and something inside it failed.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    // Infrastructure errors (exit code 2)
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{0}")]
    Boot(BootError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Run errors (exit code 1)
    #[error("{0}")]
    Trapped(BootError),

    #[error("{failed} of {total} threads did not finish")]
    ThreadsFailed { failed: usize, total: usize },
}

impl RunError {
    /// Classify a boot or run failure by whether the entry ever ran.
    pub fn from_boot(err: BootError) -> Self {
        if err.is_boot_failure() {
            RunError::Boot(err)
        } else {
            RunError::Trapped(err)
        }
    }

    pub fn exit_code_num(&self) -> u8 {
        match self {
            RunError::Read { .. }
            | RunError::Config { .. }
            | RunError::Boot(_)
            | RunError::Json(_) => 2,
            RunError::Trapped(_) | RunError::ThreadsFailed { .. } => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_code_num())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_failures_are_infrastructure_errors() {
        let err = RunError::from_boot(BootError::Link("unknown import".into()));
        assert!(matches!(err, RunError::Boot(_)));
        assert_eq!(err.exit_code_num(), 2);
    }

    #[test]
    fn traps_are_run_errors() {
        let err = RunError::from_boot(BootError::Trap {
            export: "_start".into(),
            message: "unreachable".into(),
            bridge: None,
        });
        assert!(matches!(err, RunError::Trapped(_)));
        assert_eq!(err.exit_code_num(), 1);
        assert_eq!(
            RunError::ThreadsFailed { failed: 1, total: 3 }.to_string(),
            "1 of 3 threads did not finish"
        );
    }
}
