//! Boot, run and summarize one module.

use std::fmt;
use std::path::{Path, PathBuf};

use glbridge_runtime::graphics::{GraphicsContext, HeadlessContext};
use glbridge_runtime::{Bridge, MainContext, ThreadBoot, ThreadOutcome};
use log::info;
use serde::Serialize;

use crate::config::RunConfig;
use crate::error::RunError;

/// What happened to one spawned thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadReport {
    pub id: u32,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ThreadOutcome> for ThreadReport {
    fn from(outcome: &ThreadOutcome) -> Self {
        let (state, error) = match &outcome.boot {
            ThreadBoot::Finished => ("finished", None),
            ThreadBoot::Failed(err) => ("failed", Some(err.to_string())),
            ThreadBoot::Trapped(err) => ("trapped", Some(err.to_string())),
            ThreadBoot::Panicked(message) => ("panicked", Some(message.clone())),
            ThreadBoot::Uninitialized | ThreadBoot::Instantiated | ThreadBoot::Running => {
                ("unfinished", None)
            }
        };
        ThreadReport {
            id: outcome.id,
            state,
            error,
        }
    }
}

/// Host graphics state left behind by the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphicsReport {
    pub forwarded_calls: usize,
    pub live_buffers: usize,
    pub live_programs: usize,
    pub pending_error: u32,
}

impl GraphicsReport {
    fn capture(context: &mut HeadlessContext) -> Self {
        GraphicsReport {
            forwarded_calls: context.calls().len(),
            live_buffers: context.live_buffers(),
            live_programs: context.live_programs(),
            pending_error: context.get_error(),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub module: PathBuf,
    pub entry: String,
    pub threads: Vec<ThreadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphics: Option<GraphicsReport>,
}

impl RunReport {
    pub fn failed_threads(&self) -> usize {
        self.threads.iter().filter(|t| t.state != "finished").count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: `{}` returned", self.module.display(), self.entry)?;
        for thread in &self.threads {
            match &thread.error {
                Some(error) => writeln!(f, "  thread {}: {} ({error})", thread.id, thread.state)?,
                None => writeln!(f, "  thread {}: {}", thread.id, thread.state)?,
            }
        }
        if let Some(graphics) = &self.graphics {
            writeln!(
                f,
                "  graphics: {} forwarded calls, {} buffers, {} programs live, error {:#x}",
                graphics.forwarded_calls,
                graphics.live_buffers,
                graphics.live_programs,
                graphics.pending_error
            )?;
        }
        Ok(())
    }
}

/// Boot the module, run its entry and join every thread.
pub fn run(module: &Path, config: RunConfig, graphics: bool) -> Result<RunReport, RunError> {
    let bytes = std::fs::read(module).map_err(|source| RunError::Read {
        path: module.to_path_buf(),
        source,
    })?;
    let entry = config.bridge.entry_export.clone();

    let bridge = Bridge::new(config.bridge).map_err(RunError::from_boot)?;
    let context: Option<Box<dyn GraphicsContext>> = if graphics {
        Some(Box::new(config.graphics.build_context()))
    } else {
        None
    };
    let mut main = bridge.load(&bytes, context).map_err(RunError::from_boot)?;
    info!("{} booted, running `{entry}`", module.display());

    let result = main.run();
    // Threads keep running after a trap in the main context; wait for them
    // either way so none outlives the report.
    let threads: Vec<ThreadReport> = main.join_threads().iter().map(ThreadReport::from).collect();
    result.map_err(RunError::from_boot)?;

    let report = RunReport {
        module: module.to_path_buf(),
        entry,
        threads,
        graphics: graphics_report(&mut main),
    };
    match report.failed_threads() {
        0 => Ok(report),
        failed => Err(RunError::ThreadsFailed {
            failed,
            total: report.threads.len(),
        }),
    }
}

fn graphics_report(main: &mut MainContext) -> Option<GraphicsReport> {
    main.graphics_mut::<HeadlessContext>()
        .map(GraphicsReport::capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glbridge_runtime::BootError;

    fn write_module(dir: &tempfile::TempDir, wat: &str) -> PathBuf {
        let path = dir.path().join("module.wat");
        std::fs::write(&path, wat).unwrap();
        path
    }

    #[test]
    fn report_counts_graphics_and_threads() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(
            &dir,
            r#"(module
  (import "env" "memory" (memory 17 17 shared))
  (import "env" "glClear" (func $clear (param i32)))
  (import "env" "glEnable" (func $enable (param i32)))
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (func (export "_start")
    (call $enable (i32.const 0x0B71))
    (call $clear (i32.const 0x4000))
    (drop (call $spawn (i32.const 0))))
  (func (export "wasi_thread_start") (param i32 i32)))"#,
        );

        let report = run(&module, RunConfig::default(), true).unwrap();
        assert_eq!(report.entry, "_start");
        assert_eq!(
            report.threads,
            vec![ThreadReport {
                id: 1,
                state: "finished",
                error: None
            }]
        );
        let graphics = report.graphics.unwrap();
        assert_eq!(graphics.forwarded_calls, 2);
        assert_eq!(graphics.pending_error, 0);
    }

    #[test]
    fn trap_in_entry_is_a_run_error() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(
            &dir,
            r#"(module
  (import "env" "memory" (memory 17 17 shared))
  (func (export "_start") unreachable))"#,
        );

        let err = run(&module, RunConfig::default(), false).unwrap_err();
        assert!(matches!(err, RunError::Trapped(BootError::Trap { .. })));
        assert_eq!(err.exit_code_num(), 1);
    }

    #[test]
    fn failed_thread_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(
            &dir,
            r#"(module
  (import "env" "memory" (memory 17 17 shared))
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (func (export "_start") (drop (call $spawn (i32.const 0)))))"#,
        );

        let err = run(&module, RunConfig::default(), false).unwrap_err();
        assert!(matches!(err, RunError::ThreadsFailed { failed: 1, total: 1 }));
    }

    #[test]
    fn human_report_lists_threads() {
        let report = RunReport {
            module: PathBuf::from("app.wasm"),
            entry: "_start".into(),
            threads: vec![ThreadReport {
                id: 2,
                state: "trapped",
                error: Some("`wasi_thread_start` trapped: unreachable".into()),
            }],
            graphics: None,
        };
        assert_eq!(
            report.to_string(),
            "app.wasm: `_start` returned\n  thread 2: trapped (`wasi_thread_start` trapped: unreachable)\n"
        );
        assert_eq!(report.failed_threads(), 1);
    }
}
