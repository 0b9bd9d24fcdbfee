//! Per-analysis diagnostics: stage timings, decision points, warnings.

use serde::Serialize;

/// Diagnostic record accumulated while an analysis runs. Advisory only;
/// nothing in the core branches on it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    pub stages: Vec<StageTrace>,
    pub warnings: Vec<String>,
}

/// One pipeline stage: elapsed wall time plus free-form notes.
#[derive(Debug, Clone, Serialize)]
pub struct StageTrace {
    pub stage: &'static str,
    pub elapsed_ms: f64,
    pub notes: Vec<String>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed stage.
    pub fn stage(&mut self, stage: &'static str, elapsed: std::time::Duration, notes: Vec<String>) {
        self.stages.push(StageTrace {
            stage,
            elapsed_ms: elapsed.as_secs_f64() * 1e3,
            notes,
        });
    }

    /// Record a recoverable problem. Also emitted through `tracing`.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn note(&mut self, stage: &'static str, note: impl Into<String>) {
        let note = note.into();
        match self.stages.iter_mut().rev().find(|s| s.stage == stage) {
            Some(entry) => entry.notes.push(note),
            None => self.stages.push(StageTrace {
                stage,
                elapsed_ms: 0.0,
                notes: vec![note],
            }),
        }
    }
}
