//! Phase engine: one phase turn at a time, and the multi-iteration loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::lock::RunLock;
use super::state::{IdleTracker, IterationSnapshot, RunJournal};
use super::{AgentInvoker, Invocation};
use crate::config::TriadToml;
use crate::errors::{PhaseError, RunError, StoreError};
use crate::paths::ProjectPaths;
use crate::phases::{Phase, PhaseResult, PhaseSummary, builder, planner, reviewer};
use crate::prompts::{self, BuiltinPrompts, PromptRenderer};
use crate::store::{RecordStore, StatusCounts};
use crate::ui::{NullReporter, Reporter};

const JOURNAL_FILE: &str = "state";

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing left Open, Active or Pending.
    AllComplete,
    IterationLimit,
    Idle { consecutive: u32 },
}

/// A phase that failed without ending the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseFailure {
    pub iteration: u32,
    pub phase: Phase,
    pub message: String,
}

/// Everything one iteration produced.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub results: Vec<PhaseResult>,
    pub failures: Vec<PhaseFailure>,
    pub snapshot: IterationSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub iterations: Vec<IterationRecord>,
    pub stop: StopReason,
    pub final_counts: StatusCounts,
}

impl RunSummary {
    /// Phase failures across all iterations.
    pub fn errors(&self) -> Vec<&PhaseFailure> {
        self.iterations.iter().flat_map(|i| &i.failures).collect()
    }
}

pub struct Engine {
    paths: ProjectPaths,
    config: TriadToml,
    invoker: Arc<dyn AgentInvoker>,
    renderer: Arc<dyn PromptRenderer>,
    reporter: Arc<dyn Reporter>,
}

impl Engine {
    pub fn new(paths: ProjectPaths, config: TriadToml, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self {
            paths,
            config,
            invoker,
            renderer: Arc::new(BuiltinPrompts),
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn load_store(&self) -> Result<RecordStore, StoreError> {
        RecordStore::load(&self.paths.store())
    }

    pub fn save_store(&self, store: &RecordStore) -> Result<(), StoreError> {
        store.save(&self.paths.store())
    }

    /// Run one phase turn without writing invocation logs.
    pub async fn run_iteration(
        &self,
        phase: Phase,
        iteration: u32,
    ) -> Result<PhaseResult, PhaseError> {
        self.run_phase(phase, iteration, None).await
    }

    async fn run_phase(
        &self,
        phase: Phase,
        iteration: u32,
        log_dir: Option<&Path>,
    ) -> Result<PhaseResult, PhaseError> {
        let outcome = self.execute(phase, iteration, log_dir).await;
        match &outcome {
            Ok(result) if result.was_skipped() => {
                if let PhaseSummary::Skipped { reason } = &result.summary {
                    tracing::info!(phase = %phase, reason = %reason, "phase skipped");
                    self.reporter.phase_skipped(phase, reason);
                }
            }
            Ok(result) => {
                tracing::info!(
                    phase = %phase,
                    signals = result.signals.len(),
                    tokens = result.usage.total_tokens(),
                    "phase finished"
                );
                self.reporter.phase_finished(result);
            }
            Err(e) => {
                tracing::warn!(phase = %phase, error = %e, "phase failed");
                self.reporter.phase_failed(phase, e);
            }
        }
        outcome
    }

    async fn execute(
        &self,
        phase: Phase,
        iteration: u32,
        log_dir: Option<&Path>,
    ) -> Result<PhaseResult, PhaseError> {
        let store = self.load_store()?;
        if let Some(reason) = skip_reason(phase, &store) {
            return Ok(PhaseResult::skipped(phase, reason));
        }

        let settings = self.config.phase_settings(phase);
        let Some(data) = prompts::gather(
            phase,
            &self.paths,
            &store,
            settings.progress_lines,
            iteration,
        ) else {
            return Ok(PhaseResult::skipped(phase, "no active record"));
        };
        let target = builder::target(&store);

        let prompt = self.renderer.render(&data);
        if prompt.trim().is_empty() {
            return Err(PhaseError::EmptyPrompt { phase });
        }

        self.reporter.phase_started(phase);
        let invocation = Invocation {
            phase,
            iteration,
            prompt,
            model: settings.model,
            max_tokens: settings.max_tokens,
            allowed_tools: settings.allowed_tools,
            context_files: self.config.context_files(&self.paths),
            workdir: self.paths.root().to_path_buf(),
            log_dir: log_dir.map(Path::to_path_buf),
        };
        let outcome = self
            .invoker
            .invoke(&invocation, self.reporter.as_ref())
            .await
            .map_err(|source| PhaseError::Invocation { phase, source })?;
        self.reporter
            .usage(phase, &outcome.usage, invocation.max_tokens);

        // The agent may have edited the store on disk while it ran.
        let before = self.load_store()?;
        let mut store = before.clone();
        let (summary, ignored) = match phase {
            Phase::Planner => {
                let (s, ignored) = planner::apply(&mut store, &outcome.signals, &self.paths);
                (PhaseSummary::Planner(s), ignored)
            }
            Phase::Builder => {
                let id = target.unwrap_or_default();
                let (s, ignored) = builder::apply(&mut store, &outcome.signals, &id);
                (PhaseSummary::Builder(s), ignored)
            }
            Phase::Reviewer => {
                let (s, ignored) = reviewer::apply(&mut store, &outcome.signals, &self.paths);
                (PhaseSummary::Reviewer(s), ignored)
            }
            Phase::Chat => (
                PhaseSummary::Skipped {
                    reason: "chat has no loop signals".to_string(),
                },
                Vec::new(),
            ),
        };
        if store != before {
            self.save_store(&store)?;
        }

        Ok(PhaseResult {
            phase,
            summary,
            signals: outcome.signals,
            usage: outcome.usage,
            ignored,
        })
    }

    /// Run up to `iterations` planner → builder → reviewer rounds.
    ///
    /// Phase failures are recorded and the round continues; store failures
    /// end the run.
    pub async fn run_loop(&self, iterations: u32) -> Result<RunSummary, RunError> {
        let run_id = new_run_id();
        let _lock = RunLock::acquire(&self.paths.lock_file(), &run_id)?;

        let log_dir = run_log_dir(&self.paths, &run_id);
        std::fs::create_dir_all(&log_dir).map_err(|source| RunError::LogDir {
            path: log_dir.clone(),
            source,
        })?;
        let journal = RunJournal::new(journal_path(&self.paths, &run_id));

        tracing::info!(run_id = %run_id, iterations, "starting run");
        self.reporter.run_started(&run_id, iterations);

        let mut idle = IdleTracker::new(self.config.defaults.max_idle_iterations);
        let mut records = Vec::new();
        let mut stop = StopReason::IterationLimit;

        for iteration in 1..=iterations {
            if !has_work(&self.load_store()?) {
                stop = StopReason::AllComplete;
                break;
            }
            self.reporter.iteration_started(iteration, iterations);

            let record = self.run_round(iteration, &log_dir, &journal).await?;
            let stop_idle = idle.observe(&record.snapshot);
            if record.snapshot.is_idle() {
                tracing::info!(
                    iteration,
                    consecutive = idle.consecutive(),
                    "iteration produced no progress"
                );
                self.reporter.idle(idle.consecutive(), idle.limit());
            }
            records.push(record);

            if stop_idle {
                stop = StopReason::Idle {
                    consecutive: idle.consecutive(),
                };
                break;
            }
        }

        let final_store = self.load_store()?;
        if stop == StopReason::IterationLimit && !has_work(&final_store) {
            stop = StopReason::AllComplete;
        }

        let summary = RunSummary {
            run_id,
            iterations: records,
            stop,
            final_counts: final_store.counts(),
        };
        tracing::info!(stop = ?summary.stop, "run finished");
        self.reporter.run_finished(&summary);
        Ok(summary)
    }

    async fn run_round(
        &self,
        iteration: u32,
        log_dir: &Path,
        journal: &RunJournal,
    ) -> Result<IterationRecord, RunError> {
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for phase in Phase::LOOP {
            match self.run_phase(phase, iteration, Some(log_dir)).await {
                Ok(result) => {
                    let status = if result.was_skipped() {
                        "skipped"
                    } else {
                        "completed"
                    };
                    journal.record(iteration, phase, status);
                    results.push(result);
                }
                Err(PhaseError::Store(e)) => {
                    journal.record(iteration, phase, "fatal");
                    return Err(e.into());
                }
                Err(e) => {
                    journal.record(iteration, phase, "failed");
                    failures.push(PhaseFailure {
                        iteration,
                        phase,
                        message: e.to_string(),
                    });
                }
            }
        }

        let counts = self.load_store()?.counts();
        let kinds = results
            .iter()
            .flat_map(|r: &PhaseResult| r.signals.iter().map(|s| s.kind));
        let snapshot = IterationSnapshot::capture(counts, kinds);

        Ok(IterationRecord {
            iteration,
            results,
            failures,
            snapshot,
        })
    }
}

fn skip_reason(phase: Phase, store: &RecordStore) -> Option<String> {
    match phase {
        Phase::Planner => planner::skip_reason(store),
        Phase::Builder => builder::skip_reason(store),
        Phase::Reviewer => reviewer::skip_reason(store),
        Phase::Chat => Some("chat runs interactively".to_string()),
    }
}

fn has_work(store: &RecordStore) -> bool {
    let c = store.counts();
    c.open + c.active + c.pending > 0
}

fn new_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S"),
        &id[..8]
    )
}

/// Directory holding a run's logs.
pub fn run_log_dir(paths: &ProjectPaths, run_id: &str) -> PathBuf {
    paths.logs_dir().join(run_id)
}

/// Phase journal of a run.
pub fn journal_path(paths: &ProjectPaths, run_id: &str) -> PathBuf {
    run_log_dir(paths, run_id).join(JOURNAL_FILE)
}

/// The most recent run that left a log directory. Run ids sort by start time.
pub fn latest_run_id(paths: &ProjectPaths) -> Option<String> {
    std::fs::read_dir(paths.logs_dir())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .max()
}
