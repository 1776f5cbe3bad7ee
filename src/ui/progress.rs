use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::Reporter;
use super::icons::{
    BAILOUT, BLOCKER, BUILDER, CHECK, CROSS, LOOP, PLANNER, REVIEWER, SKIP, SPARKLE, TARGET,
    TOKENS, WARN,
};
use crate::budget::TokenUsage;
use crate::errors::PhaseError;
use crate::orchestrator::{RunSummary, StopReason};
use crate::phases::{Phase, PhaseResult, PhaseSummary};
use crate::stream::tool_emoji;

/// Terminal reporter: a spinner for the running phase plus printed lines for
/// tool use, verdicts and summaries.
///
/// In verbose mode agent text snippets are printed as well.
pub struct ConsoleReporter {
    spinner: ProgressBar,
    verbose: bool,
    current_iter: AtomicU32,
    max_iter: AtomicU32,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(spinner_style);

        Self {
            spinner,
            verbose,
            current_iter: AtomicU32::new(0),
            max_iter: AtomicU32::new(0),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.spinner.is_hidden() {
            eprintln!("{}", msg.as_ref());
        } else {
            self.spinner.println(msg.as_ref());
        }
    }

    fn status(&self, msg: impl Into<String>) {
        let iter = self.current_iter.load(Ordering::SeqCst);
        let max = self.max_iter.load(Ordering::SeqCst);
        self.spinner.set_message(format!(
            "{}/{} {}",
            style(iter).cyan(),
            max,
            msg.into()
        ));
    }

    fn phase_icon(phase: Phase) -> String {
        match phase {
            Phase::Planner => PLANNER.to_string(),
            Phase::Builder => BUILDER.to_string(),
            Phase::Reviewer => REVIEWER.to_string(),
            Phase::Chat => String::new(),
        }
    }

    fn describe(result: &PhaseResult) -> Vec<String> {
        let mut lines = Vec::new();
        match &result.summary {
            PhaseSummary::Skipped { reason } => lines.push(format!("skipped: {reason}")),
            PhaseSummary::Planner(s) => {
                if let Some(id) = &s.planned {
                    lines.push(format!(
                        "{}planned {} ({})",
                        TARGET,
                        style(id).bold(),
                        s.plan_path.as_deref().unwrap_or("no plan path")
                    ));
                }
                if let Some(reason) = &s.skip_reason {
                    lines.push(format!("{}nothing planned: {reason}", SKIP));
                }
            }
            PhaseSummary::Builder(s) => {
                if s.completed {
                    lines.push(format!(
                        "{}{} ready for review",
                        CHECK,
                        style(&s.record_id).bold()
                    ));
                } else if s.bailout.is_none() && s.blocked.is_none() {
                    lines.push(format!("{} still in progress", s.record_id));
                }
            }
            PhaseSummary::Reviewer(s) => {
                for id in &s.verified {
                    lines.push(format!("{}verified {}", CHECK, style(id).green()));
                }
                for (id, reason) in &s.rejected {
                    lines.push(format!("{}rejected {}: {reason}", CROSS, style(id).red()));
                }
                for id in &s.plan_updated {
                    lines.push(format!("plan updated for {id}"));
                }
                for id in &s.loop_risk {
                    lines.push(format!("{}loop risk: {}", LOOP, style(id).yellow()));
                }
                for phase in &s.prompt_updated {
                    lines.push(format!("{phase} guidance updated"));
                }
            }
        }
        if let Some(reason) = result.bailout() {
            lines.push(format!("{}bailout: {}", BAILOUT, style(reason).yellow()));
        }
        let blocked = match &result.summary {
            PhaseSummary::Planner(s) => s.blocked.as_deref(),
            PhaseSummary::Builder(s) => s.blocked.as_deref(),
            PhaseSummary::Reviewer(s) => s.blocked.as_deref(),
            PhaseSummary::Skipped { .. } => None,
        };
        if let Some(reason) = blocked {
            lines.push(format!("{}blocked: {}", BLOCKER, style(reason).red()));
        }
        for ignored in &result.ignored {
            lines.push(format!(
                "{}ignored {}: {}",
                WARN,
                ignored.signal,
                style(&ignored.reason).dim()
            ));
        }
        lines
    }
}

impl Reporter for ConsoleReporter {
    fn run_started(&self, run_id: &str, iterations: u32) {
        self.max_iter.store(iterations, Ordering::SeqCst);
        self.print_line(format!(
            "{}Run {} ({} iterations)",
            SPARKLE,
            style(run_id).dim(),
            iterations
        ));
    }

    fn iteration_started(&self, iteration: u32, total: u32) {
        self.current_iter.store(iteration, Ordering::SeqCst);
        self.max_iter.store(total, Ordering::SeqCst);
        self.print_line(format!(
            "\n{} {}/{}",
            style("Iteration").bold(),
            style(iteration).cyan(),
            total
        ));
    }

    fn phase_started(&self, phase: Phase) {
        self.spinner.set_prefix(phase.name());
        self.status(style(phase.purpose()).dim().to_string());
        self.spinner.enable_steady_tick(Duration::from_millis(100));
        self.print_line(format!(
            "  {}{}",
            Self::phase_icon(phase),
            style(phase.name()).bold()
        ));
    }

    fn phase_skipped(&self, phase: Phase, reason: &str) {
        self.print_line(format!(
            "  {}{} skipped: {}",
            SKIP,
            phase.name(),
            style(reason).dim()
        ));
    }

    fn phase_finished(&self, result: &PhaseResult) {
        self.spinner.disable_steady_tick();
        self.spinner.set_message("");
        for line in Self::describe(result) {
            self.print_line(format!("    {line}"));
        }
    }

    fn phase_failed(&self, phase: Phase, error: &PhaseError) {
        self.spinner.disable_steady_tick();
        self.print_line(format!(
            "  {}{} failed: {}",
            CROSS,
            phase.name(),
            style(error).red()
        ));
    }

    fn tool_use(&self, name: &str, description: &str) {
        let emoji = tool_emoji(name);
        self.status(format!("{} {}", emoji, style(description).yellow()));
        self.print_line(format!("    {} {}", emoji, style(description).yellow()));
    }

    fn text(&self, snippet: &str) {
        self.status(style(format!("💭 {snippet}")).dim().to_string());
        if self.verbose {
            self.print_line(format!("    {} {}", style("💭").dim(), style(snippet).dim()));
        }
    }

    fn working_on(&self, record_id: &str) {
        self.print_line(format!("    {}working on {}", TARGET, style(record_id).bold()));
    }

    fn usage(&self, phase: Phase, usage: &TokenUsage, ceiling: u64) {
        self.print_line(format!(
            "    {}{} tokens: {} / {} (in {}, out {}, cache {})",
            TOKENS,
            phase.name(),
            style(usage.total_tokens()).cyan(),
            ceiling,
            usage.input_tokens,
            usage.output_tokens,
            usage.cache_read_tokens
        ));
    }

    fn idle(&self, consecutive: u32, limit: u32) {
        self.print_line(format!(
            "  {}no productive signals ({}/{} idle iterations)",
            WARN, consecutive, limit
        ));
    }

    fn run_finished(&self, summary: &RunSummary) {
        self.spinner.finish_and_clear();
        let reason = match summary.stop {
            StopReason::AllComplete => style("all records complete".to_string()).green(),
            StopReason::IterationLimit => {
                style(format!("{} iterations done", summary.iterations.len())).cyan()
            }
            StopReason::Idle { consecutive } => {
                style(format!("stopped after {consecutive} idle iterations")).yellow()
            }
        };
        let c = summary.final_counts;
        self.print_line(format!(
            "\n{} {}\n  open {}  active {}  pending {}  complete {}",
            style("Finished:").bold(),
            reason,
            c.open,
            c.active,
            c.pending,
            style(c.complete).green()
        ));
        if !summary.errors().is_empty() {
            self.print_line(format!(
                "  {}{} phase error(s)",
                CROSS,
                summary.errors().len()
            ));
        }
    }
}
