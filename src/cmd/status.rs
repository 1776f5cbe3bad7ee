use anyhow::{Context, Result};
use console::style;
use std::fmt::Write;
use std::path::Path;

use triad::orchestrator::{JournalEntry, RunJournal, journal_path, latest_run_id};
use triad::paths::ProjectPaths;
use triad::store::{Record, RecordStore, select_next};

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    let paths = ProjectPaths::new(project_dir);

    println!();
    println!("{}", style("Triad Status").bold());
    println!("============");
    println!();

    if !paths.exists() {
        println!("Project: Not initialized");
        println!();
        println!("Run 'triad init' to initialize the project.");
        println!();
        return Ok(());
    }

    let store = RecordStore::load(&paths.store())
        .with_context(|| format!("Failed to load {}", paths.store().display()))?;
    print!("{}", render(&store));

    if let Some(run_id) = latest_run_id(&paths) {
        let entries = RunJournal::new(journal_path(&paths, &run_id))
            .entries()
            .with_context(|| format!("Failed to read journal of run {run_id}"))?;
        println!();
        println!("{}", render_last_run(&run_id, &entries));
    }
    Ok(())
}

fn render(store: &RecordStore) -> String {
    let mut out = String::new();
    if store.is_empty() {
        let _ = writeln!(out, "No records defined yet.");
        let _ = writeln!(out, "Run 'triad chat' to add some.");
        return out;
    }

    let c = store.counts();
    let _ = writeln!(
        out,
        "Records: {} total  open {}  active {}  pending {}  complete {}",
        c.total(),
        c.open,
        c.active,
        c.pending,
        style(c.complete).green()
    );

    if store.active().is_empty()
        && let Some(next) = select_next(store)
    {
        let _ = writeln!(out, "Next to plan: {}", line(next).trim_start());
    }

    let groups = [
        ("Active", store.active()),
        ("Pending review", store.pending()),
        ("Open", store.open()),
        ("Complete", store.complete()),
    ];
    for (title, mut records) in groups {
        if records.is_empty() {
            continue;
        }
        records.sort_by_key(|r| r.priority);
        let _ = writeln!(out, "\n{} ({})", style(title).bold(), records.len());
        for record in records {
            let _ = writeln!(out, "{}", line(record));
        }
    }
    out
}

fn render_last_run(run_id: &str, entries: &[JournalEntry]) -> String {
    let count = |status: &str| entries.iter().filter(|e| e.status == status).count();
    let iterations = entries.iter().map(|e| e.iteration).max().unwrap_or(0);
    let mut text = format!(
        "Last run: {}  {} iteration(s), {} completed, {} skipped, {} failed",
        style(run_id).dim(),
        iterations,
        count("completed"),
        count("skipped"),
        count("failed")
    );
    if count("fatal") > 0 {
        let _ = write!(text, ", {}", style("aborted").red());
    }
    text
}

fn line(record: &Record) -> String {
    let mut text = format!(
        "  [{}] {}  {}",
        record.priority,
        style(&record.id).cyan(),
        record.description
    );
    if let Some(plan) = &record.active_plan {
        let _ = write!(text, "  {}", style(format!("plan: {plan}")).dim());
    }
    text
}
