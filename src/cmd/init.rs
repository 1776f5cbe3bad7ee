use anyhow::Result;
use console::style;
use std::path::Path;

use triad::init::init_project;
use triad::ui::icons::{CHECK, SPARKLE};

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "{}Initialized {}",
            SPARKLE,
            style(result.triad_dir.display()).bold()
        );
    } else {
        println!(
            "{}{} already exists; missing files were restored",
            CHECK,
            style(result.triad_dir.display()).bold()
        );
    }
    println!();
    println!("Next steps:");
    println!("  triad chat     add requirement records and map the codebase");
    println!("  triad status   see records by status");
    println!("  triad run 5    run up to five planner → builder → reviewer iterations");
    println!();
    println!(
        "Guidance for each phase lives in {}",
        style(".triad/prompts/*.md").dim()
    );
    Ok(())
}
