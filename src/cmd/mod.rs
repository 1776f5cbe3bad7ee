//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `init`   | `Init`           |
//! | `status` | `Status`         |
//! | `run`    | `Run`            |
//! | `chat`   | `Chat`           |
//! | `config` | `Config`         |

pub mod chat;
pub mod config;
pub mod init;
pub mod run;
pub mod status;

pub use chat::cmd_chat;
pub use config::cmd_config;
pub use init::cmd_init;
pub use run::cmd_run;
pub use status::cmd_status;

use anyhow::Result;
use std::path::Path;
use triad::paths::ProjectPaths;

/// Paths for an initialized project, or an error pointing at `triad init`.
pub(crate) fn initialized_paths(project_dir: &Path) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(project_dir);
    if !paths.exists() {
        anyhow::bail!(
            "No .triad/ directory in {}. Run 'triad init' first.",
            project_dir.display()
        );
    }
    Ok(paths)
}

/// Load and validate `triad.toml`.
pub(crate) fn load_config(paths: &ProjectPaths) -> Result<triad::config::TriadToml> {
    let config = triad::config::TriadToml::load_or_default(paths)?;
    config.validate()?;
    Ok(config)
}
