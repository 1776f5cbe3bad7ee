pub mod budget;
pub mod config;
pub mod errors;
pub mod init;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod phases;
pub mod prompts;
pub mod signals;
pub mod store;
pub mod stream;
pub mod ui;
