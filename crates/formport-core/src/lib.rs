pub mod analysis;
pub mod backend;
pub mod cancel;
pub mod config;
pub mod deploy;
pub mod discover;
pub mod error;
pub mod io;
pub mod lock;
pub mod manifest;
pub mod merge;
pub mod orchestrator;
pub mod paths;
pub mod prompt;
pub mod prompter;
pub mod rollback;
pub mod scanner;
pub mod step;
pub mod types;

pub use error::{ConvertError, Result};
