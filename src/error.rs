use std::path::PathBuf;

/// Input problems that stop a run before any repository is touched.
///
/// Everything that can go wrong *inside* a repository is reported and
/// counted by [`crate::relink`] instead; those errors never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Path '{}' does not exist.", .0.display())]
    PathNotFound(PathBuf),

    #[error("`git` not found in PATH.")]
    GitNotFound,

    #[error("Find string cannot be empty.")]
    EmptyFind,

    #[error("--replace is required in batch mode.")]
    MissingReplace,

    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("Invalid replacement: {0}")]
    InvalidReplacement(String),

    #[error("Prompt error: {0}")]
    Prompt(String),
}
