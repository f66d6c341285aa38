//! Error types for ctsgen-core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while generating descriptions and plans.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Filesystem access failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A build variable was requested that the make file does not define
    #[error("variable {name} is not defined in {path}")]
    MissingVariable { name: String, path: PathBuf },

    /// No element with the requested tag exists in the document
    #[error("no <{element}> element in {path}")]
    MissingElement { element: String, path: PathBuf },

    /// The element exists but lacks the requested attribute
    #[error("<{element}> in {path} has no attribute {attribute}")]
    MissingAttribute {
        element: String,
        attribute: String,
        path: PathBuf,
    },

    /// Malformed XML
    #[error("XML error in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    /// The generator output could not be read back as a description
    #[error("description {path} could not be parsed (generator exit code {exit_code:?}): {message}")]
    DescriptionParse {
        path: PathBuf,
        exit_code: Option<i32>,
        message: String,
    },

    /// Plan rule pattern is not a valid regular expression
    #[error("invalid plan pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Generator command has no executable
    #[error("description generator command is empty")]
    EmptyCommand,

    /// Generator process could not be started
    #[error("failed to start {program}: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Generator process ran longer than allowed
    #[error("description generator timed out after {timeout_secs} seconds")]
    ToolTimeout { timeout_secs: u64 },

    /// Source tree walk failed
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Description listing failed
    #[error("glob error: {0}")]
    Glob(String),

    /// A generation task panicked or was cancelled
    #[error("generation task aborted: {0}")]
    TaskAborted(String),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn xml(path: impl Into<PathBuf>, source: impl Into<quick_xml::Error>) -> Self {
        BuildError::Xml {
            path: path.into(),
            source: source.into(),
        }
    }
}

impl From<glob::PatternError> for BuildError {
    fn from(err: glob::PatternError) -> Self {
        BuildError::Glob(err.to_string())
    }
}

impl From<glob::GlobError> for BuildError {
    fn from(err: glob::GlobError) -> Self {
        BuildError::Glob(err.to_string())
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, BuildError>;
