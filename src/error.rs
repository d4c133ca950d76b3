// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of every failure the engine can produce.
///
/// Retry and partial-failure logic match on this instead of on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A heuristic fallback was used instead of canonical resolution
    ClassificationDegraded,
    /// The backend could not fetch metadata or retrieve content
    Extraction,
    /// An extraction failure persisted through every retry attempt of a job
    RetryExhausted,
    /// The caller supplied an unusable tool path or output directory
    ConfigurationInvalid,
    /// Any other runtime fault
    Unexpected,
}

/// Errors raised by the extraction/retrieval backend
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to launch {program}: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Failed { message: String },

    #[error("Backend returned invalid metadata for {url}: {source}")]
    InvalidMetadata {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Lost connection to {program} output: {source}")]
    OutputFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractionError {
    /// Build a failure carrying the backend's own message text
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::LaunchFailed { .. } => FailureKind::ConfigurationInvalid,
            _ => FailureKind::Extraction,
        }
    }
}

/// Errors that can occur while analyzing a URL
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to fetch metadata for {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: ExtractionError,
    },
}

impl AnalysisError {
    /// The backend's message, without the URL decoration
    pub fn backend_message(&self) -> String {
        match self {
            Self::FetchFailed { source, .. } => source.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::FetchFailed { source, .. } => source.kind(),
        }
    }
}

/// Errors that can occur while retrieving a single job
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{source}")]
    RetryExhausted {
        title: String,
        attempts: u32,
        #[source]
        source: ExtractionError,
    },

    /// Failed in a way another attempt cannot fix
    #[error("{source}")]
    Aborted {
        title: String,
        attempts: u32,
        #[source]
        source: ExtractionError,
    },
}

impl DownloadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RetryExhausted { .. } => FailureKind::RetryExhausted,
            Self::Aborted { source, .. } => source.kind(),
        }
    }
}

/// Errors for unusable configuration, raised before any background work starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Tool location does not exist: {0}")]
    ToolNotFound(PathBuf),

    #[error("Output directory does not exist: {0}")]
    OutputDirectoryMissing(PathBuf),

    #[error("Backend program {program} is not usable: {source}")]
    BackendUnavailable {
        program: String,
        #[source]
        source: ExtractionError,
    },

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize logging: {0}")]
    LoggingFailed(String),
}

impl ConfigError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ConfigurationInvalid
    }
}

/// Reasons a background operation refuses to start
#[derive(Error, Debug)]
pub enum StartError {
    #[error("Please enter a URL")]
    EmptyUrl,

    #[error("Nothing selected to download")]
    NothingSelected,

    #[error("No output directory configured")]
    NoOutputDirectory,

    #[error("No compatible video formats; choose audio only or a specific format")]
    NoCompatibleFormats,

    #[error("Format '{0}' is not among the available formats")]
    UnknownFormat(String),

    #[error("Entry {index} is out of range (1-{len})")]
    EntryOutOfRange { index: usize, len: usize },

    #[error("Invalid entry selection '{0}'")]
    InvalidSelection(String),

    #[error("An {0} is already in progress")]
    Busy(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
