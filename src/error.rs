use std::io;
use std::path::PathBuf;

/// Everything that can go wrong between spawning a source and writing a row,
/// and while plotting a finished log.
///
/// While monitoring, only `Config` is fatal to the process. The supervisor
/// logs every other variant and starts a fresh run after the retry delay.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported stream format: {0}")]
    Format(String),

    #[error("failed to read audio stream")]
    Read(#[source] io::Error),

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write wav mirror {}", path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read spectrum log {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} is not a spectrum log: {reason}", path.display())]
    InvalidLog { path: PathBuf, reason: String },

    #[error("failed to write image {}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl MonitorError {
    pub fn write(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn wav(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self::Wav {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn invalid_log(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidLog {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Short discriminator used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Format(_) => "format",
            Self::Read(_) | Self::Input { .. } | Self::Csv { .. } | Self::InvalidLog { .. } => "read",
            Self::Write { .. } | Self::Wav { .. } | Self::Image { .. } => "write",
            Self::Spawn { .. } => "spawn",
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
