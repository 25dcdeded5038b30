//! Error taxonomy shared by every component.
//!
//! Each variant's `Display` text is what ends up in front of the user, so
//! messages are phrased for a reader, not for a log.

/// Missing or unusable configuration. Fatal: blocks the whole application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No API key in the environment or the config file.
    #[error("no API key configured: set GEMINI_API_KEY (or API_KEY) and restart")]
    MissingCredential,

    /// The config file exists but could not be read or parsed.
    #[error("invalid config file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    /// The platform has no config directory.
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Local input problems, shown as a dismissible banner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid file type ({0}). Please choose a .docx, .pdf or image file.")]
    UnsupportedFileType(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No content to analyze.")]
    EmptyContent,

    #[error("Nothing is ready to submit yet.")]
    NotReady,

    #[error("An analysis is already in progress.")]
    Busy,
}

/// Failures while turning a staged file into request content. Aborts only the
/// current submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not read the PDF file. It may be corrupt or password-protected.")]
    UnreadablePdf,

    #[error("Could not read the Word document: {0}")]
    UnreadableDocx(String),

    #[error("Error reading file: {0}")]
    Read(String),
}

/// Camera unavailable or denied. Closes the camera view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Cannot access the camera ({0}). Check that the device exists and you have permission to use it.")]
    Unavailable(String),

    #[error("The camera stopped before a photo could be taken.")]
    StreamEnded,

    #[error("Camera read failed: {0}")]
    Io(String),
}

/// Network or backend failure during a turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommunicationError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// A turn could not be started on the conversation session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a turn is already in flight on this session")]
    TurnInFlight,

    #[error("no active conversation session")]
    NoSession,
}

/// Crate-level error for callers that do not care which component failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Communication(#[from] CommunicationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
