pub mod ai;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod extract;
pub mod input;
pub mod prompts;
pub mod render;
pub mod request;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::{ChatBackend, Content, FragmentStream, GeminiClient, GenerateRequest};
pub use camera::{CameraCapture, CameraDevice, CapturedImage, CommandCamera, VideoStream};
pub use config::Config;
pub use controller::{forward_turn, Connector, SessionController, SessionEvent};
pub use error::{
    CommunicationError, ConfigError, DeviceError, Error, ExtractionError, Result, SessionError,
    ValidationError,
};
pub use export::{build_docx, export_to_file, ExportError, EXPORT_FILE_NAME};
pub use extract::{extract, Extracted, MediaKind, SelectedFile};
pub use input::{
    prepare_turn, AcquisitionState, InputAcquisition, InputMode, PrepareError, PreparedTurn,
    StagedInput,
};
pub use request::{InlineImage, Part, TurnRequest};
pub use session::ConversationSession;
pub use state::{ChatMessage, ChatRole, MessageLog, ViewState};
