//! The analysis workflow: input acquisition, the conversation session, and the
//! message log, driven from a single control task.
//!
//! Anything that suspends (extraction, the model stream, the camera) runs in a
//! spawned task that only produces [`SessionEvent`]s. Every event carries the
//! generation it was started under; [`SessionController::new_task`] bumps the
//! generation so events from the abandoned work are dropped unapplied.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::ai::{ChatBackend, FragmentStream};
use crate::camera::{CameraCapture, CameraDevice, CapturedImage};
use crate::config::Config;
use crate::error::{CommunicationError, ConfigError, DeviceError, Error, SessionError, ValidationError};
use crate::export::{self, ExportError};
use crate::input::{self, InputAcquisition, InputMode, PrepareError, PreparedTurn};
use crate::prompts::SYSTEM_INSTRUCTION;
use crate::request::TurnRequest;
use crate::session::ConversationSession;
use crate::state::{ChatRole, MessageLog, ViewState};

/// Builds the backend for a fresh session.
pub type Connector = Arc<dyn Fn() -> Result<Arc<dyn ChatBackend>, ConfigError> + Send + Sync>;

pub const ANALYZING_STATUS: &str = "Analyzing...";

#[derive(Debug)]
pub enum SessionEvent {
    Prepared {
        generation: u64,
        result: Result<PreparedTurn, PrepareError>,
    },
    Fragment {
        generation: u64,
        text: String,
    },
    Done {
        generation: u64,
    },
    Failed {
        generation: u64,
        error: CommunicationError,
    },
    CameraOpened {
        generation: u64,
        result: Result<CameraCapture, DeviceError>,
    },
    PhotoTaken {
        generation: u64,
        result: Result<CapturedImage, DeviceError>,
    },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::Prepared { generation, .. }
            | SessionEvent::Fragment { generation, .. }
            | SessionEvent::Done { generation }
            | SessionEvent::Failed { generation, .. }
            | SessionEvent::CameraOpened { generation, .. }
            | SessionEvent::PhotoTaken { generation, .. } => *generation,
        }
    }
}

/// Pump a turn's fragments into the event channel, tagged with `generation`.
pub async fn forward_turn(
    mut stream: FragmentStream,
    generation: u64,
    events: UnboundedSender<SessionEvent>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => {
                if events.send(SessionEvent::Fragment { generation, text }).is_err() {
                    return;
                }
            }
            Err(error) => {
                let _ = events.send(SessionEvent::Failed { generation, error });
                return;
            }
        }
    }
    let _ = events.send(SessionEvent::Done { generation });
}

pub struct SessionController {
    config: Config,
    connector: Connector,
    camera_device: Arc<dyn CameraDevice>,
    session: Option<ConversationSession>,
    fatal: Option<ConfigError>,
    view: ViewState,
    log: MessageLog,
    input: InputAcquisition,
    camera: Option<CameraCapture>,
    /// Owns the capture while a photo is being taken.
    photo_task: Option<JoinHandle<()>>,
    generation: u64,
    ai_loading: bool,
    status: Option<String>,
    turn_task: Option<JoinHandle<()>>,
    events: UnboundedSender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        config: Config,
        connector: Connector,
        camera_device: Arc<dyn CameraDevice>,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let mut controller = Self {
            config,
            connector,
            camera_device,
            session: None,
            fatal: None,
            view: ViewState::Initial,
            log: MessageLog::new(),
            input: InputAcquisition::new(),
            camera: None,
            photo_task: None,
            generation: 0,
            ai_loading: false,
            status: None,
            turn_task: None,
            events,
        };
        controller.init_session();
        controller
    }

    fn init_session(&mut self) {
        match (self.connector)() {
            Ok(backend) => {
                self.session = Some(ConversationSession::new(
                    backend,
                    SYSTEM_INSTRUCTION,
                    self.config.model(),
                ));
                self.fatal = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "conversation session unavailable");
                self.session = None;
                self.fatal = Some(e);
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set when the session could not be created. Blocks the whole UI.
    pub fn fatal_error(&self) -> Option<&ConfigError> {
        self.fatal.as_ref()
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(ConversationSession::id)
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn input(&self) -> &InputAcquisition {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputAcquisition {
        &mut self.input
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ai_loading(&self) -> bool {
        self.ai_loading
    }

    /// True while anything is between submit and the end of its stream.
    pub fn is_busy(&self) -> bool {
        self.ai_loading || self.input.is_submitting()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_camera_active(&self) -> bool {
        self.camera.is_some()
    }

    pub fn switch_mode(&mut self, mode: InputMode) {
        self.input.switch_mode(mode);
        if mode != InputMode::Camera {
            self.release_camera();
        }
    }

    /// Submit the active mode's staged input as the first turn.
    pub fn submit(&mut self) -> Result<(), ValidationError> {
        if self.fatal.is_some() || self.session.is_none() {
            return Err(ValidationError::NotReady);
        }
        if self.ai_loading {
            return Err(ValidationError::Busy);
        }
        let staged = self.input.begin_submit()?;
        self.status = Some(staged.progress_message().to_string());
        tracing::info!(source = staged.source_name(), "submission accepted");

        let generation = self.generation;
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = input::prepare_turn(staged).await;
            let _ = events.send(SessionEvent::Prepared { generation, result });
        });
        Ok(())
    }

    /// Send a typed follow-up question in the current conversation.
    pub fn submit_follow_up(&mut self, text: &str) -> Result<(), Error> {
        let question = text.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        if self.is_busy() {
            return Err(ValidationError::Busy.into());
        }
        self.start_turn(question.to_string(), TurnRequest::text(question))?;
        Ok(())
    }

    fn start_turn(&mut self, label: String, request: TurnRequest) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let stream = session.send_turn(request)?;

        // the placeholder must exist before any fragment can be applied
        self.log.push_user(label);
        self.log.begin_model_turn();
        self.view = ViewState::Conversation;
        self.ai_loading = true;
        self.status = Some(ANALYZING_STATUS.to_string());

        let generation = self.generation;
        let events = self.events.clone();
        self.turn_task = Some(tokio::spawn(forward_turn(stream, generation, events)));
        Ok(())
    }

    pub fn open_camera(&mut self) {
        if self.input.mode() != InputMode::Camera || self.input.is_camera_open() {
            return;
        }
        self.input.open_camera();
        self.status = Some("Starting camera...".to_string());

        let generation = self.generation;
        let device = Arc::clone(&self.camera_device);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = CameraCapture::open(device.as_ref()).await;
            let _ = events.send(SessionEvent::CameraOpened { generation, result });
        });
    }

    pub fn take_photo(&mut self) {
        let Some(capture) = self.camera.take() else {
            return;
        };
        self.status = Some("Capturing photo...".to_string());

        let generation = self.generation;
        let events = self.events.clone();
        self.photo_task = Some(tokio::spawn(async move {
            let result = capture.take_photo().await;
            let _ = events.send(SessionEvent::PhotoTaken { generation, result });
        }));
    }

    pub fn close_camera(&mut self) {
        self.release_camera();
        self.input.close_camera();
        self.status = None;
    }

    /// Stop the device whether it is live or in the middle of a photo.
    fn release_camera(&mut self) {
        if let Some(capture) = self.camera.take() {
            capture.close();
        }
        // dropping the aborted task drops its capture, which stops the stream
        if let Some(task) = self.photo_task.take() {
            task.abort();
        }
    }

    /// Discard everything and start over with a fresh session.
    pub fn new_task(&mut self) {
        self.generation += 1;
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        self.release_camera();
        self.view = ViewState::Initial;
        self.log.clear();
        self.input.reset();
        self.ai_loading = false;
        self.status = None;
        self.init_session();
        tracing::info!(generation = self.generation, "new task started");
    }

    /// Apply an event from a spawned task. Events from an older generation
    /// are dropped.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if event.generation() != self.generation {
            tracing::debug!(
                event_generation = event.generation(),
                current = self.generation,
                "stale event dropped"
            );
            return;
        }

        match event {
            SessionEvent::Prepared { result, .. } => self.on_prepared(result),
            SessionEvent::Fragment { text, .. } => {
                self.log.apply_fragment(&text);
            }
            SessionEvent::Done { .. } => {
                let reply = self.log.finish_model_turn();
                if let Some(session) = self.session.as_mut() {
                    session.record_reply(&reply);
                }
                tracing::info!(reply_len = reply.len(), "turn complete");
                self.end_turn();
            }
            SessionEvent::Failed { error, .. } => {
                tracing::warn!(error = %error, "turn failed");
                self.log.fail_model_turn();
                if let Some(session) = self.session.as_mut() {
                    session.abandon_turn();
                }
                self.end_turn();
            }
            SessionEvent::CameraOpened { result, .. } => match result {
                Ok(capture) => {
                    if self.input.mode() == InputMode::Camera && self.input.is_camera_open() {
                        self.camera = Some(capture);
                        self.status = Some("Camera ready. Press Enter to take a photo.".to_string());
                    } else {
                        // closed while starting up
                        capture.close();
                    }
                }
                Err(e) => {
                    self.input.camera_failed(e.to_string());
                    self.status = None;
                }
            },
            SessionEvent::PhotoTaken { result, .. } => {
                self.photo_task = None;
                match result {
                    Ok(image) => self.input.capture(image),
                    Err(e) => self.input.camera_failed(e.to_string()),
                }
                self.status = None;
            }
        }
    }

    fn on_prepared(&mut self, result: Result<PreparedTurn, PrepareError>) {
        let turn = match result {
            Ok(turn) => turn,
            Err(e) => {
                tracing::warn!(error = %e, "submission failed before sending");
                self.input.finish_submit(false);
                self.input.set_error(e.to_string());
                self.status = None;
                return;
            }
        };

        match self.start_turn(turn.label, turn.request) {
            Ok(()) => self.input.finish_submit(true),
            Err(e) => {
                self.input.finish_submit(false);
                self.input.set_error(e.to_string());
                self.status = None;
            }
        }
    }

    fn end_turn(&mut self) {
        self.ai_loading = false;
        self.status = None;
        self.turn_task = None;
    }

    /// Export the model message at `index` to the configured export directory.
    pub fn export_response(&self, index: usize) -> Result<PathBuf, ExportError> {
        let message = self
            .log
            .messages()
            .get(index)
            .filter(|m| m.role == ChatRole::Model)
            .ok_or(ExportError::EmptyResponse)?;
        export::export_to_file(&message.text, &self.config.export_dir())
    }
}
