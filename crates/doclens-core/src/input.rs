//! Input acquisition: three mutually exclusive ways to stage a document.
//!
//! Switching modes never discards what another mode has staged; only the
//! active mode's data is eligible for submission.

use crate::camera::CapturedImage;
use crate::error::{ExtractionError, ValidationError};
use crate::extract::{self, Extracted, MediaKind, SelectedFile};
use crate::prompts;
use crate::request::TurnRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    Paste,
    #[default]
    Upload,
    Camera,
}

impl InputMode {
    pub fn all() -> [InputMode; 3] {
        [InputMode::Upload, InputMode::Paste, InputMode::Camera]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InputMode::Paste => "Paste text",
            InputMode::Upload => "Upload file",
            InputMode::Camera => "Take photo",
        }
    }

    pub fn next(self) -> Self {
        match self {
            InputMode::Upload => InputMode::Paste,
            InputMode::Paste => InputMode::Camera,
            InputMode::Camera => InputMode::Upload,
        }
    }
}

/// The active mode's data, detached from the state machine for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedInput {
    Paste(String),
    Upload(SelectedFile),
    Camera(CapturedImage),
}

impl StagedInput {
    pub fn source_name(&self) -> &'static str {
        match self {
            StagedInput::Paste(_) => "paste",
            StagedInput::Upload(_) => "upload",
            StagedInput::Camera(_) => "camera",
        }
    }

    /// Status text shown while this input is being prepared.
    pub fn progress_message(&self) -> &'static str {
        match self {
            StagedInput::Paste(_) => "Preparing analysis...",
            StagedInput::Upload(file) if file.kind == MediaKind::Image => "Processing image...",
            StagedInput::Upload(_) => "Processing file...",
            StagedInput::Camera(_) => "Recognizing photo...",
        }
    }
}

/// Observable acquisition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    NoInput,
    StagingPaste,
    StagingUpload,
    StagingCamera,
    Submittable,
    Submitting,
}

#[derive(Debug, Default)]
pub struct InputAcquisition {
    mode: InputMode,
    paste_text: String,
    selected_file: Option<SelectedFile>,
    captured_image: Option<CapturedImage>,
    camera_open: bool,
    submitting: bool,
    error: Option<String>,
}

impl InputAcquisition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn paste_text(&self) -> &str {
        &self.paste_text
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected_file.as_ref()
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.captured_image.as_ref()
    }

    pub fn is_camera_open(&self) -> bool {
        self.camera_open
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn state(&self) -> AcquisitionState {
        if self.submitting {
            AcquisitionState::Submitting
        } else if self.is_submittable() {
            AcquisitionState::Submittable
        } else if !self.has_any_staged() {
            AcquisitionState::NoInput
        } else {
            match self.mode {
                InputMode::Paste => AcquisitionState::StagingPaste,
                InputMode::Upload => AcquisitionState::StagingUpload,
                InputMode::Camera => AcquisitionState::StagingCamera,
            }
        }
    }

    /// Readiness of the active mode only.
    pub fn is_ready(&self) -> bool {
        match self.mode {
            InputMode::Paste => !self.paste_text.trim().is_empty(),
            InputMode::Upload => self.selected_file.is_some(),
            InputMode::Camera => self.captured_image.is_some(),
        }
    }

    pub fn is_submittable(&self) -> bool {
        !self.submitting && self.is_ready()
    }

    fn has_any_staged(&self) -> bool {
        !self.paste_text.is_empty() || self.selected_file.is_some() || self.captured_image.is_some()
    }

    pub fn switch_mode(&mut self, mode: InputMode) {
        self.mode = mode;
        self.error = None;
        if mode != InputMode::Camera {
            self.camera_open = false;
        }
    }

    pub fn set_paste_text(&mut self, text: impl Into<String>) {
        self.paste_text = text.into();
    }

    pub fn paste_text_mut(&mut self) -> &mut String {
        &mut self.paste_text
    }

    /// Stage a file. Unsupported types are rejected and leave nothing staged.
    pub fn select_file(&mut self, file: Result<SelectedFile, ValidationError>) -> bool {
        self.error = None;
        match file {
            Ok(file) => {
                tracing::debug!(name = %file.name, mime = %file.mime_type, size = file.size, "file staged");
                self.selected_file = Some(file);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "file rejected");
                self.selected_file = None;
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub fn clear_file(&mut self) {
        self.selected_file = None;
    }

    pub fn open_camera(&mut self) {
        self.error = None;
        self.camera_open = true;
    }

    pub fn close_camera(&mut self) {
        self.camera_open = false;
    }

    /// Photo taken: stage it and close the camera view.
    pub fn capture(&mut self, image: CapturedImage) {
        self.captured_image = Some(image);
        self.camera_open = false;
    }

    /// Camera could not be used: close the view and show why.
    pub fn camera_failed(&mut self, message: impl Into<String>) {
        self.camera_open = false;
        self.error = Some(message.into());
    }

    pub fn clear_capture(&mut self) {
        self.captured_image = None;
    }

    /// Accept a submit request. Only possible from `Submittable`.
    pub fn begin_submit(&mut self) -> Result<StagedInput, ValidationError> {
        if self.submitting {
            return Err(ValidationError::Busy);
        }
        let staged = match self.mode {
            InputMode::Paste if !self.paste_text.trim().is_empty() => {
                StagedInput::Paste(self.paste_text.clone())
            }
            InputMode::Upload => StagedInput::Upload(
                self.selected_file.clone().ok_or(ValidationError::NotReady)?,
            ),
            InputMode::Camera => StagedInput::Camera(
                self.captured_image.clone().ok_or(ValidationError::NotReady)?,
            ),
            InputMode::Paste => return Err(ValidationError::NotReady),
        };
        self.submitting = true;
        self.error = None;
        Ok(staged)
    }

    /// Submission ended. Staged data is cleared only when it was dispatched.
    pub fn finish_submit(&mut self, dispatched: bool) {
        self.submitting = false;
        if dispatched {
            self.clear_staged();
        }
    }

    fn clear_staged(&mut self) {
        self.paste_text.clear();
        self.selected_file = None;
        self.captured_image = None;
    }

    /// Back to a fresh acquisition: nothing staged, upload mode, camera closed.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A turn ready to send, with the label the log shows instead of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTurn {
    pub label: String,
    pub request: TurnRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Build the first-turn request from staged input.
pub async fn prepare_turn(staged: StagedInput) -> Result<PreparedTurn, PrepareError> {
    let image_label = match &staged {
        StagedInput::Upload(file) if file.kind == MediaKind::Image => {
            Some(prompts::uploaded_image_label(&file.name))
        }
        StagedInput::Camera(_) => Some(prompts::PHOTO_LABEL.to_string()),
        _ => None,
    };

    match extract::extract(&staged).await? {
        Extracted::Image(image) => Ok(PreparedTurn {
            label: image_label.unwrap_or_else(|| prompts::PHOTO_LABEL.to_string()),
            request: TurnRequest::image(image, prompts::IMAGE_INSTRUCTION),
        }),
        Extracted::Text(text) => {
            if text.trim().is_empty() {
                return Err(ValidationError::EmptyContent.into());
            }
            Ok(PreparedTurn {
                label: prompts::ANALYZE_DOCUMENT_LABEL.to_string(),
                request: TurnRequest::text(prompts::analysis_prompt(&text)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Part;

    fn staged_file(dir: &std::path::Path, name: &str, bytes: &[u8]) -> SelectedFile {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        SelectedFile::from_path(&path).unwrap()
    }

    #[test]
    fn test_default_mode_is_upload_with_no_input() {
        let input = InputAcquisition::new();
        assert_eq!(input.mode(), InputMode::Upload);
        assert_eq!(input.state(), AcquisitionState::NoInput);
        assert!(!input.is_submittable());
    }

    #[test]
    fn test_whitespace_paste_is_not_submittable() {
        let mut input = InputAcquisition::new();
        input.switch_mode(InputMode::Paste);
        input.set_paste_text("   \n\t ");
        assert!(!input.is_submittable());
        assert_eq!(input.state(), AcquisitionState::StagingPaste);
        assert_eq!(input.begin_submit().unwrap_err(), ValidationError::NotReady);

        input.set_paste_text(" text ");
        assert!(input.is_submittable());
        assert_eq!(input.state(), AcquisitionState::Submittable);
    }

    #[test]
    fn test_only_active_mode_counts() {
        let mut input = InputAcquisition::new();
        input.switch_mode(InputMode::Paste);
        input.set_paste_text("ready");
        input.switch_mode(InputMode::Camera);

        assert!(!input.is_submittable());
        assert_eq!(input.state(), AcquisitionState::StagingCamera);
        // paste data survives the switch
        input.switch_mode(InputMode::Paste);
        assert_eq!(input.paste_text(), "ready");
        assert!(input.is_submittable());
    }

    #[test]
    fn test_mode_switch_clears_error_banner() {
        let mut input = InputAcquisition::new();
        input.set_error("boom");
        input.switch_mode(InputMode::Paste);
        assert_eq!(input.error(), None);
    }

    #[test]
    fn test_zip_upload_rejected_and_unset() {
        let mut input = InputAcquisition::new();
        let accepted = input.select_file(SelectedFile::new(
            "/tmp/a.zip",
            "a.zip",
            "application/zip",
            10,
        ));
        assert!(!accepted);
        assert!(input.selected_file().is_none());
        assert!(input.error().unwrap().contains("Invalid file type"));
        assert!(!input.is_submittable());
    }

    #[test]
    fn test_rejected_upload_replaces_previous_selection() {
        let mut input = InputAcquisition::new();
        input.select_file(SelectedFile::new("/tmp/a.pdf", "a.pdf", "application/pdf", 10));
        assert!(input.is_submittable());
        input.select_file(SelectedFile::new("/tmp/a.zip", "a.zip", "application/zip", 10));
        assert!(input.selected_file().is_none());
    }

    #[test]
    fn test_clearing_file_makes_unsubmittable() {
        let mut input = InputAcquisition::new();
        input.select_file(SelectedFile::new("/tmp/a.pdf", "a.pdf", "application/pdf", 10));
        input.clear_file();
        assert!(!input.is_submittable());
    }

    #[test]
    fn test_submit_cycle() {
        let mut input = InputAcquisition::new();
        input.switch_mode(InputMode::Camera);
        input.open_camera();
        input.capture(CapturedImage::from_jpeg(b"jpeg"));
        assert!(!input.is_camera_open());

        let staged = input.begin_submit().unwrap();
        assert!(matches!(staged, StagedInput::Camera(_)));
        assert_eq!(input.state(), AcquisitionState::Submitting);
        assert_eq!(input.begin_submit().unwrap_err(), ValidationError::Busy);

        // failed attempt keeps the photo
        input.finish_submit(false);
        assert_eq!(input.state(), AcquisitionState::Submittable);

        input.begin_submit().unwrap();
        input.finish_submit(true);
        assert!(input.captured_image().is_none());
        assert_eq!(input.state(), AcquisitionState::NoInput);
    }

    #[test]
    fn test_successful_submit_clears_every_mode() {
        let mut input = InputAcquisition::new();
        input.set_paste_text("draft");
        input.capture(CapturedImage::from_jpeg(b"jpeg"));
        input.select_file(SelectedFile::new("/tmp/a.pdf", "a.pdf", "application/pdf", 10));

        input.begin_submit().unwrap();
        input.finish_submit(true);
        assert_eq!(input.paste_text(), "");
        assert!(input.selected_file().is_none());
        assert!(input.captured_image().is_none());
    }

    #[test]
    fn test_camera_failure_closes_view() {
        let mut input = InputAcquisition::new();
        input.switch_mode(InputMode::Camera);
        input.open_camera();
        input.camera_failed("no camera");
        assert!(!input.is_camera_open());
        assert_eq!(input.error(), Some("no camera"));
    }

    #[tokio::test]
    async fn test_prepare_paste_wraps_prompt() {
        let turn = prepare_turn(StagedInput::Paste("Budget report".to_string()))
            .await
            .unwrap();
        assert_eq!(turn.label, prompts::ANALYZE_DOCUMENT_LABEL);
        assert_eq!(
            turn.request.parts(),
            &[Part::Text(prompts::analysis_prompt("Budget report"))]
        );
    }

    #[tokio::test]
    async fn test_prepare_empty_docx_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = crate::export::build_docx("").unwrap();
        let file = staged_file(dir.path(), "empty.docx", &bytes);

        let err = prepare_turn(StagedInput::Upload(file)).await.unwrap_err();
        assert_eq!(err, PrepareError::Validation(ValidationError::EmptyContent));
    }

    #[tokio::test]
    async fn test_prepare_docx_extracts_text() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = crate::export::build_docx("# Minutes\nAll agreed").unwrap();
        let file = staged_file(dir.path(), "minutes.docx", &bytes);

        let turn = prepare_turn(StagedInput::Upload(file)).await.unwrap();
        let Part::Text(prompt) = &turn.request.parts()[0] else {
            panic!("expected text part");
        };
        assert!(prompt.contains("Minutes"));
        assert!(prompt.contains("All agreed"));
    }

    #[tokio::test]
    async fn test_prepare_uploaded_image() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged_file(dir.path(), "scan.png", b"png-bytes");

        let turn = prepare_turn(StagedInput::Upload(file)).await.unwrap();
        assert_eq!(turn.label, "[Uploaded image file: scan.png]");
        assert!(turn.request.has_image());
        assert_eq!(
            turn.request.parts()[1],
            Part::Text(prompts::IMAGE_INSTRUCTION.to_string())
        );
    }

    #[tokio::test]
    async fn test_prepare_camera_photo() {
        let turn = prepare_turn(StagedInput::Camera(CapturedImage::from_jpeg(b"jpeg")))
            .await
            .unwrap();
        assert_eq!(turn.label, prompts::PHOTO_LABEL);
        assert!(turn.request.has_image());
    }

    #[tokio::test]
    async fn test_prepare_corrupt_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = staged_file(dir.path(), "broken.pdf", b"not a pdf");

        let err = prepare_turn(StagedInput::Upload(file)).await.unwrap_err();
        assert_eq!(err, PrepareError::Extraction(ExtractionError::UnreadablePdf));
    }
}
