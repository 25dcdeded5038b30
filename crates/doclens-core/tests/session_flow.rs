use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use doclens_core::prompts::APOLOGY;
use doclens_core::{
    CameraDevice, ChatBackend, CommunicationError, Config, Connector, DeviceError, FragmentStream,
    GenerateRequest, InputMode, SessionController, SessionEvent, VideoStream, ViewState,
};
use futures_util::stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

type FragmentSender = UnboundedSender<Result<String, CommunicationError>>;

/// Backend whose replies are fed by the test, one channel per turn.
#[derive(Default)]
struct ManualBackend {
    turns: Mutex<Vec<FragmentSender>>,
}

impl ManualBackend {
    fn turn(&self, index: usize) -> FragmentSender {
        self.turns.lock().unwrap()[index].clone()
    }

    fn close_turn(&self, index: usize) {
        // dropping the only sender ends the stream
        let mut turns = self.turns.lock().unwrap();
        let (closed, _) = mpsc::unbounded_channel();
        turns[index] = closed;
    }
}

#[async_trait]
impl ChatBackend for ManualBackend {
    async fn stream_generate(
        &self,
        _request: GenerateRequest,
    ) -> Result<FragmentStream, CommunicationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.turns.lock().unwrap().push(tx);
        let fragments = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(fragments))
    }
}

struct NoCamera;

#[async_trait]
impl CameraDevice for NoCamera {
    async fn acquire(&self) -> Result<Box<dyn VideoStream>, DeviceError> {
        Err(DeviceError::Unavailable("no device".to_string()))
    }
}

fn setup() -> (SessionController, UnboundedReceiver<SessionEvent>, Arc<ManualBackend>) {
    let backend = Arc::new(ManualBackend::default());
    let shared = Arc::clone(&backend);
    let connector: Connector = Arc::new(move || Ok(Arc::clone(&shared) as Arc<dyn ChatBackend>));
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(Config::default(), connector, Arc::new(NoCamera), tx);
    (controller, rx, backend)
}

async fn wait_for_turn(backend: &ManualBackend, count: usize) {
    while backend.turns.lock().unwrap().len() < count {
        tokio::task::yield_now().await;
    }
}

async fn submit_paste(
    controller: &mut SessionController,
    rx: &mut UnboundedReceiver<SessionEvent>,
    text: &str,
) {
    controller.switch_mode(InputMode::Paste);
    controller.input_mut().set_paste_text(text);
    controller.submit().unwrap();
    let prepared = rx.recv().await.unwrap();
    controller.handle_event(prepared);
}

#[tokio::test]
async fn test_fragments_concatenate_into_placeholder() {
    let (mut controller, mut rx, backend) = setup();
    submit_paste(&mut controller, &mut rx, "contract text").await;

    // placeholder is visible before any fragment
    assert_eq!(controller.log().len(), 2);
    assert_eq!(controller.log().messages()[1].text, "");
    assert!(controller.is_ai_loading());

    wait_for_turn(&backend, 1).await;
    let turn = backend.turn(0);
    for fragment in ["## Sum", "mary\n", "* point"] {
        turn.send(Ok(fragment.to_string())).unwrap();
        let event = rx.recv().await.unwrap();
        controller.handle_event(event);
    }
    drop(turn);
    backend.close_turn(0);
    let done = rx.recv().await.unwrap();
    controller.handle_event(done);

    assert_eq!(controller.log().messages()[1].text, "## Summary\n* point");
    assert!(!controller.is_ai_loading());
}

#[tokio::test]
async fn test_stale_stream_does_not_touch_fresh_log() {
    let (mut controller, mut rx, backend) = setup();
    submit_paste(&mut controller, &mut rx, "first document").await;
    let first_session = controller.session_id();

    wait_for_turn(&backend, 1).await;
    let turn = backend.turn(0);
    turn.send(Ok("partial".to_string())).unwrap();
    let in_flight = rx.recv().await.unwrap();

    controller.new_task();
    controller.handle_event(in_flight);
    // the old stream keeps talking after the reset
    let _ = turn.send(Ok(" more".to_string()));
    while let Ok(event) = rx.try_recv() {
        controller.handle_event(event);
    }

    assert!(controller.log().is_empty());
    assert_eq!(controller.view(), ViewState::Initial);
    assert!(!controller.is_ai_loading());
    assert_ne!(controller.session_id(), first_session);
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_partial_text() {
    let (mut controller, mut rx, backend) = setup();
    submit_paste(&mut controller, &mut rx, "doc").await;

    wait_for_turn(&backend, 1).await;
    let turn = backend.turn(0);
    turn.send(Ok("Half an ans".to_string())).unwrap();
    turn.send(Err(CommunicationError::Stream("reset".to_string()))).unwrap();
    for _ in 0..2 {
        let event = rx.recv().await.unwrap();
        controller.handle_event(event);
    }

    assert_eq!(controller.log().messages()[1].text, "Half an ans");
    assert!(!controller.is_ai_loading());
}

#[tokio::test]
async fn test_failure_before_any_fragment_is_apology() {
    let (mut controller, mut rx, backend) = setup();
    submit_paste(&mut controller, &mut rx, "doc").await;

    wait_for_turn(&backend, 1).await;
    backend
        .turn(0)
        .send(Err(CommunicationError::Request("offline".to_string())))
        .unwrap();
    let event = rx.recv().await.unwrap();
    controller.handle_event(event);

    assert_eq!(controller.log().messages()[1].text, APOLOGY);
}

#[tokio::test]
async fn test_new_task_resets_everything() {
    let (mut controller, mut rx, _backend) = setup();
    controller.switch_mode(InputMode::Camera);
    controller.input_mut().set_error("old banner");
    submit_paste(&mut controller, &mut rx, "doc").await;

    controller.new_task();

    assert_eq!(controller.view(), ViewState::Initial);
    assert!(controller.log().is_empty());
    assert_eq!(controller.input().mode(), InputMode::Upload);
    assert_eq!(controller.input().paste_text(), "");
    assert!(!controller.input().is_camera_open());
    assert_eq!(controller.input().error(), None);
    assert_eq!(controller.status(), None);
}

#[tokio::test]
async fn test_camera_failure_shows_banner() {
    let (mut controller, mut rx, _backend) = setup();
    controller.switch_mode(InputMode::Camera);
    controller.open_camera();
    assert!(controller.input().is_camera_open());

    let event = rx.recv().await.unwrap();
    controller.handle_event(event);

    assert!(!controller.input().is_camera_open());
    assert!(controller.input().error().unwrap().contains("camera"));
}
