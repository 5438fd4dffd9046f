use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use answer_provider::{AnswerProvider, AskRequest, CancelSignal, ProviderProfile, StreamEvent};
use answer_provider_mock::{MockProvider, MockStep};
use chat_session::{ChatView, Message, Mode, StreamController};
use serde_json::json;

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn test_profile() -> ProviderProfile {
    ProviderProfile {
        provider_id: "test".to_string(),
        endpoint: "memory://".to_string(),
    }
}

#[derive(Default)]
struct BlockingCancelProvider;

impl AnswerProvider for BlockingCancelProvider {
    fn profile(&self) -> ProviderProfile {
        test_profile()
    }

    fn run(
        &self,
        req: AskRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String> {
        let stream_id = req.stream_id;

        emit(StreamEvent::Started { stream_id });
        emit(StreamEvent::Content {
            stream_id,
            text: format!("working on {}", req.chat_id),
        });

        while !cancel.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }

        emit(StreamEvent::Content {
            stream_id,
            text: " after cancel".to_string(),
        });
        emit(StreamEvent::Cancelled { stream_id });
        Ok(())
    }
}

struct SilentProvider;

impl AnswerProvider for SilentProvider {
    fn profile(&self) -> ProviderProfile {
        test_profile()
    }

    fn run(
        &self,
        _req: AskRequest,
        _cancel: CancelSignal,
        _emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String> {
        Ok(())
    }
}

struct PanickingProvider;

impl AnswerProvider for PanickingProvider {
    fn profile(&self) -> ProviderProfile {
        test_profile()
    }

    fn run(
        &self,
        _req: AskRequest,
        _cancel: CancelSignal,
        _emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String> {
        panic!("provider blew up");
    }
}

fn controller_with(provider: Arc<dyn AnswerProvider>) -> Arc<StreamController> {
    let view = Arc::new(Mutex::new(ChatView::new("c1")));
    StreamController::new(view, provider)
}

fn submit(controller: &Arc<StreamController>, query: &str) {
    let mut host = Arc::clone(controller);
    lock_unpoisoned(controller.view()).submit(query, Vec::new(), json!({}), &mut host);
}

fn pump_until<F>(controller: &Arc<StreamController>, timeout: Duration, mut done: F) -> bool
where
    F: FnMut(&ChatView) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        controller.wait_for_events(Duration::from_millis(20));
        controller.flush_pending_events();
        if done(&lock_unpoisoned(controller.view())) {
            return true;
        }
    }
    false
}

fn last_ai(view: &ChatView) -> Message {
    view.messages
        .iter()
        .rev()
        .find(|message| message.is_ai())
        .cloned()
        .expect("ai message present")
}

#[test]
fn mock_stream_runs_to_completion_through_controller() {
    let provider = MockProvider::new(vec![
        MockStep::Content("The warranty".to_string()),
        MockStep::Content(" is 2 years.".to_string()),
        MockStep::Citations(vec![
            json!({"title": "Manual", "preview": "...2 years...", "pages": [4]}),
        ]),
    ])
    .with_token_delay(Duration::ZERO);
    let controller = controller_with(Arc::new(provider));

    submit(&controller, "What is the warranty period?");

    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        view.mode == Mode::Idle
    }));

    let view = lock_unpoisoned(controller.view());
    let answer = last_ai(&view);
    assert_eq!(answer.content, "The warranty is 2 years.");
    assert_eq!(answer.cited_sections.len(), 1);
    assert_eq!(answer.cited_sections[0].pages, vec![4]);
    assert!(!answer.is_streaming);
    drop(view);

    assert_eq!(controller.active_stream_id(), None);
    assert!(controller.render_requests() > 0);
}

#[test]
fn provider_failure_surfaces_as_retryable_error() {
    let provider = MockProvider::new(vec![
        MockStep::Content("partial".to_string()),
        MockStep::Fail("Index is being rebuilt".to_string()),
    ]);
    let controller = controller_with(Arc::new(provider));

    submit(&controller, "What is the warranty period?");

    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        matches!(view.mode, Mode::Errored(_))
    }));

    let view = lock_unpoisoned(controller.view());
    let answer = last_ai(&view);
    assert!(answer.is_error);
    assert_eq!(answer.content, "Index is being rebuilt");
    assert!(answer.can_retry());
}

#[test]
fn switching_chat_mid_stream_keeps_both_lists_untouched() {
    let controller = controller_with(Arc::new(BlockingCancelProvider));

    submit(&controller, "What is the warranty period?");
    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        last_ai(view).content == "working on c1"
    }));

    let c1_snapshot = lock_unpoisoned(controller.view()).messages.clone();
    let c2_history = vec![Message::user("0-1", "c2 history")];
    {
        let mut host = Arc::clone(&controller);
        lock_unpoisoned(controller.view()).switch_chat("c2", c2_history.clone(), &mut host);
    }
    assert_eq!(controller.active_stream_id(), None);

    thread::sleep(Duration::from_millis(100));
    controller.flush_pending_events();

    let view = lock_unpoisoned(controller.view());
    assert_eq!(view.messages, c2_history);
    assert_eq!(view.mode, Mode::Idle);
    assert_eq!(c1_snapshot.len(), 2);
    assert!(c1_snapshot[1].is_streaming);
}

#[test]
fn starting_a_new_stream_cancels_the_previous_one() {
    let controller = controller_with(Arc::new(BlockingCancelProvider));

    submit(&controller, "first");
    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        view.active_stream_id() == Some(1) && last_ai(view).content == "working on c1"
    }));

    submit(&controller, "second");
    assert_eq!(controller.active_stream_id(), Some(2));

    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        matches!(view.mode, Mode::Streaming { stream_id: 2 })
    }));
    thread::sleep(Duration::from_millis(100));
    controller.flush_pending_events();

    let view = lock_unpoisoned(controller.view());
    assert_eq!(view.messages.len(), 4);
    assert_eq!(view.messages[1].content, "working on c1");
    assert!(!view.messages[1].is_streaming);
    assert!(!view.messages[1].content.contains("after cancel"));
    assert_eq!(view.messages[3].content, "working on c1");
    drop(view);

    let mut host = Arc::clone(&controller);
    lock_unpoisoned(controller.view()).teardown(&mut host);
    assert_eq!(controller.active_stream_id(), None);
}

#[test]
fn user_cancel_settles_partial_answer() {
    let controller = controller_with(Arc::new(BlockingCancelProvider));

    submit(&controller, "question");
    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        !last_ai(view).content.is_empty()
    }));

    let mut host = Arc::clone(&controller);
    assert!(lock_unpoisoned(controller.view()).cancel(&mut host));

    thread::sleep(Duration::from_millis(100));
    controller.flush_pending_events();

    let view = lock_unpoisoned(controller.view());
    let answer = last_ai(&view);
    assert_eq!(answer.content, "working on c1");
    assert!(!answer.is_streaming);
    assert!(!answer.is_error);
    assert_eq!(view.mode, Mode::Idle);
}

#[test]
fn provider_without_terminal_event_is_reported_as_failure() {
    let controller = controller_with(Arc::new(SilentProvider));

    submit(&controller, "question");

    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        matches!(view.mode, Mode::Errored(_))
    }));
    let view = lock_unpoisoned(controller.view());
    assert!(last_ai(&view).content.contains("without terminal event"));
}

#[test]
fn provider_panic_is_reported_as_failure() {
    let controller = controller_with(Arc::new(PanickingProvider));

    submit(&controller, "question");

    assert!(pump_until(&controller, Duration::from_secs(5), |view| {
        matches!(view.mode, Mode::Errored(_))
    }));
    let view = lock_unpoisoned(controller.view());
    assert!(last_ai(&view).content.contains("panicked"));
}

#[test]
fn wait_for_events_times_out_when_idle() {
    let controller = controller_with(Arc::new(SilentProvider));

    let started = Instant::now();
    assert!(!controller.wait_for_events(Duration::from_millis(30)));
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(controller.flush_pending_events(), 0);
}
