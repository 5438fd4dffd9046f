use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use answer_provider::{AnswerProvider, AskRequest, CancelSignal, StreamEvent, StreamId};
use tracing::{debug, warn};

use crate::chat::{ChatView, HostOps};
use crate::message::RetryRequest;

struct ActiveStream {
    stream_id: StreamId,
    cancel: CancelSignal,
    join_handle: Option<JoinHandle<()>>,
}

/// Runs answer streams for one [`ChatView`].
///
/// Each stream runs its provider on a dedicated worker thread. Events are queued
/// and applied to the view only when the owner calls
/// [`StreamController::flush_pending_events`], so the view is mutated from a
/// single thread. Only the stream in the active slot ever reaches the view.
pub struct StreamController {
    view: Arc<Mutex<ChatView>>,
    provider: Arc<dyn AnswerProvider>,
    pending_events: Mutex<VecDeque<StreamEvent>>,
    events_ready: Condvar,
    next_stream_id: AtomicU64,
    active_stream: Mutex<Option<ActiveStream>>,
    render_requests: AtomicU64,
}

impl StreamController {
    pub fn new(view: Arc<Mutex<ChatView>>, provider: Arc<dyn AnswerProvider>) -> Arc<Self> {
        Arc::new(Self {
            view,
            provider,
            pending_events: Mutex::new(VecDeque::new()),
            events_ready: Condvar::new(),
            next_stream_id: AtomicU64::new(1),
            active_stream: Mutex::new(None),
            render_requests: AtomicU64::new(0),
        })
    }

    pub fn view(&self) -> &Arc<Mutex<ChatView>> {
        &self.view
    }

    pub fn active_stream_id(&self) -> Option<StreamId> {
        self.lock_active_stream()
            .as_ref()
            .map(|active| active.stream_id)
    }

    /// Number of renders requested by the view so far.
    pub fn render_requests(&self) -> u64 {
        self.render_requests.load(Ordering::Acquire)
    }

    /// Applies queued events to the view and returns how many were drained.
    ///
    /// Must not be called while holding the view lock.
    pub fn flush_pending_events(&self) -> usize {
        let mut drained = 0usize;

        loop {
            let event = lock_unpoisoned(&self.pending_events).pop_front();

            match event {
                Some(event) => {
                    self.apply_stream_event(event);
                    drained += 1;
                }
                None => break,
            }
        }

        if drained > 0 {
            self.render_requests.fetch_add(1, Ordering::AcqRel);
        }

        drained
    }

    /// Blocks until at least one event is queued or `timeout` elapses.
    pub fn wait_for_events(&self, timeout: Duration) -> bool {
        let queue = lock_unpoisoned(&self.pending_events);
        let (queue, _) = match self
            .events_ready
            .wait_timeout_while(queue, timeout, |queue| queue.is_empty())
        {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };

        !queue.is_empty()
    }

    fn start_stream_internal(
        self: &Arc<Self>,
        chat_id: &str,
        request: &RetryRequest,
    ) -> Result<StreamId, String> {
        let mut active_stream = self.lock_active_stream();
        if let Some(previous) = active_stream.take() {
            debug!(
                stream_id = previous.stream_id,
                "cancelling previous stream before starting a new one"
            );
            previous.cancel.store(true, Ordering::SeqCst);
        }

        let stream_id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
        let ask = AskRequest::new(stream_id, chat_id, request.query.clone())
            .with_indices(request.indices.clone())
            .with_filter_dimensions(request.filter_dimensions.clone());
        let join_handle = self.spawn_worker(ask, Arc::clone(&cancel))?;

        *active_stream = Some(ActiveStream {
            stream_id,
            cancel,
            join_handle: Some(join_handle),
        });

        Ok(stream_id)
    }

    fn spawn_worker(
        self: &Arc<Self>,
        request: AskRequest,
        cancel: CancelSignal,
    ) -> Result<JoinHandle<()>, String> {
        let stream_id = request.stream_id;
        let controller = Arc::clone(self);
        thread::Builder::new()
            .name(format!("acaceta-stream-{stream_id}"))
            .spawn(move || controller.run_worker(request, cancel))
            .map_err(|error| format!("Failed to spawn stream worker: {error}"))
    }

    fn run_worker(self: Arc<Self>, request: AskRequest, cancel: CancelSignal) {
        let stream_id = request.stream_id;
        self.wait_for_view_visibility(stream_id);

        let terminal_emitted = Arc::new(AtomicBool::new(false));
        let terminal_emitted_for_emit = Arc::clone(&terminal_emitted);
        let controller = Arc::clone(&self);
        let provider = Arc::clone(&self.provider);

        let mut emit = move |event: StreamEvent| {
            if event.is_terminal() {
                terminal_emitted_for_emit.store(true, Ordering::SeqCst);
            }

            controller.enqueue_stream_event(event);
        };
        let run_outcome = catch_unwind(AssertUnwindSafe(|| {
            provider.run(request, Arc::clone(&cancel), &mut emit)
        }));

        match run_outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => emit(StreamEvent::Failed { stream_id, error }),
            Err(_) => emit(StreamEvent::Failed {
                stream_id,
                error: "Answer provider panicked".to_string(),
            }),
        }

        if !terminal_emitted.load(Ordering::SeqCst) && self.is_active_stream_id(stream_id) {
            warn!(stream_id, "provider exited without terminal event");
            emit(StreamEvent::Failed {
                stream_id,
                error: "Answer provider exited without terminal event".to_string(),
            });
        }
    }

    fn enqueue_stream_event(&self, event: StreamEvent) {
        lock_unpoisoned(&self.pending_events).push_back(event);
        self.events_ready.notify_all();
    }

    // The view records the exchange only after `start_stream` returns. Events
    // that reach it earlier would fail its stream guard.
    fn wait_for_view_visibility(&self, stream_id: StreamId) {
        for _ in 0..256 {
            let visible = lock_unpoisoned(&self.view).active_stream_id() == Some(stream_id);
            if visible || !self.is_active_stream_id(stream_id) {
                return;
            }

            thread::yield_now();
        }
    }

    fn apply_stream_event(&self, event: StreamEvent) {
        let stream_id = event.stream_id();
        if !self.is_active_stream_id(stream_id) {
            debug!(stream_id, "dropping event from inactive stream");
            return;
        }

        let terminal = event.is_terminal();

        {
            let mut view = lock_unpoisoned(&self.view);
            match event {
                StreamEvent::Started { stream_id } => view.on_stream_started(stream_id),
                StreamEvent::Content { stream_id, text } => view.on_content(stream_id, &text),
                StreamEvent::Citations { stream_id, entries } => {
                    view.on_citations(stream_id, &entries)
                }
                StreamEvent::Finished { stream_id } => view.on_finished(stream_id),
                StreamEvent::Failed { stream_id, error } => view.on_failed(stream_id, &error),
                StreamEvent::Cancelled { stream_id } => view.on_cancelled(stream_id),
            }
        }

        if terminal {
            self.clear_active_stream_if_matching(stream_id);
        }
    }

    fn clear_active_stream_if_matching(&self, stream_id: StreamId) {
        let mut active_stream = self.lock_active_stream();
        let matches = active_stream.as_ref().map(|active| active.stream_id) == Some(stream_id);
        if !matches {
            return;
        }

        let Some(mut completed) = active_stream.take() else {
            return;
        };

        if let Some(join_handle) = completed.join_handle.take() {
            let is_current_thread = join_handle.thread().id() == thread::current().id();
            if !is_current_thread && join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    fn is_active_stream_id(&self, stream_id: StreamId) -> bool {
        self.lock_active_stream()
            .as_ref()
            .map(|active| active.stream_id)
            == Some(stream_id)
    }

    fn abort_stream_internal(&self, stream_id: StreamId) {
        let mut active_stream = self.lock_active_stream();
        let matches = active_stream.as_ref().map(|active| active.stream_id) == Some(stream_id);
        if !matches {
            return;
        }

        if let Some(aborted) = active_stream.take() {
            aborted.cancel.store(true, Ordering::SeqCst);
            debug!(stream_id, "stream aborted");
        }
    }

    fn lock_active_stream(&self) -> MutexGuard<'_, Option<ActiveStream>> {
        lock_unpoisoned(&self.active_stream)
    }
}

impl HostOps for Arc<StreamController> {
    fn start_stream(&mut self, chat_id: &str, request: &RetryRequest) -> Result<StreamId, String> {
        self.start_stream_internal(chat_id, request)
    }

    fn abort_stream(&mut self, stream_id: StreamId) {
        self.abort_stream_internal(stream_id);
    }

    fn request_render(&mut self) {
        self.render_requests.fetch_add(1, Ordering::AcqRel);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
