//! Segmentation manager: strategy negotiation and the per-frame request
//! protocol.
//!
//! The render loop calls [`SegmentationManager::poll`] once per tick and
//! [`SegmentationManager::submit`] when the manager is idle. At most one
//! request is in flight; a frame offered while busy is handed straight
//! back. Results are matched to requests by id, and anything that arrives
//! after its request expired is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camfx_core::{timing, FaceLandmarks, FrameBuffer, RollingWindow};
use tracing::{debug, info, trace, warn};

use crate::autoframe::{AutoFrameTransform, AutoFramer};
use crate::backend::{guarded_initialize, BackendFactory, SegmentationBackend};
use crate::config::SegmentationConfig;
use crate::mask::MaskBuffer;
use crate::strategy::{Completion, MainThreadStrategy, Strategy, WorkerStrategy};
use crate::worker::{SegmentationWorker, WorkerEvent, WorkerPoll};
use crate::{RequestId, SegmentationMode};

/// Lifecycle of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationState {
    Uninitialized,
    /// Worker thread is loading its backend.
    Initializing,
    WorkerMode,
    MainThreadMode,
    /// No segmentation this session (until `reinitialize`).
    Disabled,
}

/// Something the caller may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationEvent {
    /// A strategy was selected and accepts frames.
    Ready(SegmentationMode),
    /// A new mask is available.
    Completed { id: RequestId, latency: Duration },
    /// The backend returned an error for this request.
    Failed { id: RequestId, error: String },
    /// The request passed its deadline; its response will be ignored.
    TimedOut { id: RequestId },
    /// Segmentation was turned off. Emitted once per disable.
    Disabled { reason: String },
}

impl SegmentationEvent {
    fn concerns(&self, request: RequestId) -> bool {
        match self {
            Self::Completed { id, .. } | Self::Failed { id, .. } | Self::TimedOut { id } => {
                *id == request
            }
            Self::Disabled { .. } => true,
            Self::Ready(_) => false,
        }
    }
}

/// Why a frame was not accepted. The frame is handed back either way.
#[derive(Debug)]
pub enum SubmitError {
    /// A request is already in flight.
    Busy(FrameBuffer),
    /// No strategy is active (initializing, disabled or disposed).
    Unavailable(FrameBuffer),
}

impl SubmitError {
    pub fn into_frame(self) -> FrameBuffer {
        match self {
            Self::Busy(frame) | Self::Unavailable(frame) => frame,
        }
    }
}

/// Segmentation throughput and outcome counters.
#[derive(Debug, Clone)]
pub struct SegmentationStats {
    intervals_ms: RollingWindow,
    latency_ms: RollingWindow,
    last_completion: Option<Instant>,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected_busy: u64,
    pub late_discarded: u64,
}

impl Default for SegmentationStats {
    fn default() -> Self {
        Self {
            intervals_ms: RollingWindow::new(timing::SAMPLE_WINDOW),
            latency_ms: RollingWindow::new(timing::SAMPLE_WINDOW),
            last_completion: None,
            completed: 0,
            failed: 0,
            timed_out: 0,
            rejected_busy: 0,
            late_discarded: 0,
        }
    }
}

impl SegmentationStats {
    fn record_success(&mut self, now: Instant, latency: Duration) {
        if let Some(last) = self.last_completion {
            self.intervals_ms
                .push(now.saturating_duration_since(last).as_secs_f32() * 1000.0);
        }
        self.last_completion = Some(now);
        self.latency_ms.push(latency.as_secs_f32() * 1000.0);
        self.completed += 1;
    }

    /// Masks per second over the rolling window.
    pub fn fps(&self) -> f32 {
        match self.intervals_ms.mean() {
            Some(ms) if ms > 0.0 => 1000.0 / ms,
            _ => 0.0,
        }
    }

    /// Mean inference latency in milliseconds.
    pub fn mean_latency_ms(&self) -> f32 {
        self.latency_ms.mean().unwrap_or(0.0)
    }
}

struct PendingInit {
    worker: SegmentationWorker,
    started: Instant,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    submitted_at: Instant,
    deadline: Instant,
}

/// Owns the segmentation strategy, the pending-request table and the
/// latest mask.
pub struct SegmentationManager {
    config: SegmentationConfig,
    worker_factory: Option<BackendFactory>,
    fallback_factory: Option<BackendFactory>,
    state: SegmentationState,
    strategy: Option<Strategy>,
    init: Option<PendingInit>,
    pending: HashMap<RequestId, PendingRequest>,
    next_id: u64,
    consecutive_failures: u32,
    disabled_reported: bool,
    latest_mask: Option<Arc<MaskBuffer>>,
    latest_landmarks: Option<FaceLandmarks>,
    mask_generation: u64,
    auto_framer: AutoFramer,
    stats: SegmentationStats,
    backlog: Vec<SegmentationEvent>,
    completions: Vec<Completion>,
}

impl SegmentationManager {
    pub fn new(config: SegmentationConfig) -> Self {
        let auto_framer = AutoFramer::new(config.auto_frame.clone());
        Self {
            config,
            worker_factory: None,
            fallback_factory: None,
            state: SegmentationState::Uninitialized,
            strategy: None,
            init: None,
            pending: HashMap::new(),
            next_id: 0,
            consecutive_failures: 0,
            disabled_reported: false,
            latest_mask: None,
            latest_landmarks: None,
            mask_generation: 0,
            auto_framer,
            stats: SegmentationStats::default(),
            backlog: Vec::new(),
            completions: Vec::new(),
        }
    }

    /// Backend run on the worker thread.
    pub fn with_worker_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SegmentationBackend> + Send + Sync + 'static,
    {
        self.worker_factory = Some(Box::new(factory));
        self
    }

    /// Backend run synchronously when the worker cannot start.
    pub fn with_fallback_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SegmentationBackend> + Send + Sync + 'static,
    {
        self.fallback_factory = Some(Box::new(factory));
        self
    }

    pub fn state(&self) -> SegmentationState {
        self.state
    }

    pub fn mode(&self) -> Option<SegmentationMode> {
        self.strategy.as_ref().map(Strategy::mode)
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// No request in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Accepting frames right now.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SegmentationState::WorkerMode | SegmentationState::MainThreadMode
        )
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Newest mask, possibly stale.
    pub fn latest_mask(&self) -> Option<Arc<MaskBuffer>> {
        self.latest_mask.clone()
    }

    pub fn latest_landmarks(&self) -> Option<FaceLandmarks> {
        self.latest_landmarks
    }

    /// Incremented whenever a new mask arrives.
    pub fn mask_generation(&self) -> u64 {
        self.mask_generation
    }

    pub fn stats(&self) -> &SegmentationStats {
        &self.stats
    }

    /// Auto-framing target from the newest mask, recomputed at most once
    /// per configured interval.
    pub fn auto_frame_target(&mut self, now: Instant) -> AutoFrameTransform {
        self.auto_framer.target(self.latest_mask.as_deref(), now)
    }

    /// Start the worker (or go straight to the fallback). Never blocks:
    /// readiness is observed by `poll`.
    pub fn initialize(&mut self, now: Instant) {
        if self.state != SegmentationState::Uninitialized {
            debug!(state = ?self.state, "Segmentation already initialized");
            return;
        }
        if !self.config.enabled {
            info!("Segmentation disabled by configuration");
            self.state = SegmentationState::Disabled;
            self.disabled_reported = true;
            return;
        }

        let mut events = Vec::new();
        match &self.worker_factory {
            Some(factory) => match SegmentationWorker::spawn(factory()) {
                Ok(worker) => {
                    info!(
                        backend = worker.backend_name(),
                        timeout_s = self.config.init_timeout().as_secs(),
                        "Starting segmentation worker"
                    );
                    self.init = Some(PendingInit {
                        worker,
                        started: now,
                        deadline: now + self.config.init_timeout(),
                    });
                    self.state = SegmentationState::Initializing;
                }
                Err(e) => self.fall_back(format!("{e}"), &mut events),
            },
            None => self.fall_back("no worker backend configured".to_string(), &mut events),
        }
        self.backlog.extend(events);
    }

    /// Tear down and start over, typically after `Disabled`.
    pub fn reinitialize(&mut self, now: Instant) {
        info!(state = ?self.state, "Reinitializing segmentation");
        self.shutdown();
        self.state = SegmentationState::Uninitialized;
        self.disabled_reported = false;
        self.consecutive_failures = 0;
        self.auto_framer.reset();
        self.initialize(now);
    }

    /// Advance startup, collect finished requests and expire stale ones.
    pub fn poll(&mut self, now: Instant) -> Vec<SegmentationEvent> {
        self.poll_inner(now, None)
    }

    /// Hand `frame` to the active strategy.
    pub fn submit(&mut self, frame: FrameBuffer, now: Instant) -> Result<RequestId, SubmitError> {
        let Some(strategy) = self.strategy.as_mut() else {
            return Err(SubmitError::Unavailable(frame));
        };
        if !self.pending.is_empty() {
            self.stats.rejected_busy += 1;
            return Err(SubmitError::Busy(frame));
        }

        self.next_id += 1;
        let id = RequestId(self.next_id);
        match strategy.submit(id, frame) {
            Ok(()) => {
                self.pending.insert(
                    id,
                    PendingRequest {
                        submitted_at: now,
                        deadline: now + self.config.request_timeout(),
                    },
                );
                trace!(%id, "Segmentation request submitted");
                Ok(id)
            }
            Err(frame) => {
                self.stats.rejected_busy += 1;
                Err(SubmitError::Busy(frame))
            }
        }
    }

    /// Block until request `id` resolves or its deadline passes.
    ///
    /// Returns `None` when `id` is not pending. Other events seen while
    /// waiting are returned by the next `poll`.
    pub fn wait_for(&mut self, id: RequestId) -> Option<SegmentationEvent> {
        loop {
            if let Some(pos) = self.backlog.iter().position(|e| e.concerns(id)) {
                return Some(self.backlog.remove(pos));
            }
            let deadline = self.pending.get(&id)?.deadline;
            let events = self.poll_inner(Instant::now(), Some(deadline));
            self.backlog.extend(events);
        }
    }

    /// Stop the worker and drop all state. Outstanding requests are
    /// abandoned.
    pub fn dispose(&mut self) {
        if self.strategy.is_none() && self.init.is_none() {
            return;
        }
        self.shutdown();
        self.state = SegmentationState::Disabled;
        self.disabled_reported = true;
        info!("Segmentation disposed");
    }

    fn shutdown(&mut self) {
        if let Some(mut strategy) = self.strategy.take() {
            strategy.dispose();
        }
        if let Some(mut init) = self.init.take() {
            init.worker.shutdown(Duration::ZERO);
        }
        self.pending.clear();
    }

    fn poll_inner(&mut self, now: Instant, block_until: Option<Instant>) -> Vec<SegmentationEvent> {
        let mut events = std::mem::take(&mut self.backlog);

        if self.state == SegmentationState::Initializing {
            self.poll_init(now, &mut events);
        }

        let mut completions = std::mem::take(&mut self.completions);
        let drained = self
            .strategy
            .as_mut()
            .map(|s| s.drain(&mut completions, block_until));
        let now = if block_until.is_some() { Instant::now() } else { now };
        for completion in completions.drain(..) {
            self.handle_completion(completion, now, &mut events);
        }
        self.completions = completions;

        if let Some(Err(e)) = drained {
            self.disable(format!("worker failed: {e}"), &mut events);
        }

        self.expire_requests(now, &mut events);
        events
    }

    fn poll_init(&mut self, now: Instant, events: &mut Vec<SegmentationEvent>) {
        loop {
            let poll = match &self.init {
                Some(init) => init.worker.try_recv(),
                None => return,
            };
            match poll {
                WorkerPoll::Event(WorkerEvent::Ready) => {
                    let Some(init) = self.init.take() else { return };
                    info!(
                        backend = init.worker.backend_name(),
                        elapsed_ms = now.saturating_duration_since(init.started).as_millis() as u64,
                        "Segmentation worker ready"
                    );
                    self.strategy = Some(Strategy::Worker(WorkerStrategy::new(init.worker)));
                    self.state = SegmentationState::WorkerMode;
                    events.push(SegmentationEvent::Ready(SegmentationMode::Worker));
                    return;
                }
                WorkerPoll::Event(WorkerEvent::InitFailed(msg)) => {
                    self.init = None;
                    self.fall_back(format!("worker failed to start: {msg}"), events);
                    return;
                }
                WorkerPoll::Event(other) => {
                    debug!(event = ?other, "Unexpected event during worker startup");
                }
                WorkerPoll::Empty => break,
                WorkerPoll::Disconnected => {
                    self.init = None;
                    self.fall_back("worker exited during startup".to_string(), events);
                    return;
                }
            }
        }

        let timed_out = self.init.as_ref().is_some_and(|i| now >= i.deadline);
        if timed_out {
            if let Some(mut init) = self.init.take() {
                init.worker.shutdown(Duration::ZERO);
            }
            warn!(
                timeout_s = self.config.init_timeout().as_secs(),
                "Segmentation worker startup timed out"
            );
            self.fall_back("worker startup timed out".to_string(), events);
        }
    }

    /// Switch to synchronous inference, or disable when there is no fallback.
    fn fall_back(&mut self, reason: String, events: &mut Vec<SegmentationEvent>) {
        let Some(factory) = &self.fallback_factory else {
            self.disable(reason, events);
            return;
        };
        let mut backend = factory();
        match guarded_initialize(backend.as_mut()) {
            Ok(()) => {
                warn!(%reason, backend = backend.name(), "Falling back to main-thread segmentation");
                self.strategy = Some(Strategy::MainThread(MainThreadStrategy::new(backend)));
                self.state = SegmentationState::MainThreadMode;
                events.push(SegmentationEvent::Ready(SegmentationMode::MainThread));
            }
            Err(e) => {
                backend.dispose();
                self.disable(format!("{reason}; fallback failed: {e}"), events);
            }
        }
    }

    fn disable(&mut self, reason: String, events: &mut Vec<SegmentationEvent>) {
        self.shutdown();
        self.state = SegmentationState::Disabled;
        if !self.disabled_reported {
            self.disabled_reported = true;
            warn!(%reason, "Segmentation disabled; rendering without AI effects");
            events.push(SegmentationEvent::Disabled { reason });
        }
    }

    fn handle_completion(
        &mut self,
        completion: Completion,
        now: Instant,
        events: &mut Vec<SegmentationEvent>,
    ) {
        let Completion {
            id,
            output,
            elapsed,
        } = completion;
        let Some(request) = self.pending.remove(&id) else {
            self.stats.late_discarded += 1;
            trace!(%id, "Discarding late segmentation response");
            return;
        };

        match output {
            Ok(output) => {
                self.consecutive_failures = 0;
                self.latest_mask = Some(Arc::new(output.mask));
                self.latest_landmarks = output.landmarks;
                self.mask_generation += 1;
                self.stats.record_success(now, elapsed);
                trace!(
                    %id,
                    inference_ms = elapsed.as_millis() as u64,
                    round_trip_ms = now.saturating_duration_since(request.submitted_at).as_millis() as u64,
                    "Segmentation mask updated"
                );
                events.push(SegmentationEvent::Completed {
                    id,
                    latency: elapsed,
                });
            }
            Err(e) => {
                self.stats.failed += 1;
                let error = e.to_string();
                events.push(SegmentationEvent::Failed {
                    id,
                    error: error.clone(),
                });
                self.record_failure(error, events);
            }
        }
    }

    fn expire_requests(&mut self, now: Instant, events: &mut Vec<SegmentationEvent>) {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| now >= p.deadline)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.pending.remove(&id);
            self.stats.timed_out += 1;
            events.push(SegmentationEvent::TimedOut { id });
            self.record_failure(format!("request {id} timed out"), events);
        }
    }

    fn record_failure(&mut self, error: String, events: &mut Vec<SegmentationEvent>) {
        self.consecutive_failures += 1;
        warn!(
            %error,
            consecutive = self.consecutive_failures,
            "Segmentation request failed"
        );
        if self.consecutive_failures >= self.config.max_consecutive_failures.max(1) {
            self.disable(
                format!("{} consecutive failures", self.consecutive_failures),
                events,
            );
        }
    }
}

impl Drop for SegmentationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
