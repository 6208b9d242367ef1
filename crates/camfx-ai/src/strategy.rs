//! Execution strategies: a dedicated worker thread, or synchronous
//! inference on the caller's thread.

use std::time::{Duration, Instant};

use camfx_core::FrameBuffer;
use tracing::debug;

use crate::backend::{guarded_infer, InferenceOutput, SegmentationBackend};
use crate::error::{AiError, AiResult};
use crate::worker::{SegmentationWorker, WorkerEvent, WorkerPoll};
use crate::{RequestId, SegmentationMode};

/// A finished request as reported by a strategy.
#[derive(Debug)]
pub struct Completion {
    pub id: RequestId,
    pub output: AiResult<InferenceOutput>,
    pub elapsed: Duration,
}

/// Common surface of the two execution modes.
pub trait SegmentationStrategy {
    fn mode(&self) -> SegmentationMode;

    /// Start inference on `frame`. Returns the frame when it cannot be
    /// accepted right now.
    fn submit(&mut self, id: RequestId, frame: FrameBuffer) -> Result<(), FrameBuffer>;

    /// Move finished requests into `out`, waiting until `block_until` for
    /// the first one when given. Errors when the executor is gone.
    fn drain(&mut self, out: &mut Vec<Completion>, block_until: Option<Instant>) -> AiResult<()>;

    fn dispose(&mut self);
}

/// Inference on the `camfx-segmentation` thread.
pub struct WorkerStrategy {
    worker: SegmentationWorker,
}

impl WorkerStrategy {
    pub fn new(worker: SegmentationWorker) -> Self {
        Self { worker }
    }
}

impl SegmentationStrategy for WorkerStrategy {
    fn mode(&self) -> SegmentationMode {
        SegmentationMode::Worker
    }

    fn submit(&mut self, id: RequestId, frame: FrameBuffer) -> Result<(), FrameBuffer> {
        self.worker.try_send(id, frame)
    }

    fn drain(&mut self, out: &mut Vec<Completion>, block_until: Option<Instant>) -> AiResult<()> {
        let mut first = true;
        loop {
            let poll = match block_until {
                Some(deadline) if first => self.worker.recv_deadline(deadline),
                _ => self.worker.try_recv(),
            };
            first = false;
            match poll {
                WorkerPoll::Event(WorkerEvent::Completed { id, output, elapsed }) => {
                    out.push(Completion { id, output, elapsed });
                }
                WorkerPoll::Event(other) => debug!(event = ?other, "Ignoring worker lifecycle event"),
                WorkerPoll::Empty => return Ok(()),
                WorkerPoll::Disconnected => return Err(AiError::WorkerGone),
            }
        }
    }

    fn dispose(&mut self) {
        self.worker.shutdown(Duration::from_millis(100));
    }
}

/// Synchronous inference on the render thread.
pub struct MainThreadStrategy {
    backend: Box<dyn SegmentationBackend>,
    finished: Vec<Completion>,
    disposed: bool,
}

impl MainThreadStrategy {
    /// Wrap an already-initialized backend.
    pub fn new(backend: Box<dyn SegmentationBackend>) -> Self {
        Self {
            backend,
            finished: Vec::new(),
            disposed: false,
        }
    }
}

impl SegmentationStrategy for MainThreadStrategy {
    fn mode(&self) -> SegmentationMode {
        SegmentationMode::MainThread
    }

    fn submit(&mut self, id: RequestId, frame: FrameBuffer) -> Result<(), FrameBuffer> {
        if self.disposed || !self.finished.is_empty() {
            return Err(frame);
        }
        let start = Instant::now();
        let output = guarded_infer(self.backend.as_mut(), &frame);
        self.finished.push(Completion {
            id,
            output,
            elapsed: start.elapsed(),
        });
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<Completion>, _block_until: Option<Instant>) -> AiResult<()> {
        out.append(&mut self.finished);
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.backend.dispose();
            self.disposed = true;
        }
    }
}

/// The strategy chosen at initialization.
pub enum Strategy {
    Worker(WorkerStrategy),
    MainThread(MainThreadStrategy),
}

impl Strategy {
    fn inner(&mut self) -> &mut dyn SegmentationStrategy {
        match self {
            Strategy::Worker(s) => s,
            Strategy::MainThread(s) => s,
        }
    }

    pub fn mode(&self) -> SegmentationMode {
        match self {
            Strategy::Worker(s) => s.mode(),
            Strategy::MainThread(s) => s.mode(),
        }
    }

    pub fn submit(&mut self, id: RequestId, frame: FrameBuffer) -> Result<(), FrameBuffer> {
        self.inner().submit(id, frame)
    }

    pub fn drain(&mut self, out: &mut Vec<Completion>, block_until: Option<Instant>) -> AiResult<()> {
        self.inner().drain(out, block_until)
    }

    pub fn dispose(&mut self) {
        self.inner().dispose()
    }
}
