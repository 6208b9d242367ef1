//! Dedicated inference thread.
//!
//! Frames move into the thread by value and results come back over a
//! channel; nothing is shared. The command channel holds one frame, so a
//! send while the thread is busy fails immediately and hands the frame back.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camfx_core::FrameBuffer;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use tracing::{debug, info, warn};

use crate::backend::{guarded_infer, guarded_initialize, InferenceOutput, SegmentationBackend};
use crate::error::{AiError, AiResult};
use crate::RequestId;

const THREAD_NAME: &str = "camfx-segmentation";

/// Request sent to the worker.
enum WorkerCommand {
    Infer { id: RequestId, frame: FrameBuffer },
}

/// Message from the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Backend initialized; the worker accepts frames.
    Ready,
    /// Backend initialization failed; the thread has exited.
    InitFailed(String),
    /// One inference finished.
    Completed {
        id: RequestId,
        output: AiResult<InferenceOutput>,
        elapsed: Duration,
    },
}

/// Outcome of polling the event channel.
#[derive(Debug)]
pub enum WorkerPoll {
    Event(WorkerEvent),
    Empty,
    /// The thread exited and every event has been read.
    Disconnected,
}

/// Handle to the inference thread.
pub struct SegmentationWorker {
    commands: Option<Sender<WorkerCommand>>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    backend_name: String,
}

impl SegmentationWorker {
    /// Spawn the thread. The backend is initialized on the new thread; watch
    /// for [`WorkerEvent::Ready`].
    pub fn spawn(backend: Box<dyn SegmentationBackend>) -> AiResult<Self> {
        let backend_name = backend.name().to_string();
        let (command_tx, command_rx) = crossbeam_channel::bounded::<WorkerCommand>(1);
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<WorkerEvent>();

        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || Self::run(backend, command_rx, event_tx))
            .map_err(|e| AiError::WorkerSpawn(e.to_string()))?;

        debug!(backend = %backend_name, "Segmentation worker spawned");
        Ok(Self {
            commands: Some(command_tx),
            events: event_rx,
            handle: Some(handle),
            backend_name,
        })
    }

    fn run(
        mut backend: Box<dyn SegmentationBackend>,
        commands: Receiver<WorkerCommand>,
        events: Sender<WorkerEvent>,
    ) {
        info!(backend = backend.name(), "Segmentation worker started");

        if let Err(e) = guarded_initialize(backend.as_mut()) {
            warn!(backend = backend.name(), error = %e, "Segmentation backend failed to initialize");
            let _ = events.send(WorkerEvent::InitFailed(e.to_string()));
            backend.dispose();
            return;
        }
        if events.send(WorkerEvent::Ready).is_err() {
            backend.dispose();
            return;
        }

        while let Ok(command) = commands.recv() {
            match command {
                WorkerCommand::Infer { id, frame } => {
                    let start = Instant::now();
                    let output = guarded_infer(backend.as_mut(), &frame);
                    let event = WorkerEvent::Completed {
                        id,
                        output,
                        elapsed: start.elapsed(),
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
        }

        backend.dispose();
        info!("Segmentation worker stopped");
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Hand a frame to the thread without blocking. Returns the frame when
    /// the thread is busy or gone.
    pub fn try_send(&self, id: RequestId, frame: FrameBuffer) -> Result<(), FrameBuffer> {
        let Some(commands) = &self.commands else {
            return Err(frame);
        };
        commands
            .try_send(WorkerCommand::Infer { id, frame })
            .map_err(|e| match e {
                TrySendError::Full(WorkerCommand::Infer { frame, .. })
                | TrySendError::Disconnected(WorkerCommand::Infer { frame, .. }) => frame,
            })
    }

    /// Next event without blocking.
    pub fn try_recv(&self) -> WorkerPoll {
        match self.events.try_recv() {
            Ok(event) => WorkerPoll::Event(event),
            Err(TryRecvError::Empty) => WorkerPoll::Empty,
            Err(TryRecvError::Disconnected) => WorkerPoll::Disconnected,
        }
    }

    /// Next event, blocking until `deadline` at the latest.
    pub fn recv_deadline(&self, deadline: Instant) -> WorkerPoll {
        match self.events.recv_deadline(deadline) {
            Ok(event) => WorkerPoll::Event(event),
            Err(RecvTimeoutError::Timeout) => WorkerPoll::Empty,
            Err(RecvTimeoutError::Disconnected) => WorkerPoll::Disconnected,
        }
    }

    /// Close the command channel and wait up to `grace` for the thread to
    /// exit. A thread stuck inside the backend is detached.
    pub fn shutdown(&mut self, grace: Duration) {
        self.commands = None;
        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + grace;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            warn!(backend = %self.backend_name, "Segmentation worker did not stop in time; detaching");
        }
    }
}

impl Drop for SegmentationWorker {
    fn drop(&mut self) {
        self.shutdown(Duration::from_millis(100));
    }
}
