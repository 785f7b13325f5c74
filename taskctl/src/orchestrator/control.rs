//! Per-workflow cooperative control: pause/cancel flags and the event
//! broadcast `Subscribe` reads from.
//!
//! A flag only takes effect at the next step boundary a `drive` loop
//! checks - there is no preemption mid-step. That boundary check also
//! runs before the very first step, so a flag set before a workflow's
//! driver ever runs is still honored.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::broadcast;

use crate::domain::WorkflowStatus;

const NONE: u8 = 0;
const PAUSE: u8 = 1;
const CANCEL: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    None,
    Pause,
    Cancel,
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StatusChanged { status: WorkflowStatus },
    StepStarted { step_index: usize },
    StepCompleted { step_index: usize, succeeded: bool },
}

pub struct WorkflowControl {
    requested: AtomicU8,
    events: broadcast::Sender<WorkflowEvent>,
}

impl WorkflowControl {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(64);
        Self { requested: AtomicU8::new(NONE), events }
    }

    pub fn request_pause(&self) {
        self.requested.store(PAUSE, Ordering::SeqCst);
    }

    pub fn request_cancel(&self) {
        self.requested.store(CANCEL, Ordering::SeqCst);
    }

    /// Consume whatever was requested, resetting to `None`. Called once
    /// per step boundary by the drive loop.
    pub fn take_request(&self) -> ControlRequest {
        match self.requested.swap(NONE, Ordering::SeqCst) {
            PAUSE => ControlRequest::Pause,
            CANCEL => ControlRequest::Cancel,
            _ => ControlRequest::None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // No subscribers is the common case outside tests; a send error
        // here just means nobody's listening, not a failure.
        let _ = self.events.send(event);
    }
}

impl Default for WorkflowControl {
    fn default() -> Self {
        Self::new()
    }
}
