/*!
 * Progress / event bus
 *
 * A publish-subscribe channel the engine uses to push `Status` snapshots
 * and capture-completion records to whatever transport layer is wired in.
 * The core never knows about HTTP or push protocols; it only ever
 * publishes typed events here.
 */

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::tracker::Classification;

/// Events the engine publishes over the lifetime of a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A capture reached quorum and was removed from the tracker.
    CaptureComplete {
        capture_number: String,
        project: String,
        verified: bool,
        sensor_code: Option<String>,
        session_id: String,
        class: Classification,
        counter_value: u32,
    },
    /// A Per-Source Task was dispatched for a (node, share).
    TaskStarted { node: String, share: String },
    /// A Per-Source Task's scan+copy pass finished.
    TaskFinished {
        node: String,
        share: String,
        copied_files: u32,
        failed_files: u32,
    },
}

/// Engine-side handle: publishes events to every current subscriber.
#[derive(Clone)]
pub struct ProgressBus {
    sender: Sender<ProgressEvent>,
    receiver: Receiver<ProgressEvent>,
}

impl ProgressBus {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn publish(&self, event: ProgressEvent) {
        // Unbounded channel with no guaranteed subscriber: a send error
        // just means nobody is currently listening.
        let _ = self.sender.send(event);
    }

    /// A subscriber handle over the same underlying channel. Multiple
    /// subscribers compete for each event (this is a work queue, not a
    /// broadcast); transports needing fan-out should maintain their own
    /// distribution beyond this single internal receiver.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.receiver.clone()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}
