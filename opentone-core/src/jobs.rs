use crossbeam::channel::{unbounded, Receiver, Sender};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::PrimaryKey;

pub type BoxedJobQueue = Arc<dyn JobQueue>;

/// Work that is handed off to asynchronous workers. Handlers enqueue and
/// move on, they never await completion or observe failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    /// Render the waveform image for a freshly uploaded track
    WaveformExtract { asset_id: PrimaryKey },
    /// Tell one follower about a new upload
    AssetNotification {
        asset_id: PrimaryKey,
        follower_id: PrimaryKey,
    },
}

/// Represents a type that can accept jobs for later execution
pub trait JobQueue: Send + Sync + 'static {
    fn enqueue(&self, job: Job);
}

/// Hands jobs to whatever worker is draining the channel
pub struct ChannelJobQueue {
    sender: Sender<Job>,
}

impl ChannelJobQueue {
    pub fn new() -> (Self, Receiver<Job>) {
        let (sender, receiver) = unbounded();

        (Self { sender }, receiver)
    }
}

impl JobQueue for ChannelJobQueue {
    fn enqueue(&self, job: Job) {
        if let Err(e) = self.sender.send(job) {
            // Fire-and-forget: a closed queue must never fail the request
            warn!("Dropped job because the queue is closed: {:?}", e.0);
        }
    }
}
