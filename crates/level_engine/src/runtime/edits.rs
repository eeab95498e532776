use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::level::{GroupId, ObjectId, Vec2};

/// A mutation requested from outside the simulation thread. Edits are applied
/// at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelEdit {
    SetPosition { object: ObjectId, position: Vec2 },
    Translate { object: ObjectId, delta: Vec2 },
    CancelMovesForGroup(GroupId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditQueueError {
    #[error("deferred edit queue is full")]
    Full,
    #[error("level is no longer running")]
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct EditSender {
    sender: Sender<LevelEdit>,
}

impl EditSender {
    pub fn try_send(&self, edit: LevelEdit) -> Result<(), EditQueueError> {
        self.sender.try_send(edit).map_err(|error| match error {
            TrySendError::Full(_) => EditQueueError::Full,
            TrySendError::Disconnected(_) => EditQueueError::Disconnected,
        })
    }
}

#[derive(Debug)]
pub(crate) struct EditQueue {
    sender: Sender<LevelEdit>,
    receiver: Receiver<LevelEdit>,
    capacity: usize,
}

impl EditQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    pub(crate) fn sender(&self) -> EditSender {
        EditSender {
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes the edits queued so far. Edits sent while draining wait for the
    /// next call.
    pub(crate) fn drain(&self) -> Vec<LevelEdit> {
        let queued = self.receiver.len();
        self.receiver.try_iter().take(queued).collect()
    }
}
