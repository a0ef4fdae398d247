//! Collects per-attachment results until the whole share action is done.
//!
//! Attachments load asynchronously and finish in any order. The batch is
//! handed out exactly once, by the completion that brings the count to the
//! number of attachments, so no caller can write or signal a partial batch.

use crate::ProducerError;
use handoff_core::payload::encode_media;
use handoff_core::{Channel, MediaItem, StoredValue};
use std::sync::Mutex;

/// Result of loading one attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Media(MediaItem),
    Text(String),
    /// The attachment failed to load or copy; it still counts toward the batch.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchContents {
    pub media: Vec<MediaItem>,
    pub texts: Vec<String>,
}

impl BatchContents {
    pub fn is_empty(&self) -> bool {
        self.media.is_empty() && self.texts.is_empty()
    }

    /// Channel and store value for this batch. Media wins over text when both
    /// are present; `None` when nothing usable was collected.
    pub fn into_payload(self) -> Result<Option<(Channel, StoredValue)>, ProducerError> {
        if !self.media.is_empty() {
            let bytes = encode_media(&self.media)?;
            return Ok(Some((Channel::Media, StoredValue::Data(bytes))));
        }
        if !self.texts.is_empty() {
            return Ok(Some((Channel::Text, StoredValue::Strings(self.texts))));
        }
        Ok(None)
    }
}

#[derive(Debug)]
struct Progress {
    completed: usize,
    slots: Vec<Option<Completion>>,
}

#[derive(Debug)]
pub struct ShareBatch {
    expected: usize,
    progress: Mutex<Progress>,
}

impl ShareBatch {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            progress: Mutex::new(Progress {
                completed: 0,
                slots: vec![None; expected],
            }),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn completed(&self) -> usize {
        self.progress
            .lock()
            .map(|progress| progress.completed)
            .unwrap_or(0)
    }

    /// Records attachment `index`. Returns the assembled batch, in attachment
    /// order, for the last completion only.
    pub fn complete(
        &self,
        index: usize,
        outcome: Completion,
    ) -> Result<Option<BatchContents>, ProducerError> {
        if index >= self.expected {
            return Err(ProducerError::IndexOutOfRange {
                index,
                expected: self.expected,
            });
        }
        let mut progress = self.progress.lock().map_err(|_| ProducerError::Poisoned)?;
        // Every index has completed once the batch was released.
        if progress.completed == self.expected || progress.slots[index].is_some() {
            return Err(ProducerError::DuplicateCompletion { index });
        }
        progress.slots[index] = Some(outcome);
        progress.completed += 1;
        if progress.completed < self.expected {
            return Ok(None);
        }

        let mut contents = BatchContents::default();
        for slot in progress.slots.drain(..).flatten() {
            match slot {
                Completion::Media(item) => contents.media.push(item),
                Completion::Text(text) => contents.texts.push(text),
                Completion::Skipped => {}
            }
        }
        Ok(Some(contents))
    }
}
