//! Host-side collaborators: the frame sink that receives completed frames
//! and the property registry that mirrors the control surface.

use flicam_core::{ParamValue, ParameterSpec};
use flicam_hw::{FrameBufferDescriptor, FrameMetadata};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("frame sink buffer overflow")]
    BufferOverflow,
}

/// Destination for delivered frames. Called on the SDK's delivery thread.
pub trait FrameSink: Send + Sync {
    fn insert(
        &self,
        buffer: &[u8],
        descriptor: &FrameBufferDescriptor,
        channels: u32,
        metadata: &FrameMetadata,
    ) -> Result<(), SinkError>;

    /// Drop every queued frame.
    fn clear_backlog(&self);
}

/// One frame held by the [`FrameQueue`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub descriptor: FrameBufferDescriptor,
    pub channels: u32,
    pub metadata: FrameMetadata,
}

/// Bounded FIFO frame sink. Inserting into a full queue overflows.
pub struct FrameQueue {
    capacity: usize,
    frames: Mutex<VecDeque<Frame>>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: Mutex::new(VecDeque::new()),
        }
    }

    fn frames(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    /// Take the oldest frame.
    pub fn pop(&self) -> Option<Frame> {
        self.frames().pop_front()
    }
}

impl FrameSink for FrameQueue {
    fn insert(
        &self,
        buffer: &[u8],
        descriptor: &FrameBufferDescriptor,
        channels: u32,
        metadata: &FrameMetadata,
    ) -> Result<(), SinkError> {
        let mut frames = self.frames();
        if frames.len() >= self.capacity {
            return Err(SinkError::BufferOverflow);
        }
        frames.push_back(Frame {
            data: buffer.to_vec(),
            descriptor: *descriptor,
            channels,
            metadata: metadata.clone(),
        });
        Ok(())
    }

    fn clear_backlog(&self) {
        let dropped = {
            let mut frames = self.frames();
            let n = frames.len();
            frames.clear();
            n
        };
        tracing::debug!(dropped, "frame backlog cleared");
    }
}

/// Host property registry.
pub trait PropertyHost: Send + Sync {
    /// Replace the whole registered parameter set.
    fn replace_all(&self, specs: &[ParameterSpec]);

    /// A parameter's value changed.
    fn notify(&self, name: &str, value: &ParamValue);
}

/// A registered parameter with its last notified value.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyEntry {
    #[serde(flatten)]
    pub spec: ParameterSpec,
    pub value: Option<ParamValue>,
}

#[derive(Default)]
struct TableState {
    specs: Vec<ParameterSpec>,
    values: HashMap<String, ParamValue>,
}

/// In-process [`PropertyHost`].
#[derive(Default)]
pub struct PropertyTable {
    state: RwLock<TableState>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered parameters in registration order.
    pub fn entries(&self) -> Vec<PropertyEntry> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .specs
            .iter()
            .map(|spec| PropertyEntry {
                spec: spec.clone(),
                value: state.values.get(spec.name).cloned(),
            })
            .collect()
    }
}

#[cfg(test)]
impl FrameQueue {
    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }
}

#[cfg(test)]
impl PropertyTable {
    pub fn names(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.specs.iter().map(|s| s.name.to_string()).collect()
    }

    pub fn value(&self, name: &str) -> Option<ParamValue> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.values.get(name).cloned()
    }
}

impl PropertyHost for PropertyTable {
    fn replace_all(&self, specs: &[ParameterSpec]) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.specs = specs.to_vec();
        state.values.clear();
        tracing::debug!(count = specs.len(), "property set replaced");
    }

    fn notify(&self, name: &str, value: &ParamValue) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.specs.iter().any(|s| s.name == name) {
            state.values.insert(name.to_string(), value.clone());
        } else {
            tracing::trace!(param = name, "notification for unregistered parameter");
        }
    }
}
