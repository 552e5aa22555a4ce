//! In-memory fakes for the state provider (testing only)
//!
//! [`MemoryStateProvider`] serves pre-registered documents keyed by the
//! rendered [`StateSource`] and records every load request.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StateError;
use crate::provider::{StateProvider, StateSource};
use crate::schema::PipelineState;
use crate::Result;

/// In-memory state provider backed by a `HashMap<source, state>`.
#[derive(Debug, Default)]
pub struct MemoryStateProvider {
    states: Mutex<HashMap<String, PipelineState>>,
    requests: Mutex<Vec<StateSource>>,
}

impl MemoryStateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `state` to be served for `source`.
    pub fn with_state(self, source: &StateSource, state: PipelineState) -> Self {
        self.states
            .lock()
            .unwrap()
            .insert(source.to_string(), state);
        self
    }

    /// Every source requested so far, in order.
    pub fn requests(&self) -> Vec<StateSource> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateProvider for MemoryStateProvider {
    async fn load_pipeline_state(&self, source: &StateSource) -> Result<PipelineState> {
        self.requests.lock().unwrap().push(source.clone());
        let state = self
            .states
            .lock()
            .unwrap()
            .get(&source.to_string())
            .cloned()
            .ok_or_else(|| StateError::NotFound(source.to_string()))?;
        state.validate()?;
        Ok(state)
    }
}
