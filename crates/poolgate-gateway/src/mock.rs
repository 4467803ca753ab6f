//! In-memory identity backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use poolgate_backend::{Action, IdentityBackend};
use poolgate_core::BackendError;

/// Records every call and answers from a per-action table.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<HashMap<Action, Result<Value, BackendError>>>,
    calls: Mutex<Vec<(Action, Value)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `action` with `response` from now on.
    pub fn respond(&self, action: Action, response: Result<Value, BackendError>) {
        self.responses.lock().unwrap().insert(action, response);
    }

    pub fn calls(&self) -> Vec<(Action, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> (Action, Value) {
        self.calls().pop().expect("backend was called")
    }
}

#[async_trait]
impl IdentityBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(&self, action: Action, request: Value) -> Result<Value, BackendError> {
        self.calls.lock().unwrap().push((action, request));
        self.responses
            .lock()
            .unwrap()
            .get(&action)
            .cloned()
            .unwrap_or_else(|| Ok(json!({"ok": true})))
    }
}
