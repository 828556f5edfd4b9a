//! Token and webhook registry.
//!
//! Three maps correlate callback tokens with the executions awaiting them
//! and hold the callback content once it lands. All three live behind one
//! lock so that no reader ever sees a token in one direction but not the
//! other.

use changegate_core::{CallbackPayload, CallbackToken, ExecutionId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct Maps {
    token_to_execution: HashMap<CallbackToken, ExecutionId>,
    execution_to_token: HashMap<ExecutionId, CallbackToken>,
    callback_content: HashMap<ExecutionId, CallbackPayload>,
}

/// Process-wide, thread-safe registry of outstanding callbacks.
#[derive(Debug, Default)]
pub struct WebhookRegistry {
    maps: RwLock<Maps>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind a token to an execution in both directions.
    ///
    /// A no-op when either side is empty. Callers guarantee the execution
    /// holds no token yet.
    pub fn register(&self, token: &CallbackToken, execution_id: &ExecutionId) {
        if token.is_empty() || execution_id.is_empty() {
            return;
        }
        let mut maps = self.write();
        maps.token_to_execution.insert(token.clone(), execution_id.clone());
        maps.execution_to_token.insert(execution_id.clone(), token.clone());
        debug!(token = %token, execution = %execution_id, "Token registered");
    }

    pub fn token_for(&self, execution_id: &ExecutionId) -> Option<CallbackToken> {
        self.read().execution_to_token.get(execution_id).cloned()
    }

    /// True while the token is bound to some execution.
    pub fn is_waiting(&self, token: &CallbackToken) -> bool {
        self.read().token_to_execution.contains_key(token)
    }

    pub fn execution_for(&self, token: &CallbackToken) -> Option<ExecutionId> {
        self.read().token_to_execution.get(token).cloned()
    }

    pub fn set_callback_content(&self, execution_id: &ExecutionId, payload: CallbackPayload) {
        self.write().callback_content.insert(execution_id.clone(), payload);
    }

    pub fn callback_content(&self, execution_id: &ExecutionId) -> Option<CallbackPayload> {
        self.read().callback_content.get(execution_id).cloned()
    }

    pub fn has_callback_content(&self, execution_id: &ExecutionId) -> bool {
        self.read().callback_content.contains_key(execution_id)
    }

    /// Remove and return the callback content. A second call returns `None`.
    pub fn remove_callback_content(&self, execution_id: &ExecutionId) -> Option<CallbackPayload> {
        self.write().callback_content.remove(execution_id)
    }

    /// Unbind the execution's token, both directions.
    pub fn remove_token(&self, execution_id: &ExecutionId) -> Option<CallbackToken> {
        let mut maps = self.write();
        let token = maps.execution_to_token.remove(execution_id)?;
        maps.token_to_execution.remove(&token);
        Some(token)
    }

    /// Resolve a token: unbind it and store the payload in one step.
    ///
    /// Returns the execution the token belonged to, or `None` if the token
    /// is unknown or was already resolved.
    pub fn resolve(&self, token: &CallbackToken, payload: CallbackPayload) -> Option<ExecutionId> {
        let mut maps = self.write();
        let execution_id = maps.token_to_execution.remove(token)?;
        maps.execution_to_token.remove(&execution_id);
        maps.callback_content.insert(execution_id.clone(), payload);
        Some(execution_id)
    }

    /// Same as [`resolve`](Self::resolve), addressed by execution.
    pub fn resolve_execution(
        &self,
        execution_id: &ExecutionId,
        payload: CallbackPayload,
    ) -> Option<CallbackToken> {
        let mut maps = self.write();
        let token = maps.execution_to_token.remove(execution_id)?;
        maps.token_to_execution.remove(&token);
        maps.callback_content.insert(execution_id.clone(), payload);
        Some(token)
    }

    /// Drop every entry belonging to an execution, including stage-scoped ones.
    pub fn purge_execution(&self, execution_id: &ExecutionId) -> usize {
        let mut maps = self.write();
        let Maps {
            token_to_execution,
            execution_to_token,
            callback_content,
        } = &mut *maps;

        let before = execution_to_token.len() + callback_content.len();
        execution_to_token.retain(|id, token| {
            let keep = !id.same_execution(execution_id);
            if !keep {
                token_to_execution.remove(token);
            }
            keep
        });
        callback_content.retain(|id, _| !id.same_execution(execution_id));
        before - (execution_to_token.len() + callback_content.len())
    }

    pub fn pending(&self) -> usize {
        self.read().token_to_execution.len()
    }
}
