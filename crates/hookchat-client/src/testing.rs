use crate::errors::{ErrorEnvelope, ErrorKind};
use crate::executor::RequestExecutor;
use crate::types::{OutcomeEnvelope, WebhookPayload};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a scripted attempt does.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Reply(Value),
    Fail(ErrorKind),
    Outcome(OutcomeEnvelope),
    Panic,
}

/// In-memory executor replaying queued steps. When the queue is empty the
/// fallback step (if any) repeats forever.
#[derive(Clone, Debug, Default)]
pub struct ScriptedExecutor {
    inner: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    fallback: Option<ScriptStep>,
    requests: Vec<(String, String)>,
}

impl ScriptedExecutor {
    pub fn always(step: ScriptStep) -> Self {
        let executor = Self::default();
        executor.state().fallback = Some(step);
        executor
    }

    pub fn push(&self, step: ScriptStep) {
        self.state().steps.push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.state().requests.len()
    }

    /// `(message, session_id)` pairs seen so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state().requests.clone()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(&self, message: &str, session_id: &str) -> OutcomeEnvelope {
        let step = {
            let mut state = self.state();
            state
                .requests
                .push((message.to_string(), session_id.to_string()));
            state.steps.pop_front().or_else(|| state.fallback.clone())
        };

        match step {
            Some(ScriptStep::Reply(body)) => OutcomeEnvelope::success(WebhookPayload::json(body)),
            Some(ScriptStep::Fail(kind)) => OutcomeEnvelope::failure(
                ErrorEnvelope::new(kind).with_developer_message("scripted failure"),
            ),
            Some(ScriptStep::Outcome(outcome)) => outcome,
            Some(ScriptStep::Panic) => panic!("scripted executor panic"),
            None => OutcomeEnvelope::failure(
                ErrorEnvelope::new(ErrorKind::Unknown)
                    .with_developer_message("scripted executor has no steps left"),
            ),
        }
    }
}
