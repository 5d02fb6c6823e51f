use crate::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Progress of one orchestrated send, emitted while attempts run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryEvent {
    AttemptStarted {
        attempt: u32,
        max_attempts: u32,
    },
    Retrying {
        attempt: u32,
        next_attempt: u32,
        delay_ms: u64,
        error_kind: ErrorKind,
        notice: String,
    },
    Succeeded {
        attempt: u32,
    },
    GaveUp {
        attempt: u32,
        error_kind: ErrorKind,
        message: String,
    },
    Exhausted {
        attempts: u32,
        error_kind: ErrorKind,
        message: String,
    },
}

impl RetryEvent {
    /// Text a host can show for this state, if any.
    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Retrying { notice, .. } => Some(notice),
            Self::GaveUp { message, .. } | Self::Exhausted { message, .. } => Some(message),
            Self::AttemptStarted { .. } | Self::Succeeded { .. } => None,
        }
    }
}

pub trait RetryEventObserver: Send + Sync {
    fn on_event(&self, event: &RetryEvent);
}

impl<F> RetryEventObserver for F
where
    F: Fn(&RetryEvent) + Send + Sync,
{
    fn on_event(&self, event: &RetryEvent) {
        self(event);
    }
}

pub type SharedRetryEventObserver = Arc<dyn RetryEventObserver>;
pub type RetryEventSender = mpsc::UnboundedSender<RetryEvent>;
pub type RetryEventReceiver = mpsc::UnboundedReceiver<RetryEvent>;

#[derive(Clone, Default)]
pub struct RetryEventSink {
    observer: Option<SharedRetryEventObserver>,
    sender: Option<RetryEventSender>,
}

impl RetryEventSink {
    pub fn with_observer(observer: SharedRetryEventObserver) -> Self {
        Self {
            observer: Some(observer),
            sender: None,
        }
    }

    pub fn with_sender(sender: RetryEventSender) -> Self {
        Self {
            observer: None,
            sender: Some(sender),
        }
    }

    pub fn observer(mut self, observer: SharedRetryEventObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn sender(mut self, sender: RetryEventSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.observer.is_some() || self.sender.is_some()
    }

    pub fn emit(&self, event: RetryEvent) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_event(&event);
        }
        if let Some(sender) = self.sender.as_ref() {
            let _ = sender.send(event);
        }
    }
}

impl std::fmt::Debug for RetryEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryEventSink")
            .field("observer", &self.observer.is_some())
            .field("sender", &self.sender.is_some())
            .finish()
    }
}

pub fn retry_event_channel() -> (RetryEventSender, RetryEventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn retry_event_sink_observer_and_sender_expected_both_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer_seen = Arc::clone(&seen);
        let observer: SharedRetryEventObserver = Arc::new(move |event: &RetryEvent| {
            observer_seen
                .lock()
                .expect("observer mutex should lock")
                .push(event.clone());
        });
        let (tx, mut rx) = retry_event_channel();
        let sink = RetryEventSink::with_observer(observer).sender(tx);
        sink.emit(RetryEvent::Succeeded { attempt: 2 });

        let streamed = rx.try_recv().expect("channel should receive one event");
        assert_eq!(streamed, RetryEvent::Succeeded { attempt: 2 });
        assert_eq!(seen.lock().expect("observer mutex should lock").len(), 1);
    }

    #[test]
    fn retrying_event_serializes_with_snake_case_tag() {
        let event = RetryEvent::Retrying {
            attempt: 1,
            next_attempt: 2,
            delay_ms: 1_000,
            error_kind: ErrorKind::Network,
            notice: ErrorKind::Network.retrying_message().to_string(),
        };
        let value = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(value["kind"], "retrying");
        assert_eq!(value["error_kind"], "NETWORK");
        assert_eq!(event.notice(), Some(ErrorKind::Network.retrying_message()));
    }

    #[test]
    fn default_sink_expected_disabled() {
        let sink = RetryEventSink::default();
        assert!(!sink.is_enabled());
        sink.emit(RetryEvent::Succeeded { attempt: 1 });
    }
}
