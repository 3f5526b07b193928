use std::sync::Arc;

use tokio::sync::watch;

use crate::error::WebSqlError;

#[derive(Debug, Clone)]
enum GateState<T> {
    Pending,
    Ready(T),
    Failed(Arc<str>),
}

/// One-shot completion signal that any number of waiters can await.
///
/// The gate settles exactly once, either with a value or with a failure reason. Later
/// attempts to settle it are ignored, so readiness never reverts and a failure is permanent.
#[derive(Debug)]
pub struct ReadinessGate<T> {
    label: String,
    state: watch::Sender<GateState<T>>,
}

impl<T: Clone> ReadinessGate<T> {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        let (state, _) = watch::channel(GateState::Pending);
        Self {
            label: label.into(),
            state,
        }
    }

    /// Mark the gate ready. Returns `false` if it had already settled.
    pub fn complete(&self, value: T) -> bool {
        self.settle(GateState::Ready(value))
    }

    /// Mark the gate permanently failed. Returns `false` if it had already settled.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let reason: String = reason.into();
        self.settle(GateState::Failed(Arc::from(reason)))
    }

    fn settle(&self, next: GateState<T>) -> bool {
        self.state.send_if_modified(move |current| {
            if matches!(current, GateState::Pending) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), GateState::Ready(_))
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(*self.state.borrow(), GateState::Pending)
    }

    /// Wait until the gate settles. Returns immediately when it already has.
    ///
    /// # Errors
    /// Returns [`WebSqlError::Initialization`] if the gate failed.
    pub async fn wait(&self) -> Result<T, WebSqlError> {
        let mut rx = self.state.subscribe();
        let settled = {
            let state = rx
                .wait_for(|state| !matches!(state, GateState::Pending))
                .await
                .map_err(|_| self.failure("readiness signal dropped"))?;
            (*state).clone()
        };
        match settled {
            GateState::Ready(value) => Ok(value),
            GateState::Failed(reason) => Err(self.failure(&reason)),
            GateState::Pending => Err(self.failure("readiness signal still pending")),
        }
    }

    fn failure(&self, reason: &str) -> WebSqlError {
        WebSqlError::Initialization {
            name: self.label.clone(),
            reason: reason.to_owned(),
        }
    }
}
