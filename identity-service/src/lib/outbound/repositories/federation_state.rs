use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::federation::errors::FederationError;
use crate::domain::federation::models::CsrfState;
use crate::domain::federation::models::SessionKey;
use crate::domain::federation::ports::StateStore;

/// CSRF states for in-flight federation attempts, keyed by caller session.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<SessionKey, CsrfState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, session: SessionKey, state: CsrfState) -> Result<(), FederationError> {
        self.states.lock().await.insert(session, state);
        Ok(())
    }

    async fn take(&self, session: &SessionKey) -> Result<Option<CsrfState>, FederationError> {
        Ok(self.states.lock().await.remove(session))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, FederationError> {
        let mut states = self.states.lock().await;
        let before = states.len();
        states.retain(|_, state| !state.is_expired(now));
        Ok(before - states.len())
    }
}
