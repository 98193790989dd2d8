//! Finished conversations, keyed by id

use crate::state::ConversationState;
use dashmap::DashMap;
use std::sync::Arc;
use storecrew_core::ConversationId;

pub struct ConversationRegistry {
    conversations: DashMap<ConversationId, Arc<ConversationState>>,
}

impl Default for ConversationRegistry {
    fn default() -> Self { Self::new() }
}

impl ConversationRegistry {
    pub fn new() -> Self { Self { conversations: DashMap::new() } }

    pub fn insert(&self, state: ConversationState) -> Arc<ConversationState> {
        let state = Arc::new(state);
        self.conversations.insert(state.id().clone(), state.clone());
        state
    }

    pub fn get(&self, id: &ConversationId) -> Option<Arc<ConversationState>> {
        self.conversations.get(id).map(|s| s.clone())
    }

    pub fn list(&self) -> Vec<ConversationId> {
        self.conversations.iter().map(|e| e.key().clone()).collect()
    }

    pub fn remove(&self, id: &ConversationId) -> Option<Arc<ConversationState>> {
        self.conversations.remove(id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
