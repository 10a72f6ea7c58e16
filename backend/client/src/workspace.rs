//! The conversation list, the active selection, and the theme, kept in sync
//! with a [`StateStore`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use chatbox_core::{Conversation, ConversationHandle};

use crate::store::{AppState, MemoryStore, StateStore, StoreError, Theme};

pub struct Workspace {
    state: Mutex<AppState>,
    store: Box<dyn StateStore>,
}

impl Workspace {
    /// Load saved state from `store`, or start from [`AppState::initial`].
    pub fn open(store: impl StateStore + 'static) -> Result<Self, StoreError> {
        let mut state = store.load()?.unwrap_or_else(AppState::initial);
        repair(&mut state);
        Ok(Self {
            state: Mutex::new(state),
            store: Box::new(store),
        })
    }

    /// A workspace that is never written anywhere.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(AppState::initial()),
            store: Box::new(MemoryStore::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and persist the result.
    fn mutate<T>(&self, f: impl FnOnce(&mut AppState) -> T) -> Result<T, StoreError> {
        let mut state = self.lock();
        let out = f(&mut state);
        self.store.save(&state)?;
        Ok(out)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save(&self.lock())
    }

    pub fn snapshot(&self) -> AppState {
        self.lock().clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.lock().active
    }

    pub fn active(&self) -> Option<Conversation> {
        let state = self.lock();
        let id = state.active?;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    pub fn conversation(&self, id: Uuid) -> Option<Conversation> {
        self.lock().conversations.iter().find(|c| c.id == id).cloned()
    }

    pub fn theme(&self) -> Theme {
        self.lock().theme
    }

    /// Create an empty conversation at the top of the list and make it active.
    pub fn new_chat(&self) -> Result<Uuid, StoreError> {
        self.mutate(|state| {
            let conversation = Conversation::default();
            let id = conversation.id;
            state.conversations.insert(0, conversation);
            state.active = Some(id);
            id
        })
    }

    /// Returns `false` if `id` is unknown.
    pub fn select(&self, id: Uuid) -> Result<bool, StoreError> {
        self.mutate(|state| {
            let known = state.conversations.iter().any(|c| c.id == id);
            if known {
                state.active = Some(id);
            }
            known
        })
    }

    pub fn rename(&self, id: Uuid, title: impl Into<String>) -> Result<bool, StoreError> {
        let title = title.into();
        self.mutate(|state| match state.conversations.iter_mut().find(|c| c.id == id) {
            Some(conversation) => {
                conversation.title = title;
                true
            }
            None => false,
        })
    }

    /// Remove a conversation. Removing the last one leaves a fresh empty chat behind.
    pub fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.mutate(|state| {
            let before = state.conversations.len();
            state.conversations.retain(|c| c.id != id);
            if state.conversations.len() == before {
                return false;
            }
            repair(state);
            true
        })
    }

    pub fn toggle_theme(&self) -> Result<Theme, StoreError> {
        self.mutate(|state| {
            state.theme = state.theme.toggled();
            state.theme
        })
    }
}

/// Keep the list non-empty and the active id pointing into it.
fn repair(state: &mut AppState) {
    if state.conversations.is_empty() {
        state.conversations.push(Conversation::default());
    }
    let active_is_known = state
        .active
        .is_some_and(|id| state.conversations.iter().any(|c| c.id == id));
    if !active_is_known {
        state.active = state.conversations.first().map(|c| c.id);
    }
}

impl ConversationHandle for Workspace {
    fn update_active(&self, f: &mut dyn FnMut(&mut Conversation)) -> Option<Uuid> {
        let mut state = self.lock();
        let id = state.active?;
        let conversation = state.conversations.iter_mut().find(|c| c.id == id)?;
        f(conversation);
        Some(id)
    }

    fn update(&self, id: Uuid, f: &mut dyn FnMut(&mut Conversation)) -> bool {
        let mut state = self.lock();
        match state.conversations.iter_mut().find(|c| c.id == id) {
            Some(conversation) => {
                f(conversation);
                true
            }
            None => {
                debug!(%id, "Conversation is gone, dropping update");
                false
            }
        }
    }

    fn checkpoint(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "Failed to save chat state");
        }
    }
}
