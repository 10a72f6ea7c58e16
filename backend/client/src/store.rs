//! Persisted client state and where it lives.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use chatbox_core::{Conversation, Message};

/// Title of the conversation a fresh install starts with.
pub const WELCOME_TITLE: &str = "ChatBox Ai";

/// Greeting shown in the welcome conversation.
pub const WELCOME_GREETING: &str = "Hi! I'm your helpful assistant. Ask me anything.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Everything the client remembers between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppState {
    /// Most recently created first.
    pub conversations: Vec<Conversation>,
    pub active: Option<Uuid>,
    #[serde(default)]
    pub theme: Theme,
}

impl AppState {
    /// State of a client that has never saved anything.
    pub fn initial() -> Self {
        let mut welcome = Conversation::new(WELCOME_TITLE);
        welcome.push(Message::assistant(WELCOME_GREETING));
        Self {
            active: Some(welcome.id),
            conversations: vec![welcome],
            theme: Theme::default(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Backing storage for [`AppState`].
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<AppState>, StoreError>;

    fn save(&self, state: &AppState) -> Result<(), StoreError>;
}

impl<S: StateStore + ?Sized> StateStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<AppState>, StoreError> {
        (**self).load()
    }

    fn save(&self, state: &AppState) -> Result<(), StoreError> {
        (**self).save(state)
    }
}

/// JSON file on disk, replaced atomically on every save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<AppState>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, state: &AppState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state)?;

        // Write to a temp file first, then rename.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<AppState>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last saved state.
    pub fn snapshot(&self) -> Option<AppState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<AppState>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &AppState) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
