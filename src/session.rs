//! Caller-owned conversation state.
//!
//! The engine never stores sessions itself. A service keeps a
//! [`SessionStore`] and lends one [`SessionState`] mutably per request, which
//! keeps concurrent conversations isolated.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(SessionId)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub intent: Intent,
    pub success: bool,
    pub row_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    history: VecDeque<ConversationTurn>,
    previous_intent: Option<Intent>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_intent(&self) -> Option<&Intent> {
        self.previous_intent.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.history.iter()
    }

    pub fn turns(&self) -> usize {
        self.history.len()
    }

    /// Appends a turn, dropping the oldest ones beyond `limit`. Only turns
    /// that reached execution become the context for the next question.
    pub fn record(&mut self, turn: ConversationTurn, limit: usize) {
        if !turn.intent.clarification_needed {
            self.previous_intent = Some(turn.intent.clone());
        }
        self.history.push_back(turn);
        while self.history.len() > limit.max(1) {
            self.history.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.previous_intent = None;
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(id, SessionState::new());
        id
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionState> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut SessionState> {
        self.sessions.get_mut(id)
    }

    pub fn get_or_create(&mut self, id: SessionId) -> &mut SessionState {
        self.sessions.entry(id).or_default()
    }

    /// Forgets the conversation but keeps the session id registered.
    pub fn clear(&mut self, id: &SessionId) -> bool {
        match self.sessions.get_mut(id) {
            Some(state) => {
                state.clear();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<SessionState> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
