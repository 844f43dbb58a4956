//! Guards consulted by every handler before it touches the session.

use crate::session::Session;
use crate::types::{PeerId, Phase};

#[derive(Debug, Clone)]
pub struct Validator {
    local_id: PeerId,
}

impl Validator {
    pub fn new(local_id: PeerId) -> Self {
        Self { local_id }
    }

    /// Broadcast echo of our own publication.
    pub fn is_from_myself(&self, sender: &PeerId) -> bool {
        *sender == self.local_id
    }

    /// `true` (and logged) when the session is not in `expected`.
    pub fn is_unexpected_phase(&self, session: &Session, expected: Phase) -> bool {
        if session.phase() != expected {
            tracing::debug!(
                peer = %self.local_id,
                "expected phase {expected}, actual {}",
                session.phase()
            );
            return true;
        }
        false
    }

    /// Play messages that arrive before play started are leftovers.
    pub fn game_not_ready(&self, session: &Session) -> bool {
        if session.phase().is_before_play() {
            tracing::debug!(peer = %self.local_id, "game not ready for play messages yet");
            return true;
        }
        false
    }

    /// A message from someone other than the bound opponent.
    pub fn is_stranger(&self, session: &Session, sender: &PeerId) -> bool {
        match session.opponent() {
            Some(opponent) if opponent != sender => {
                tracing::debug!(peer = %self.local_id, "ignoring {sender}, bound to {opponent}");
                true
            }
            _ => false,
        }
    }
}
