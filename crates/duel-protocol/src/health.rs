/// HealthCheck: opponent liveness during play.
///
/// Pure state machine: the runtime calls `refresh` on opponent traffic and
/// `check` on every liveness tick. Fail-suspect only: a slow opponent and a
/// dead one look the same, so the verdict is `Inconsistent`, never "gone".
use crate::session::Session;
use crate::types::Phase;

/// Consecutive silent liveness windows tolerated during play.
pub const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Result of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Not playing or no opponent bound; nothing to watch.
    Idle,
    /// Opponent was heard since the previous check.
    Alive,
    /// Opponent silent for `misses` consecutive windows.
    Suspect { misses: u32 },
    /// Threshold reached; the session must go `Inconsistent`.
    Failed { misses: u32 },
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Opponent traffic seen since the previous check.
    responded: bool,
    misses: u32,
    max_misses: u32,
}

impl HealthCheck {
    pub fn new() -> Self {
        Self::with_threshold(MAX_MISSED_HEARTBEATS)
    }

    pub fn with_threshold(max_misses: u32) -> Self {
        Self {
            responded: true,
            misses: 0,
            max_misses: max_misses.max(1),
        }
    }

    /// Any message from the opponent counts as a heartbeat.
    pub fn refresh(&mut self) {
        self.responded = true;
        self.misses = 0;
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// One liveness window elapsed.
    ///
    /// Only counts while the session is `InProgress` with a bound opponent.
    pub fn check(&mut self, session: &Session) -> Liveness {
        if session.opponent().is_none() || session.phase() != Phase::InProgress {
            return Liveness::Idle;
        }

        if std::mem::replace(&mut self.responded, false) {
            return Liveness::Alive;
        }

        self.misses += 1;
        if self.misses >= self.max_misses {
            Liveness::Failed {
                misses: self.misses,
            }
        } else {
            Liveness::Suspect {
                misses: self.misses,
            }
        }
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_session() -> Session {
        let mut session = Session::new();
        session.bind_opponent("bob".into());
        session.set_phase(Phase::InProgress);
        session
    }

    #[test]
    fn idle_without_opponent_or_outside_play() {
        let mut health = HealthCheck::new();
        let mut session = Session::new();
        session.set_phase(Phase::InProgress);
        assert_eq!(health.check(&session), Liveness::Idle);

        session.bind_opponent("bob".into());
        session.set_phase(Phase::ChoosingMoveType);
        assert_eq!(health.check(&session), Liveness::Idle);
        assert_eq!(health.misses(), 0);
    }

    #[test]
    fn three_silent_windows_fail() {
        let mut health = HealthCheck::new();
        let session = playing_session();

        // First window consumes the initial "responded" credit.
        assert_eq!(health.check(&session), Liveness::Alive);
        assert_eq!(health.check(&session), Liveness::Suspect { misses: 1 });
        assert_eq!(health.check(&session), Liveness::Suspect { misses: 2 });
        assert_eq!(health.check(&session), Liveness::Failed { misses: 3 });
    }

    #[test]
    fn refresh_resets_counter() {
        let mut health = HealthCheck::new();
        let session = playing_session();

        health.check(&session);
        health.check(&session);
        health.check(&session);
        assert_eq!(health.misses(), 2);

        health.refresh();
        assert_eq!(health.misses(), 0);
        assert_eq!(health.check(&session), Liveness::Alive);
        assert_eq!(health.check(&session), Liveness::Suspect { misses: 1 });
    }

    #[test]
    fn custom_threshold() {
        let mut health = HealthCheck::with_threshold(1);
        let session = playing_session();
        health.check(&session);
        assert_eq!(health.check(&session), Liveness::Failed { misses: 1 });
    }
}
