//! Buyer-facing disclosure state machine.
//!
//! Resolution is pure: the caller supplies the full flag history every
//! call and the machine ranks states from the top down, so the highest
//! stage whose precondition holds wins. A session wrapper keeps the
//! high-water mark so the resolved rank never regresses within one
//! session even if a caller hands back degraded flags.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Disclosure stages in monotonic rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Structuration = 0,
    Confrontation = 1,
    LucidityPoint = 2,
    DecisionOpen = 3,
    Secured = 4,
}

impl DecisionState {
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionState::Structuration => "structuration",
            DecisionState::Confrontation => "confrontation",
            DecisionState::LucidityPoint => "lucidity_point",
            DecisionState::DecisionOpen => "decision_open",
            DecisionState::Secured => "secured",
        }
    }
}

/// Disclosure history of one session, as booleans that only ever flip
/// from false to true upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionFlags {
    pub has_seen_core_proofs: bool,
    pub has_seen_projection: bool,
    pub has_seen_budget_module: bool,
    pub has_reached_decision_anchor: bool,
    pub is_signed: bool,
}

impl DecisionFlags {
    fn bits(&self) -> String {
        format!(
            "{}{}{}{}{}",
            u8::from(self.has_seen_core_proofs),
            u8::from(self.has_seen_projection),
            u8::from(self.has_seen_budget_module),
            u8::from(self.has_reached_decision_anchor),
            u8::from(self.is_signed),
        )
    }
}

/// Highest-ranked state whose precondition holds, checked top down.
pub fn resolve(flags: &DecisionFlags) -> DecisionState {
    if flags.is_signed {
        DecisionState::Secured
    } else if flags.has_reached_decision_anchor {
        DecisionState::DecisionOpen
    } else if flags.has_seen_projection && flags.has_seen_budget_module {
        DecisionState::LucidityPoint
    } else if flags.has_seen_core_proofs {
        DecisionState::Confrontation
    } else {
        DecisionState::Structuration
    }
}

/// Per-session high-water mark over [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct DecisionSession {
    highest: Option<DecisionState>,
}

impl DecisionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and clamp to the highest stage this session has reached.
    pub fn observe(&mut self, flags: &DecisionFlags) -> DecisionState {
        let resolved = resolve(flags);
        let state = match self.highest {
            Some(prev) => prev.max(resolved),
            None => resolved,
        };
        self.highest = Some(state);
        state
    }
}

/// UI affordances enabled at a given stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub free_navigation: bool,
    pub inputs_editable: bool,
    pub pause_requestable: bool,
    pub summary_downloadable: bool,
}

pub fn permissions(state: DecisionState) -> Permissions {
    Permissions {
        free_navigation: state < DecisionState::DecisionOpen,
        inputs_editable: state != DecisionState::Secured,
        pause_requestable: state == DecisionState::DecisionOpen,
        summary_downloadable: state >= DecisionState::LucidityPoint,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Locks {
    pub navigation_locked: bool,
    /// Permanent freeze; nothing unlocks a secured session.
    pub frozen: bool,
}

pub fn locks(state: DecisionState) -> Locks {
    Locks {
        navigation_locked: state >= DecisionState::DecisionOpen,
        frozen: state == DecisionState::Secured,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nudge {
    SuggestPause,
}

pub fn nudges(state: DecisionState, fatigue: f64, fatigue_threshold: f64) -> Vec<Nudge> {
    let mut out = Vec::new();
    if state == DecisionState::DecisionOpen && fatigue > fatigue_threshold {
        out.push(Nudge::SuggestPause);
    }
    out
}

/// Audit record emitted for every resolution.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionAudit {
    pub state: DecisionState,
    pub flags: DecisionFlags,
    pub fatigue: f64,
    pub ts: u64,
    /// SHA-256 over the canonical `state|flags|fatigue|ts` string. An
    /// integrity tag for the stored row, not a signature: it proves the
    /// row was not edited after the fact, nothing about who wrote it.
    pub integrity_hash: String,
}

pub fn audit(state: DecisionState, flags: &DecisionFlags, fatigue: f64, ts: u64) -> DecisionAudit {
    let canonical = format!("{}|{}|{:.2}|{}", state.as_str(), flags.bits(), fatigue, ts);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    DecisionAudit {
        state,
        flags: *flags,
        fatigue,
        ts,
        integrity_hash: hex::encode(hasher.finalize()),
    }
}

/// One full resolution: state plus everything derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub state: DecisionState,
    pub permissions: Permissions,
    pub locks: Locks,
    pub nudges: Vec<Nudge>,
    pub audit: DecisionAudit,
}

pub fn resolve_full(
    flags: &DecisionFlags,
    fatigue: f64,
    fatigue_threshold: f64,
    ts: u64,
) -> Resolution {
    let state = resolve(flags);
    Resolution {
        state,
        permissions: permissions(state),
        locks: locks(state),
        nudges: nudges(state, fatigue, fatigue_threshold),
        audit: audit(state, flags, fatigue, ts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_flags_resolve_to_structuration() {
        assert_eq!(resolve(&DecisionFlags::default()), DecisionState::Structuration);
    }

    #[test]
    fn test_each_precondition_level() {
        let mut flags = DecisionFlags::default();

        flags.has_seen_core_proofs = true;
        assert_eq!(resolve(&flags), DecisionState::Confrontation);

        // Projection alone is not enough for the lucidity point.
        flags.has_seen_projection = true;
        assert_eq!(resolve(&flags), DecisionState::Confrontation);

        flags.has_seen_budget_module = true;
        assert_eq!(resolve(&flags), DecisionState::LucidityPoint);

        flags.has_reached_decision_anchor = true;
        assert_eq!(resolve(&flags), DecisionState::DecisionOpen);

        flags.is_signed = true;
        assert_eq!(resolve(&flags), DecisionState::Secured);
    }

    #[test]
    fn test_signed_wins_over_anchor() {
        let flags = DecisionFlags {
            has_reached_decision_anchor: true,
            is_signed: true,
            ..Default::default()
        };
        assert_eq!(resolve(&flags), DecisionState::Secured);
    }

    #[test]
    fn test_lucidity_needs_both_modules() {
        let flags = DecisionFlags {
            has_seen_budget_module: true,
            ..Default::default()
        };
        assert_eq!(resolve(&flags), DecisionState::Structuration);
    }

    #[test]
    fn test_session_rank_never_decreases() {
        let mut session = DecisionSession::new();
        let mut flags = DecisionFlags::default();
        let mut last_rank = 0;

        let steps: [fn(&mut DecisionFlags); 5] = [
            |f| f.has_seen_core_proofs = true,
            |f| f.has_seen_projection = true,
            |f| f.has_seen_budget_module = true,
            |f| f.has_reached_decision_anchor = true,
            |f| f.is_signed = true,
        ];
        for step in steps {
            step(&mut flags);
            let state = session.observe(&flags);
            assert!(state.rank() >= last_rank, "rank regressed to {:?}", state);
            last_rank = state.rank();
        }
        assert_eq!(last_rank, 4);
    }

    #[test]
    fn test_session_clamps_degraded_flags() {
        let mut session = DecisionSession::new();
        let open = DecisionFlags {
            has_reached_decision_anchor: true,
            ..Default::default()
        };
        assert_eq!(session.observe(&open), DecisionState::DecisionOpen);

        // A caller replaying stale flags must not walk the session back.
        assert_eq!(session.observe(&DecisionFlags::default()), DecisionState::DecisionOpen);
    }

    #[test]
    fn test_permissions_and_locks_per_stage() {
        let p = permissions(DecisionState::Structuration);
        assert!(p.free_navigation && p.inputs_editable);
        assert!(!p.pause_requestable && !p.summary_downloadable);

        let p = permissions(DecisionState::LucidityPoint);
        assert!(p.free_navigation && p.summary_downloadable);

        let p = permissions(DecisionState::DecisionOpen);
        assert!(!p.free_navigation && p.pause_requestable);
        assert!(locks(DecisionState::DecisionOpen).navigation_locked);
        assert!(!locks(DecisionState::DecisionOpen).frozen);

        let p = permissions(DecisionState::Secured);
        assert!(!p.inputs_editable && !p.pause_requestable);
        let l = locks(DecisionState::Secured);
        assert!(l.navigation_locked && l.frozen);
    }

    #[test]
    fn test_pause_nudge_only_when_open_and_tired() {
        assert_eq!(
            nudges(DecisionState::DecisionOpen, 75.0, 70.0),
            vec![Nudge::SuggestPause]
        );
        assert!(nudges(DecisionState::DecisionOpen, 70.0, 70.0).is_empty());
        assert!(nudges(DecisionState::Secured, 95.0, 70.0).is_empty());
        assert!(nudges(DecisionState::Structuration, 95.0, 70.0).is_empty());
    }

    #[test]
    fn test_audit_hash_deterministic_and_input_sensitive() {
        let flags = DecisionFlags {
            has_seen_core_proofs: true,
            ..Default::default()
        };
        let a = audit(DecisionState::Confrontation, &flags, 10.0, 1000);
        let b = audit(DecisionState::Confrontation, &flags, 10.0, 1000);
        assert_eq!(a.integrity_hash, b.integrity_hash);
        assert_eq!(a.integrity_hash.len(), 64);

        let c = audit(DecisionState::Confrontation, &flags, 10.0, 1001);
        assert_ne!(a.integrity_hash, c.integrity_hash);
    }

    #[test]
    fn test_resolve_full_wires_everything() {
        let flags = DecisionFlags {
            has_reached_decision_anchor: true,
            ..Default::default()
        };
        let r = resolve_full(&flags, 80.0, 70.0, 500);
        assert_eq!(r.state, DecisionState::DecisionOpen);
        assert!(r.locks.navigation_locked);
        assert_eq!(r.nudges, vec![Nudge::SuggestPause]);
        assert_eq!(r.audit.state, DecisionState::DecisionOpen);
    }
}
