//! Signal detectors: pure battery over a study snapshot.
//!
//! Each detector is an independent condition; several signals may fire
//! for one study in the same pass. Signals are derived observations —
//! the study's raw fields stay authoritative and signals are recomputed
//! on demand, never stored as source of truth.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{Config, SECS_PER_DAY};
use crate::model::{Study, StudyStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDomain {
    Financial,
    Engagement,
    Contract,
    Systemic,
}

/// One observed condition, with only the fields that condition needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    FinancialDepositPending,
    FinancialDepositLate { days_overdue: u64 },
    EngagementGhosting { days_silent: u64 },
    EngagementFatigue { score: f64 },
    ContractQuizMissing,
    ContractInstallStalled { days_since_signature: u64 },
    SystemicCounterAnomaly { views: u32, clicks: u32 },
}

impl SignalKind {
    pub fn code(&self) -> &'static str {
        match self {
            SignalKind::FinancialDepositPending => "FINANCIAL_DEPOSIT_PENDING",
            SignalKind::FinancialDepositLate { .. } => "FINANCIAL_DEPOSIT_LATE",
            SignalKind::EngagementGhosting { .. } => "ENGAGEMENT_GHOSTING",
            SignalKind::EngagementFatigue { .. } => "ENGAGEMENT_FATIGUE",
            SignalKind::ContractQuizMissing => "CONTRACT_QUIZ_MISSING",
            SignalKind::ContractInstallStalled { .. } => "CONTRACT_INSTALL_STALLED",
            SignalKind::SystemicCounterAnomaly { .. } => "SYSTEMIC_COUNTER_ANOMALY",
        }
    }

    pub fn domain(&self) -> SignalDomain {
        match self {
            SignalKind::FinancialDepositPending | SignalKind::FinancialDepositLate { .. } => {
                SignalDomain::Financial
            }
            SignalKind::EngagementGhosting { .. } | SignalKind::EngagementFatigue { .. } => {
                SignalDomain::Engagement
            }
            SignalKind::ContractQuizMissing | SignalKind::ContractInstallStalled { .. } => {
                SignalDomain::Contract
            }
            SignalKind::SystemicCounterAnomaly { .. } => SignalDomain::Systemic,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    /// Deterministic id from {code, study id}; repeated detection runs
    /// yield the same id, so downstream consumers can de-duplicate.
    pub id: String,
    pub study_id: String,
    #[serde(flatten)]
    pub kind: SignalKind,
    pub domain: SignalDomain,
    /// Severity in [0, 1].
    pub severity: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub detected_at: u64,
}

impl Signal {
    fn new(study_id: &str, kind: SignalKind, severity: f64, confidence: f64, now: u64) -> Self {
        let domain = kind.domain();
        Self {
            id: signal_id(kind.code(), study_id),
            study_id: study_id.to_string(),
            domain,
            severity: severity.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            detected_at: now,
            kind,
        }
    }
}

/// Stable signal identifier: code prefix plus a 64-bit digest slice.
pub fn signal_id(code: &str, study_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(b":");
    hasher.update(study_id.as_bytes());
    let digest = hasher.finalize();
    format!("{}:{}", code, &hex::encode(digest)[..16])
}

/// Engagement fatigue on a 0-100 scale: view/click pressure without
/// pipeline progress. Zero once the study moves past the quote stage.
pub fn fatigue_score(study: &Study) -> f64 {
    match study.status {
        StudyStatus::Lead | StudyStatus::QuoteSent => {
            (f64::from(study.views) * 2.0 + f64::from(study.clicks) * 5.0).min(100.0)
        }
        _ => 0.0,
    }
}

fn deposit_pending(study: &Study, now: u64) -> Option<Signal> {
    if study.deposit_required && !study.deposit_paid && study.signed_at.is_some() {
        Some(Signal::new(&study.id, SignalKind::FinancialDepositPending, 0.5, 1.0, now))
    } else {
        None
    }
}

fn deposit_late(study: &Study, now: u64, cfg: &Config) -> Option<Signal> {
    if !study.deposit_required || study.deposit_paid {
        return None;
    }
    let days = study.days_since_signature(now)?;
    if days > u64::from(cfg.deposit_overdue_days) {
        let overdue = days - u64::from(cfg.deposit_overdue_days);
        Some(Signal::new(
            &study.id,
            SignalKind::FinancialDepositLate { days_overdue: overdue },
            0.5 + overdue as f64 / 20.0,
            1.0,
            now,
        ))
    } else {
        None
    }
}

fn ghosting(study: &Study, now: u64, cfg: &Config) -> Option<Signal> {
    if study.views == 0 || study.status.is_terminal() {
        return None;
    }
    let days = study.days_silent(now)?;
    if days > u64::from(cfg.ghost_days) {
        Some(Signal::new(
            &study.id,
            SignalKind::EngagementGhosting { days_silent: days },
            days as f64 / 30.0,
            0.8,
            now,
        ))
    } else {
        None
    }
}

fn fatigue(study: &Study, now: u64, cfg: &Config) -> Option<Signal> {
    let score = fatigue_score(study);
    if score >= cfg.fatigue_threshold {
        Some(Signal::new(
            &study.id,
            SignalKind::EngagementFatigue { score },
            score / 100.0,
            0.7,
            now,
        ))
    } else {
        None
    }
}

fn quiz_missing(study: &Study, now: u64) -> Option<Signal> {
    if study.status == StudyStatus::Signed && !study.quiz_completed {
        Some(Signal::new(&study.id, SignalKind::ContractQuizMissing, 0.6, 1.0, now))
    } else {
        None
    }
}

fn install_stalled(study: &Study, now: u64, cfg: &Config) -> Option<Signal> {
    if study.status != StudyStatus::Signed {
        return None;
    }
    let days = study.days_since_signature(now)?;
    if days > u64::from(cfg.install_stall_days) {
        Some(Signal::new(
            &study.id,
            SignalKind::ContractInstallStalled { days_since_signature: days },
            days as f64 / 60.0,
            0.9,
            now,
        ))
    } else {
        None
    }
}

fn counter_anomaly(study: &Study, now: u64) -> Option<Signal> {
    if study.clicks > study.views {
        Some(Signal::new(
            &study.id,
            SignalKind::SystemicCounterAnomaly { views: study.views, clicks: study.clicks },
            0.3,
            1.0,
            now,
        ))
    } else {
        None
    }
}

/// Run the full battery. Order is fixed but carries no meaning; every
/// condition is evaluated independently.
pub fn detect(study: &Study, now: u64, cfg: &Config) -> Vec<Signal> {
    [
        deposit_pending(study, now),
        deposit_late(study, now, cfg),
        ghosting(study, now, cfg),
        fatigue(study, now, cfg),
        quiz_missing(study, now),
        install_stalled(study, now, cfg),
        counter_anomaly(study, now),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn has_active_fatigue(signals: &[Signal]) -> bool {
    signals
        .iter()
        .any(|s| matches!(s.kind, SignalKind::EngagementFatigue { .. }))
}
