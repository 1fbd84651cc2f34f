//! Process-order guard: hard invariants a study must satisfy before a
//! state-changing operation is allowed through.
//!
//! Collects every broken rule in one pass rather than stopping at the
//! first, so a caller can report all problems at once. Any violation
//! means the whole mutation is rejected; there is no partial commit.

use std::fmt;

use serde::Serialize;

use crate::model::{Study, StudyStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRule {
    SignedWithoutQuiz,
    InstallationWithoutDeposit,
    ClosedWithoutSignature,
}

impl ProcessRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRule::SignedWithoutQuiz => "signed_without_quiz",
            ProcessRule::InstallationWithoutDeposit => "installation_without_deposit",
            ProcessRule::ClosedWithoutSignature => "closed_without_signature",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessViolation {
    pub rule: ProcessRule,
    pub study_id: String,
    pub reason: String,
}

/// Evaluate every rule against the snapshot. Empty vec means the study
/// may proceed.
pub fn check(study: &Study) -> Vec<ProcessViolation> {
    let mut violations = Vec::new();

    if study.status == StudyStatus::Signed && !study.quiz_completed {
        violations.push(ProcessViolation {
            rule: ProcessRule::SignedWithoutQuiz,
            study_id: study.id.clone(),
            reason: "study is signed but the qualification quiz was never completed".to_string(),
        });
    }
    if study.status == StudyStatus::Installation && !study.deposit_paid {
        violations.push(ProcessViolation {
            rule: ProcessRule::InstallationWithoutDeposit,
            study_id: study.id.clone(),
            reason: "installation started without a paid deposit".to_string(),
        });
    }
    if study.status == StudyStatus::Closed && study.signed_at.is_none() {
        violations.push(ProcessViolation {
            rule: ProcessRule::ClosedWithoutSignature,
            study_id: study.id.clone(),
            reason: "study closed without a signature timestamp".to_string(),
        });
    }

    violations
}

/// Error carrying the complete violation list from one pass.
#[derive(Debug, Clone)]
pub struct ProcessError {
    pub violations: Vec<ProcessViolation>,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<&str> = self.violations.iter().map(|v| v.rule.as_str()).collect();
        write!(f, "process guard rejected study: [{}]", rules.join(", "))
    }
}

impl std::error::Error for ProcessError {}

/// Enforcing entry point: raises once with the full list attached.
pub fn enforce(study: &Study) -> Result<(), ProcessError> {
    let violations = check(study);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ProcessError { violations })
    }
}
