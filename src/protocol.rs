//! Static protocol library: predefined multi-step action plans keyed by
//! situation, plus the selection policy that picks one for a study.
//!
//! The templates are reference data, never mutated at runtime. Selection
//! is deliberately simple and total: eligibility by status and required
//! signals, then ranked by specificity, urgency, and id.

use serde::Serialize;

use crate::model::StudyStatus;
use crate::signals::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolCategory {
    Financial,
    Engagement,
    Contract,
    Systemic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Human,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Call,
    Email,
    Review,
    Verify,
    Pause,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Step {
    pub owner: Owner,
    pub action: StepAction,
    pub description: &'static str,
}

/// Trigger condition: the study's status must be listed and every
/// required signal code must be active.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Trigger {
    pub statuses: &'static [StudyStatus],
    pub required_signals: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Protocol {
    pub id: &'static str,
    pub version: u16,
    pub objective: &'static str,
    pub category: ProtocolCategory,
    pub urgency: Urgency,
    pub trigger: Trigger,
    pub steps: &'static [Step],
    pub success_metric: &'static str,
    pub failure_risk: &'static str,
}

pub const LIBRARY: &[Protocol] = &[
    Protocol {
        id: "CLOSING_ASSIST",
        version: 1,
        objective: "Unblock a signed study that never reached installation",
        category: ProtocolCategory::Contract,
        urgency: Urgency::Medium,
        trigger: Trigger {
            statuses: &[StudyStatus::Signed],
            required_signals: &["CONTRACT_INSTALL_STALLED"],
        },
        steps: &[
            Step {
                owner: Owner::Human,
                action: StepAction::Review,
                description: "Identify the installation blocker with the project lead",
            },
            Step {
                owner: Owner::System,
                action: StepAction::Email,
                description: "Send the client two proposed installation dates",
            },
            Step {
                owner: Owner::Human,
                action: StepAction::Call,
                description: "Confirm the chosen date by phone",
            },
        ],
        success_metric: "installation date booked within 10 days",
        failure_risk: "signed client churns before installation",
    },
    Protocol {
        id: "DEPOSIT_RECOVERY",
        version: 1,
        objective: "Recover an overdue deposit on a signed study",
        category: ProtocolCategory::Financial,
        urgency: Urgency::High,
        trigger: Trigger {
            statuses: &[StudyStatus::Signed, StudyStatus::Installation],
            required_signals: &["FINANCIAL_DEPOSIT_PENDING", "FINANCIAL_DEPOSIT_LATE"],
        },
        steps: &[
            Step {
                owner: Owner::System,
                action: StepAction::Email,
                description: "Send the deposit reminder with the payment link",
            },
            Step {
                owner: Owner::Human,
                action: StepAction::Call,
                description: "Call the client to walk through the payment",
            },
            Step {
                owner: Owner::System,
                action: StepAction::Verify,
                description: "Confirm the payment landed in the deposit record",
            },
        ],
        success_metric: "deposit recorded within 7 days",
        failure_risk: "contract slides toward cancellation",
    },
    Protocol {
        id: "FATIGUE_COOLDOWN",
        version: 1,
        objective: "Back off a prospect showing contact fatigue",
        category: ProtocolCategory::Engagement,
        urgency: Urgency::Low,
        trigger: Trigger {
            statuses: &[StudyStatus::Lead, StudyStatus::QuoteSent],
            required_signals: &["ENGAGEMENT_FATIGUE"],
        },
        steps: &[
            Step {
                owner: Owner::System,
                action: StepAction::Pause,
                description: "Suspend automated follow-ups for this study",
            },
            Step {
                owner: Owner::Human,
                action: StepAction::Review,
                description: "Reassess cadence and content before resuming",
            },
        ],
        success_metric: "fatigue score back under the threshold",
        failure_risk: "complaint or unsubscribe",
    },
    Protocol {
        id: "INTEGRITY_TRIAGE",
        version: 1,
        objective: "Triage inconsistent tracking counters",
        category: ProtocolCategory::Systemic,
        urgency: Urgency::Critical,
        trigger: Trigger {
            statuses: &[
                StudyStatus::Lead,
                StudyStatus::QuoteSent,
                StudyStatus::Signed,
                StudyStatus::Installation,
                StudyStatus::Closed,
            ],
            required_signals: &["SYSTEMIC_COUNTER_ANOMALY"],
        },
        steps: &[
            Step {
                owner: Owner::System,
                action: StepAction::Verify,
                description: "Re-derive counters from raw tracking events",
            },
            Step {
                owner: Owner::Human,
                action: StepAction::Review,
                description: "Inspect the ingestion path for double counting",
            },
        ],
        success_metric: "counters consistent after re-derivation",
        failure_risk: "analytics lose the team's trust",
    },
    Protocol {
        id: "REENGAGE_GHOST",
        version: 1,
        objective: "Re-engage a prospect gone silent after showing interest",
        category: ProtocolCategory::Engagement,
        urgency: Urgency::Medium,
        trigger: Trigger {
            statuses: &[StudyStatus::Lead, StudyStatus::QuoteSent],
            required_signals: &["ENGAGEMENT_GHOSTING"],
        },
        steps: &[
            Step {
                owner: Owner::System,
                action: StepAction::Email,
                description: "Send the savings recap with a soft call to action",
            },
            Step {
                owner: Owner::Human,
                action: StepAction::Call,
                description: "Call on a different weekday than previous attempts",
            },
            Step {
                owner: Owner::Human,
                action: StepAction::Review,
                description: "Requalify the quote if the budget context changed",
            },
        ],
        success_metric: "any interaction within 5 days",
        failure_risk: "lead goes permanently cold",
    },
];

/// Pick the applicable protocol for a study's status and active signals.
///
/// Eligibility: status listed in the trigger and every required signal
/// code active. Ranking among eligible: most required signals matched
/// first (more specific wins), then urgency, then lexical id as a
/// stable tie-break. Returns `None` when nothing is eligible.
pub fn select(status: StudyStatus, signals: &[Signal]) -> Option<&'static Protocol> {
    let active: Vec<&str> = signals.iter().map(|s| s.kind.code()).collect();
    let mut eligible: Vec<&'static Protocol> = LIBRARY
        .iter()
        .filter(|p| {
            p.trigger.statuses.contains(&status)
                && p.trigger.required_signals.iter().all(|code| active.contains(code))
        })
        .collect();
    eligible.sort_by(|a, b| {
        b.trigger
            .required_signals
            .len()
            .cmp(&a.trigger.required_signals.len())
            .then(b.urgency.cmp(&a.urgency))
            .then(a.id.cmp(b.id))
    });
    eligible.first().copied()
}
