use serde::{Deserialize, Serialize};

/// Pipeline stage of one sales opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    Lead,
    QuoteSent,
    Signed,
    Installation,
    Closed,
    Cancelled,
    Refused,
}

impl StudyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStatus::Lead => "lead",
            StudyStatus::QuoteSent => "quote_sent",
            StudyStatus::Signed => "signed",
            StudyStatus::Installation => "installation",
            StudyStatus::Closed => "closed",
            StudyStatus::Cancelled => "cancelled",
            StudyStatus::Refused => "refused",
        }
    }

    /// Terminal stages take no further outbound contact.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StudyStatus::Closed | StudyStatus::Cancelled | StudyStatus::Refused)
    }
}

/// Snapshot of one sales opportunity as read from the store.
///
/// Raw fields are authoritative; everything else (signals, decision
/// states) is recomputed from them on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: String,
    pub client_id: String,
    pub status: StudyStatus,
    /// Epoch seconds of the signature, if any.
    pub signed_at: Option<u64>,
    pub deposit_required: bool,
    pub deposit_paid: bool,
    pub deposit_amount: f64,
    pub quiz_completed: bool,
    pub views: u32,
    pub clicks: u32,
    pub last_interaction_at: Option<u64>,
    pub last_followup_at: Option<u64>,
}

impl Study {
    pub fn days_since_signature(&self, now: u64) -> Option<u64> {
        self.signed_at.map(|t| now.saturating_sub(t) / crate::config::SECS_PER_DAY)
    }

    pub fn days_silent(&self, now: u64) -> Option<u64> {
        self.last_interaction_at
            .map(|t| now.saturating_sub(t) / crate::config::SECS_PER_DAY)
    }
}

/// Contact identity. `optout` is a one-way latch set by webhook
/// processing upstream; this crate only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub optout: bool,
}

/// Row of the external email queue, only used by the integrity scan.
#[derive(Debug, Clone, Deserialize)]
pub struct QueuedEmail {
    pub id: String,
    pub study_id: String,
}
