//! Referential integrity scan: orphaned child rows in the store.
//!
//! Observation-only. The scan reports and logs what it finds; it never
//! blocks an operation. A network failure propagates as an error for
//! the caller to surface or swallow.

use std::collections::HashSet;

use anyhow::Result;
use serde::Serialize;

use crate::db::DbClient;
use crate::logging::{json_log, obj, v_int, v_str, Domain};

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    /// Study ids whose client no longer exists.
    pub orphan_studies: Vec<String>,
    /// Queued email ids whose study no longer exists.
    pub orphan_emails: Vec<String>,
}

impl IntegrityReport {
    pub fn breach_count(&self) -> usize {
        self.orphan_studies.len() + self.orphan_emails.len()
    }
}

pub async fn scan(db: &DbClient) -> Result<IntegrityReport> {
    let studies = db.fetch_studies().await?;
    let clients = db.fetch_clients().await?;
    let queue = db.fetch_email_queue().await?;

    let client_ids: HashSet<&str> = clients.iter().map(|c| c.id.as_str()).collect();
    let study_ids: HashSet<&str> = studies.iter().map(|s| s.id.as_str()).collect();

    let mut report = IntegrityReport::default();
    for study in &studies {
        if !client_ids.contains(study.client_id.as_str()) {
            report.orphan_studies.push(study.id.clone());
        }
    }
    for email in &queue {
        if !study_ids.contains(email.study_id.as_str()) {
            report.orphan_emails.push(email.id.clone());
        }
    }

    for id in &report.orphan_studies {
        json_log(
            Domain::Guard,
            "integrity.orphan_study",
            obj(&[("study_id", v_str(id))]),
        );
    }
    for id in &report.orphan_emails {
        json_log(
            Domain::Guard,
            "integrity.orphan_email",
            obj(&[("email_id", v_str(id))]),
        );
    }
    json_log(
        Domain::Guard,
        "integrity.scan_done",
        obj(&[("breaches", v_int(report.breach_count() as u64))]),
    );

    Ok(report)
}
