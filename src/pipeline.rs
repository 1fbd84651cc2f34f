//! One ops cycle: the fixed sequential composition of guards,
//! detectors and side effects over the current snapshot.
//!
//! Order per study: process guard first (any violation rejects the
//! study's mutations atomically and is audited), then signal
//! detection, decision resolution, protocol recommendation, and the
//! gated follow-up email. The referential integrity scan runs last and
//! only observes. Nothing here coordinates with anything else; every
//! evaluation is independent given the snapshot.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;

use crate::audit::AuditStore;
use crate::config::Config;
use crate::db::DbClient;
use crate::decision::{resolve_full, DecisionFlags};
use crate::email::{send_followup, template_for, EmailSender, Outcome};
use crate::guard::{integrity, process};
use crate::logging::{json_log, obj, v_int, v_num, v_str, Domain, Level};
use crate::model::{Client, Study};
use crate::reliability::ProviderCircuit;
use crate::signals::{detect, fatigue_score};

/// Per-cycle counters, logged at cycle end.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleStats {
    pub studies: u64,
    pub rejected: u64,
    pub signals: u64,
    pub decisions: u64,
    pub protocols_recommended: u64,
    pub emails_sent: u64,
    pub emails_suppressed: u64,
    pub email_errors: u64,
    pub integrity_breaches: u64,
}

/// Disclosure flags recomputed from the study snapshot. Each flag maps
/// to the furthest tracked milestone that implies it, so the flags only
/// move forward as the study does.
pub fn flags_from_study(study: &Study) -> DecisionFlags {
    DecisionFlags {
        has_seen_core_proofs: study.views > 0,
        has_seen_projection: study.clicks > 0,
        has_seen_budget_module: study.quiz_completed,
        has_reached_decision_anchor: study.deposit_paid,
        is_signed: study.signed_at.is_some(),
    }
}

async fn handle_study(
    study: &Study,
    clients: &HashMap<&str, &Client>,
    audit: &mut AuditStore,
    sender: &dyn EmailSender,
    circuit: &mut ProviderCircuit,
    cfg: &Config,
    now: u64,
    stats: &mut CycleStats,
) -> Result<()> {
    // Process guard: all violations in one pass, whole study rejected
    // on any of them.
    let violations = process::check(study);
    if !violations.is_empty() {
        stats.rejected += 1;
        for v in &violations {
            json_log(
                Domain::Guard,
                "process.violation",
                obj(&[
                    ("study_id", v_str(&study.id)),
                    ("rule", v_str(v.rule.as_str())),
                    ("reason", v_str(&v.reason)),
                ]),
            );
            audit.record_action(
                &study.id,
                "mutation_blocked",
                &format!("{}: {}", v.rule.as_str(), v.reason),
                &cfg.agent_source,
                now,
            )?;
        }
        return Ok(());
    }

    let signals = detect(study, now, cfg);
    stats.signals += signals.len() as u64;
    for signal in &signals {
        json_log(
            Domain::Signal,
            "signal.detected",
            obj(&[
                ("signal_id", v_str(&signal.id)),
                ("study_id", v_str(&study.id)),
                ("code", v_str(signal.kind.code())),
                ("severity", v_num(signal.severity)),
                ("confidence", v_num(signal.confidence)),
            ]),
        );
    }

    let fatigue = fatigue_score(study);
    let resolution = resolve_full(&flags_from_study(study), fatigue, cfg.fatigue_threshold, now);
    audit.record_decision(&study.id, &resolution.audit)?;
    stats.decisions += 1;
    json_log(
        Domain::Decision,
        "decision.resolved",
        obj(&[
            ("study_id", v_str(&study.id)),
            ("state", v_str(resolution.state.as_str())),
            ("fatigue", v_num(fatigue)),
            ("hash", v_str(&resolution.audit.integrity_hash)),
        ]),
    );

    if let Some(protocol) = crate::protocol::select(study.status, &signals) {
        stats.protocols_recommended += 1;
        json_log(
            Domain::Protocol,
            "protocol.recommended",
            obj(&[
                ("study_id", v_str(&study.id)),
                ("protocol_id", v_str(protocol.id)),
                ("objective", v_str(protocol.objective)),
            ]),
        );
        audit.record_action(
            &study.id,
            "protocol_recommended",
            protocol.objective,
            &cfg.agent_source,
            now,
        )?;
    }

    // Follow-up email, if this stage still warrants contact and the
    // client row is present (the integrity scan reports the orphans).
    let Some((template_id, subject)) = template_for(study) else {
        return Ok(());
    };
    let Some(client) = clients.get(study.client_id.as_str()).copied() else {
        return Ok(());
    };
    match send_followup(
        sender, circuit, client, study, &signals, template_id, subject, cfg.email_min_hours, now,
    )
    .await
    {
        Ok(Outcome::Sent) => {
            stats.emails_sent += 1;
            audit.record_action(
                &study.id,
                "followup_sent",
                template_id,
                &cfg.agent_source,
                now,
            )?;
        }
        Ok(outcome) => {
            stats.emails_suppressed += 1;
            audit.record_action(
                &study.id,
                "followup_suppressed",
                outcome.as_str(),
                &cfg.agent_source,
                now,
            )?;
        }
        Err(e) => {
            // One study's send failure (temporal or provider) must not
            // abort the cycle for everyone else.
            stats.email_errors += 1;
            crate::logging::log(
                Level::Warn,
                Domain::Email,
                "followup.error",
                obj(&[("study_id", v_str(&study.id)), ("error", v_str(&e.to_string()))]),
            );
        }
    }
    Ok(())
}

/// Run one full cycle over the store snapshot.
pub async fn run_cycle(
    db: &DbClient,
    audit: &mut AuditStore,
    sender: &dyn EmailSender,
    circuit: &mut ProviderCircuit,
    cfg: &Config,
    now: u64,
) -> Result<CycleStats> {
    let studies = db.fetch_studies().await?;
    let clients = db.fetch_clients().await?;
    let client_map: HashMap<&str, &Client> =
        clients.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut stats = CycleStats { studies: studies.len() as u64, ..Default::default() };
    for study in &studies {
        handle_study(study, &client_map, audit, sender, circuit, cfg, now, &mut stats).await?;
    }

    // Observation-only: runs last, never blocks, and a scan failure is
    // logged rather than failing the cycle.
    match integrity::scan(db).await {
        Ok(report) => stats.integrity_breaches = report.breach_count() as u64,
        Err(e) => crate::logging::log(
            Level::Warn,
            Domain::Guard,
            "integrity.scan_failed",
            obj(&[("error", v_str(&e.to_string()))]),
        ),
    }

    json_log(
        Domain::Pipeline,
        "cycle.done",
        obj(&[
            ("studies", v_int(stats.studies)),
            ("rejected", v_int(stats.rejected)),
            ("signals", v_int(stats.signals)),
            ("decisions", v_int(stats.decisions)),
            ("protocols", v_int(stats.protocols_recommended)),
            ("emails_sent", v_int(stats.emails_sent)),
            ("emails_suppressed", v_int(stats.emails_suppressed)),
            ("email_errors", v_int(stats.email_errors)),
            ("integrity_breaches", v_int(stats.integrity_breaches)),
        ]),
    );
    Ok(stats)
}

/// Same composition over an in-memory snapshot, for callers that
/// already hold the rows (and for exercising the pipeline without a
/// store).
pub async fn run_cycle_with_snapshot(
    studies: &[Study],
    clients: &[Client],
    audit: &mut AuditStore,
    sender: &dyn EmailSender,
    circuit: &mut ProviderCircuit,
    cfg: &Config,
    now: u64,
) -> Result<CycleStats> {
    let client_map: HashMap<&str, &Client> =
        clients.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut stats = CycleStats { studies: studies.len() as u64, ..Default::default() };
    for study in studies {
        handle_study(study, &client_map, audit, sender, circuit, cfg, now, &mut stats).await?;
    }
    json_log(
        Domain::Pipeline,
        "cycle.done",
        obj(&[
            ("studies", v_int(stats.studies)),
            ("rejected", v_int(stats.rejected)),
            ("emails_sent", v_int(stats.emails_sent)),
        ]),
    );
    Ok(stats)
}
