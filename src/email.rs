//! Outbound follow-up path.
//!
//! One templated email to one recipient, behind every gate the rest of
//! the crate defines. Opt-out, active fatigue and an open circuit are
//! silent no-ops rather than errors: an error here would feed upstream
//! retry loops, which is exactly what those gates exist to starve.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::json;

use crate::guard::temporal;
use crate::logging::{json_log, obj, v_str, Domain};
use crate::model::{Client, Study};
use crate::reliability::ProviderCircuit;
use crate::signals::{has_active_fatigue, Signal};

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, template_id: &str, subject: &str) -> Result<()>;
}

pub struct HttpEmailSender {
    client: HttpClient,
    base: String,
    api_key: String,
}

impl HttpEmailSender {
    pub fn new(base: String, api_key: String) -> Self {
        Self { client: HttpClient::new(), base, api_key }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, to: &str, template_id: &str, subject: &str) -> Result<()> {
        let url = format!("{}/emails", self.base);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "to": to,
                "template_id": template_id,
                "subject": subject,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("email send failed ({}): {}", status, body);
        }
        Ok(())
    }
}

/// Stub sender that records recipients instead of talking to a
/// provider. Makes integration explicit, and lets tests assert that a
/// suppressed send really sent nothing.
#[derive(Default)]
pub struct NullEmailSender {
    sent: std::sync::Mutex<Vec<String>>,
}

impl NullEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for NullEmailSender {
    async fn send(&self, to: &str, _template_id: &str, _subject: &str) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(to.to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    SuppressedOptout,
    SuppressedFatigue,
    SuppressedCircuitOpen,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Sent => "sent",
            Outcome::SuppressedOptout => "suppressed_optout",
            Outcome::SuppressedFatigue => "suppressed_fatigue",
            Outcome::SuppressedCircuitOpen => "suppressed_circuit_open",
        }
    }
}

/// Send one follow-up, or decide not to.
///
/// The caller has already run the process guard; this path adds the
/// recipient gates (opt-out, fatigue), the temporal guard in enforcing
/// mode, and the provider circuit. Temporal violations and provider
/// failures are real errors; everything else returns an outcome.
pub async fn send_followup(
    sender: &dyn EmailSender,
    circuit: &mut ProviderCircuit,
    client: &Client,
    study: &Study,
    signals: &[Signal],
    template_id: &str,
    subject: &str,
    min_hours: f64,
    now: u64,
) -> Result<Outcome> {
    if client.optout {
        json_log(
            Domain::Email,
            "followup.suppressed",
            obj(&[("study_id", v_str(&study.id)), ("cause", v_str("optout"))]),
        );
        return Ok(Outcome::SuppressedOptout);
    }
    if has_active_fatigue(signals) {
        json_log(
            Domain::Email,
            "followup.suppressed",
            obj(&[("study_id", v_str(&study.id)), ("cause", v_str("fatigue"))]),
        );
        return Ok(Outcome::SuppressedFatigue);
    }

    temporal::enforce(study.last_followup_at, now, min_hours)?;

    if !circuit.allow(now) {
        json_log(
            Domain::Email,
            "followup.suppressed",
            obj(&[("study_id", v_str(&study.id)), ("cause", v_str("circuit_open"))]),
        );
        return Ok(Outcome::SuppressedCircuitOpen);
    }

    match sender.send(&client.email, template_id, subject).await {
        Ok(()) => {
            circuit.record_success();
            json_log(
                Domain::Email,
                "followup.sent",
                obj(&[
                    ("study_id", v_str(&study.id)),
                    ("template_id", v_str(template_id)),
                ]),
            );
            Ok(Outcome::Sent)
        }
        Err(e) => {
            circuit.record_failure(now);
            json_log(
                Domain::Email,
                "followup.provider_error",
                obj(&[("study_id", v_str(&study.id)), ("error", v_str(&e.to_string()))]),
            );
            Err(e)
        }
    }
}

/// Follow-up template for a study's current stage, if the stage still
/// warrants outbound contact.
pub fn template_for(study: &Study) -> Option<(&'static str, &'static str)> {
    use crate::model::StudyStatus;
    match study.status {
        StudyStatus::Lead => Some(("lead_warmup", "Your solar study is ready to go further")),
        StudyStatus::QuoteSent => Some(("quote_followup", "Any questions on your solar quote?")),
        StudyStatus::Signed => Some(("signed_next_steps", "Next steps for your installation")),
        StudyStatus::Installation => Some(("install_checkin", "Your installation is under way")),
        _ => None,
    }
}
