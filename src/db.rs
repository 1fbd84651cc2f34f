//! Read access to the hosted relational store.
//!
//! PostgREST-style endpoints, one request per table read. Every read is
//! raced against a fixed deadline; a slow store surfaces as an error
//! and the caller decides whether to surface or swallow it. There is no
//! automatic retry anywhere on this path.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::{timeout, Duration};

use crate::model::{Client as CrmClient, QueuedEmail, Study};

#[derive(Clone)]
pub struct DbClient {
    client: Client,
    base: String,
    api_key: Option<String>,
    deadline: Duration,
}

impl DbClient {
    pub fn new(base: String, api_key: Option<String>, deadline_secs: u64) -> Self {
        Self {
            client: Client::new(),
            base,
            api_key,
            deadline: Duration::from_secs(deadline_secs),
        }
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let url = format!("{}/rest/v1/{}?select=*", self.base, table);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} read failed ({}): {}", table, status, body));
        }
        Ok(resp.json().await?)
    }

    /// One table read raced against the configured deadline.
    async fn read<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        match timeout(self.deadline, self.fetch_rows(table)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "{} read timed out after {}s",
                table,
                self.deadline.as_secs()
            )),
        }
    }

    pub async fn fetch_studies(&self) -> Result<Vec<Study>> {
        self.read("studies").await
    }

    pub async fn fetch_clients(&self) -> Result<Vec<CrmClient>> {
        self.read("clients").await
    }

    pub async fn fetch_email_queue(&self) -> Result<Vec<QueuedEmail>> {
        self.read("email_queue").await
    }
}
