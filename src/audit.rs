//! Append-only audit sink on local sqlite.
//!
//! Every blocked or decided action leaves a row. Rows are inserted,
//! never updated or deleted; the file is the traceability record when
//! somebody asks why the system did or refused something.

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::decision::DecisionAudit;

pub struct AuditStore {
    conn: Connection,
}

impl AuditStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS ops_audit_history (
                study_id TEXT NOT NULL,
                action_performed TEXT NOT NULL,
                justification TEXT NOT NULL,
                agent_source TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS decision_logs (
                study_id TEXT NOT NULL,
                state TEXT NOT NULL,
                integrity_hash TEXT NOT NULL,
                fatigue REAL NOT NULL,
                created_at INTEGER NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn record_action(
        &mut self,
        study_id: &str,
        action_performed: &str,
        justification: &str,
        agent_source: &str,
        created_at: u64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO ops_audit_history
                 (study_id, action_performed, justification, agent_source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![study_id, action_performed, justification, agent_source, created_at as i64],
        )?;
        Ok(())
    }

    pub fn record_decision(&mut self, study_id: &str, audit: &DecisionAudit) -> Result<()> {
        self.conn.execute(
            "INSERT INTO decision_logs
                 (study_id, state, integrity_hash, fatigue, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                study_id,
                audit.state.as_str(),
                audit.integrity_hash,
                audit.fatigue,
                audit.ts as i64
            ],
        )?;
        Ok(())
    }
}
