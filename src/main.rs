use anyhow::Result;
use tokio::time::{sleep, Duration};

use solarops::audit::AuditStore;
use solarops::config::{now_ts, Config};
use solarops::db::DbClient;
use solarops::email::{EmailSender, HttpEmailSender, NullEmailSender};
use solarops::logging::{json_log, obj, v_int, v_str, Domain, Level};
use solarops::pipeline::run_cycle;
use solarops::reliability::ProviderCircuit;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let db = DbClient::new(cfg.db_base.clone(), cfg.db_api_key.clone(), cfg.db_timeout_secs);
    let mut audit = AuditStore::new(&cfg.sqlite_path)?;
    audit.init()?;
    let mut circuit = ProviderCircuit::new(cfg.email_failure_threshold, cfg.cycle_secs);

    // Real sender only with a provider key; the stub makes dry runs
    // explicit instead of silently mailing nobody.
    let sender: Box<dyn EmailSender> = match &cfg.email_api_key {
        Some(key) => {
            json_log(Domain::System, "sender.configured", obj(&[("kind", v_str("http"))]));
            Box::new(HttpEmailSender::new(cfg.email_base.clone(), key.clone()))
        }
        None => {
            json_log(Domain::System, "sender.configured", obj(&[("kind", v_str("null"))]));
            Box::new(NullEmailSender::new())
        }
    };

    json_log(
        Domain::System,
        "daemon.start",
        obj(&[
            ("db_base", v_str(&cfg.db_base)),
            ("cycle_secs", v_int(cfg.cycle_secs)),
        ]),
    );

    loop {
        let now = now_ts();
        match run_cycle(&db, &mut audit, sender.as_ref(), &mut circuit, &cfg, now).await {
            Ok(stats) => {
                if stats.rejected > 0 || stats.integrity_breaches > 0 {
                    solarops::logging::log(
                        Level::Warn,
                        Domain::System,
                        "cycle.attention",
                        obj(&[
                            ("rejected", v_int(stats.rejected)),
                            ("integrity_breaches", v_int(stats.integrity_breaches)),
                        ]),
                    );
                }
            }
            Err(e) => {
                // A failed cycle (store unreachable, audit write error)
                // is logged and retried on the next tick.
                solarops::logging::log(
                    Level::Error,
                    Domain::System,
                    "cycle.failed",
                    obj(&[("error", v_str(&e.to_string()))]),
                );
            }
        }
        sleep(Duration::from_secs(cfg.cycle_secs)).await;
    }
}
