use std::env;

use anyhow::anyhow;

use crate::notify::SmtpConfig;
use crate::services::{RescheduleConflictPolicy, SchedulingPolicy};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    /// None: notices are only logged.
    pub smtp: Option<SmtpConfig>,
    pub policy: SchedulingPolicy,
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let run_migrations = flag("RUN_MIGRATIONS", true);

        let smtp = match non_empty("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse::<u16>().ok())
                    .unwrap_or(587),
                username: non_empty("SMTP_USERNAME"),
                password: non_empty("SMTP_PASSWORD"),
                from: non_empty("MAIL_FROM")
                    .ok_or_else(|| anyhow!("MAIL_FROM is required when SMTP_HOST is set"))?,
                starttls: flag("SMTP_STARTTLS", true),
            }),
            None => None,
        };

        let reschedule_conflicts = match env::var("RESCHEDULE_CONFLICTS") {
            Ok(v) => v.parse::<RescheduleConflictPolicy>().map_err(|e| anyhow!(e))?,
            Err(_) => RescheduleConflictPolicy::default(),
        };
        let policy = SchedulingPolicy {
            cancel_requires_ownership: flag("CANCEL_REQUIRES_OWNERSHIP", false),
            reschedule_conflicts,
        };

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            run_migrations,
            smtp,
            policy,
        })
    }
}
