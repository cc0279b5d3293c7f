//! Operator configuration, read from the environment (and `.env`).

use std::env;

use anyhow::{Context, Result, anyhow};
use eesa_db::DbConfig;
use eesa_workflow::WorkflowConfig;
use eesa_workflow::password::check_strength;

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub db: DbConfig,
    pub workflow: WorkflowConfig,
    /// Initial password for `create-admin`, from `EESA_ADMIN_PASSWORD`.
    pub admin_password: Option<String>,
}

impl AdminConfig {
    /// Load configuration from environment variables. Unset variables fall
    /// back to the library defaults.
    pub fn from_env() -> Result<Self> {
        let db_defaults = DbConfig::default();
        let db = DbConfig {
            url: env::var("EESA_DB_URL").unwrap_or(db_defaults.url),
            namespace: env::var("EESA_DB_NAMESPACE").unwrap_or(db_defaults.namespace),
            database: env::var("EESA_DB_DATABASE").unwrap_or(db_defaults.database),
            username: env::var("EESA_DB_USER").unwrap_or(db_defaults.username),
            password: env::var("EESA_DB_PASSWORD").unwrap_or(db_defaults.password),
        };

        let mut workflow = WorkflowConfig::default();
        workflow.pepper = env::var("EESA_PASSWORD_PEPPER").ok().filter(|p| !p.is_empty());
        if let Ok(raw) = env::var("EESA_ENFORCE_REVIEWER_COHORT") {
            workflow.enforce_reviewer_cohort_match = parse_flag(&raw)
                .with_context(|| format!("EESA_ENFORCE_REVIEWER_COHORT: invalid value {raw:?}"))?;
        }

        Ok(Self {
            db,
            workflow,
            admin_password: env::var("EESA_ADMIN_PASSWORD").ok(),
        })
    }

    /// The bootstrap superuser password, checked against the configured
    /// minimum length.
    pub fn admin_password(&self) -> Result<&str> {
        let password = self
            .admin_password
            .as_deref()
            .ok_or_else(|| anyhow!("EESA_ADMIN_PASSWORD must be set"))?;
        check_strength(password, self.workflow.min_password_length)?;
        Ok(password)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
