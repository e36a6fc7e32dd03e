// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Key used when no `session.secret` is configured. Fine for a laptop, never for a deployment.
pub const DEVELOPMENT_SESSION_SECRET: &str = "taskdesk-development-secret-change-me";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub smtp: Option<SmtpSettings>,
    pub cron: CronSettings,
    pub seed: Option<SeedSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Base URL used when mailing links back into the application.
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub secret: String,
    pub ttl_hours: i64,
    pub cookie_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl SmtpSettings {
    /// Sender mailbox, falling back to the SMTP user like the mail templates expect.
    pub fn from_address(&self) -> String {
        match (&self.from, &self.username) {
            (Some(from), _) => from.clone(),
            (None, Some(user)) => format!("College Task System <{}>", user),
            (None, None) => format!("College Task System <no-reply@{}>", self.host),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CronSettings {
    pub secret: Option<String>,
    /// Period of the in-process sweep. Zero turns the loop off.
    pub interval_secs: u64,
}

/// HOD account created by the `seed` binary.
#[derive(Debug, Deserialize, Clone)]
pub struct SeedSettings {
    pub hod_emp_id: String,
    pub hod_name: String,
    pub hod_email: String,
    pub hod_password: String,
    pub department_code: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case outside development.
        let _ = dotenvy::dotenv();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.url", "sqlite://database/taskdesk.db")?
            .set_default("database.max_connections", 5)?
            .set_default("session.secret", DEVELOPMENT_SESSION_SECRET)?
            .set_default("session.ttl_hours", 12)?
            .set_default("session.cookie_name", "taskdesk_session")?
            .set_default("cron.interval_secs", 900)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_prefers_explicit_from() {
        let mut smtp = SmtpSettings {
            host: "smtp.example.edu".into(),
            port: 587,
            username: Some("tasks@example.edu".into()),
            password: None,
            from: None,
        };
        assert_eq!(smtp.from_address(), "College Task System <tasks@example.edu>");

        smtp.from = Some("Registrar <registrar@example.edu>".into());
        assert_eq!(smtp.from_address(), "Registrar <registrar@example.edu>");
    }
}
