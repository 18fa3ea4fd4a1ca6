use anyhow::{Context, anyhow};
use chrono::Weekday;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::reveal::schedule::RevealSchedule;

pub const REVEAL_API_KEY_ENV: &str = "SUNDAYDECK_REVEAL_API_KEY";
pub const CATALOG_CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const CATALOG_CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    pub http: HttpConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    pub catalog: Option<CatalogConfig>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        let mut config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;
        config.apply_env(|key| std::env::var(key).ok());
        config.reveal.schedule()?;
        config.reveal.poll_interval()?;
        Ok(config)
    }

    /// secrets from the environment win over the file
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(REVEAL_API_KEY_ENV) {
            self.reveal.api_key = Some(key);
        }

        let client_id = lookup(CATALOG_CLIENT_ID_ENV);
        let client_secret = lookup(CATALOG_CLIENT_SECRET_ENV);
        match (&mut self.catalog, client_id, client_secret) {
            (Some(catalog), id, secret) => {
                if let Some(id) = id {
                    catalog.client_id = id;
                }
                if let Some(secret) = secret {
                    catalog.client_secret = secret;
                }
            }
            (None, Some(client_id), Some(client_secret)) => {
                self.catalog = Some(CatalogConfig {
                    client_id,
                    client_secret,
                });
            }
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RevealConfig {
    /// three-letter or full english weekday name, e.g. "Sun"
    pub weekday: String,
    /// hour of day in UTC
    pub hour: u32,
    pub poll_interval_secs: u64,
    /// shared secret for the manual reveal trigger
    pub api_key: Option<String>,
    /// accept manual reveals without a key; only honoured when `api_key` is unset
    pub trust_all_callers: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            weekday: "Sun".to_string(),
            hour: 12,
            poll_interval_secs: 20,
            api_key: None,
            trust_all_callers: false,
        }
    }
}

impl RevealConfig {
    pub fn schedule(&self) -> anyhow::Result<RevealSchedule> {
        let weekday: Weekday = self
            .weekday
            .parse()
            .map_err(|_| anyhow!("invalid reveal weekday '{}'", self.weekday))?;
        RevealSchedule::new(weekday, self.hour)
            .ok_or_else(|| anyhow!("invalid reveal hour {}, expected 0..=23", self.hour))
    }

    /// Must be shorter than a minute, otherwise a tick can miss the due minute.
    pub fn poll_interval(&self) -> anyhow::Result<Duration> {
        match self.poll_interval_secs {
            1..=59 => Ok(Duration::from_secs(self.poll_interval_secs)),
            secs => Err(anyhow!(
                "invalid reveal poll_interval_secs {secs}, expected 1..=59"
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const FULL: &str = r#"
version = 1

[database]
in_memory = false
path = "/tmp/sundaydeck.db"

[http]
bind_addr = "127.0.0.1"
port = 8080

[reveal]
weekday = "Sun"
hour = 17
poll_interval_secs = 5
api_key = "secret"

[catalog]
client_id = "id"
client_secret = "shh"
"#;

    #[test]
    fn test_parse_config_toml() -> anyhow::Result<()> {
        let cfg: Config = toml::from_str(FULL)?;

        assert_eq!(cfg.version, 1);
        assert!(!cfg.database.in_memory);
        assert_eq!(cfg.database.path, Some(PathBuf::from("/tmp/sundaydeck.db")));
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.reveal.hour, 17);
        assert_eq!(cfg.reveal.poll_interval_secs, 5);
        assert_eq!(cfg.reveal.api_key.as_deref(), Some("secret"));
        assert!(!cfg.reveal.trust_all_callers);
        assert_eq!(cfg.catalog.unwrap().client_id, "id");

        Ok(())
    }

    #[test]
    fn test_reveal_section_defaults() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[database]
in_memory = true

[http]
bind_addr = "0.0.0.0"
port = 80
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert!(cfg.database.in_memory);
        assert!(cfg.catalog.is_none());
        assert_eq!(cfg.reveal.weekday, "Sun");
        assert_eq!(cfg.reveal.hour, 12);
        assert!(cfg.reveal.api_key.is_none());

        let schedule = cfg.reveal.schedule()?;
        assert_eq!(schedule, RevealSchedule::default());

        Ok(())
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let mut reveal = RevealConfig::default();
        reveal.weekday = "Someday".to_string();
        assert!(reveal.schedule().is_err());

        let mut reveal = RevealConfig::default();
        reveal.hour = 24;
        assert!(reveal.schedule().is_err());
    }

    #[test]
    fn test_poll_interval_must_fit_in_due_minute() {
        let mut reveal = RevealConfig::default();
        assert_eq!(reveal.poll_interval().ok(), Some(Duration::from_secs(20)));

        reveal.poll_interval_secs = 59;
        assert!(reveal.poll_interval().is_ok());

        reveal.poll_interval_secs = 60;
        assert!(reveal.poll_interval().is_err());

        reveal.poll_interval_secs = 0;
        assert!(reveal.poll_interval().is_err());
    }

    #[test]
    fn test_load_rejects_slow_poll_interval() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        let slow = FULL.replace("poll_interval_secs = 5", "poll_interval_secs = 90");
        file.write_all(slow.as_bytes())?;

        assert!(Config::load(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_env_overrides_secrets() -> anyhow::Result<()> {
        let mut cfg: Config = toml::from_str(FULL)?;
        let env = HashMap::from([
            (REVEAL_API_KEY_ENV, "from-env"),
            (CATALOG_CLIENT_SECRET_ENV, "env-secret"),
        ]);

        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.reveal.api_key.as_deref(), Some("from-env"));
        let catalog = cfg.catalog.unwrap();
        assert_eq!(catalog.client_id, "id");
        assert_eq!(catalog.client_secret, "env-secret");

        Ok(())
    }

    #[test]
    fn test_env_creates_catalog_section() -> anyhow::Result<()> {
        let mut cfg: Config = toml::from_str(
            r#"
version = 1
[database]
in_memory = true
[http]
bind_addr = "0.0.0.0"
port = 80
"#,
        )?;
        let env = HashMap::from([
            (CATALOG_CLIENT_ID_ENV, "cid"),
            (CATALOG_CLIENT_SECRET_ENV, "csecret"),
        ]);

        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        let catalog = cfg.catalog.unwrap();
        assert_eq!(catalog.client_id, "cid");
        assert_eq!(catalog.client_secret, "csecret");

        Ok(())
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(FULL.as_bytes())?;

        let cfg = Config::load(file.path())?;
        assert_eq!(cfg.http.bind_addr, "127.0.0.1");

        assert!(Config::load(Path::new("/definitely/not/here.toml")).is_err());
        Ok(())
    }
}
