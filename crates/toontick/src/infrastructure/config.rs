use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CatalogueConfig {
    #[serde(default = "default_catalogue_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            endpoint: default_catalogue_endpoint(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            per_page: default_per_page(),
        }
    }
}

impl CatalogueConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_create_database")]
    pub create_database: bool,
    #[serde(default = "default_guest_library_path")]
    pub guest_library_path: String,
    #[serde(default = "default_session_path")]
    pub session_path: String,
    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl: i64,
    #[serde(default)]
    pub catalogue: CatalogueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: toontick_home().join("config.yml"),
            database_path: default_database_path(),
            create_database: default_create_database(),
            guest_library_path: default_guest_library_path(),
            session_path: default_session_path(),
            session_ttl: default_session_ttl(),
            catalogue: CatalogueConfig::default(),
        }
    }
}

pub fn toontick_home() -> PathBuf {
    match std::env::var("TOONTICK_HOME") {
        Ok(path) => PathBuf::from(path),
        Err(_) => dirs::home_dir().unwrap_or_default().join(".toontick"),
    }
}

fn default_database_path() -> String {
    toontick_home().join("toontick.db").display().to_string()
}

fn default_create_database() -> bool {
    true
}

fn default_guest_library_path() -> String {
    toontick_home()
        .join("guest_library.json")
        .display()
        .to_string()
}

fn default_session_path() -> String {
    toontick_home().join("session.json").display().to_string()
}

fn default_session_ttl() -> i64 {
    3600
}

fn default_catalogue_endpoint() -> String {
    toontick_catalogue::anilist::ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_min_request_interval_ms() -> u64 {
    500
}

fn default_per_page() -> i64 {
    50
}

impl Config {
    pub fn open<P: AsRef<Path>>(path: Option<P>) -> Result<Config, anyhow::Error> {
        let config_path = match path {
            Some(p) => PathBuf::new().join(p),
            None => toontick_home().join("config.yml"),
        };

        let cfg = match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                info!("Open config from {:?}", config_path);
                let mut cfg: Self = serde_yml::from_str(&content)?;
                cfg.path = config_path;
                cfg
            }
            Err(_) => {
                let cfg = Config {
                    path: config_path,
                    ..Default::default()
                };
                cfg.save()?;
                info!("Write default config at {:?}", cfg.path);
                cfg
            }
        };

        cfg.create_dirs()?;

        Ok(cfg)
    }

    pub fn save(&self) -> Result<(), anyhow::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yml::to_string(&self)?)?;

        Ok(())
    }

    fn create_dirs(&self) -> Result<(), anyhow::Error> {
        for path in [
            &self.database_path,
            &self.guest_library_path,
            &self.session_path,
        ] {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl)
    }
}
