use std::{env, fs, net::SocketAddr};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "PLAYLIST_PROXY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./config.toml";
/// Overrides `backend_url` when set, the same variable the web frontend reads its backend from
pub const SERVER_URL_VAR: &str = "SERVER_URL";

#[derive(Error, Debug)]
pub enum PrefError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid config format: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("could not serialize default config: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    #[error("backend_url must be an absolute http(s) URL, got {0:?}")]
    InvalidBackendUrl(String),

    #[error("https_cert_path and https_key_path must be set together")]
    IncompleteTls,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Preferences {
    http_ip: String,
    port: u16,
    backend_url: String,
    api_prefix: String,
    preserve_upstream_status: bool,
    log_level: String,
    https_cert_path: Option<String>,
    https_key_path: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            http_ip: String::from("127.0.0.1"),
            port: 8080,
            backend_url: String::from("http://localhost:8000"),
            api_prefix: String::from("/api/v1"),
            preserve_upstream_status: false,
            log_level: String::from("info"),
            https_cert_path: None,
            https_key_path: None,
        }
    }
}

impl Preferences {
    pub fn http_ip(&self) -> &str {
        self.http_ip.as_str()
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn backend_url(&self) -> &str {
        self.backend_url.as_str()
    }
    pub fn api_prefix(&self) -> &str {
        self.api_prefix.as_str()
    }
    pub fn preserve_upstream_status(&self) -> bool {
        self.preserve_upstream_status
    }
    pub fn log_level(&self) -> &str {
        self.log_level.as_str()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.http_ip(), self.port()).parse()
    }

    /// Cert and key paths when HTTPS is configured
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        self.https_cert_path
            .as_deref()
            .zip(self.https_key_path.as_deref())
    }

    /// Path to the config file, taken from the environment or the working directory
    pub fn config_path() -> String {
        env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH))
    }

    /// Reads the TOML file at `path`, writing a default one first if it does not exist. Keys
    /// missing from the file keep their default values.
    pub fn load_config(path: &str) -> Result<Self, PrefError> {
        eprintln!("Config path is {}", path);
        let prefs = match fs::read_to_string(path) {
            Ok(buff) => toml::from_str(buff.as_str())?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => create_default_config(path)?,
            Err(err) => return Err(PrefError::IoError(err)),
        };

        prefs
            .with_backend_override(env::var(SERVER_URL_VAR).ok())
            .validated()
    }

    fn with_backend_override(mut self, backend_url: Option<String>) -> Self {
        if let Some(url) = backend_url.filter(|url| !url.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        self
    }

    fn validated(self) -> Result<Self, PrefError> {
        if self.https_cert_path.is_some() != self.https_key_path.is_some() {
            return Err(PrefError::IncompleteTls);
        }
        match Url::parse(&self.backend_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(self),
            _ => Err(PrefError::InvalidBackendUrl(self.backend_url)),
        }
    }
}

fn create_default_config(path: &str) -> Result<Preferences, PrefError> {
    let new_pref = Preferences::default();
    eprintln!("No config found, writing defaults to {}", path);
    fs::write(path, toml::to_string(&new_pref)?)?;
    Ok(new_pref)
}
