use std::{env, fmt, fs, io, path, time::Duration};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{
    ValidationResult, validate_checker_name, validate_http_endpoint, validate_interval,
    validate_listen_address, validate_system_id, validate_timeout,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which devices this instance monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every device listed in the central monitoring document
    Central,
    /// Devices of the room this system belongs to
    #[default]
    Room,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Central => write!(f, "central"),
            Mode::Room => write!(f, "room"),
        }
    }
}

impl Mode {
    /// Jitter used when the config does not set one
    pub fn default_jitter_secs(self) -> u64 {
        match self {
            Mode::Central => 30,
            Mode::Room => 5,
        }
    }

    /// Checkers run when the config does not declare any
    pub fn default_checkers(self) -> Vec<CheckerConfig> {
        let ping = CheckerConfig::new("ping", CheckerKind::Reachability, 120);
        match self {
            Mode::Central => vec![ping],
            Mode::Room => vec![ping, CheckerConfig::new("health", CheckerKind::Health, 60)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerKind {
    /// ICMP echo bursts
    Reachability,
    /// Room health report from the control backend
    Health,
}

impl fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckerKind::Reachability => write!(f, "reachability"),
            CheckerKind::Health => write!(f, "health"),
        }
    }
}

/// One `[[checkers]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub name: String,
    pub kind: CheckerKind,
    pub interval_secs: u64,

    /// Probes per burst (reachability)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u16>,
    /// Spacing between probes (reachability)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_interval_ms: Option<u64>,
    /// Burst timeout (reachability) or request timeout (health)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Lifetime of a cached room report (health)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

impl CheckerConfig {
    pub fn new(name: impl Into<String>, kind: CheckerKind, interval_secs: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            interval_secs,
            count: None,
            probe_interval_ms: None,
            timeout_ms: None,
            cache_ttl_secs: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHub {
    /// Empty to only log events
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EventHub {
    fn default() -> Self {
        Self { address: String::new(), timeout_secs: default_request_timeout_secs() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthApi {
    pub address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    pub listen: String,
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    /// Identifier of this system, `BLDG-ROOM-CPn`
    #[serde(default)]
    pub system_id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_secs: Option<u64>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    pub store: Store,
    #[serde(default)]
    pub event_hub: EventHub,
    pub health_api: HealthApi,
    pub api: Api,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkers: Vec<CheckerConfig>,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_queue_capacity() -> usize {
    fleetwatch::DEFAULT_QUEUE_CAPACITY
}

fn default_max_concurrent_checks() -> usize {
    fleetwatch::DEFAULT_MAX_CONCURRENT_CHECKS
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/fleetwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("fleetwatch/config.toml"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            system_id: String::new(),
            log_level: default_log_level(),
            jitter_secs: None,
            queue_capacity: default_queue_capacity(),
            max_concurrent_checks: default_max_concurrent_checks(),
            store: Store {
                address: "http://localhost:5984".into(),
                username: String::new(),
                password: String::new(),
                timeout_secs: default_request_timeout_secs(),
            },
            event_hub: EventHub::default(),
            health_api: HealthApi {
                address: "http://localhost:8000".into(),
                timeout_secs: default_request_timeout_secs(),
            },
            api: Api { listen: "0.0.0.0:8080".into() },
            checkers: Vec::new(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        let or_unset = |value: &str| if value.is_empty() { "(unset)".to_string() } else { value.to_string() };
        let password = if self.store.password.is_empty() { "(unset)" } else { "********" };

        writeln!(f, "Current Internal Configuration State:")?;
        write_1(f, "Mode", &self.mode)?;
        write_1(f, "System ID", &or_unset(&self.system_id))?;
        write_1(f, "Log Level", &self.log_level)?;
        write_1(f, "Jitter (s)", &self.jitter().as_secs())?;
        write_1(f, "Queue Capacity", &self.queue_capacity)?;
        write_1(f, "Max Concurrent Checks", &self.max_concurrent_checks)?;
        write_title_1(f, "Device Store")?;
        write_1(f, "Address", &self.store.address)?;
        write_1(f, "Username", &or_unset(&self.store.username))?;
        write_1(f, "Password", &password)?;
        write_1(f, "Timeout (s)", &self.store.timeout_secs)?;
        write_title_1(f, "Event Hub")?;
        write_1(f, "Address", &or_unset(&self.event_hub.address))?;
        write_1(f, "Timeout (s)", &self.event_hub.timeout_secs)?;
        write_title_1(f, "Health API")?;
        write_1(f, "Address", &self.health_api.address)?;
        write_1(f, "Timeout (s)", &self.health_api.timeout_secs)?;
        write_title_1(f, "Status API")?;
        write_1(f, "Listen", &self.api.listen)?;
        write_title_1(f, "Checkers")?;
        for checker in self.effective_checkers() {
            write_1(f, &checker.name, &checker.kind)?;
            write_2(f, "Interval (s)", &checker.interval_secs)?;
        }

        Ok(())
    }
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub system_id: Option<String>,
    pub log_level: Option<String>,
    pub db_address: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub eventhub_address: Option<String>,
    pub health_api_address: Option<String>,
    pub listen: Option<String>,
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/fleetwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply command line values on top of the file
    pub fn apply(&mut self, overrides: Overrides) {
        let Overrides {
            mode,
            system_id,
            log_level,
            db_address,
            db_username,
            db_password,
            eventhub_address,
            health_api_address,
            listen,
        } = overrides;

        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(system_id) = system_id {
            self.system_id = system_id;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        if let Some(address) = db_address {
            self.store.address = address;
        }
        if let Some(username) = db_username {
            self.store.username = username;
        }
        if let Some(password) = db_password {
            self.store.password = password;
        }
        if let Some(address) = eventhub_address {
            self.event_hub.address = address;
        }
        if let Some(address) = health_api_address {
            self.health_api.address = address;
        }
        if let Some(listen) = listen {
            self.api.listen = listen;
        }
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs.unwrap_or_else(|| self.mode.default_jitter_secs()))
    }

    /// Declared checkers, or the mode's defaults when none are declared
    pub fn effective_checkers(&self) -> Vec<CheckerConfig> {
        if self.checkers.is_empty() { self.mode.default_checkers() } else { self.checkers.clone() }
    }

    /// Room monitored in room mode, derived from `BLDG-ROOM-CPn`
    pub fn room_id(&self) -> Option<String> {
        let mut parts = self.system_id.split('-');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(building), Some(room), Some(_), None) if !building.is_empty() && !room.is_empty() => {
                Some(format!("{building}-{room}"))
            }
            _ => None,
        }
    }

    /// Check every value that would otherwise fail later at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut checks = vec![
            validate_http_endpoint(&self.store.address).context("store.address"),
            validate_listen_address(&self.api.listen).context("api.listen"),
        ];

        if self.mode == Mode::Room {
            checks.push(validate_system_id(&self.system_id).context("system_id"));
        }
        if !self.event_hub.address.is_empty() {
            checks.push(validate_http_endpoint(&self.event_hub.address).context("event_hub.address"));
        }
        for (field, timeout_secs) in [
            ("store.timeout_secs", self.store.timeout_secs),
            ("event_hub.timeout_secs", self.event_hub.timeout_secs),
            ("health_api.timeout_secs", self.health_api.timeout_secs),
        ] {
            if timeout_secs == 0 {
                checks.push(ValidationResult::err(format!("{field}: must be at least 1")));
            }
        }
        if self.queue_capacity == 0 {
            checks.push(ValidationResult::err("queue_capacity: must be at least 1"));
        }
        if self.max_concurrent_checks == 0 {
            checks.push(ValidationResult::err("max_concurrent_checks: must be at least 1"));
        }

        let checkers = self.effective_checkers();
        for (i, checker) in checkers.iter().enumerate() {
            let field = |name: &str| format!("checkers[{i}].{name}");

            checks.push(validate_checker_name(&checker.name).context(&field("name")));
            checks.push(validate_interval(checker.interval_secs).context(&field("interval_secs")));
            if let Some(timeout_ms) = checker.timeout_ms {
                checks.push(validate_timeout(timeout_ms, checker.interval_secs).context(&field("timeout_ms")));
            }
            if checker.count == Some(0) {
                checks.push(ValidationResult::err(format!("{}: must be at least 1", field("count"))));
            }
            if checker.kind == CheckerKind::Health {
                checks.push(validate_http_endpoint(&self.health_api.address).context("health_api.address"));
            }
            if checkers[..i].iter().any(|other| other.name == checker.name) {
                checks.push(ValidationResult::err(format!("{}: duplicate checker {}", field("name"), checker.name)));
            }
        }

        let errors: Vec<String> = checks.into_iter().filter_map(|check| check.error).collect();
        if errors.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(errors.join("; "))) }
    }
}
