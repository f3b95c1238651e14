//! Configuration for `GeofenceApp`.
//!
//! Settings live in an INI file, by default at
//! `<config dir>/geobridge/config.ini`:
//!
//! ```ini
//! [registration]
//! initial_trigger = enter
//! resolution_request_code = 2404
//!
//! [dispatch]
//! auto_start_runtime = true
//!
//! [logging]
//! level = info
//! directory = /var/log/geobridge
//!
//! [region.home]
//! latitude = 1.0
//! longitude = 2.0
//! radius = 100
//! ```
//!
//! Missing keys keep their defaults. `[region.<identifier>]` sections are read
//! separately through [`GeofenceConfig::load_regions`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use super::error::ConfigError;
use crate::provider::InitialTrigger;
use crate::region::RegionConfig;
use crate::registration::RegistrationConfig;

/// Directory name under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "geobridge";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

const REGION_SECTION_PREFIX: &str = "region.";

/// Delivery gating settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Request runtime startup when a delivery finds the bus cold.
    pub auto_start_runtime: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            auto_start_runtime: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,

    /// Directory for daily-rolling log files. Console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Top-level configuration passed to `GeofenceApp::start()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeofenceConfig {
    pub registration: RegistrationConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

impl GeofenceConfig {
    pub fn with_initial_trigger(mut self, trigger: InitialTrigger) -> Self {
        self.registration.initial_trigger = trigger;
        self
    }

    pub fn with_resolution_request_code(mut self, code: i32) -> Self {
        self.registration.resolution_request_code = code;
        self
    }

    pub fn with_auto_start_runtime(mut self, enabled: bool) -> Self {
        self.dispatch.auto_start_runtime = enabled;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    pub fn with_log_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.logging.directory = Some(directory.into());
        self
    }

    /// Default configuration file path, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = read_ini(path)?;
        Self::from_ini(&ini)
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    /// Regions declared as `[region.<identifier>]` sections in `path`.
    pub fn load_regions(path: &Path) -> Result<Vec<RegionConfig>, ConfigError> {
        let ini = read_ini(path)?;
        parse_regions(&ini)
    }

    pub fn regions_from_ini_str(contents: &str) -> Result<Vec<RegionConfig>, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        parse_regions(&ini)
    }

    /// Render the effective settings as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("registration"))
            .set("initial_trigger", self.registration.initial_trigger.as_str())
            .set(
                "resolution_request_code",
                self.registration.resolution_request_code.to_string(),
            );
        ini.with_section(Some("dispatch")).set(
            "auto_start_runtime",
            self.dispatch.auto_start_runtime.to_string(),
        );
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str());
        if let Some(dir) = &self.logging.directory {
            ini.with_section(Some("logging"))
                .set("directory", dir.display().to_string());
        }

        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("registration")) {
            if let Some(v) = section.get("initial_trigger") {
                config.registration.initial_trigger = v
                    .parse::<InitialTrigger>()
                    .map_err(|e| invalid("registration", "initial_trigger", e))?;
            }
            if let Some(v) = section.get("resolution_request_code") {
                config.registration.resolution_request_code =
                    parse_value("registration", "resolution_request_code", v)?;
            }
        }

        if let Some(section) = ini.section(Some("dispatch")) {
            if let Some(v) = section.get("auto_start_runtime") {
                config.dispatch.auto_start_runtime =
                    parse_value("dispatch", "auto_start_runtime", v)?;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("level") {
                config.logging.level = v.trim().to_string();
            }
            if let Some(v) = section.get("directory") {
                let v = v.trim();
                config.logging.directory = (!v.is_empty()).then(|| PathBuf::from(v));
            }
        }

        Ok(config)
    }
}

fn read_ini(path: &Path) -> Result<Ini, ConfigError> {
    Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(source) => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
        ini::Error::Parse(e) => ConfigError::Parse(e.to_string()),
    })
}

fn parse_regions(ini: &Ini) -> Result<Vec<RegionConfig>, ConfigError> {
    let mut regions = Vec::new();

    for (name, section) in ini.iter() {
        let Some(identifier) = name.and_then(|n| n.strip_prefix(REGION_SECTION_PREFIX)) else {
            continue;
        };
        let section_name = format!("{}{}", REGION_SECTION_PREFIX, identifier);

        let field = |key: &str| -> Result<f64, ConfigError> {
            let raw = section.get(key).ok_or_else(|| ConfigError::MissingKey {
                section: section_name.clone(),
                key: key.to_string(),
            })?;
            parse_value(&section_name, key, raw)
        };

        regions.push(RegionConfig {
            identifier: identifier.to_string(),
            latitude: field("latitude")?,
            longitude: field("longitude")?,
            radius: field("radius")?,
        });
    }

    Ok(regions)
}

fn parse_value<T>(section: &str, key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| invalid(section, key, e))
}

fn invalid(section: &str, key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
