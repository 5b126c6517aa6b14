// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::controller::IssuanceDefaults;
use crate::error::{Error, Result};
use crate::fs::atomic_write;
use crate::key::KeyType;
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current config file version. Increment when making breaking changes.
const CONFIG_VERSION: u32 = 1;

/// Longest validity for intermediate and leaf certificates (10 years).
pub const MAX_CERT_DAYS: u32 = 3650;

/// Longest validity for root certificates (20 years).
pub const MAX_ROOT_DAYS: u32 = 7300;

pub const ROOT_ENV: &str = "CERTCENTER_ROOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Config file version for future migration support
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default = "default_root_days")]
    pub root_days: u32,
    #[serde(default = "default_cert_days")]
    pub cert_days: u32,
    #[serde(default = "default_key_type")]
    pub root_key_type: KeyType,
    #[serde(default = "default_key_type")]
    pub certificate_key_type: KeyType,
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_root_days() -> u32 {
    3650
}

fn default_cert_days() -> u32 {
    365
}

fn default_key_type() -> KeyType {
    KeyType::EcdsaP384
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            root_days: default_root_days(),
            cert_days: default_cert_days(),
            root_key_type: default_key_type(),
            certificate_key_type: default_key_type(),
        }
    }
}

/// Validate that a validity period is within `1..=max` days.
pub fn validate_days(field: &str, days: u32, max: u32) -> Result<()> {
    if days == 0 {
        return Err(Error::InvalidDays(format!("{} cannot be 0", field)));
    }
    if days > max {
        return Err(Error::InvalidDays(format!(
            "{} cannot exceed {}",
            field, max
        )));
    }
    Ok(())
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.config_version > CONFIG_VERSION {
            tracing::warn!(
                version = self.config_version,
                supported = CONFIG_VERSION,
                "config.toml is newer than this build; some settings may be ignored"
            );
        }

        validate_days("root_days", self.root_days, MAX_ROOT_DAYS)?;
        validate_days("cert_days", self.cert_days, MAX_CERT_DAYS)?;

        for (field, key_type) in [
            ("root_key_type", self.root_key_type),
            ("certificate_key_type", self.certificate_key_type),
        ] {
            if key_type == KeyType::Nil {
                return Err(Error::Config(format!("{} must not be NIL", field)));
            }
            if !key_type.supports_certificates() {
                return Err(Error::Config(format!(
                    "{} {} cannot be used to issue certificates",
                    field, key_type
                )));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        atomic_write(path, content.as_bytes())
    }

    pub fn issuance_defaults(&self) -> IssuanceDefaults {
        IssuanceDefaults {
            root_expiration: time::Duration::days(i64::from(self.root_days)),
            expiration: time::Duration::days(i64::from(self.cert_days)),
            root_key_type: self.root_key_type,
            key_type: self.certificate_key_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        Ok(Self::from_base(Self::base_dir()?))
    }

    pub fn from_base(base: PathBuf) -> Self {
        Self {
            config: base.join("config.toml"),
            base,
        }
    }

    /// Root of the file repository tree.
    pub fn repository(&self) -> &Path {
        &self.base
    }

    fn base_dir() -> Result<PathBuf> {
        if let Ok(custom_root) = std::env::var(ROOT_ENV) {
            let path = PathBuf::from(&custom_root);
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "{} must be an absolute path, got: {}",
                    ROOT_ENV, custom_root
                )));
            }
            return Ok(path);
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "certcenter") {
            Ok(proj_dirs.data_dir().to_path_buf())
        } else if let Some(base_dirs) = BaseDirs::new() {
            Ok(base_dirs.home_dir().join(".certcenter"))
        } else {
            Err(Error::Config(format!(
                "could not determine a data directory; set {}",
                ROOT_ENV
            )))
        }
    }
}
