// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::key::KeyType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{field}: must be defined")]
    MustBeDefined { field: &'static str },

    #[error("Invalid {field} '{value}': {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Server certificate must have at least one DNS name")]
    NoDnsNames,

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(KeyType),

    #[error("Invalid serial number '{0}'")]
    InvalidSerialNumber(String),

    #[error("Invalid path (non-UTF8): {0}")]
    InvalidPath(PathBuf),

    #[error("Organization '{id}' not found")]
    OrganizationNotFound { id: String },

    #[error("Certificate '{serial}' not found in organization '{organization}'")]
    CertificateNotFound {
        organization: String,
        serial: String,
    },

    #[error("Private key for '{serial}' not found in organization '{organization}'")]
    PrivateKeyNotFound {
        organization: String,
        serial: String,
    },

    #[error("Organization '{id}' already exists")]
    OrganizationExists { id: String },

    #[error("Serial number {serial} already exists in organization '{organization}'")]
    SerialNumberExists {
        organization: String,
        serial: String,
    },

    #[error("Random source failed: {0}")]
    Entropy(String),

    #[error("Key generation failed for {key_type}: {reason}")]
    KeyGeneration { key_type: KeyType, reason: String },

    #[error("Failed to encode private key: {0}")]
    KeyEncoding(String),

    #[error("Failed to parse private key: {0}")]
    KeyParse(String),

    #[error("Certificate generation failed: {0}")]
    CertGen(#[from] rcgen::Error),

    #[error("Failed to parse certificate: {0}")]
    CertParse(String),

    #[error("Signature operation failed: {0}")]
    Signature(String),

    #[error("Signed certificate does not match its template: {0}")]
    SignatureMismatch(String),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create temporary file in {dir}: {source}")]
    CreateTemp {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to set permissions on {path}: {source}")]
    SetPermissions {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to close file {path}: {source}")]
    CloseFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse PEM in {path}: {reason}")]
    Pem { path: PathBuf, reason: String },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{repository} repository is not initialized")]
    NotInitialized { repository: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid validity period: {0}")]
    InvalidDays(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the calling operation's context.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Error::OrganizationNotFound { .. }
                | Error::CertificateNotFound { .. }
                | Error::PrivateKeyNotFound { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self.root(),
            Error::OrganizationExists { .. } | Error::SerialNumberExists { .. }
        )
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self.root(),
            Error::MustBeDefined { .. }
                | Error::Validation { .. }
                | Error::NoDnsNames
                | Error::UnsupportedKeyType(_)
                | Error::InvalidSerialNumber(_)
        )
    }
}

/// Attach operation context to the error side of a result.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
