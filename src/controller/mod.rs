// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Navigation and issuance over the certificate hierarchy.
//!
//! Controllers form a chain that is built top-down:
//!
//! ```text
//! ApplicationController
//!   └─ OrganizationController<'a>      borrows the application
//!        └─ CertificateController<'a>  borrows the organization and its parent certificate
//!             └─ PrivateKeyController<'a>
//! ```
//!
//! A controller never holds its children; they are looked up in the
//! repositories on demand.

mod application;
mod certificate;
mod organization;
mod private_key;

pub use application::ApplicationController;
pub use certificate::CertificateController;
pub use organization::OrganizationController;
pub use private_key::PrivateKeyController;

use crate::key::KeyType;
use time::Duration;

pub const DEFAULT_ROOT_EXPIRATION_DAYS: i64 = 3650;
pub const DEFAULT_EXPIRATION_DAYS: i64 = 365;
pub const DEFAULT_ROOT_KEY_TYPE: KeyType = KeyType::EcdsaP384;
pub const DEFAULT_KEY_TYPE: KeyType = KeyType::EcdsaP384;

/// Validity periods and key types used when the caller does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceDefaults {
    pub root_expiration: Duration,
    /// Intermediate and leaf certificates.
    pub expiration: Duration,
    pub root_key_type: KeyType,
    pub key_type: KeyType,
}

impl Default for IssuanceDefaults {
    fn default() -> Self {
        Self {
            root_expiration: Duration::days(DEFAULT_ROOT_EXPIRATION_DAYS),
            expiration: Duration::days(DEFAULT_EXPIRATION_DAYS),
            root_key_type: DEFAULT_ROOT_KEY_TYPE,
            key_type: DEFAULT_KEY_TYPE,
        }
    }
}
