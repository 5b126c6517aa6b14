// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Persistence for organizations, certificates and private keys.
//!
//! Certificates and keys are addressed by organization id plus the full
//! serial number chain from the root down to the item itself.
//! [`memory`] keeps everything in process; [`file`] stores PEM and JSON
//! under a directory tree.

pub mod file;
pub mod memory;

use crate::certificate::Certificate;
use crate::error::Result;
use crate::key::PrivateKey;
use crate::organization::Organization;
use crate::serial::{serial_path, SerialNumber};

pub trait OrganizationRepository: Send + Sync {
    fn find_all(&self) -> Result<Vec<Organization>>;

    /// Fails with `OrganizationNotFound` when absent.
    fn find_by_id(&self, id: &str) -> Result<Organization>;

    /// Insert or replace.
    fn save(&self, organization: &Organization) -> Result<()>;
}

pub trait CertificateRepository: Send + Sync {
    fn find_all_by_organization(&self, organization: &str) -> Result<Vec<Certificate>>;

    /// Direct children of the certificate at `signed_by`, which is the
    /// signer's full chain.
    fn find_all_by_organization_and_signed_by(
        &self,
        organization: &str,
        signed_by: &[SerialNumber],
    ) -> Result<Vec<Certificate>>;

    /// Fails with `CertificateNotFound` when absent.
    fn find_by_organization_and_serial_numbers(
        &self,
        organization: &str,
        chain: &[SerialNumber],
    ) -> Result<Certificate>;

    /// Insert or replace.
    fn save(&self, certificate: &Certificate) -> Result<()>;
}

pub trait PrivateKeyRepository: Send + Sync {
    /// Fails with `PrivateKeyNotFound` when absent.
    fn find_by_organization_and_serial_numbers(
        &self,
        organization: &str,
        chain: &[SerialNumber],
    ) -> Result<PrivateKey>;

    /// Insert or replace.
    fn save(&self, key: &PrivateKey) -> Result<()>;
}

/// `{organization}/{serial}/{serial}...`
///
/// Organization ids are slugs, so no id can contain the separator.
pub(crate) fn locator(organization: &str, chain: &[SerialNumber]) -> String {
    if chain.is_empty() {
        organization.to_string()
    } else {
        format!("{}/{}", organization, serial_path(chain))
    }
}
