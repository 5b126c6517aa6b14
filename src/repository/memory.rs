// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! In-process repositories.
//!
//! Each repository holds one map behind one lock, taken for the length of
//! a single call. A poisoned lock reports `NotInitialized`. Certificates and
//! keys are keyed by their locator, so organization ids are validated before
//! one is built.

use super::{locator, CertificateRepository, OrganizationRepository, PrivateKeyRepository};
use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::key::PrivateKey;
use crate::organization::Organization;
use crate::serial::{serial_path, SerialNumber};
use crate::validation::validate_organization_id;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

fn lock<'a, T>(
    map: &'a Mutex<BTreeMap<String, T>>,
    repository: &'static str,
) -> Result<MutexGuard<'a, BTreeMap<String, T>>> {
    map.lock()
        .map_err(|_| Error::NotInitialized { repository })
}

#[derive(Debug, Default)]
pub struct MemoryOrganizationRepository {
    organizations: Mutex<BTreeMap<String, Organization>>,
}

impl MemoryOrganizationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrganizationRepository for MemoryOrganizationRepository {
    fn find_all(&self) -> Result<Vec<Organization>> {
        let map = lock(&self.organizations, "organization")?;
        Ok(map.values().cloned().collect())
    }

    fn find_by_id(&self, id: &str) -> Result<Organization> {
        let map = lock(&self.organizations, "organization")?;
        map.get(id)
            .cloned()
            .ok_or_else(|| Error::OrganizationNotFound { id: id.to_string() })
    }

    fn save(&self, organization: &Organization) -> Result<()> {
        let mut map = lock(&self.organizations, "organization")?;
        map.insert(organization.id().to_string(), organization.clone());
        tracing::debug!(organization = organization.id(), "saved organization in memory");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCertificateRepository {
    certificates: Mutex<BTreeMap<String, Certificate>>,
}

impl MemoryCertificateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CertificateRepository for MemoryCertificateRepository {
    fn find_all_by_organization(&self, organization: &str) -> Result<Vec<Certificate>> {
        let map = lock(&self.certificates, "certificate")?;
        Ok(map
            .values()
            .filter(|cert| cert.organization_id() == organization)
            .cloned()
            .collect())
    }

    fn find_all_by_organization_and_signed_by(
        &self,
        organization: &str,
        signed_by: &[SerialNumber],
    ) -> Result<Vec<Certificate>> {
        let map = lock(&self.certificates, "certificate")?;
        Ok(map
            .values()
            .filter(|cert| cert.organization_id() == organization && cert.parents() == signed_by)
            .cloned()
            .collect())
    }

    fn find_by_organization_and_serial_numbers(
        &self,
        organization: &str,
        chain: &[SerialNumber],
    ) -> Result<Certificate> {
        validate_organization_id(organization)?;
        let map = lock(&self.certificates, "certificate")?;
        map.get(&locator(organization, chain))
            .cloned()
            .ok_or_else(|| Error::CertificateNotFound {
                organization: organization.to_string(),
                serial: serial_path(chain),
            })
    }

    fn save(&self, certificate: &Certificate) -> Result<()> {
        validate_organization_id(certificate.organization_id())?;
        let id = locator(certificate.organization_id(), &certificate.chain());
        let mut map = lock(&self.certificates, "certificate")?;
        map.insert(id.clone(), certificate.clone());
        tracing::debug!(locator = %id, "saved certificate in memory");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPrivateKeyRepository {
    keys: Mutex<BTreeMap<String, PrivateKey>>,
}

impl MemoryPrivateKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrivateKeyRepository for MemoryPrivateKeyRepository {
    fn find_by_organization_and_serial_numbers(
        &self,
        organization: &str,
        chain: &[SerialNumber],
    ) -> Result<PrivateKey> {
        validate_organization_id(organization)?;
        let map = lock(&self.keys, "private key")?;
        map.get(&locator(organization, chain))
            .cloned()
            .ok_or_else(|| Error::PrivateKeyNotFound {
                organization: organization.to_string(),
                serial: serial_path(chain),
            })
    }

    fn save(&self, key: &PrivateKey) -> Result<()> {
        if key.chain().is_empty() {
            return Err(Error::MustBeDefined {
                field: "certificateChain",
            });
        }
        validate_organization_id(key.organization_id())?;
        let id = locator(key.organization_id(), key.chain());
        let mut map = lock(&self.keys, "private key")?;
        map.insert(id.clone(), key.clone());
        tracing::debug!(locator = %id, "saved private key in memory");
        Ok(())
    }
}
