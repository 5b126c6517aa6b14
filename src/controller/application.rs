// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use super::{IssuanceDefaults, OrganizationController};
use crate::error::{Error, Result, ResultExt};
use crate::organization::Organization;
use crate::repository::{CertificateRepository, OrganizationRepository, PrivateKeyRepository};
use crate::serial::RandomSource;
use crate::signer::CertificateSigner;
use crate::validation::validate_organization;
use std::sync::Arc;

/// Entry point to the hierarchy. Owns the shared repositories, the signer
/// and the random source.
pub struct ApplicationController {
    organizations: Arc<dyn OrganizationRepository>,
    certificates: Arc<dyn CertificateRepository>,
    private_keys: Arc<dyn PrivateKeyRepository>,
    signer: Arc<dyn CertificateSigner>,
    random: Arc<dyn RandomSource>,
    defaults: IssuanceDefaults,
}

impl ApplicationController {
    pub fn new(
        organizations: Arc<dyn OrganizationRepository>,
        certificates: Arc<dyn CertificateRepository>,
        private_keys: Arc<dyn PrivateKeyRepository>,
        signer: Arc<dyn CertificateSigner>,
        random: Arc<dyn RandomSource>,
        defaults: IssuanceDefaults,
    ) -> Self {
        Self {
            organizations,
            certificates,
            private_keys,
            signer,
            random,
            defaults,
        }
    }

    pub fn defaults(&self) -> &IssuanceDefaults {
        &self.defaults
    }

    pub fn organization_collection(&self) -> Result<Vec<Organization>> {
        self.organizations
            .find_all()
            .context("OrganizationCollection")
    }

    pub fn organization(&self, id: &str) -> Result<Organization> {
        self.organizations
            .find_by_id(id)
            .with_context(|| format!("Organization('{}')", id))
    }

    pub fn organization_controller(&self, id: &str) -> Result<OrganizationController<'_>> {
        let organization = self.organization(id)?;
        Ok(OrganizationController::new(self, organization))
    }

    /// Validate and store a new organization. An existing id is a conflict.
    pub fn new_organization(&self, organization: Organization) -> Result<Organization> {
        let context = || format!("NewOrganization('{}')", organization.id());
        validate_organization(&organization).with_context(context)?;

        match self.organizations.find_by_id(organization.id()) {
            Ok(_) => {
                return Err(Error::OrganizationExists {
                    id: organization.id().to_string(),
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.context(context())),
        }

        self.organizations
            .save(&organization)
            .with_context(context)?;
        tracing::info!(
            organization = organization.id(),
            name = organization.name(),
            "created organization"
        );
        Ok(organization)
    }

    pub(crate) fn certificates(&self) -> &dyn CertificateRepository {
        self.certificates.as_ref()
    }

    pub(crate) fn private_keys(&self) -> &dyn PrivateKeyRepository {
        self.private_keys.as_ref()
    }

    pub(crate) fn signer(&self) -> &dyn CertificateSigner {
        self.signer.as_ref()
    }

    pub(crate) fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }
}
