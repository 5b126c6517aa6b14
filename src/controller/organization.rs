// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use super::{ApplicationController, CertificateController};
use crate::certificate::{Certificate, RevokedCertificate};
use crate::error::{Error, Result, ResultExt};
use crate::factory;
use crate::key::{generate_private_key, KeyType};
use crate::organization::Organization;
use crate::serial::SerialNumber;
use time::{Duration, OffsetDateTime};

/// One organization and its root certificates.
pub struct OrganizationController<'a> {
    app: &'a ApplicationController,
    organization: Organization,
    expiration: Duration,
    key_type: KeyType,
}

impl<'a> OrganizationController<'a> {
    pub(crate) fn new(app: &'a ApplicationController, organization: Organization) -> Self {
        let defaults = app.defaults();
        Self {
            app,
            organization,
            expiration: defaults.root_expiration,
            key_type: defaults.root_key_type,
        }
    }

    pub fn organization_id(&self) -> &str {
        self.organization.id()
    }

    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    pub fn application_controller(&self) -> &'a ApplicationController {
        self.app
    }

    /// Validity of roots issued from here on.
    pub fn set_expiration_duration(&mut self, expiration: Duration) {
        self.expiration = expiration;
    }

    /// Key type of roots issued from here on.
    pub fn set_key_type(&mut self, key_type: KeyType) -> Result<()> {
        key_type
            .check_certificate_support()
            .with_context(|| format!("OrganizationController('{}').SetKeyType", self.organization_id()))?;
        self.key_type = key_type;
        Ok(())
    }

    /// Root certificates of this organization.
    pub fn certificate_collection(&self) -> Result<Vec<Certificate>> {
        self.app
            .certificates()
            .find_all_by_organization_and_signed_by(self.organization_id(), &[])
            .with_context(|| format!("OrganizationController('{}').CertificateCollection", self.organization_id()))
    }

    pub fn certificate(&self, serial_number: &SerialNumber) -> Result<Certificate> {
        self.app
            .certificates()
            .find_by_organization_and_serial_numbers(
                self.organization_id(),
                std::slice::from_ref(serial_number),
            )
            .with_context(|| {
                format!(
                    "OrganizationController('{}').Certificate('{}')",
                    self.organization_id(),
                    serial_number
                )
            })
    }

    pub fn certificate_controller(
        &self,
        serial_number: &SerialNumber,
    ) -> Result<CertificateController<'_>> {
        let certificate = self.certificate(serial_number)?;
        Ok(CertificateController::new(self, None, certificate))
    }

    /// Issue and store a new self-signed root.
    ///
    /// The key is stored before the certificate so a stored certificate
    /// always has a retrievable key.
    pub fn new_root_certificate(&self, common_name: &str) -> Result<Certificate> {
        let organization = self.organization_id();
        let context = || format!("OrganizationController('{}').NewRootCertificate", organization);

        self.key_type
            .check_certificate_support()
            .with_context(context)?;
        let serial_number = SerialNumber::generate(self.app.random()).with_context(context)?;

        match self.certificate(&serial_number) {
            Ok(_) => {
                return Err(Error::SerialNumberExists {
                    organization: organization.to_string(),
                    serial: serial_number.to_string(),
                }
                .context(context()))
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.context(context())),
        }

        let private_key =
            generate_private_key(organization, vec![serial_number.clone()], self.key_type)
                .with_context(context)?;

        let certificate = factory::new_root_certificate(
            self.app.signer(),
            &serial_number,
            &self.organization,
            self.expiration,
            &private_key,
            common_name,
        )
        .with_context(context)?;

        self.app
            .private_keys()
            .save(&private_key)
            .with_context(context)?;
        self.app
            .certificates()
            .save(&certificate)
            .with_context(context)?;

        tracing::info!(
            organization,
            serial = %serial_number,
            key_type = %self.key_type,
            common_name,
            "issued root certificate"
        );
        Ok(certificate)
    }

    /// Revocation record for one of this organization's certificates.
    pub fn revoke_certificate(&self, certificate: &Certificate) -> Result<RevokedCertificate> {
        if certificate.organization_id() != self.organization_id() {
            return Err(Error::Validation {
                field: "organization",
                value: certificate.organization_id().to_string(),
                reason: format!("certificate does not belong to '{}'", self.organization_id()),
            });
        }
        let revoked = RevokedCertificate::new(
            certificate.serial_number().clone(),
            OffsetDateTime::now_utc(),
            certificate.not_after()?,
        );
        tracing::info!(
            organization = self.organization_id(),
            certificate = %certificate,
            "revoked certificate"
        );
        Ok(revoked)
    }
}
