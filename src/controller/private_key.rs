// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use super::{ApplicationController, CertificateController, OrganizationController};
use crate::certificate::Certificate;
use crate::error::{Result, ResultExt};
use crate::key::PrivateKey;
use crate::organization::Organization;
use crate::serial::serial_path;

/// The private key of one certificate. Read-only apart from [`save`](Self::save).
pub struct PrivateKeyController<'a> {
    certificate: &'a CertificateController<'a>,
    key: PrivateKey,
}

impl<'a> PrivateKeyController<'a> {
    pub(crate) fn new(certificate: &'a CertificateController<'a>, key: PrivateKey) -> Self {
        Self { certificate, key }
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn certificate_controller(&self) -> &'a CertificateController<'a> {
        self.certificate
    }

    pub fn certificate(&self) -> &Certificate {
        self.certificate.certificate()
    }

    pub fn organization_controller(&self) -> &'a OrganizationController<'a> {
        self.certificate.organization_controller()
    }

    pub fn application_controller(&self) -> &'a ApplicationController {
        self.certificate.application_controller()
    }

    pub fn organization_id(&self) -> &str {
        self.certificate.organization_id()
    }

    pub fn organization(&self) -> &Organization {
        self.certificate.organization()
    }

    /// Store the key again, replacing what the repository holds.
    pub fn save(&self) -> Result<()> {
        self.application_controller()
            .private_keys()
            .save(&self.key)
            .with_context(|| format!("PrivateKeyController('{}').Save", serial_path(self.key.chain())))
    }
}
