// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::serial::{serial_path, SerialNumber};
use crate::x509::{self, CertificateInfo, ExtendedKeyUsage, CERTIFICATE_TAG};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Role of a certificate in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateType {
    Root,
    Intermediate,
    Server,
    Client,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Root => "root",
            CertificateType::Intermediate => "intermediate",
            CertificateType::Server => "server",
            CertificateType::Client => "client",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "root" => Ok(CertificateType::Root),
            "intermediate" => Ok(CertificateType::Intermediate),
            "server" => Ok(CertificateType::Server),
            "client" => Ok(CertificateType::Client),
            _ => Err(Error::Validation {
                field: "certificateType",
                value: s.to_string(),
                reason: "expected root, intermediate, server or client".into(),
            }),
        }
    }
}

/// A signed certificate addressed by organization and ancestor chain.
///
/// `parents` runs root-first and excludes the certificate's own serial
/// number, so a root has no parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    organization_id: String,
    parents: Vec<SerialNumber>,
    der: Vec<u8>,
    info: CertificateInfo,
}

impl Certificate {
    pub fn new(
        organization_id: impl Into<String>,
        parents: Vec<SerialNumber>,
        der: Vec<u8>,
        info: CertificateInfo,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            parents,
            der,
            info,
        }
    }

    pub fn from_der(
        organization_id: impl Into<String>,
        parents: Vec<SerialNumber>,
        der: Vec<u8>,
    ) -> Result<Self> {
        let info = x509::parse_cert_der(&der)?;
        Ok(Self::new(organization_id, parents, der, info))
    }

    pub fn from_pem(
        organization_id: impl Into<String>,
        parents: Vec<SerialNumber>,
        text: &str,
    ) -> Result<Self> {
        let (der, info) = x509::parse_cert_pem(text)?;
        Ok(Self::new(organization_id, parents, der, info))
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn parents(&self) -> &[SerialNumber] {
        &self.parents
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.info.serial_number
    }

    /// Full path from the root to this certificate.
    pub fn chain(&self) -> Vec<SerialNumber> {
        let mut chain = self.parents.clone();
        chain.push(self.info.serial_number.clone());
        chain
    }

    /// Serial number of the issuing certificate; a root names itself.
    pub fn signed_by(&self) -> &SerialNumber {
        self.parents.last().unwrap_or(&self.info.serial_number)
    }

    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        ::pem::encode(&::pem::Pem::new(CERTIFICATE_TAG, self.der.clone()))
    }

    pub fn common_name(&self) -> Option<&str> {
        self.info.common_name.as_deref()
    }

    pub fn organization_name(&self) -> Option<&str> {
        self.info.organization_names.first().map(String::as_str)
    }

    pub fn dns_names(&self) -> &[String] {
        &self.info.dns_names
    }

    pub fn subject(&self) -> &str {
        &self.info.subject
    }

    pub fn issuer(&self) -> &str {
        &self.info.issuer
    }

    pub fn not_after(&self) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.info.not_after_timestamp)
            .map_err(|e| Error::CertParse(format!("invalid notAfter: {}", e)))
    }

    pub fn is_ca(&self) -> bool {
        self.info.is_ca
    }

    /// Equal key identifiers when both are present, otherwise equal
    /// issuer and subject names.
    pub fn is_self_signed(&self) -> bool {
        match (&self.info.subject_key_id, &self.info.authority_key_id) {
            (Some(ski), Some(aki)) => ski == aki,
            _ => self.info.issuer == self.info.subject,
        }
    }

    pub fn is_root_certificate(&self) -> bool {
        self.info.basic_constraints_valid && self.is_ca() && self.is_self_signed()
    }

    pub fn is_intermediate_certificate(&self) -> bool {
        self.info.basic_constraints_valid && self.is_ca() && !self.is_self_signed()
    }

    pub fn is_server_certificate(&self) -> bool {
        self.info
            .has_extended_key_usage(ExtendedKeyUsage::ServerAuth)
    }

    pub fn is_client_certificate(&self) -> bool {
        self.info
            .has_extended_key_usage(ExtendedKeyUsage::ClientAuth)
    }

    /// First matching role, checked root, intermediate, server, client.
    pub fn certificate_type(&self) -> Option<CertificateType> {
        if self.is_root_certificate() {
            Some(CertificateType::Root)
        } else if self.is_intermediate_certificate() {
            Some(CertificateType::Intermediate)
        } else if self.is_server_certificate() {
            Some(CertificateType::Server)
        } else if self.is_client_certificate() {
            Some(CertificateType::Client)
        } else {
            None
        }
    }

    pub fn is_type(&self, certificate_type: CertificateType) -> bool {
        self.certificate_type() == Some(certificate_type)
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.organization_id,
            serial_path(&self.chain())
        )
    }
}

/// Revocation record for a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedCertificate {
    pub serial_number: SerialNumber,
    pub revocation_time: OffsetDateTime,
    /// The certificate's original notAfter.
    pub expiration_time: OffsetDateTime,
}

impl RevokedCertificate {
    pub fn new(
        serial_number: SerialNumber,
        revocation_time: OffsetDateTime,
        expiration_time: OffsetDateTime,
    ) -> Self {
        Self {
            serial_number,
            revocation_time,
            expiration_time,
        }
    }
}
