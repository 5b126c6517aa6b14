// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Parse X.509 certificates into an owned summary.

use crate::error::{Error, Result};
use crate::serial::SerialNumber;
use x509_parser::prelude::*;

pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Key usage bits the issuance templates set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
    CertSign,
}

/// Extended key usages the issuance templates set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedKeyUsage {
    /// TLS server authentication (OID 1.3.6.1.5.5.7.3.1)
    ServerAuth,
    /// TLS client authentication (OID 1.3.6.1.5.5.7.3.2)
    ClientAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub serial_number: SerialNumber,
    pub subject: String,
    pub issuer: String,
    pub common_name: Option<String>,
    pub organization_names: Vec<String>,
    pub not_before_timestamp: i64,
    pub not_after_timestamp: i64,
    /// Whether a basic constraints extension is present.
    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    pub max_path_len: Option<u32>,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    pub key_usage: Vec<KeyUsage>,
    pub extended_key_usage: Vec<ExtendedKeyUsage>,
    pub dns_names: Vec<String>,
    /// DER-encoded SubjectPublicKeyInfo.
    pub public_key_der: Vec<u8>,
}

impl CertificateInfo {
    pub fn expiry_string(&self) -> String {
        match ::time::OffsetDateTime::from_unix_timestamp(self.not_after_timestamp) {
            Ok(dt) => format!("{}-{:02}-{:02}", dt.year(), dt.month() as u8, dt.day()),
            Err(_) => "Invalid date".to_string(),
        }
    }

    pub fn days_remaining(&self) -> i64 {
        let now = ::time::OffsetDateTime::now_utc();
        match ::time::OffsetDateTime::from_unix_timestamp(self.not_after_timestamp) {
            Ok(expiry) => (expiry - now).whole_days(),
            Err(_) => -1,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.days_remaining() < 0
    }

    pub fn max_path_len_zero(&self) -> bool {
        self.max_path_len == Some(0)
    }

    pub fn has_key_usage(&self, usage: KeyUsage) -> bool {
        self.key_usage.contains(&usage)
    }

    pub fn has_extended_key_usage(&self, usage: ExtendedKeyUsage) -> bool {
        self.extended_key_usage.contains(&usage)
    }
}

pub fn parse_cert_pem(pem_str: &str) -> Result<(Vec<u8>, CertificateInfo)> {
    let pem = ::pem::parse(pem_str)
        .map_err(|e| Error::CertParse(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != CERTIFICATE_TAG {
        return Err(Error::CertParse(format!(
            "Expected CERTIFICATE, got {}",
            pem.tag()
        )));
    }

    let der = pem.into_contents();
    let info = parse_cert_der(&der)?;
    Ok((der, info))
}

pub fn parse_cert_der(der: &[u8]) -> Result<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::CertParse(format!("Invalid X.509: {}", e)))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let organization_names = cert
        .subject()
        .iter_organization()
        .filter_map(|o| o.as_str().ok())
        .map(String::from)
        .collect();

    let mut info = CertificateInfo {
        serial_number: SerialNumber::from_bytes_be(cert.raw_serial()),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        common_name,
        organization_names,
        not_before_timestamp: cert.validity().not_before.timestamp(),
        not_after_timestamp: cert.validity().not_after.timestamp(),
        basic_constraints_valid: false,
        is_ca: false,
        max_path_len: None,
        subject_key_id: None,
        authority_key_id: None,
        key_usage: Vec::new(),
        extended_key_usage: Vec::new(),
        dns_names: Vec::new(),
        public_key_der: cert.public_key().raw.to_vec(),
    };

    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                for name in &san.general_names {
                    if let GeneralName::DNSName(dns) = name {
                        info.dns_names.push(dns.to_string());
                    }
                }
            }
            ParsedExtension::BasicConstraints(bc) => {
                info.basic_constraints_valid = true;
                info.is_ca = bc.ca;
                info.max_path_len = bc.path_len_constraint;
            }
            ParsedExtension::SubjectKeyIdentifier(id) => {
                info.subject_key_id = Some(id.0.to_vec());
            }
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                info.authority_key_id = aki.key_identifier.as_ref().map(|id| id.0.to_vec());
            }
            ParsedExtension::KeyUsage(ku) => {
                if ku.digital_signature() {
                    info.key_usage.push(KeyUsage::DigitalSignature);
                }
                if ku.key_encipherment() {
                    info.key_usage.push(KeyUsage::KeyEncipherment);
                }
                if ku.key_cert_sign() {
                    info.key_usage.push(KeyUsage::CertSign);
                }
            }
            ParsedExtension::ExtendedKeyUsage(eku) => {
                if eku.server_auth {
                    info.extended_key_usage.push(ExtendedKeyUsage::ServerAuth);
                }
                if eku.client_auth {
                    info.extended_key_usage.push(ExtendedKeyUsage::ClientAuth);
                }
            }
            _ => {}
        }
    }

    Ok(info)
}

/// Check the signature of `der` against `issuer_public_key_der`, a DER
/// SubjectPublicKeyInfo. `None` checks a self-signed certificate against
/// its own key.
pub fn verify_cert_signature(der: &[u8], issuer_public_key_der: Option<&[u8]>) -> Result<()> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::CertParse(format!("Invalid X.509: {}", e)))?;

    let issuer_key = match issuer_public_key_der {
        Some(spki) => Some(
            SubjectPublicKeyInfo::from_der(spki)
                .map_err(|e| Error::CertParse(format!("Invalid issuer public key: {}", e)))?
                .1,
        ),
        None => None,
    };

    cert.verify_signature(issuer_key.as_ref())
        .map_err(|e| Error::SignatureMismatch(format!("signature does not verify: {}", e)))
}
