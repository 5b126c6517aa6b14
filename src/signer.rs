// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! The signing primitive behind certificate issuance.
//!
//! [`CertificateSigner`] turns a [`CertificateTemplate`] into DER bytes and
//! parses DER back. [`RcgenSigner`] is the default implementation; tests
//! substitute their own.

use crate::certificate::Certificate;
use crate::error::{Error, Result, ResultExt};
use crate::key::PrivateKey;
use crate::serial::SerialNumber;
use crate::x509::{self, CertificateInfo, ExtendedKeyUsage, KeyUsage};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use time::OffsetDateTime;

/// Everything a signer needs to produce one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub serial_number: SerialNumber,
    pub common_name: String,
    pub organization_name: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub is_ca: bool,
    /// Forbid the certificate from issuing further CA certificates.
    pub max_path_len_zero: bool,
    pub key_usage: Vec<KeyUsage>,
    pub extended_key_usage: Vec<ExtendedKeyUsage>,
    pub dns_names: Vec<String>,
}

/// Who signs a template.
#[derive(Debug, Clone, Copy)]
pub enum SigningAuthority<'a> {
    /// The subject key signs its own certificate.
    SelfSigned,
    /// An existing CA certificate and its key sign the template.
    Certificate {
        certificate: &'a Certificate,
        private_key: &'a PrivateKey,
    },
}

pub trait CertificateSigner: Send + Sync {
    /// Sign `template` for `subject_key` and return the DER certificate.
    fn create_certificate(
        &self,
        template: &CertificateTemplate,
        subject_key: &PrivateKey,
        authority: SigningAuthority<'_>,
    ) -> Result<Vec<u8>>;

    fn parse_certificate(&self, der: &[u8]) -> Result<CertificateInfo>;
}

/// Signs with rcgen on the ring provider.
///
/// ring loads RSA keys of 2048 bits and up, ECDSA P-256 and P-384 and
/// Ed25519; see [`KeyType::supports_certificates`](crate::key::KeyType::supports_certificates).
/// Other key types fail with a certificate generation error.
#[derive(Debug, Default, Clone, Copy)]
pub struct RcgenSigner;

impl RcgenSigner {
    fn params(template: &CertificateTemplate) -> Result<CertificateParams> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        if !template.organization_name.is_empty() {
            dn.push(DnType::OrganizationName, template.organization_name.as_str());
        }
        dn.push(DnType::CommonName, template.common_name.as_str());
        params.distinguished_name = dn;

        params.serial_number = Some(rcgen::SerialNumber::from_slice(
            &template.serial_number.to_bytes_be(),
        ));
        params.not_before = template.not_before;
        params.not_after = template.not_after;

        params.is_ca = if !template.is_ca {
            IsCa::ExplicitNoCa
        } else if template.max_path_len_zero {
            IsCa::Ca(BasicConstraints::Constrained(0))
        } else {
            IsCa::Ca(BasicConstraints::Unconstrained)
        };

        params.key_usages = template
            .key_usage
            .iter()
            .map(|usage| match usage {
                KeyUsage::DigitalSignature => KeyUsagePurpose::DigitalSignature,
                KeyUsage::KeyEncipherment => KeyUsagePurpose::KeyEncipherment,
                KeyUsage::CertSign => KeyUsagePurpose::KeyCertSign,
            })
            .collect();

        params.extended_key_usages = template
            .extended_key_usage
            .iter()
            .map(|usage| match usage {
                ExtendedKeyUsage::ServerAuth => ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsage::ClientAuth => ExtendedKeyUsagePurpose::ClientAuth,
            })
            .collect();

        for name in &template.dns_names {
            params
                .subject_alt_names
                .push(SanType::DnsName(name.clone().try_into()?));
        }

        params.use_authority_key_identifier_extension = true;
        Ok(params)
    }

    fn key_pair(key: &PrivateKey) -> Result<KeyPair> {
        let pem = key.to_pkcs8_pem()?;
        KeyPair::from_pem(&pem)
            .map_err(Error::from)
            .with_context(|| format!("loading {} key", key.key_type()))
    }
}

impl CertificateSigner for RcgenSigner {
    fn create_certificate(
        &self,
        template: &CertificateTemplate,
        subject_key: &PrivateKey,
        authority: SigningAuthority<'_>,
    ) -> Result<Vec<u8>> {
        let params = Self::params(template)?;
        let subject = Self::key_pair(subject_key)?;

        let cert = match authority {
            SigningAuthority::SelfSigned => params.self_signed(&subject)?,
            SigningAuthority::Certificate {
                certificate,
                private_key,
            } => {
                let issuer = Issuer::from_ca_cert_pem(
                    &certificate.to_pem(),
                    Self::key_pair(private_key)?,
                )?;
                params.signed_by(&subject, &issuer)?
            }
        };

        Ok(cert.der().to_vec())
    }

    fn parse_certificate(&self, der: &[u8]) -> Result<CertificateInfo> {
        x509::parse_cert_der(der)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::key::{generate_private_key, KeyType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts signing calls and can be told to fail them.
    #[derive(Default)]
    pub(crate) struct CountingSigner {
        pub(crate) calls: AtomicUsize,
        pub(crate) fail: bool,
    }

    impl CountingSigner {
        pub(crate) fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CertificateSigner for CountingSigner {
        fn create_certificate(
            &self,
            template: &CertificateTemplate,
            subject_key: &PrivateKey,
            authority: SigningAuthority<'_>,
        ) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Signature("signer disabled".into()));
            }
            RcgenSigner.create_certificate(template, subject_key, authority)
        }

        fn parse_certificate(&self, der: &[u8]) -> Result<CertificateInfo> {
            RcgenSigner.parse_certificate(der)
        }
    }

    pub(crate) fn template(serial: u128, is_ca: bool) -> CertificateTemplate {
        let now = OffsetDateTime::now_utc();
        CertificateTemplate {
            serial_number: SerialNumber::from(serial),
            common_name: "Test".into(),
            organization_name: "Test Org".into(),
            not_before: now,
            not_after: now + time::Duration::days(1),
            is_ca,
            max_path_len_zero: false,
            key_usage: vec![KeyUsage::DigitalSignature, KeyUsage::CertSign],
            extended_key_usage: vec![ExtendedKeyUsage::ServerAuth],
            dns_names: Vec::new(),
        }
    }

    #[test]
    fn test_self_signed_template() {
        let key = generate_private_key("acme", vec![SerialNumber::from(5u128)], KeyType::EcdsaP256)
            .unwrap();
        let der = RcgenSigner
            .create_certificate(&template(5, true), &key, SigningAuthority::SelfSigned)
            .unwrap();

        let info = RcgenSigner.parse_certificate(&der).unwrap();
        assert_eq!(info.serial_number, SerialNumber::from(5u128));
        assert_eq!(info.common_name.as_deref(), Some("Test"));
        assert_eq!(info.organization_names, vec!["Test Org".to_string()]);
        assert!(info.is_ca);
        assert_eq!(info.max_path_len, None);
        assert_eq!(info.public_key_der, key.public_key().to_public_key_der().unwrap());
    }

    #[test]
    fn test_signed_by_authority() {
        let ca_key =
            generate_private_key("acme", vec![SerialNumber::from(1u128)], KeyType::EcdsaP384)
                .unwrap();
        let ca_der = RcgenSigner
            .create_certificate(&template(1, true), &ca_key, SigningAuthority::SelfSigned)
            .unwrap();
        let ca = Certificate::from_der("acme", Vec::new(), ca_der).unwrap();

        let chain = vec![SerialNumber::from(1u128), SerialNumber::from(2u128)];
        let leaf_key = generate_private_key("acme", chain, KeyType::Ed25519).unwrap();
        let mut leaf_template = template(2, false);
        leaf_template.dns_names = vec!["www.acme.com".into()];
        let der = RcgenSigner
            .create_certificate(
                &leaf_template,
                &leaf_key,
                SigningAuthority::Certificate {
                    certificate: &ca,
                    private_key: &ca_key,
                },
            )
            .unwrap();

        let info = RcgenSigner.parse_certificate(&der).unwrap();
        assert!(!info.is_ca);
        assert!(info.basic_constraints_valid);
        assert_eq!(info.dns_names, vec!["www.acme.com".to_string()]);
        assert_eq!(info.issuer, ca.subject());
        assert_eq!(info.authority_key_id, ca.info().subject_key_id);
        x509::verify_cert_signature(&der, Some(&ca.info().public_key_der)).unwrap();
    }

    #[test]
    fn test_unsupported_signing_key() {
        let key = generate_private_key("acme", vec![SerialNumber::from(3u128)], KeyType::EcdsaP224)
            .unwrap();
        let err = RcgenSigner
            .create_certificate(&template(3, true), &key, SigningAuthority::SelfSigned)
            .unwrap_err();
        assert!(err.to_string().contains("loading ECDSA_P224 key"));
    }
}
