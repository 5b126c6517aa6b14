// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Builds and signs each class of certificate.
//!
//! Every function checks its arguments before the signer is called, so a
//! failure names the offending field. A freshly signed certificate is
//! parsed back and its signature verified against the issuing key before
//! it is returned.

use crate::certificate::Certificate;
use crate::error::{Error, Result, ResultExt};
use crate::key::PrivateKey;
use crate::organization::Organization;
use crate::serial::{serial_path, SerialNumber};
use crate::signer::{CertificateSigner, CertificateTemplate, SigningAuthority};
use crate::validation;
use crate::x509::{self, ExtendedKeyUsage, KeyUsage};
use time::{Duration, OffsetDateTime};

/// Where a new certificate sits and what signs it.
#[derive(Debug, Clone, Copy)]
pub struct Issuer<'a> {
    pub certificate: &'a Certificate,
    pub private_key: &'a PrivateKey,
}

pub fn new_root_certificate(
    signer: &dyn CertificateSigner,
    serial_number: &SerialNumber,
    organization: &Organization,
    expiration: Duration,
    private_key: &PrivateKey,
    common_name: &str,
) -> Result<Certificate> {
    check_common(organization, common_name, expiration)?;
    validation::validate_root_common_name(common_name).context("NewRootCertificate")?;
    check_subject_key(private_key, organization, &[], serial_number)?;

    let template = template(
        serial_number,
        organization,
        expiration,
        common_name,
        Class::Root,
        Vec::new(),
    );
    sign(
        signer,
        &template,
        organization,
        Vec::new(),
        private_key,
        SigningAuthority::SelfSigned,
    )
    .context("NewRootCertificate")
}

/// The new intermediate may sign leaves but no further CAs.
pub fn new_intermediate_certificate(
    signer: &dyn CertificateSigner,
    serial_number: &SerialNumber,
    organization: &Organization,
    expiration: Duration,
    private_key: &PrivateKey,
    issuer: Issuer<'_>,
    common_name: &str,
) -> Result<Certificate> {
    check_common(organization, common_name, expiration)?;
    validation::validate_intermediate_common_name(common_name)
        .context("NewIntermediateCertificate")?;
    let parents = check_issuer(issuer, organization)?;
    if issuer.certificate.info().max_path_len_zero() {
        return Err(Error::Validation {
            field: "parentCertificate",
            value: serial_path(&parents),
            reason: "path length constraint forbids issuing CA certificates".into(),
        }
        .context("NewIntermediateCertificate"));
    }
    check_subject_key(private_key, organization, &parents, serial_number)?;

    let template = template(
        serial_number,
        organization,
        expiration,
        common_name,
        Class::Intermediate,
        Vec::new(),
    );
    sign(
        signer,
        &template,
        organization,
        parents,
        private_key,
        issuer.authority(),
    )
    .context("NewIntermediateCertificate")
}

#[allow(clippy::too_many_arguments)]
pub fn new_server_certificate(
    signer: &dyn CertificateSigner,
    serial_number: &SerialNumber,
    organization: &Organization,
    expiration: Duration,
    private_key: &PrivateKey,
    issuer: Issuer<'_>,
    common_name: &str,
    dns_names: &[String],
) -> Result<Certificate> {
    check_common(organization, common_name, expiration)?;
    validation::validate_server_common_name(common_name).context("NewServerCertificate")?;
    if dns_names.is_empty() {
        return Err(Error::NoDnsNames.context("NewServerCertificate"));
    }
    validation::validate_dns_names(dns_names).context("NewServerCertificate")?;
    let parents = check_issuer(issuer, organization)?;
    check_subject_key(private_key, organization, &parents, serial_number)?;

    let template = template(
        serial_number,
        organization,
        expiration,
        common_name,
        Class::Server,
        dns_names.to_vec(),
    );
    sign(
        signer,
        &template,
        organization,
        parents,
        private_key,
        issuer.authority(),
    )
    .context("NewServerCertificate")
}

pub fn new_client_certificate(
    signer: &dyn CertificateSigner,
    serial_number: &SerialNumber,
    organization: &Organization,
    expiration: Duration,
    private_key: &PrivateKey,
    issuer: Issuer<'_>,
    common_name: &str,
) -> Result<Certificate> {
    check_common(organization, common_name, expiration)?;
    validation::validate_client_common_name(common_name).context("NewClientCertificate")?;
    let parents = check_issuer(issuer, organization)?;
    check_subject_key(private_key, organization, &parents, serial_number)?;

    let template = template(
        serial_number,
        organization,
        expiration,
        common_name,
        Class::Client,
        Vec::new(),
    );
    sign(
        signer,
        &template,
        organization,
        parents,
        private_key,
        issuer.authority(),
    )
    .context("NewClientCertificate")
}

impl<'a> Issuer<'a> {
    pub fn new(certificate: &'a Certificate, private_key: &'a PrivateKey) -> Self {
        Self {
            certificate,
            private_key,
        }
    }

    fn authority(self) -> SigningAuthority<'a> {
        SigningAuthority::Certificate {
            certificate: self.certificate,
            private_key: self.private_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Root,
    Intermediate,
    Server,
    Client,
}

fn template(
    serial_number: &SerialNumber,
    organization: &Organization,
    expiration: Duration,
    common_name: &str,
    class: Class,
    dns_names: Vec<String>,
) -> CertificateTemplate {
    let not_before = OffsetDateTime::now_utc();
    let is_ca = matches!(class, Class::Root | Class::Intermediate);

    let key_usage = if is_ca {
        vec![KeyUsage::DigitalSignature, KeyUsage::CertSign]
    } else {
        vec![KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment]
    };
    let extended_key_usage = match class {
        Class::Root | Class::Intermediate => {
            vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth]
        }
        Class::Server => vec![ExtendedKeyUsage::ServerAuth],
        Class::Client => vec![ExtendedKeyUsage::ClientAuth],
    };

    CertificateTemplate {
        serial_number: serial_number.clone(),
        common_name: common_name.to_string(),
        organization_name: organization.name().to_string(),
        not_before,
        not_after: not_before + expiration,
        is_ca,
        max_path_len_zero: class == Class::Intermediate,
        key_usage,
        extended_key_usage,
        dns_names,
    }
}

fn check_common(organization: &Organization, common_name: &str, expiration: Duration) -> Result<()> {
    if organization.id().is_empty() {
        return Err(Error::MustBeDefined {
            field: "organization",
        });
    }
    if common_name.is_empty() {
        return Err(Error::MustBeDefined {
            field: "commonName",
        });
    }
    if !expiration.is_positive() {
        return Err(Error::MustBeDefined {
            field: "expiration",
        });
    }
    Ok(())
}

/// Returns the parents of the certificate the issuer will sign.
fn check_issuer(issuer: Issuer<'_>, organization: &Organization) -> Result<Vec<SerialNumber>> {
    let certificate = issuer.certificate;
    if certificate.organization_id() != organization.id() || !certificate.is_ca() {
        return Err(Error::MustBeDefined {
            field: "parentCertificate",
        });
    }
    let chain = certificate.chain();
    if issuer.private_key.organization_id() != organization.id()
        || issuer.private_key.chain() != chain.as_slice()
    {
        return Err(Error::MustBeDefined {
            field: "parentPrivateKey",
        });
    }
    Ok(chain)
}

/// The subject key must sit at `parents` + `serial_number`.
fn check_subject_key(
    private_key: &PrivateKey,
    organization: &Organization,
    parents: &[SerialNumber],
    serial_number: &SerialNumber,
) -> Result<()> {
    if private_key.organization_id() != organization.id()
        || private_key.parents() != parents
        || private_key.serial_number() != Some(serial_number)
    {
        return Err(Error::MustBeDefined {
            field: "privateKey",
        });
    }
    Ok(())
}

fn sign(
    signer: &dyn CertificateSigner,
    template: &CertificateTemplate,
    organization: &Organization,
    parents: Vec<SerialNumber>,
    private_key: &PrivateKey,
    authority: SigningAuthority<'_>,
) -> Result<Certificate> {
    let der = signer.create_certificate(template, private_key, authority)?;
    let info = signer
        .parse_certificate(&der)
        .context("failed to parse certificate after creating it")?;

    if info.serial_number != template.serial_number {
        return Err(Error::SignatureMismatch(format!(
            "signed serial {} does not match requested {}",
            info.serial_number, template.serial_number
        )));
    }
    let issuer_spki = match authority {
        SigningAuthority::SelfSigned => None,
        SigningAuthority::Certificate { certificate, .. } => {
            Some(certificate.info().public_key_der.as_slice())
        }
    };
    x509::verify_cert_signature(&der, issuer_spki)?;

    let certificate = Certificate::new(organization.id(), parents, der, info);
    tracing::info!(
        organization = organization.id(),
        serial = %serial_path(&certificate.chain()),
        common_name = %template.common_name,
        is_ca = template.is_ca,
        "signed certificate"
    );
    Ok(certificate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{generate_private_key, KeyType};
    use crate::signer::tests::CountingSigner;
    use crate::signer::RcgenSigner;

    fn acme() -> Organization {
        Organization::new("acme", "acme", vec!["Acme Corp".into()])
    }

    fn key(chain: &[u128]) -> PrivateKey {
        let chain = chain.iter().map(|s| SerialNumber::from(*s)).collect();
        generate_private_key("acme", chain, KeyType::EcdsaP256).unwrap()
    }

    fn root(signer: &dyn CertificateSigner) -> (Certificate, PrivateKey) {
        let key = key(&[1]);
        let cert = new_root_certificate(
            signer,
            &SerialNumber::from(1u128),
            &acme(),
            Duration::days(30),
            &key,
            "Acme Root CA",
        )
        .unwrap();
        (cert, key)
    }

    #[test]
    fn test_root_certificate() {
        let (cert, _) = root(&RcgenSigner);
        assert!(cert.parents().is_empty());
        assert!(cert.is_root_certificate());
        assert!(cert.is_self_signed());
        assert!(!cert.is_intermediate_certificate());
        assert_eq!(cert.common_name(), Some("Acme Root CA"));
        assert_eq!(cert.organization_name(), Some("Acme Corp"));
        assert!(cert.info().has_key_usage(KeyUsage::CertSign));
        assert!(cert.is_server_certificate());
        assert!(cert.is_client_certificate());
        assert_eq!(cert.certificate_type(), Some(crate::CertificateType::Root));
    }

    #[test]
    fn test_intermediate_certificate() {
        let (root_cert, root_key) = root(&RcgenSigner);
        let sub_key = key(&[1, 2]);
        let cert = new_intermediate_certificate(
            &RcgenSigner,
            &SerialNumber::from(2u128),
            &acme(),
            Duration::days(30),
            &sub_key,
            Issuer::new(&root_cert, &root_key),
            "Acme Issuing CA",
        )
        .unwrap();

        assert_eq!(cert.parents(), &[SerialNumber::from(1u128)]);
        assert!(cert.is_ca());
        assert!(!cert.is_self_signed());
        assert!(cert.is_intermediate_certificate());
        assert!(cert.info().max_path_len_zero());
        assert_eq!(cert.issuer(), root_cert.subject());
    }

    #[test]
    fn test_server_and_client_certificates() {
        let (root_cert, root_key) = root(&RcgenSigner);
        let dns = vec!["www.acme.com".to_string(), "acme.com".to_string()];

        let server_key = key(&[1, 3]);
        let server = new_server_certificate(
            &RcgenSigner,
            &SerialNumber::from(3u128),
            &acme(),
            Duration::days(30),
            &server_key,
            Issuer::new(&root_cert, &root_key),
            "www.acme.com",
            &dns,
        )
        .unwrap();
        assert!(!server.is_ca());
        assert!(server.is_server_certificate());
        assert!(!server.is_client_certificate());
        assert_eq!(server.dns_names(), dns.as_slice());
        assert!(server.info().has_key_usage(KeyUsage::KeyEncipherment));

        let client_key = key(&[1, 4]);
        let client = new_client_certificate(
            &RcgenSigner,
            &SerialNumber::from(4u128),
            &acme(),
            Duration::days(30),
            &client_key,
            Issuer::new(&root_cert, &root_key),
            "alice@acme.com",
        )
        .unwrap();
        assert!(!client.is_ca());
        assert!(client.is_client_certificate());
        assert_eq!(client.parents(), &[SerialNumber::from(1u128)]);
    }

    #[test]
    fn test_server_without_dns_names_does_not_sign() {
        let (root_cert, root_key) = root(&RcgenSigner);
        let signer = CountingSigner::default();
        let err = new_server_certificate(
            &signer,
            &SerialNumber::from(3u128),
            &acme(),
            Duration::days(30),
            &key(&[1, 3]),
            Issuer::new(&root_cert, &root_key),
            "www.acme.com",
            &[],
        )
        .unwrap_err();

        assert!(matches!(err.root(), Error::NoDnsNames));
        assert!(err.is_precondition());
        assert_eq!(signer.calls(), 0);
    }

    #[test]
    fn test_preconditions_before_signing() {
        let signer = CountingSigner::default();
        let serial = SerialNumber::from(1u128);

        let err = new_root_certificate(
            &signer,
            &serial,
            &acme(),
            Duration::days(1),
            &key(&[1]),
            "",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "commonName: must be defined");

        let no_org = Organization::new("", "", vec![]);
        let err = new_root_certificate(
            &signer,
            &serial,
            &no_org,
            Duration::days(1),
            &key(&[1]),
            "Root",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "organization: must be defined");

        let err = new_root_certificate(
            &signer,
            &serial,
            &acme(),
            Duration::ZERO,
            &key(&[1]),
            "Root",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "expiration: must be defined");

        let err = new_root_certificate(
            &signer,
            &serial,
            &acme(),
            Duration::days(1),
            &key(&[9]),
            "Root",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "privateKey: must be defined");

        let err = new_root_certificate(
            &signer,
            &serial,
            &acme(),
            Duration::days(1),
            &key(&[1]),
            "12345",
        )
        .unwrap_err();
        assert!(err.is_precondition());

        assert_eq!(signer.calls(), 0);
    }

    #[test]
    fn test_mismatched_parent_key() {
        let (root_cert, _) = root(&RcgenSigner);
        let signer = CountingSigner::default();
        let wrong_key = key(&[5]);
        let err = new_client_certificate(
            &signer,
            &SerialNumber::from(4u128),
            &acme(),
            Duration::days(1),
            &key(&[1, 4]),
            Issuer::new(&root_cert, &wrong_key),
            "client",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "parentPrivateKey: must be defined");
        assert_eq!(signer.calls(), 0);
    }

    #[test]
    fn test_intermediate_cannot_sign_intermediate() {
        let (root_cert, root_key) = root(&RcgenSigner);
        let sub_key = key(&[1, 2]);
        let sub = new_intermediate_certificate(
            &RcgenSigner,
            &SerialNumber::from(2u128),
            &acme(),
            Duration::days(30),
            &sub_key,
            Issuer::new(&root_cert, &root_key),
            "Acme Issuing CA",
        )
        .unwrap();

        let signer = CountingSigner::default();
        let err = new_intermediate_certificate(
            &signer,
            &SerialNumber::from(3u128),
            &acme(),
            Duration::days(30),
            &key(&[1, 2, 3]),
            Issuer::new(&sub, &sub_key),
            "Acme Nested CA",
        )
        .unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(
            err.to_string(),
            "NewIntermediateCertificate: Invalid parentCertificate '1/2': \
             path length constraint forbids issuing CA certificates"
        );
        assert_eq!(signer.calls(), 0);

        let client = new_client_certificate(
            &signer,
            &SerialNumber::from(4u128),
            &acme(),
            Duration::days(30),
            &key(&[1, 2, 4]),
            Issuer::new(&sub, &sub_key),
            "alice",
        )
        .unwrap();
        assert_eq!(client.parents(), &[SerialNumber::from(1u128), SerialNumber::from(2u128)]);
    }

    #[test]
    fn test_leaf_cannot_issue() {
        let (root_cert, root_key) = root(&RcgenSigner);
        let leaf_key = key(&[1, 4]);
        let leaf = new_client_certificate(
            &RcgenSigner,
            &SerialNumber::from(4u128),
            &acme(),
            Duration::days(1),
            &leaf_key,
            Issuer::new(&root_cert, &root_key),
            "client",
        )
        .unwrap();

        let err = new_client_certificate(
            &RcgenSigner,
            &SerialNumber::from(5u128),
            &acme(),
            Duration::days(1),
            &key(&[1, 4, 5]),
            Issuer::new(&leaf, &leaf_key),
            "nested",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "parentCertificate: must be defined");
    }

    #[test]
    fn test_signer_failure_is_wrapped() {
        let signer = CountingSigner::failing();
        let err = new_root_certificate(
            &signer,
            &SerialNumber::from(1u128),
            &acme(),
            Duration::days(1),
            &key(&[1]),
            "Acme Root CA",
        )
        .unwrap_err();
        assert_eq!(signer.calls(), 1);
        assert!(err.to_string().starts_with("NewRootCertificate: "));
        assert!(matches!(err.root(), Error::Signature(_)));
    }
}
