// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use super::{ApplicationController, OrganizationController, PrivateKeyController};
use crate::certificate::{Certificate, CertificateType};
use crate::error::{Error, Result, ResultExt};
use crate::factory::{self, Issuer};
use crate::key::{generate_private_key, KeyType, PrivateKey};
use crate::organization::Organization;
use crate::serial::{serial_path, SerialNumber};
use time::Duration;

/// One certificate in the hierarchy and the operations that issue below it.
pub struct CertificateController<'a> {
    organization: &'a OrganizationController<'a>,
    parent: Option<&'a CertificateController<'a>>,
    certificate: Certificate,
    expiration: Duration,
    key_type: KeyType,
}

impl<'a> CertificateController<'a> {
    pub(crate) fn new(
        organization: &'a OrganizationController<'a>,
        parent: Option<&'a CertificateController<'a>>,
        certificate: Certificate,
    ) -> Self {
        let (expiration, key_type) = match parent {
            Some(parent) => (parent.expiration, parent.key_type),
            None => {
                let defaults = organization.application_controller().defaults();
                (defaults.expiration, defaults.key_type)
            }
        };
        Self {
            organization,
            parent,
            certificate,
            expiration,
            key_type,
        }
    }

    pub fn application_controller(&self) -> &'a ApplicationController {
        self.organization.application_controller()
    }

    pub fn organization_controller(&self) -> &'a OrganizationController<'a> {
        self.organization
    }

    pub fn organization_id(&self) -> &str {
        self.organization.organization_id()
    }

    pub fn organization(&self) -> &Organization {
        self.organization.organization()
    }

    pub fn serial_number(&self) -> &SerialNumber {
        self.certificate.serial_number()
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// `None` for a root.
    pub fn parent_certificate_controller(&self) -> Option<&'a CertificateController<'a>> {
        self.parent
    }

    pub fn parent_certificate(&self) -> Option<&Certificate> {
        self.parent.map(|parent| &parent.certificate)
    }

    /// Validity of certificates issued through this controller and the
    /// child controllers it creates afterwards.
    pub fn set_expiration_duration(&mut self, expiration: Duration) {
        self.expiration = expiration;
    }

    pub fn set_key_type(&mut self, key_type: KeyType) -> Result<()> {
        key_type
            .check_certificate_support()
            .with_context(|| format!("{}.SetKeyType", self.name()))?;
        self.key_type = key_type;
        Ok(())
    }

    fn name(&self) -> String {
        format!("CertificateController('{}')", serial_path(&self.certificate.chain()))
    }

    pub fn child_certificate(&self, serial_number: &SerialNumber) -> Result<Certificate> {
        let mut chain = self.certificate.chain();
        chain.push(serial_number.clone());
        self.application_controller()
            .certificates()
            .find_by_organization_and_serial_numbers(self.organization_id(), &chain)
            .with_context(|| format!("{}.ChildCertificate('{}')", self.name(), serial_number))
    }

    pub fn child_certificate_controller(
        &self,
        serial_number: &SerialNumber,
    ) -> Result<CertificateController<'_>> {
        let certificate = self.child_certificate(serial_number)?;
        Ok(CertificateController::new(
            self.organization,
            Some(self),
            certificate,
        ))
    }

    /// Certificates signed by this one, optionally limited to one type.
    pub fn child_certificate_collection(
        &self,
        certificate_type: Option<CertificateType>,
    ) -> Result<Vec<Certificate>> {
        let children = self
            .application_controller()
            .certificates()
            .find_all_by_organization_and_signed_by(
                self.organization_id(),
                &self.certificate.chain(),
            )
            .with_context(|| format!("{}.ChildCertificateCollection", self.name()))?;

        Ok(match certificate_type {
            Some(certificate_type) => children
                .into_iter()
                .filter(|child| child.is_type(certificate_type))
                .collect(),
            None => children,
        })
    }

    pub fn private_key(&self) -> Result<PrivateKey> {
        self.application_controller()
            .private_keys()
            .find_by_organization_and_serial_numbers(
                self.organization_id(),
                &self.certificate.chain(),
            )
            .with_context(|| format!("{}.PrivateKey", self.name()))
    }

    pub fn private_key_controller(&self) -> Result<PrivateKeyController<'_>> {
        let key = self.private_key()?;
        Ok(PrivateKeyController::new(self, key))
    }

    pub fn new_intermediate_certificate(
        &self,
        common_name: &str,
    ) -> Result<(Certificate, PrivateKey)> {
        self.issue("NewIntermediateCertificate", |serial, key, issuer| {
            factory::new_intermediate_certificate(
                self.application_controller().signer(),
                serial,
                self.organization(),
                self.expiration,
                key,
                issuer,
                common_name,
            )
        })
    }

    /// The first DNS name doubles as the common name.
    pub fn new_server_certificate(&self, dns_names: &[String]) -> Result<(Certificate, PrivateKey)> {
        let Some(common_name) = dns_names.first() else {
            return Err(Error::NoDnsNames.context(format!("{}.NewServerCertificate", self.name())));
        };
        self.issue("NewServerCertificate", |serial, key, issuer| {
            factory::new_server_certificate(
                self.application_controller().signer(),
                serial,
                self.organization(),
                self.expiration,
                key,
                issuer,
                common_name,
                dns_names,
            )
        })
    }

    pub fn new_client_certificate(&self, common_name: &str) -> Result<(Certificate, PrivateKey)> {
        self.issue("NewClientCertificate", |serial, key, issuer| {
            factory::new_client_certificate(
                self.application_controller().signer(),
                serial,
                self.organization(),
                self.expiration,
                key,
                issuer,
                common_name,
            )
        })
    }

    /// Fetch the signing key, draw a serial and key for the child, sign,
    /// then store the key and the certificate in that order.
    fn issue<F>(&self, operation: &str, build: F) -> Result<(Certificate, PrivateKey)>
    where
        F: FnOnce(&SerialNumber, &PrivateKey, Issuer<'_>) -> Result<Certificate>,
    {
        let context = || format!("{}.{}", self.name(), operation);
        let app = self.application_controller();

        self.key_type
            .check_certificate_support()
            .with_context(context)?;
        let parent_key = self.private_key().with_context(context)?;
        let serial_number = SerialNumber::generate(app.random()).with_context(context)?;

        let mut chain = self.certificate.chain();
        chain.push(serial_number.clone());
        let private_key = generate_private_key(self.organization_id(), chain, self.key_type)
            .with_context(context)?;

        let certificate = build(
            &serial_number,
            &private_key,
            Issuer::new(&self.certificate, &parent_key),
        )
        .with_context(context)?;

        app.private_keys()
            .save(&private_key)
            .with_context(context)?;
        app.certificates()
            .save(&certificate)
            .with_context(context)?;

        tracing::info!(
            organization = self.organization_id(),
            certificate = %certificate,
            certificate_type = ?certificate.certificate_type(),
            key_type = %self.key_type,
            "issued certificate"
        );
        Ok((certificate, private_key))
    }
}

#[cfg(test)]
mod tests {
    use super::CertificateController;
    use crate::certificate::CertificateType;
    use crate::controller::IssuanceDefaults;
    use crate::controller::tests::{defaults, FailingCertificateRepository, Fixture};
    use crate::error::Error;
    use crate::key::KeyType;
    use crate::repository::memory::MemoryPrivateKeyRepository;
    use crate::serial::tests::ScriptedRandom;
    use crate::serial::{OsRandom, SerialNumber};
    use crate::signer::tests::CountingSigner;
    use crate::signer::RcgenSigner;
    use std::sync::Arc;
    use time::Duration;

    #[test]
    fn test_hierarchy() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();

        let root_ctl = org.certificate_controller(root.serial_number()).unwrap();
        assert!(root_ctl.parent_certificate_controller().is_none());
        let (intermediate, intermediate_key) =
            root_ctl.new_intermediate_certificate("Acme Issuing CA").unwrap();
        assert_eq!(intermediate.parents(), root.chain().as_slice());
        assert!(intermediate.is_intermediate_certificate());
        assert_eq!(intermediate_key.chain(), intermediate.chain().as_slice());

        let issuing = root_ctl
            .child_certificate_controller(intermediate.serial_number())
            .unwrap();
        assert_eq!(
            issuing.parent_certificate().map(|c| c.serial_number()),
            Some(root.serial_number())
        );

        let dns = vec!["www.acme.com".to_string(), "acme.com".to_string()];
        let (server, _) = issuing.new_server_certificate(&dns).unwrap();
        assert_eq!(server.parents(), intermediate.chain().as_slice());
        assert!(server.is_server_certificate());
        assert_eq!(server.common_name(), Some("www.acme.com"));
        assert_eq!(server.dns_names(), dns.as_slice());

        let (client, _) = issuing.new_client_certificate("alice@acme.com").unwrap();
        assert!(client.is_client_certificate());
        assert!(!client.is_ca());

        let all = issuing.child_certificate_collection(None).unwrap();
        assert_eq!(all.len(), 2);
        let servers = issuing
            .child_certificate_collection(Some(CertificateType::Server))
            .unwrap();
        assert_eq!(servers, vec![server.clone()]);
        let clients = issuing
            .child_certificate_collection(Some(CertificateType::Client))
            .unwrap();
        assert_eq!(clients, vec![client]);

        let leaf = issuing.child_certificate_controller(server.serial_number()).unwrap();
        let grandparent = leaf
            .parent_certificate_controller()
            .and_then(|p| p.parent_certificate_controller())
            .unwrap();
        assert_eq!(grandparent.serial_number(), root.serial_number());
    }

    #[test]
    fn test_server_without_dns_names() {
        let fixture = Fixture::memory();
        let signer = Arc::new(CountingSigner::default());
        let app = fixture.app_with(signer.clone(), Arc::new(OsRandom));
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();
        assert_eq!(signer.calls(), 1);

        let root_ctl = org.certificate_controller(root.serial_number()).unwrap();
        let err = root_ctl.new_server_certificate(&[]).unwrap_err();
        assert!(matches!(err.root(), Error::NoDnsNames));
        assert_eq!(signer.calls(), 1);
        assert!(root_ctl.child_certificate_collection(None).unwrap().is_empty());
    }

    #[test]
    fn test_expiration_propagates_to_children() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();

        let mut root_ctl = org.certificate_controller(root.serial_number()).unwrap();
        root_ctl.set_expiration_duration(Duration::days(3));
        root_ctl.set_key_type(KeyType::Ed25519).unwrap();
        let (intermediate, key) = root_ctl.new_intermediate_certificate("Acme Issuing CA").unwrap();
        assert_eq!(key.key_type(), KeyType::Ed25519);
        let info = intermediate.info();
        assert_eq!(info.not_after_timestamp - info.not_before_timestamp, 3 * 86_400);

        let child = root_ctl
            .child_certificate_controller(intermediate.serial_number())
            .unwrap();
        let (leaf, _) = child.new_client_certificate("bob").unwrap();
        let info = leaf.info();
        assert_eq!(info.not_after_timestamp - info.not_before_timestamp, 3 * 86_400);
    }

    #[test]
    fn test_intermediate_cannot_issue_intermediate() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();
        let root_ctl = org.certificate_controller(root.serial_number()).unwrap();
        let (intermediate, _) = root_ctl.new_intermediate_certificate("Acme Issuing CA").unwrap();
        assert!(intermediate.info().max_path_len_zero());

        let issuing = root_ctl
            .child_certificate_controller(intermediate.serial_number())
            .unwrap();
        let err = issuing
            .new_intermediate_certificate("Acme Nested CA")
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains(".NewIntermediateCertificate: "));
        assert!(issuing.child_certificate_collection(None).unwrap().is_empty());

        let (client, _) = issuing.new_client_certificate("alice").unwrap();
        assert_eq!(client.parents(), intermediate.chain().as_slice());
    }

    #[test]
    fn test_each_key_type_issues_or_is_rejected() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();
        let mut root_ctl = org.certificate_controller(root.serial_number()).unwrap();

        for key_type in [
            KeyType::Rsa1024,
            KeyType::Rsa2048,
            KeyType::EcdsaP224,
            KeyType::EcdsaP256,
            KeyType::EcdsaP384,
            KeyType::EcdsaP521,
            KeyType::Ed25519,
        ] {
            let result = root_ctl.set_key_type(key_type);
            if !key_type.supports_certificates() {
                let err = result.unwrap_err();
                assert!(matches!(err.root(), Error::UnsupportedKeyType(k) if *k == key_type));
                continue;
            }
            result.unwrap();
            let (leaf, key) = root_ctl.new_client_certificate("bob").unwrap();
            assert_eq!(key.key_type(), key_type);
            assert_eq!(
                key.public_key().to_public_key_der().unwrap(),
                leaf.info().public_key_der
            );
        }
        assert_eq!(root_ctl.child_certificate_collection(None).unwrap().len(), 4);
    }

    #[test]
    fn test_non_signing_default_is_rejected_before_serial() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();

        let strict = fixture.app_with_defaults(
            Arc::new(RcgenSigner),
            Arc::new(ScriptedRandom::new(&[])),
            IssuanceDefaults {
                key_type: KeyType::EcdsaP521,
                ..defaults()
            },
        );
        let strict_org = strict.organization_controller("acme").unwrap();
        let root_ctl = strict_org.certificate_controller(root.serial_number()).unwrap();
        let err = root_ctl.new_client_certificate("bob").unwrap_err();
        assert!(matches!(err.root(), Error::UnsupportedKeyType(KeyType::EcdsaP521)));
        assert!(root_ctl.child_certificate_collection(None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_child() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();
        let root_ctl = org.certificate_controller(root.serial_number()).unwrap();

        let err = root_ctl
            .child_certificate_controller(&SerialNumber::from(1u128))
            .err()
            .unwrap();
        assert!(err.is_not_found());
        assert!(err.to_string().contains(".ChildCertificate('1')"));
    }

    #[test]
    fn test_failed_certificate_save_keeps_key() {
        let fixture = Fixture::memory();
        let app = fixture.app();
        let org = app.organization_controller("acme").unwrap();
        let root = org.new_root_certificate("Acme Root CA").unwrap();
        let root_key = fixture
            .private_keys
            .find_by_organization_and_serial_numbers("acme", &root.chain())
            .unwrap();

        let broken = Fixture {
            certificates: Arc::new(FailingCertificateRepository::default()),
            private_keys: Arc::new(MemoryPrivateKeyRepository::new()),
        };
        broken.private_keys.save(&root_key).unwrap();
        let broken_app = broken.app_with(Arc::new(RcgenSigner), Arc::new(ScriptedRandom::new(&[9])));
        let broken_org = broken_app.organization_controller("acme").unwrap();
        let root_ctl = CertificateController::new(&broken_org, None, root.clone());

        let err = root_ctl.new_client_certificate("bob").unwrap_err();
        assert!(err.to_string().contains(".NewClientCertificate: "));
        assert!(root_ctl.child_certificate_collection(None).unwrap().is_empty());

        let mut chain = root.chain();
        chain.push(SerialNumber::from_bytes_be(&[9u8; 16]));
        assert!(broken
            .private_keys
            .find_by_organization_and_serial_numbers("acme", &chain)
            .is_ok());
    }
}
