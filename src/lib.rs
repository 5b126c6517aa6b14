// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Multi-tenant certificate authority engine.
//!
//! Organizations own root certificates; roots sign intermediates; any CA
//! signs server and client certificates. Every certificate is stored with
//! its private key, addressed by the serial numbers of its ancestors.
//!
//! ```rust,no_run
//! use certcenter::{
//!     ApplicationController, Config, FileCertificateRepository, FileOrganizationRepository,
//!     FilePrivateKeyRepository, Organization, OsRandom, Paths, RcgenSigner,
//! };
//! use std::sync::Arc;
//!
//! let paths = Paths::new()?;
//! let config = Config::load(&paths.config)?;
//! let root = paths.repository();
//!
//! let app = ApplicationController::new(
//!     Arc::new(FileOrganizationRepository::new(root)),
//!     Arc::new(FileCertificateRepository::new(root)),
//!     Arc::new(FilePrivateKeyRepository::new(root)),
//!     Arc::new(RcgenSigner),
//!     Arc::new(OsRandom),
//!     config.issuance_defaults(),
//! );
//!
//! app.new_organization(Organization::with_names("acme", vec!["Acme Corp".into()]))?;
//! let org = app.organization_controller("acme")?;
//! let ca = org.new_root_certificate("Acme Root CA")?;
//! let ca = org.certificate_controller(ca.serial_number())?;
//! let (server, _key) = ca.new_server_certificate(&["www.acme.test".into()])?;
//! println!("{}", server.to_pem());
//! # Ok::<(), certcenter::Error>(())
//! ```

/// Stored certificates and their classification.
pub mod certificate;
/// Configuration handling.
pub mod config;
/// Hierarchy navigation and issuance.
pub mod controller;
/// Error types.
pub mod error;
/// Certificate templates for each role.
pub mod factory;
/// Filesystem utilities.
pub mod fs;
/// Private and public key material.
pub mod key;
/// Organizations.
pub mod organization;
/// Persistence of organizations, certificates and keys.
pub mod repository;
/// Serial numbers and serial paths.
pub mod serial;
/// X.509 signing backend.
pub mod signer;
/// Input validation.
pub mod validation;
/// X.509 certificate parsing.
pub mod x509;

pub use certificate::{Certificate, CertificateType, RevokedCertificate};
pub use config::{Config, Paths};
pub use controller::{
    ApplicationController, CertificateController, IssuanceDefaults, OrganizationController,
    PrivateKeyController,
};
pub use error::{Error, Result, ResultExt};
pub use fs::{FileSystem, OsFileSystem};
pub use key::{generate_private_key, KeyType, PrivateKey, PublicKey};
pub use organization::{slugify, Organization};
pub use repository::file::{
    FileCertificateRepository, FileOrganizationRepository, FilePrivateKeyRepository,
};
pub use repository::memory::{
    MemoryCertificateRepository, MemoryOrganizationRepository, MemoryPrivateKeyRepository,
};
pub use repository::{CertificateRepository, OrganizationRepository, PrivateKeyRepository};
pub use serial::{parse_serial_path, serial_path, OsRandom, RandomSource, SerialNumber};
pub use signer::{CertificateSigner, CertificateTemplate, RcgenSigner, SigningAuthority};
pub use x509::{parse_cert_der, parse_cert_pem, CertificateInfo};
