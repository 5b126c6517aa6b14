// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Directory-backed repositories.
//!
//! ```text
//! {root}/organizations/{org}/organization.json
//! {root}/organizations/{org}/certificates/{serial}/cert.pem
//! {root}/organizations/{org}/certificates/{serial}/privkey.pem
//! {root}/organizations/{org}/certificates/{serial}/certificates/{serial}/...
//! ```
//!
//! Every write goes through [`save_bytes`]. Private keys are written with
//! mode 0600 and directories with 0700.

use super::{CertificateRepository, OrganizationRepository, PrivateKeyRepository};
use crate::certificate::Certificate;
use crate::error::{Error, Result, ResultExt};
use crate::fs::{
    read_to_string, save_bytes, FileSystem, OsFileSystem, DIR_MODE, PUBLIC_FILE_MODE,
    SECRET_FILE_MODE,
};
use crate::key::PrivateKey;
use crate::organization::Organization;
use crate::serial::{serial_path, SerialNumber};
use crate::validation::validate_organization_id;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ORGANIZATIONS_DIR: &str = "organizations";
pub const CERTIFICATES_DIR: &str = "certificates";
pub const ORGANIZATION_JSON: &str = "organization.json";
pub const CERTIFICATE_PEM: &str = "cert.pem";
pub const PRIVATE_KEY_PEM: &str = "privkey.pem";

/// Path arithmetic for the repository tree.
#[derive(Debug, Clone)]
pub struct Locations {
    root: PathBuf,
}

impl Locations {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn organizations_dir(&self) -> PathBuf {
        self.root.join(ORGANIZATIONS_DIR)
    }

    /// Rejects ids that are not a single safe path segment.
    pub fn organization_dir(&self, organization: &str) -> Result<PathBuf> {
        validate_organization_id(organization)?;
        Ok(self.organizations_dir().join(organization))
    }

    pub fn organization_json(&self, organization: &str) -> Result<PathBuf> {
        Ok(self.organization_dir(organization)?.join(ORGANIZATION_JSON))
    }

    pub fn certificate_dir(&self, organization: &str, chain: &[SerialNumber]) -> Result<PathBuf> {
        let mut dir = self.organization_dir(organization)?;
        for serial in chain {
            dir.push(CERTIFICATES_DIR);
            dir.push(serial.to_string());
        }
        Ok(dir)
    }

    pub fn certificate_pem(&self, organization: &str, chain: &[SerialNumber]) -> Result<PathBuf> {
        Ok(self.certificate_dir(organization, chain)?.join(CERTIFICATE_PEM))
    }

    pub fn private_key_pem(&self, organization: &str, chain: &[SerialNumber]) -> Result<PathBuf> {
        Ok(self.certificate_dir(organization, chain)?.join(PRIVATE_KEY_PEM))
    }
}

fn is_missing(err: &Error) -> bool {
    matches!(err, Error::ReadFile { source, .. } if source.kind() == io::ErrorKind::NotFound)
}

/// Subdirectories of `dir`, sorted by name. A missing `dir` has none.
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::ReadDir {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::ReadDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub struct FileOrganizationRepository {
    locations: Locations,
    fs: Arc<dyn FileSystem>,
}

impl FileOrganizationRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_file_system(root, Arc::new(OsFileSystem))
    }

    pub fn with_file_system(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            locations: Locations::new(root),
            fs,
        }
    }

    fn read(&self, path: &Path) -> Result<Organization> {
        let text = read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl OrganizationRepository for FileOrganizationRepository {
    fn find_all(&self) -> Result<Vec<Organization>> {
        let mut organizations = Vec::new();
        for (_, dir) in subdirectories(&self.locations.organizations_dir())? {
            let path = dir.join(ORGANIZATION_JSON);
            if !path.exists() {
                continue;
            }
            organizations.push(self.read(&path).context("failed to read organization")?);
        }
        Ok(organizations)
    }

    fn find_by_id(&self, id: &str) -> Result<Organization> {
        let path = self.locations.organization_json(id)?;
        self.read(&path).map_err(|e| {
            if is_missing(&e) {
                Error::OrganizationNotFound { id: id.to_string() }
            } else {
                e.context("failed to read organization")
            }
        })
    }

    fn save(&self, organization: &Organization) -> Result<()> {
        let path = self.locations.organization_json(organization.id())?;
        let json = serde_json::to_vec_pretty(organization).map_err(|e| Error::Json {
            path: path.clone(),
            source: e,
        })?;
        save_bytes(self.fs.as_ref(), &path, &json, PUBLIC_FILE_MODE, DIR_MODE)
            .context("failed to save organization")?;
        tracing::info!(organization = organization.id(), path = %path.display(), "saved organization");
        Ok(())
    }
}

/// A certificate must sit in the directory named after its serial number.
fn check_serial_matches(certificate: &Certificate, serial: &SerialNumber, path: &Path) -> Result<()> {
    if certificate.serial_number() != serial {
        return Err(Error::Pem {
            path: path.to_path_buf(),
            reason: format!(
                "serial number {} does not match directory {}",
                certificate.serial_number(),
                serial
            ),
        });
    }
    Ok(())
}

pub struct FileCertificateRepository {
    locations: Locations,
    fs: Arc<dyn FileSystem>,
}

impl FileCertificateRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_file_system(root, Arc::new(OsFileSystem))
    }

    pub fn with_file_system(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            locations: Locations::new(root),
            fs,
        }
    }

    fn read(&self, organization: &str, parents: Vec<SerialNumber>, path: &Path) -> Result<Certificate> {
        let text = read_to_string(path)?;
        let certificate = Certificate::from_pem(organization, parents, &text).map_err(|e| Error::Pem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(certificate)
    }

    /// Certificates directly under `chain`, each with its address checked
    /// against the directory it was read from.
    fn children(&self, organization: &str, chain: &[SerialNumber]) -> Result<Vec<Certificate>> {
        let dir = self
            .locations
            .certificate_dir(organization, chain)?
            .join(CERTIFICATES_DIR);

        let mut certificates = Vec::new();
        for (name, path) in subdirectories(&dir)? {
            let Ok(serial) = name.parse::<SerialNumber>() else {
                continue;
            };
            let pem = path.join(CERTIFICATE_PEM);
            if !pem.exists() {
                continue;
            }
            let certificate = self
                .read(organization, chain.to_vec(), &pem)
                .context("failed to read certificate")?;
            check_serial_matches(&certificate, &serial, &pem)?;
            certificates.push(certificate);
        }
        Ok(certificates)
    }

    fn collect(
        &self,
        organization: &str,
        chain: &mut Vec<SerialNumber>,
        out: &mut Vec<Certificate>,
    ) -> Result<()> {
        for certificate in self.children(organization, chain)? {
            chain.push(certificate.serial_number().clone());
            out.push(certificate);
            self.collect(organization, chain, out)?;
            chain.pop();
        }
        Ok(())
    }
}

impl CertificateRepository for FileCertificateRepository {
    fn find_all_by_organization(&self, organization: &str) -> Result<Vec<Certificate>> {
        let mut certificates = Vec::new();
        self.collect(organization, &mut Vec::new(), &mut certificates)?;
        Ok(certificates)
    }

    fn find_all_by_organization_and_signed_by(
        &self,
        organization: &str,
        signed_by: &[SerialNumber],
    ) -> Result<Vec<Certificate>> {
        self.children(organization, signed_by)
    }

    fn find_by_organization_and_serial_numbers(
        &self,
        organization: &str,
        chain: &[SerialNumber],
    ) -> Result<Certificate> {
        let Some((serial, parents)) = chain.split_last() else {
            return Err(Error::MustBeDefined {
                field: "serialNumbers",
            });
        };
        let path = self.locations.certificate_pem(organization, chain)?;
        tracing::debug!(organization, serial = %serial_path(chain), "loading certificate");
        let certificate = self
            .read(organization, parents.to_vec(), &path)
            .map_err(|e| {
                if is_missing(&e) {
                    Error::CertificateNotFound {
                        organization: organization.to_string(),
                        serial: serial_path(chain),
                    }
                } else {
                    e.context("failed to read certificate")
                }
            })?;
        check_serial_matches(&certificate, serial, &path)?;
        Ok(certificate)
    }

    fn save(&self, certificate: &Certificate) -> Result<()> {
        let chain = certificate.chain();
        let path = self
            .locations
            .certificate_pem(certificate.organization_id(), &chain)?;
        save_bytes(
            self.fs.as_ref(),
            &path,
            certificate.to_pem().as_bytes(),
            PUBLIC_FILE_MODE,
            DIR_MODE,
        )
        .context("failed to save certificate")?;
        tracing::info!(
            organization = certificate.organization_id(),
            serial = %serial_path(&chain),
            path = %path.display(),
            "saved certificate"
        );
        Ok(())
    }
}

pub struct FilePrivateKeyRepository {
    locations: Locations,
    fs: Arc<dyn FileSystem>,
}

impl FilePrivateKeyRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_file_system(root, Arc::new(OsFileSystem))
    }

    pub fn with_file_system(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            locations: Locations::new(root),
            fs,
        }
    }
}

impl PrivateKeyRepository for FilePrivateKeyRepository {
    fn find_by_organization_and_serial_numbers(
        &self,
        organization: &str,
        chain: &[SerialNumber],
    ) -> Result<PrivateKey> {
        if chain.is_empty() {
            return Err(Error::MustBeDefined {
                field: "serialNumbers",
            });
        }
        let path = self.locations.private_key_pem(organization, chain)?;
        tracing::debug!(organization, serial = %serial_path(chain), "loading private key");
        let text = read_to_string(&path).map_err(|e| {
            if is_missing(&e) {
                Error::PrivateKeyNotFound {
                    organization: organization.to_string(),
                    serial: serial_path(chain),
                }
            } else {
                e.context("failed to read private key")
            }
        })?;
        PrivateKey::from_pem(organization, chain.to_vec(), &text).map_err(|e| Error::Pem {
            path,
            reason: e.to_string(),
        })
    }

    fn save(&self, key: &PrivateKey) -> Result<()> {
        if key.chain().is_empty() {
            return Err(Error::MustBeDefined {
                field: "certificateChain",
            });
        }
        let path = self
            .locations
            .private_key_pem(key.organization_id(), key.chain())?;
        let pem = key.to_pem()?;
        save_bytes(
            self.fs.as_ref(),
            &path,
            pem.as_bytes(),
            SECRET_FILE_MODE,
            DIR_MODE,
        )
        .context("failed to save private key")?;
        tracing::info!(
            organization = key.organization_id(),
            serial = %serial_path(key.chain()),
            key_type = %key.key_type(),
            "saved private key"
        );
        Ok(())
    }
}
