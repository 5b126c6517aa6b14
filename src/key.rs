// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Private key generation, PEM encoding and signature helpers.
//!
//! Keys are stored in the PEM form native to their family:
//!
//! | Family  | PEM block         | Encoding |
//! |---------|-------------------|----------|
//! | RSA     | `RSA PRIVATE KEY` | PKCS#1   |
//! | ECDSA   | `EC PRIVATE KEY`  | SEC1     |
//! | Ed25519 | `PRIVATE KEY`     | PKCS#8   |
//!
//! A `PRIVATE KEY` block is accepted for every family when reading.

use crate::error::{Error, Result};
use crate::serial::{serial_path, SerialNumber};
use p521::elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::der::asn1::ObjectIdentifier;
use pkcs8::der::oid::AssociatedOid;
use pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

pub const RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";
pub const EC_PRIVATE_KEY_TAG: &str = "EC PRIVATE KEY";
pub const PKCS8_PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// Supported asymmetric key algorithms.
///
/// `Nil` marks an unset key type and is never a valid key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "RSA_1024")]
    Rsa1024,
    #[serde(rename = "RSA_2048")]
    Rsa2048,
    #[serde(rename = "RSA_3072")]
    Rsa3072,
    #[serde(rename = "RSA_4096")]
    Rsa4096,
    #[serde(rename = "ECDSA_P224")]
    EcdsaP224,
    #[serde(rename = "ECDSA_P256")]
    EcdsaP256,
    #[serde(rename = "ECDSA_P384")]
    EcdsaP384,
    #[serde(rename = "ECDSA_P521")]
    EcdsaP521,
    #[serde(rename = "Ed25519")]
    Ed25519,
    #[serde(rename = "NIL")]
    Nil,
}

impl KeyType {
    /// Every valid key type, in declaration order.
    pub const ALL: [KeyType; 9] = [
        KeyType::Rsa1024,
        KeyType::Rsa2048,
        KeyType::Rsa3072,
        KeyType::Rsa4096,
        KeyType::EcdsaP224,
        KeyType::EcdsaP256,
        KeyType::EcdsaP384,
        KeyType::EcdsaP521,
        KeyType::Ed25519,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa1024 => "RSA_1024",
            KeyType::Rsa2048 => "RSA_2048",
            KeyType::Rsa3072 => "RSA_3072",
            KeyType::Rsa4096 => "RSA_4096",
            KeyType::EcdsaP224 => "ECDSA_P224",
            KeyType::EcdsaP256 => "ECDSA_P256",
            KeyType::EcdsaP384 => "ECDSA_P384",
            KeyType::EcdsaP521 => "ECDSA_P521",
            KeyType::Ed25519 => "Ed25519",
            KeyType::Nil => "NIL",
        }
    }

    pub fn is_rsa(&self) -> bool {
        self.rsa_bits().is_some()
    }

    pub fn is_ecdsa(&self) -> bool {
        matches!(
            self,
            KeyType::EcdsaP224 | KeyType::EcdsaP256 | KeyType::EcdsaP384 | KeyType::EcdsaP521
        )
    }

    /// Modulus size for RSA key types.
    pub fn rsa_bits(&self) -> Option<usize> {
        match self {
            KeyType::Rsa1024 => Some(1024),
            KeyType::Rsa2048 => Some(2048),
            KeyType::Rsa3072 => Some(3072),
            KeyType::Rsa4096 => Some(4096),
            _ => None,
        }
    }

    /// Whether certificates can be issued for keys of this type.
    ///
    /// Certificates are signed with rcgen on ring, which loads RSA keys of
    /// 2048 bits and up, ECDSA P-256 and P-384 and Ed25519. The remaining
    /// types still generate, store and sign messages.
    pub fn supports_certificates(&self) -> bool {
        matches!(
            self,
            KeyType::Rsa2048
                | KeyType::Rsa3072
                | KeyType::Rsa4096
                | KeyType::EcdsaP256
                | KeyType::EcdsaP384
                | KeyType::Ed25519
        )
    }

    /// Fails with [`Error::UnsupportedKeyType`] unless certificates can be
    /// issued for this type.
    pub fn check_certificate_support(self) -> Result<()> {
        if self.supports_certificates() {
            Ok(())
        } else {
            Err(Error::UnsupportedKeyType(self))
        }
    }

    fn from_rsa_bits(bits: usize) -> Option<Self> {
        match bits {
            1024 => Some(KeyType::Rsa1024),
            2048 => Some(KeyType::Rsa2048),
            3072 => Some(KeyType::Rsa3072),
            4096 => Some(KeyType::Rsa4096),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        KeyType::ALL
            .iter()
            .chain(std::iter::once(&KeyType::Nil))
            .find(|kt| kt.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::Validation {
                field: "keyType",
                value: s.to_string(),
                reason: "unknown key type".into(),
            })
    }
}

fn encoding_error(e: impl fmt::Display) -> Error {
    Error::KeyEncoding(e.to_string())
}

/// Private key material, one variant per supported algorithm.
#[derive(Clone)]
pub enum KeyMaterial {
    Rsa(RsaPrivateKey),
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl KeyMaterial {
    /// Generate fresh key material for `key_type`.
    pub fn generate(key_type: KeyType) -> Result<Self> {
        let material = match key_type {
            KeyType::Rsa1024 | KeyType::Rsa2048 | KeyType::Rsa3072 | KeyType::Rsa4096 => {
                let bits = key_type
                    .rsa_bits()
                    .ok_or(Error::UnsupportedKeyType(key_type))?;
                let key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
                    Error::KeyGeneration {
                        key_type,
                        reason: e.to_string(),
                    }
                })?;
                KeyMaterial::Rsa(key)
            }
            KeyType::EcdsaP224 => KeyMaterial::P224(p224::SecretKey::random(&mut OsRng)),
            KeyType::EcdsaP256 => KeyMaterial::P256(p256::SecretKey::random(&mut OsRng)),
            KeyType::EcdsaP384 => KeyMaterial::P384(p384::SecretKey::random(&mut OsRng)),
            KeyType::EcdsaP521 => KeyMaterial::P521(p521::SecretKey::random(&mut OsRng)),
            KeyType::Ed25519 => {
                KeyMaterial::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
            KeyType::Nil => return Err(Error::UnsupportedKeyType(key_type)),
        };
        Ok(material)
    }

    /// Wrap an RSA key, rejecting modulus sizes outside the supported set.
    pub fn rsa(key: RsaPrivateKey) -> Result<Self> {
        let bits = key.size() * 8;
        if KeyType::from_rsa_bits(bits).is_none() {
            return Err(Error::KeyParse(format!(
                "unsupported RSA modulus size: {} bits",
                bits
            )));
        }
        Ok(KeyMaterial::Rsa(key))
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyMaterial::Rsa(key) => {
                KeyType::from_rsa_bits(key.size() * 8).unwrap_or(KeyType::Nil)
            }
            KeyMaterial::P224(_) => KeyType::EcdsaP224,
            KeyMaterial::P256(_) => KeyType::EcdsaP256,
            KeyMaterial::P384(_) => KeyType::EcdsaP384,
            KeyMaterial::P521(_) => KeyType::EcdsaP521,
            KeyMaterial::Ed25519(_) => KeyType::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyMaterial::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            KeyMaterial::P224(key) => PublicKey::P224(key.public_key()),
            KeyMaterial::P256(key) => PublicKey::P256(key.public_key()),
            KeyMaterial::P384(key) => PublicKey::P384(key.public_key()),
            KeyMaterial::P521(key) => PublicKey::P521(key.public_key()),
            KeyMaterial::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Encode in the family's storage format.
    pub fn to_pem(&self) -> Result<String> {
        match self {
            KeyMaterial::Rsa(key) => key
                .to_pkcs1_pem(LineEnding::LF)
                .map(|p| p.to_string())
                .map_err(encoding_error),
            KeyMaterial::P224(key) => key
                .to_sec1_pem(LineEnding::LF)
                .map(|p| p.to_string())
                .map_err(encoding_error),
            KeyMaterial::P256(key) => key
                .to_sec1_pem(LineEnding::LF)
                .map(|p| p.to_string())
                .map_err(encoding_error),
            KeyMaterial::P384(key) => key
                .to_sec1_pem(LineEnding::LF)
                .map(|p| p.to_string())
                .map_err(encoding_error),
            KeyMaterial::P521(key) => key
                .to_sec1_pem(LineEnding::LF)
                .map(|p| p.to_string())
                .map_err(encoding_error),
            KeyMaterial::Ed25519(_) => self.to_pkcs8_pem(),
        }
    }

    /// Encode as PKCS#8 regardless of family.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let encoded = match self {
            KeyMaterial::Rsa(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyMaterial::P224(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyMaterial::P256(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyMaterial::P384(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyMaterial::P521(key) => key.to_pkcs8_pem(LineEnding::LF),
            KeyMaterial::Ed25519(key) => key.to_pkcs8_pem(LineEnding::LF),
        };
        encoded.map(|p| p.to_string()).map_err(encoding_error)
    }

    pub fn from_pem(text: &str) -> Result<Self> {
        let block = ::pem::parse(text)
            .map_err(|e| Error::KeyParse(format!("Failed to parse PEM: {}", e)))?;

        match block.tag() {
            RSA_PRIVATE_KEY_TAG => {
                let key = RsaPrivateKey::from_pkcs1_der(block.contents())
                    .map_err(|e| Error::KeyParse(format!("Invalid PKCS#1 key: {}", e)))?;
                Self::rsa(key)
            }
            EC_PRIVATE_KEY_TAG => Self::from_sec1_der(block.contents()),
            PKCS8_PRIVATE_KEY_TAG => Self::from_pkcs8_der(block.contents()),
            other => Err(Error::KeyParse(format!(
                "Expected a private key PEM block, got {}",
                other
            ))),
        }
    }

    fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let parsed = sec1::EcPrivateKey::try_from(der)
            .map_err(|e| Error::KeyParse(format!("Invalid SEC1 key: {}", e)))?;
        let curve: Option<ObjectIdentifier> = parsed.parameters.and_then(|p| p.named_curve());
        let invalid = |e: p256::elliptic_curve::Error| Error::KeyParse(format!("Invalid EC key: {}", e));

        match curve {
            Some(oid) if oid == p224::NistP224::OID => {
                p224::SecretKey::from_sec1_der(der).map(KeyMaterial::P224).map_err(invalid)
            }
            Some(oid) if oid == p256::NistP256::OID => {
                p256::SecretKey::from_sec1_der(der).map(KeyMaterial::P256).map_err(invalid)
            }
            Some(oid) if oid == p384::NistP384::OID => {
                p384::SecretKey::from_sec1_der(der).map(KeyMaterial::P384).map_err(invalid)
            }
            Some(oid) if oid == p521::NistP521::OID => {
                p521::SecretKey::from_sec1_der(der).map(KeyMaterial::P521).map_err(invalid)
            }
            Some(oid) => Err(Error::KeyParse(format!("Unsupported EC curve {}", oid))),
            None => Err(Error::KeyParse("EC key has no named curve".into())),
        }
    }

    fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = ed25519_dalek::SigningKey::from_pkcs8_der(der) {
            return Ok(KeyMaterial::Ed25519(key));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Self::rsa(key);
        }
        if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(KeyMaterial::P256(key));
        }
        if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
            return Ok(KeyMaterial::P384(key));
        }
        if let Ok(key) = p521::SecretKey::from_pkcs8_der(der) {
            return Ok(KeyMaterial::P521(key));
        }
        if let Ok(key) = p224::SecretKey::from_pkcs8_der(der) {
            return Ok(KeyMaterial::P224(key));
        }
        Err(Error::KeyParse(
            "PKCS#8 key uses an unsupported algorithm".into(),
        ))
    }

    /// Sign `message`: RSA PKCS#1 v1.5 with SHA-256, ECDSA with the
    /// curve's standard digest, or plain Ed25519.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let failed = |e: rsa::signature::Error| Error::Signature(e.to_string());
        match self {
            KeyMaterial::Rsa(key) => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                Ok(signer.try_sign(message).map_err(failed)?.to_vec())
            }
            KeyMaterial::P224(key) => {
                let signer = p224::ecdsa::SigningKey::from(key);
                let signature: p224::ecdsa::Signature = signer.try_sign(message).map_err(failed)?;
                Ok(signature.to_vec())
            }
            KeyMaterial::P256(key) => {
                let signer = p256::ecdsa::SigningKey::from(key);
                let signature: p256::ecdsa::Signature = signer.try_sign(message).map_err(failed)?;
                Ok(signature.to_vec())
            }
            KeyMaterial::P384(key) => {
                let signer = p384::ecdsa::SigningKey::from(key);
                let signature: p384::ecdsa::Signature = signer.try_sign(message).map_err(failed)?;
                Ok(signature.to_vec())
            }
            KeyMaterial::P521(key) => {
                let signer = p521::ecdsa::SigningKey::from_slice(&key.to_bytes()).map_err(failed)?;
                let signature: p521::ecdsa::Signature = signer.try_sign(message).map_err(failed)?;
                Ok(signature.to_vec())
            }
            KeyMaterial::Ed25519(key) => {
                let signature: ed25519_dalek::Signature = key.try_sign(message).map_err(failed)?;
                Ok(signature.to_vec())
            }
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyMaterial")
            .field(&self.key_type())
            .finish()
    }
}

/// Public half of a [`KeyMaterial`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    P224(p224::PublicKey),
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// DER-encoded SubjectPublicKeyInfo.
    pub fn to_public_key_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(key) => key.to_public_key_der(),
            PublicKey::P224(key) => key.to_public_key_der(),
            PublicKey::P256(key) => key.to_public_key_der(),
            PublicKey::P384(key) => key.to_public_key_der(),
            PublicKey::P521(key) => key.to_public_key_der(),
            PublicKey::Ed25519(key) => key.to_public_key_der(),
        };
        document
            .map(|d| d.as_bytes().to_vec())
            .map_err(encoding_error)
    }

    /// Verify a signature produced by [`KeyMaterial::sign`].
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let failed = |e: rsa::signature::Error| Error::Signature(e.to_string());
        match self {
            PublicKey::Rsa(key) => {
                let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                let signature = rsa::pkcs1v15::Signature::try_from(signature).map_err(failed)?;
                verifier.verify(message, &signature).map_err(failed)
            }
            PublicKey::P224(key) => {
                let verifier = p224::ecdsa::VerifyingKey::from(key);
                let signature = p224::ecdsa::Signature::from_slice(signature).map_err(failed)?;
                verifier.verify(message, &signature).map_err(failed)
            }
            PublicKey::P256(key) => {
                let verifier = p256::ecdsa::VerifyingKey::from(key);
                let signature = p256::ecdsa::Signature::from_slice(signature).map_err(failed)?;
                verifier.verify(message, &signature).map_err(failed)
            }
            PublicKey::P384(key) => {
                let verifier = p384::ecdsa::VerifyingKey::from(key);
                let signature = p384::ecdsa::Signature::from_slice(signature).map_err(failed)?;
                verifier.verify(message, &signature).map_err(failed)
            }
            PublicKey::P521(key) => {
                let point = key.to_encoded_point(false);
                let verifier =
                    p521::ecdsa::VerifyingKey::from_sec1_bytes(point.as_bytes()).map_err(failed)?;
                let signature = p521::ecdsa::Signature::from_slice(signature).map_err(failed)?;
                verifier.verify(message, &signature).map_err(failed)
            }
            PublicKey::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature).map_err(failed)?;
                key.verify(message, &signature).map_err(failed)
            }
        }
    }
}

/// A private key addressed by its organization and certificate chain.
///
/// `chain` runs root-first and ends with the serial number of the
/// certificate the key belongs to.
#[derive(Clone)]
pub struct PrivateKey {
    organization_id: String,
    chain: Vec<SerialNumber>,
    material: KeyMaterial,
}

impl PrivateKey {
    pub fn new(
        organization_id: impl Into<String>,
        chain: Vec<SerialNumber>,
        material: KeyMaterial,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            chain,
            material,
        }
    }

    pub fn from_pem(
        organization_id: impl Into<String>,
        chain: Vec<SerialNumber>,
        text: &str,
    ) -> Result<Self> {
        Ok(Self::new(organization_id, chain, KeyMaterial::from_pem(text)?))
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn chain(&self) -> &[SerialNumber] {
        &self.chain
    }

    /// Serial number of the owning certificate.
    pub fn serial_number(&self) -> Option<&SerialNumber> {
        self.chain.last()
    }

    /// Ancestors of the owning certificate.
    pub fn parents(&self) -> &[SerialNumber] {
        match self.chain.split_last() {
            Some((_, parents)) => parents,
            None => &[],
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.material.key_type()
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub fn public_key(&self) -> PublicKey {
        self.material.public_key()
    }

    pub fn to_pem(&self) -> Result<String> {
        self.material.to_pem()
    }

    pub fn to_pkcs8_pem(&self) -> Result<String> {
        self.material.to_pkcs8_pem()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.material.sign(message)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("organization_id", &self.organization_id)
            .field("chain", &serial_path(&self.chain))
            .field("key_type", &self.key_type())
            .finish_non_exhaustive()
    }
}

/// Generate a private key for the certificate at `chain` in `organization_id`.
pub fn generate_private_key(
    organization_id: &str,
    chain: Vec<SerialNumber>,
    key_type: KeyType,
) -> Result<PrivateKey> {
    if organization_id.is_empty() {
        return Err(Error::MustBeDefined {
            field: "organizationID",
        });
    }
    if chain.is_empty() {
        return Err(Error::MustBeDefined {
            field: "certificateChain",
        });
    }
    let material = KeyMaterial::generate(key_type)?;
    tracing::debug!(
        organization = organization_id,
        chain = %serial_path(&chain),
        key_type = %key_type,
        "generated private key"
    );
    Ok(PrivateKey::new(organization_id, chain, material))
}
