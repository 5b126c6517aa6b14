// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Certificate serial numbers and the random source they are drawn from.

use crate::error::{Error, Result};
use num_bigint::BigUint;
use rand::TryRngCore;
use std::fmt;
use std::str::FromStr;

/// Serial numbers are drawn from `[0, 2^128)`.
pub const SERIAL_NUMBER_BITS: usize = 128;

/// Source of cryptographically secure random bytes.
///
/// Injected into controllers so tests can script the values they receive.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        rand::rngs::OsRng
            .try_fill_bytes(dest)
            .map_err(|e| Error::Entropy(e.to_string()))
    }
}

/// A positive, arbitrary-precision certificate serial number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(BigUint);

impl SerialNumber {
    /// Draw a new serial number. Uniqueness is the caller's concern.
    pub fn generate(random: &dyn RandomSource) -> Result<Self> {
        let mut bytes = [0u8; SERIAL_NUMBER_BITS / 8];
        random.fill_bytes(&mut bytes)?;
        Ok(Self(BigUint::from_bytes_be(&bytes)))
    }

    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u128> for SerialNumber {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for SerialNumber {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SerialNumber {
    type Err = Error;

    /// Parse the canonical decimal form.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidSerialNumber(s.to_string()));
        }
        BigUint::parse_bytes(s.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| Error::InvalidSerialNumber(s.to_string()))
    }
}

/// Join a serial number chain into its `/`-separated decimal path.
pub fn serial_path(chain: &[SerialNumber]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse a `/`-separated decimal path back into a chain.
pub fn parse_serial_path(path: &str) -> Result<Vec<SerialNumber>> {
    let chain = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(SerialNumber::from_str)
        .collect::<Result<Vec<_>>>()?;
    if chain.is_empty() {
        return Err(Error::InvalidSerialNumber(path.to_string()));
    }
    Ok(chain)
}
