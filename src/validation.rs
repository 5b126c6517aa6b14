// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! String grammars checked before anything is issued or stored.

use crate::error::{Error, Result};
use crate::organization::Organization;
use once_cell::sync::Lazy;
use regex::Regex;

static ALL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("invalid digits regex"));

static ROOT_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-. ]+$").expect("invalid name regex"));

static CLIENT_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-. @]+$").expect("invalid client name regex"));

static HOSTNAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9\-.]+$").expect("invalid hostname regex"));

fn invalid(field: &'static str, value: &str, reason: &str) -> Error {
    Error::Validation {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Checks shared by root and client common names.
fn check_spacing(value: &str) -> std::result::Result<(), &'static str> {
    if value.is_empty() {
        return Err("cannot be empty");
    }
    if value.starts_with(' ') {
        return Err("cannot start with a space");
    }
    if value.ends_with(' ') {
        return Err("cannot end with a space");
    }
    if value.contains("  ") {
        return Err("should not have repeating spaces");
    }
    Ok(())
}

pub fn validate_root_common_name(common_name: &str) -> Result<()> {
    let check = || -> std::result::Result<(), &'static str> {
        check_spacing(common_name)?;
        if ALL_DIGITS.is_match(common_name) {
            return Err("should not be full numbers");
        }
        if !ROOT_NAME_CHARS.is_match(common_name) {
            return Err("contains invalid characters");
        }
        Ok(())
    };
    check().map_err(|reason| invalid("commonName", common_name, reason))
}

/// Intermediate CAs follow the root grammar.
pub fn validate_intermediate_common_name(common_name: &str) -> Result<()> {
    validate_root_common_name(common_name)
}

pub fn validate_client_common_name(common_name: &str) -> Result<()> {
    let check = || -> std::result::Result<(), &'static str> {
        check_spacing(common_name)?;
        if !CLIENT_NAME_CHARS.is_match(common_name) {
            return Err("contains invalid characters");
        }
        Ok(())
    };
    check().map_err(|reason| invalid("commonName", common_name, reason))
}

fn check_hostname(name: &str) -> std::result::Result<(), &'static str> {
    let name = name.strip_prefix("*.").unwrap_or(name);
    if name.is_empty() {
        return Err("cannot be empty");
    }
    if name.starts_with(['-', '.']) || name.ends_with(['-', '.']) {
        return Err("cannot start or end with '-' or '.'");
    }
    if name.contains("..") {
        return Err("cannot have repeating '.'");
    }
    if !HOSTNAME_CHARS.is_match(name) {
        return Err("contains invalid characters");
    }
    let tld = name.rsplit('.').next().unwrap_or(name);
    if tld.len() < 2 {
        return Err("last TLD must be at least two characters");
    }
    Ok(())
}

/// A leading `*.` wildcard is allowed.
pub fn validate_server_common_name(common_name: &str) -> Result<()> {
    check_hostname(common_name).map_err(|reason| invalid("commonName", common_name, reason))
}

pub fn validate_dns_names(dns_names: &[String]) -> Result<()> {
    for name in dns_names {
        check_hostname(name).map_err(|reason| invalid("dnsName", name, reason))?;
    }
    Ok(())
}

pub fn validate_organization_name(name: &str) -> Result<()> {
    let check = || -> std::result::Result<(), &'static str> {
        if name.trim().len() < 2 {
            return Err("must not be empty and must be at least two characters long");
        }
        if name.trim() != name {
            return Err("must not have leading or trailing spaces");
        }
        if name.contains("  ") {
            return Err("should not have repeating spaces");
        }
        if name.parse::<i64>().is_ok() {
            return Err("should not be full numbers");
        }
        if !ROOT_NAME_CHARS.is_match(name) {
            return Err("contains invalid characters");
        }
        Ok(())
    };
    check().map_err(|reason| invalid("name", name, reason))
}

pub fn validate_organization_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(Error::MustBeDefined { field: "names" });
    }
    names
        .iter()
        .try_for_each(|name| validate_organization_name(name))
}

fn check_slug(slug: &str) -> std::result::Result<(), &'static str> {
    if slug.len() < 2 {
        return Err("must be at least two characters long");
    }
    if slug.parse::<i64>().is_ok() {
        return Err("should not be full numbers");
    }
    if slug.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("contains uppercase characters");
    }
    if !HOSTNAME_CHARS.is_match(slug) || slug.trim_matches([' ', '-', '.']) != slug {
        return Err("contains invalid characters, or has leading/trailing spaces, '-', or '.'");
    }
    Ok(())
}

pub fn validate_organization_slug(slug: &str) -> Result<()> {
    check_slug(slug).map_err(|reason| invalid("slug", slug, reason))
}

/// The id names a storage directory, so it shares the slug grammar.
pub fn validate_organization_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::MustBeDefined { field: "id" });
    }
    check_slug(id).map_err(|reason| invalid("id", id, reason))
}

pub fn validate_organization(organization: &Organization) -> Result<()> {
    validate_organization_id(organization.id())?;
    validate_organization_slug(organization.slug())?;
    validate_organization_name(organization.name())?;
    validate_organization_names(organization.names())
}
