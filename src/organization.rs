// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-]+").expect("invalid slug regex"));

/// A tenant owning one certificate hierarchy.
///
/// `names` is never empty in a validated organization; the first entry is
/// the primary display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OrganizationFile", into = "OrganizationFile")]
pub struct Organization {
    id: String,
    slug: String,
    names: Vec<String>,
}

impl Organization {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            names,
        }
    }

    /// Build an organization whose slug is derived from its id.
    pub fn with_names(id: impl Into<String>, names: Vec<String>) -> Self {
        let id = id.into();
        let slug = slugify(&id);
        Self::new(id, slug, names)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Primary name, or an empty string when no names are set.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// On-disk shape of `organization.json`.
#[derive(Serialize, Deserialize)]
struct OrganizationFile {
    id: String,
    slug: String,
    name: String,
    #[serde(rename = "allNames")]
    all_names: Vec<String>,
}

impl From<Organization> for OrganizationFile {
    fn from(org: Organization) -> Self {
        Self {
            name: org.name().to_string(),
            id: org.id,
            slug: org.slug,
            all_names: org.names,
        }
    }
}

impl From<OrganizationFile> for Organization {
    fn from(file: OrganizationFile) -> Self {
        let names = if file.all_names.is_empty() && !file.name.is_empty() {
            vec![file.name]
        } else {
            file.all_names
        };
        Self::new(file.id, file.slug, names)
    }
}

/// Lowercase, turn spaces into `-` and drop anything outside `[a-z0-9-]`.
pub fn slugify(s: &str) -> String {
    let lower = s.to_lowercase().replace(' ', "-");
    NON_SLUG_CHARS.replace_all(&lower, "").into_owned()
}
