// Licensed under the Apache-2.0 license

//! `/etc/os-release` parsing for version assertions.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Parsed `/etc/os-release` contents.
#[derive(Debug, Clone, PartialEq)]
pub struct OsRelease {
    fields: BTreeMap<String, String>,
}

impl OsRelease {
    pub fn parse(contents: &str) -> Self {
        let mut fields = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                fields.insert(key.trim().to_string(), value.to_string());
            }
        }
        OsRelease { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("NAME")
    }

    pub fn version(&self) -> Result<&str> {
        self.get("VERSION").context("os-release has no VERSION")
    }

    /// VERSION as semver; a leading `v` and a `+revN` suffix are accepted.
    pub fn semver(&self) -> Result<semver::Version> {
        let raw = self.version()?;
        let trimmed = raw.trim_start_matches('v');
        semver::Version::parse(trimmed)
            .with_context(|| format!("os-release VERSION '{raw}' is not semver"))
    }
}
