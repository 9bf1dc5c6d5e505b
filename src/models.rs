use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub ecosystem: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Vulnerability {
    /// The id followed by every alias.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// A package found by the scanner together with everything reported against it.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageVulns {
    pub package: PackageInfo,
    #[serde(default)]
    pub dep_groups: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(default)]
    pub licenses: Vec<String>,
}

impl PackageVulns {
    pub fn new<N, V, E>(name: N, version: V, ecosystem: E) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        E: Into<String>,
    {
        Self {
            package: PackageInfo {
                name: name.into(),
                version: version.into(),
                ecosystem: ecosystem.into(),
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dep_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dep_groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Packages extracted from one scanned path (a lockfile, manifest or directory).
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageSource {
    pub path: PathBuf,
    pub packages: Vec<PackageVulns>,
}
