use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    expiry::{self, Timestamp},
    models::{PackageInfo, PackageVulns},
};

/// Ignore and override rules that apply to one scan target.
///
/// Rule order is significant: every lookup returns the first entry that applies.
#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "IgnoredVulns")]
    pub ignored_vulns: Vec<IgnoreEntry>,
    #[serde(rename = "PackageOverrides")]
    pub package_overrides: Vec<PackageOverrideEntry>,
    /// Where this config was read from. `None` for the default config.
    #[serde(skip)]
    pub load_path: Option<PathBuf>,
    #[serde(rename = "GoVersionOverride")]
    pub go_version_override: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
pub struct IgnoreEntry {
    pub id: String,
    #[serde(
        rename = "ignoreUntil",
        default,
        deserialize_with = "expiry::deserialize_timestamp"
    )]
    pub ignore_until: Option<Timestamp>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct PackageOverrideEntry {
    pub name: String,
    // If the version is empty, the entry applies to all versions.
    pub version: String,
    pub ecosystem: String,
    pub group: String,
    pub ignore: bool,
    pub license: License,
    #[serde(
        rename = "effectiveUntil",
        deserialize_with = "expiry::deserialize_timestamp"
    )]
    pub effective_until: Option<Timestamp>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct License {
    pub r#override: Vec<String>,
}

impl PackageOverrideEntry {
    fn matches(&self, pkg: &PackageVulns) -> bool {
        let field_matches = |wanted: &str, actual: &str| wanted.is_empty() || wanted == actual;

        field_matches(&self.name, &pkg.package.name)
            && field_matches(&self.version, &pkg.package.version)
            && field_matches(&self.ecosystem, &pkg.package.ecosystem)
            && (self.group.is_empty() || pkg.dep_groups.contains(&self.group))
    }
}

impl Config {
    pub fn from_toml_str(document: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(document)
    }

    #[must_use]
    pub fn should_ignore(&self, vuln_id: &str) -> (bool, Option<&IgnoreEntry>) {
        self.should_ignore_at(vuln_id, Utc::now())
    }

    #[must_use]
    pub fn should_ignore_at(
        &self,
        vuln_id: &str,
        now: DateTime<Utc>,
    ) -> (bool, Option<&IgnoreEntry>) {
        let Some(entry) = self.ignored_vulns.iter().find(|e| e.id == vuln_id) else {
            return (false, None);
        };
        (expiry::is_in_effect(entry.ignore_until.as_ref(), now), Some(entry))
    }

    fn filter_package_entries<F>(
        &self,
        pkg: &PackageVulns,
        now: DateTime<Utc>,
        condition: F,
    ) -> (bool, Option<&PackageOverrideEntry>)
    where
        F: Fn(&PackageOverrideEntry) -> bool,
    {
        let Some(entry) = self
            .package_overrides
            .iter()
            .find(|e| e.matches(pkg) && condition(e))
        else {
            return (false, None);
        };
        (
            expiry::is_in_effect(entry.effective_until.as_ref(), now),
            Some(entry),
        )
    }

    /// Whether every finding against `pkg` should be suppressed.
    #[must_use]
    pub fn should_ignore_package(
        &self,
        pkg: &PackageVulns,
    ) -> (bool, Option<&PackageOverrideEntry>) {
        self.should_ignore_package_at(pkg, Utc::now())
    }

    #[must_use]
    pub fn should_ignore_package_at(
        &self,
        pkg: &PackageVulns,
        now: DateTime<Utc>,
    ) -> (bool, Option<&PackageOverrideEntry>) {
        self.filter_package_entries(pkg, now, |e| e.ignore)
    }

    /// Whether the detected licenses of `pkg` should be replaced by `license.override`.
    #[must_use]
    pub fn should_override_package_license(
        &self,
        pkg: &PackageVulns,
    ) -> (bool, Option<&PackageOverrideEntry>) {
        self.should_override_package_license_at(pkg, Utc::now())
    }

    #[must_use]
    pub fn should_override_package_license_at(
        &self,
        pkg: &PackageVulns,
        now: DateTime<Utc>,
    ) -> (bool, Option<&PackageOverrideEntry>) {
        self.filter_package_entries(pkg, now, |e| !e.license.r#override.is_empty())
    }

    #[deprecated(note = "use `should_ignore_package` instead")]
    #[must_use]
    pub fn should_ignore_package_version(
        &self,
        name: &str,
        version: &str,
        ecosystem: &str,
    ) -> (bool, Option<&PackageOverrideEntry>) {
        self.should_ignore_package(&synthetic_package(name, version, ecosystem))
    }

    #[deprecated(note = "use `should_override_package_license` instead")]
    #[must_use]
    pub fn should_override_package_version_license(
        &self,
        name: &str,
        version: &str,
        ecosystem: &str,
    ) -> (bool, Option<&PackageOverrideEntry>) {
        self.should_override_package_license(&synthetic_package(name, version, ecosystem))
    }
}

fn synthetic_package(name: &str, version: &str, ecosystem: &str) -> PackageVulns {
    PackageVulns {
        package: PackageInfo {
            name: name.to_owned(),
            version: version.to_owned(),
            ecosystem: ecosystem.to_owned(),
        },
        ..PackageVulns::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn in_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn ignore(id: &str, until: Option<&str>) -> IgnoreEntry {
        IgnoreEntry {
            id: id.to_owned(),
            ignore_until: until.map(|raw| expiry::parse_timestamp(raw).unwrap()),
            reason: format!("reason for {id}"),
        }
    }

    #[test]
    fn unknown_vulnerability_is_not_ignored() {
        let config = Config {
            ignored_vulns: vec![ignore("GHSA-1", None)],
            ..Config::default()
        };
        assert_eq!(config.should_ignore_at("GHSA-2", in_2025()), (false, None));
        assert_eq!(Config::default().should_ignore("GHSA-1"), (false, None));
    }

    #[test]
    fn unbounded_ignore_always_applies() {
        let config = Config {
            ignored_vulns: vec![ignore("CVE-1", None)],
            ..Config::default()
        };
        let (ignored, entry) = config.should_ignore("CVE-1");
        assert!(ignored);
        assert_eq!(entry, Some(&config.ignored_vulns[0]));
    }

    #[test]
    fn expired_ignore_still_reports_entry() {
        let config = Config {
            ignored_vulns: vec![ignore("CVE-1", Some("2020-01-01"))],
            ..Config::default()
        };
        let (ignored, entry) = config.should_ignore_at("CVE-1", in_2025());
        assert!(!ignored);
        assert_eq!(entry.map(|e| e.reason.as_str()), Some("reason for CVE-1"));
    }

    #[test]
    fn first_ignore_entry_governs() {
        let config = Config {
            ignored_vulns: vec![
                ignore("CVE-1", Some("2020-01-01T00:00:00Z")),
                ignore("CVE-1", None),
            ],
            ..Config::default()
        };
        let (ignored, entry) = config.should_ignore_at("CVE-1", in_2025());
        assert!(!ignored);
        assert_eq!(entry, Some(&config.ignored_vulns[0]));
    }

    #[test]
    fn group_must_be_present_on_package() {
        let config = Config {
            package_overrides: vec![PackageOverrideEntry {
                name: "foo".to_owned(),
                group: "dev".to_owned(),
                ignore: true,
                ..PackageOverrideEntry::default()
            }],
            ..Config::default()
        };

        let dev = PackageVulns::new("foo", "1.0.0", "npm").with_dep_groups(["dev", "test"]);
        let (ignored, entry) = config.should_ignore_package(&dev);
        assert!(ignored);
        assert_eq!(entry, Some(&config.package_overrides[0]));

        let test_only = PackageVulns::new("foo", "1.0.0", "npm").with_dep_groups(["test"]);
        assert_eq!(config.should_ignore_package(&test_only), (false, None));
    }

    #[test]
    fn empty_fields_are_wildcards() {
        let config = Config {
            package_overrides: vec![PackageOverrideEntry {
                name: "lib".to_owned(),
                ecosystem: "Go".to_owned(),
                ignore: true,
                ..PackageOverrideEntry::default()
            }],
            ..Config::default()
        };

        for version in ["1.0.0", "2.3.4", ""] {
            let pkg = PackageVulns::new("lib", version, "Go");
            assert!(config.should_ignore_package(&pkg).0, "version {version}");
        }
        assert!(!config.should_ignore_package(&PackageVulns::new("lib", "1.0.0", "npm")).0);
        assert!(!config.should_ignore_package(&PackageVulns::new("other", "1.0.0", "Go")).0);
    }

    #[test]
    fn first_matching_purpose_wins_over_later_specific_entry() {
        let config = Config {
            package_overrides: vec![
                PackageOverrideEntry {
                    name: "foo".to_owned(),
                    license: License {
                        r#override: vec!["MIT".to_owned()],
                    },
                    reason: "relicense".to_owned(),
                    ..PackageOverrideEntry::default()
                },
                PackageOverrideEntry {
                    name: "foo".to_owned(),
                    ignore: true,
                    reason: "broad".to_owned(),
                    ..PackageOverrideEntry::default()
                },
                PackageOverrideEntry {
                    name: "foo".to_owned(),
                    version: "1.0.0".to_owned(),
                    ecosystem: "npm".to_owned(),
                    ignore: true,
                    reason: "specific".to_owned(),
                    ..PackageOverrideEntry::default()
                },
            ],
            ..Config::default()
        };
        let pkg = PackageVulns::new("foo", "1.0.0", "npm");

        let (ignored, entry) = config.should_ignore_package(&pkg);
        assert!(ignored);
        assert_eq!(entry.map(|e| e.reason.as_str()), Some("broad"));

        let (overridden, entry) = config.should_override_package_license(&pkg);
        assert!(overridden);
        assert_eq!(entry.map(|e| e.reason.as_str()), Some("relicense"));
    }

    #[test]
    fn expired_override_is_not_applied() {
        let config = Config {
            package_overrides: vec![PackageOverrideEntry {
                name: "foo".to_owned(),
                ignore: true,
                effective_until: expiry::parse_timestamp("2025-03-01T12:00:00Z"),
                ..PackageOverrideEntry::default()
            }],
            ..Config::default()
        };
        let pkg = PackageVulns::new("foo", "1.0.0", "npm");
        let boundary = in_2025();

        assert!(
            config
                .should_ignore_package_at(&pkg, boundary - chrono::Duration::milliseconds(1))
                .0
        );
        let (ignored, entry) = config.should_ignore_package_at(&pkg, boundary);
        assert!(!ignored);
        assert!(entry.is_some());
    }

    #[test]
    #[expect(deprecated)]
    fn path_based_adapters_ignore_groups() {
        let config = Config {
            package_overrides: vec![
                PackageOverrideEntry {
                    name: "foo".to_owned(),
                    group: "dev".to_owned(),
                    ignore: true,
                    ..PackageOverrideEntry::default()
                },
                PackageOverrideEntry {
                    name: "bar".to_owned(),
                    version: "2.0.0".to_owned(),
                    license: License {
                        r#override: vec!["Apache-2.0".to_owned()],
                    },
                    ..PackageOverrideEntry::default()
                },
            ],
            ..Config::default()
        };

        assert!(!config.should_ignore_package_version("foo", "1.0.0", "npm").0);
        assert!(config.should_override_package_version_license("bar", "2.0.0", "crates.io").0);
        assert!(!config.should_override_package_version_license("bar", "2.0.1", "crates.io").0);
    }

    #[test]
    fn decodes_document() {
        let config = Config::from_toml_str(
            r#"
GoVersionOverride = "1.22.0"
LoadPath = "/somewhere/else"
SomethingNew = 3

[[IgnoredVulns]]
id = "GO-2022-0968"
ignoreUntil = 2022-11-09
reason = "No ssh servers are connected to or hosted in Go lang"

[[IgnoredVulns]]
id = "GO-2022-1059"
ignoreUntil = "2022-11-09T10:00:00Z"

[[IgnoredVulns]]
id = "GO-2022-0000"

[[PackageOverrides]]
name = "lib"
version = "1.0.0"
ecosystem = "Go"
ignore = true
effectiveUntil = 2022-11-09T01:00:00+01:00
reason = "abc"

[[PackageOverrides]]
name = "my-pkg"
license.override = ["MIT", "0BSD"]
"#,
        )
        .unwrap();

        assert_eq!(config.go_version_override, "1.22.0");
        assert_eq!(config.load_path, None);

        let ids: Vec<_> = config.ignored_vulns.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["GO-2022-0968", "GO-2022-1059", "GO-2022-0000"]);
        assert_eq!(
            config.ignored_vulns[1].ignore_until,
            expiry::parse_timestamp("2022-11-09T10:00:00Z")
        );
        assert!(config.ignored_vulns[0].ignore_until.is_some());
        assert_eq!(config.ignored_vulns[2].ignore_until, None);
        assert_eq!(config.ignored_vulns[2].reason, "");

        let lib = &config.package_overrides[0];
        assert!(lib.ignore);
        assert_eq!(
            lib.effective_until,
            expiry::parse_timestamp("2022-11-09T00:00:00Z")
        );
        let my_pkg = &config.package_overrides[1];
        assert!(!my_pkg.ignore);
        assert_eq!(my_pkg.license.r#override, ["MIT", "0BSD"]);
        assert_eq!(my_pkg.effective_until, None);
    }

    #[test]
    fn rejects_structurally_invalid_documents() {
        assert!(Config::from_toml_str("[[IgnoredVulns]]\nreason = \"no id\"").is_err());
        assert!(Config::from_toml_str("[[IgnoredVulns]]\nid = \"A\"\nignoreUntil = 5").is_err());
        assert!(
            Config::from_toml_str("[[IgnoredVulns]]\nid = \"A\"\nignoreUntil = \"soon\"").is_err()
        );
        assert!(Config::from_toml_str("IgnoredVulns = [").is_err());
    }
}
