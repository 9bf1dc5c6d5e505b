//! Applies resolved configs to scan results.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rayon::prelude::*;

use crate::{
    config::Config,
    models::{PackageSource, PackageVulns},
    reporter::Reporter,
    ConfigManager,
};

/// Removes ignored packages and vulnerabilities from every source and applies license
/// overrides, resolving the config for each source path through `manager`.
///
/// Returns the number of vulnerabilities removed.
pub fn filter_results(
    manager: &ConfigManager,
    reporter: &dyn Reporter,
    sources: &mut [PackageSource],
) -> usize {
    let now = Utc::now();
    sources
        .par_iter_mut()
        .map(|source| {
            let config = manager.get(reporter, &source.path);
            filter_packages(&config, reporter, &mut source.packages, now)
        })
        .sum()
}

/// Filters one source's packages against `config` as of `now`.
pub fn filter_packages(
    config: &Config,
    reporter: &dyn Reporter,
    packages: &mut Vec<PackageVulns>,
    now: DateTime<Utc>,
) -> usize {
    let mut removed = 0;
    packages.retain_mut(|pkg| {
        if let (true, Some(entry)) = config.should_ignore_package_at(pkg, now) {
            reporter.info(&format!(
                "Package {}/{}/{} has been filtered out because: {}",
                pkg.package.ecosystem, pkg.package.name, pkg.package.version, entry.reason
            ));
            removed += pkg.vulnerabilities.len();
            return false;
        }

        if let (true, Some(entry)) = config.should_override_package_license_at(pkg, now) {
            pkg.licenses.clone_from(&entry.license.r#override);
            reporter.info(&format!(
                "Overriding license for package {}/{}/{} with {}",
                pkg.package.ecosystem,
                pkg.package.name,
                pkg.package.version,
                entry.license.r#override.iter().join(", ")
            ));
        }

        let had_vulns = !pkg.vulnerabilities.is_empty();
        let mut ignored = Vec::new();
        pkg.vulnerabilities.retain(|vuln| {
            match vuln.ids().find(|id| config.should_ignore_at(id, now).0) {
                Some(id) => {
                    ignored.push(id.to_owned());
                    false
                }
                None => true,
            }
        });
        if !ignored.is_empty() {
            reporter.info(&format!(
                "{} vulnerabilities have been filtered out for {}: {}",
                ignored.len(),
                pkg.package.name,
                ignored.iter().join(", ")
            ));
            removed += ignored.len();
        }

        !had_vulns || !pkg.vulnerabilities.is_empty()
    });
    removed
}
