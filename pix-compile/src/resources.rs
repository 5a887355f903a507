//! Read-only lookup of version-specific command fragments.
//!
//! The compiler never hardcodes commands whose spelling changed across
//! software versions; it asks this table instead, keyed by platform,
//! version, and option name. A built-in table covers the supported
//! PIX/FWSM versions; a TOML file can override or extend it:
//!
//! ```toml
//! [pix."8.0"]
//! clear_acl = "clear configure access-list"
//! ```
//!
//! Lookup picks the entry with the highest version not above the firewall's
//! version, so "6.3(4)" resolves through the "6.3" entry. A key with no
//! applicable entry fails the compilation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use policy_model::Version;

use crate::error::CompileError;

type VersionTable = Vec<(Version, BTreeMap<String, String>)>;

/// The platform/version → command-fragment table.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    platforms: BTreeMap<String, VersionTable>,
}

impl Resources {
    /// The built-in table for PIX and FWSM targets.
    pub fn builtin() -> Self {
        let mut res = Resources::default();
        res.insert("pix", "6.1", "clear_acl", "no access-list");
        res.insert("pix", "6.3", "clear_acl", "clear access-list");
        res.insert("pix", "7.0", "clear_acl", "clear configure access-list");
        // FWSM numbers its releases independently of PIX.
        res.insert("fwsm", "2.3", "clear_acl", "clear access-list");
        res.insert("fwsm", "4.0", "clear_acl", "clear configure access-list");
        res
    }

    fn insert(&mut self, platform: &str, version: &str, key: &str, value: &str) {
        let version: Version = version.parse().unwrap_or_else(|_| {
            unreachable!("built-in resource versions are compiled-in literals")
        });
        let table = self.platforms.entry(platform.to_string()).or_default();
        match table.iter_mut().find(|(v, _)| *v == version) {
            Some((_, entries)) => {
                entries.insert(key.to_string(), value.to_string());
            }
            None => {
                let mut entries = BTreeMap::new();
                entries.insert(key.to_string(), value.to_string());
                table.push((version, entries));
                table.sort_by(|(a, _), (b, _)| a.cmp(b));
            }
        }
    }

    /// Merge overrides from a TOML file on top of this table.
    pub fn load_overrides(&mut self, path: &Path) -> Result<(), CompileError> {
        let text = fs::read_to_string(path)
            .map_err(|e| CompileError::ResourceOverrides(format!("{}: {e}", path.display())))?;
        let parsed: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>> =
            toml::from_str(&text)
                .map_err(|e| CompileError::ResourceOverrides(format!("{}: {e}", path.display())))?;
        for (platform, versions) in parsed {
            for (version, entries) in versions {
                version.parse::<Version>().map_err(|e| {
                    CompileError::ResourceOverrides(format!("{}: {e}", path.display()))
                })?;
                for (key, value) in entries {
                    self.insert(&platform, &version, &key, &value);
                }
            }
        }
        Ok(())
    }

    /// Resolve `key` for the given platform at the given version.
    pub fn lookup(
        &self,
        platform: &str,
        version: &Version,
        key: &str,
    ) -> Result<&str, CompileError> {
        let missing = || CompileError::MissingResource {
            platform: platform.to_string(),
            version: version.to_string(),
            key: key.to_string(),
        };
        let table = self.platforms.get(platform).ok_or_else(missing)?;
        table
            .iter()
            .rev()
            .filter(|(v, _)| v <= version)
            .find_map(|(_, entries)| entries.get(key))
            .map(String::as_str)
            .ok_or_else(missing)
    }
}
