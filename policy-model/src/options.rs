//! Free-form option tables attached to firewalls and rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named boolean/string/integer options controlling platform-specific
/// behavior (`pix_acl_substitution`, `use_nat_0_0`, ...). Absent booleans
/// read as `false`, matching how the original option objects behave.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    bools: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    strings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    ints: BTreeMap<String, i64>,
}

impl Options {
    pub fn get_bool(&self, name: &str) -> bool {
        self.bools.get(name).copied().unwrap_or(false)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.ints.get(name).copied()
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.bools.insert(name.into(), value);
    }

    pub fn set_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(name.into(), value.into());
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.ints.insert(name.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::Options;

    #[test]
    fn absent_bool_reads_false() {
        let opts = Options::default();
        assert!(!opts.get_bool("pix_acl_substitution"));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut opts = Options::default();
        opts.set_bool("use_nat_0_0", true);
        opts.set_int("pix_max_conns", -1);
        opts.set_str("itf", "inside");
        assert!(opts.get_bool("use_nat_0_0"));
        assert_eq!(opts.get_int("pix_max_conns"), Some(-1));
        assert_eq!(opts.get_str("itf"), Some("inside"));
    }
}
