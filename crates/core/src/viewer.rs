//! The identity a request browses as.

use std::collections::HashMap;

use crate::acl::{AclEngine, PartAccessRules};
use crate::settings::Settings;
use crate::types::ANONYMOUS;

/// User, language and part allow-lists of one request. Built once per
/// request and shared by every node it touches.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub username: Option<String>,
    pub language: String,
    part_access: HashMap<String, PartAccessRules>,
}

impl Viewer {
    /// A viewer with no part access in any data source.
    pub fn new(username: Option<String>, language: impl Into<String>) -> Self {
        Self {
            username,
            language: language.into(),
            part_access: HashMap::new(),
        }
    }

    /// Build a viewer, reading the users file of every data source.
    pub fn load(settings: &Settings, username: Option<String>, language: impl Into<String>) -> Self {
        let part_access = AclEngine::new(settings).part_access(username.as_deref());
        Self {
            username,
            language: language.into(),
            part_access,
        }
    }

    pub fn with_part_access(mut self, ds_name: &str, rules: PartAccessRules) -> Self {
        self.part_access.insert(ds_name.to_string(), rules);
        self
    }

    /// Username, or `anonymous`.
    pub fn identity(&self) -> &str {
        self.username.as_deref().unwrap_or(ANONYMOUS)
    }

    pub fn part_type_allowed(&self, ds_name: &str, part_type: &str) -> bool {
        self.part_access
            .get(ds_name)
            .is_some_and(|rules| rules.allows(part_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DataSource;

    #[test]
    fn loads_rules_per_data_source() {
        let tmp = tempfile::tempdir().unwrap();
        let ds1 = tmp.path().join("ds1");
        let ds2 = tmp.path().join("ds2");
        std::fs::create_dir_all(ds1.join("0000-index")).unwrap();
        std::fs::create_dir_all(&ds2).unwrap();
        std::fs::write(ds1.join("0000-index/users.ini"), "[alice]\nparts = prt\n").unwrap();

        let settings = Settings::with_data_sources(vec![
            DataSource::new("ds1", &ds1),
            DataSource::new("ds2", &ds2),
        ]);

        let alice = Viewer::load(&settings, Some("alice".into()), "en");
        assert_eq!(alice.identity(), "alice");
        assert!(alice.part_type_allowed("ds1", "prt"));
        assert!(!alice.part_type_allowed("ds2", "prt"));
        assert!(!alice.part_type_allowed("unknown", "prt"));

        let anon = Viewer::load(&settings, None, "en");
        assert_eq!(anon.identity(), ANONYMOUS);
        assert!(!anon.part_type_allowed("ds1", "prt"));
    }
}
