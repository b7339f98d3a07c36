//! Directory ACLs, per-user part-type allow-lists and users-file credentials.
//!
//! Directory ACL (`<dir>/<metadata_dir>/<acl_file>`):
//!
//! ```ini
//! [allow]
//! users = alice, bob
//! ```
//!
//! Users file (`<root>/<metadata_dir>/<users_file>`), one section per user:
//!
//! ```ini
//! [alice]
//! source = internal
//! password = $argon2id$v=19$...
//! parts = prt, asm
//!
//! [anonymous]
//! parts = pdf
//! ```
//!
//! Usernames and part types compare case-insensitively.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::ini_file::{ConfigFile, ConfigRead};
use crate::paths::ResolvedPath;
use crate::settings::{split_list, DataSource, Settings};
use crate::types::ANONYMOUS;

pub const SECTION_ALLOW: &str = "allow";
pub const KEY_USERS: &str = "users";
pub const KEY_SOURCE: &str = "source";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_PARTS: &str = "parts";

pub const SOURCE_INTERNAL: &str = "internal";

/// Part-type wildcard in a `parts` list.
pub const ALL_PARTS: &str = "@all";

// ---------------------------------------------------------------------------
// Directory ACL
// ---------------------------------------------------------------------------

/// The effective rule of one directory's ACL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclRule {
    /// No ACL file, or no `users` restriction.
    Open,
    /// Only these (lower-cased) users.
    Users(Vec<String>),
    /// The file exists but could not be parsed.
    Denied,
}

impl AclRule {
    pub fn permits(&self, username: Option<&str>) -> bool {
        match self {
            Self::Open => true,
            Self::Denied => false,
            Self::Users(users) => match username {
                None => false,
                Some(name) => users.iter().any(|u| u.eq_ignore_ascii_case(name)),
            },
        }
    }
}

#[derive(Debug)]
pub struct Acl {
    path: PathBuf,
}

impl Acl {
    pub fn for_directory(settings: &Settings, dir: &Path) -> Self {
        Self {
            path: dir.join(&settings.metadata_dir).join(&settings.acl_file),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn rule(&self) -> AclRule {
        match ConfigFile::read(&self.path) {
            ConfigRead::Missing => AclRule::Open,
            ConfigRead::Unparsable(error) => {
                tracing::warn!(path = %self.path.display(), %error, "Unparsable ACL file, denying access");
                AclRule::Denied
            }
            ConfigRead::Parsed(config) => match config
                .section(SECTION_ALLOW)
                .and_then(|s| s.get(KEY_USERS))
            {
                Some(users) => AclRule::Users(split_list(users)),
                None => AclRule::Open,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Part access rules
// ---------------------------------------------------------------------------

/// Part types one user may access in one data source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartAccessRules {
    all: bool,
    types: HashSet<String>,
}

impl PartAccessRules {
    pub fn from_list(value: &str) -> Self {
        let mut rules = Self::default();
        for entry in split_list(value) {
            if entry == ALL_PARTS {
                rules.all = true;
            } else {
                rules.types.insert(entry);
            }
        }
        rules
    }

    pub fn allows(&self, part_type: &str) -> bool {
        self.all || self.types.contains(&part_type.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Users file
// ---------------------------------------------------------------------------

/// How a user's password is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Stored password: plaintext or an Argon2 PHC string.
    Internal { password: String },
    /// Delegated to an [`ExternalAuthenticator`] (e.g. `pam`).
    External { source: String },
}

#[derive(Debug, Default)]
pub struct UsersFile {
    config: Option<ConfigFile>,
}

impl UsersFile {
    pub fn path(settings: &Settings, ds: &DataSource) -> PathBuf {
        ds.root.join(&settings.metadata_dir).join(&settings.users_file)
    }

    pub fn load(settings: &Settings, ds: &DataSource) -> Self {
        let path = Self::path(settings, ds);
        match ConfigFile::read(&path) {
            ConfigRead::Parsed(config) => Self {
                config: Some(config),
            },
            ConfigRead::Missing => Self::default(),
            ConfigRead::Unparsable(error) => {
                tracing::warn!(ds = %ds.name, path = %path.display(), %error, "Unparsable users file");
                Self::default()
            }
        }
    }

    pub fn parse_str(source: &str) -> Result<Self, String> {
        Ok(Self {
            config: Some(ConfigFile::parse_str(source)?),
        })
    }

    /// Credential of `username`, if the file defines one.
    pub fn credential(&self, username: &str) -> Option<Credential> {
        let section = self.config.as_ref()?.section(username)?;
        let source = section
            .get(KEY_SOURCE)
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| SOURCE_INTERNAL.to_string());

        if source == SOURCE_INTERNAL {
            section.get(KEY_PASSWORD).map(|p| Credential::Internal {
                password: p.to_string(),
            })
        } else {
            Some(Credential::External { source })
        }
    }

    /// Allow-list of `username`, or of `anonymous` when `None`.
    pub fn part_access(&self, username: Option<&str>) -> PartAccessRules {
        let identity = username.unwrap_or(ANONYMOUS);
        self.config
            .as_ref()
            .and_then(|c| c.section(identity))
            .and_then(|s| s.get(KEY_PARTS))
            .map(PartAccessRules::from_list)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Authentication boundary
// ---------------------------------------------------------------------------

/// Password check for users whose `source` is not `internal`.
pub trait ExternalAuthenticator: Send + Sync {
    fn authenticate(&self, source: &str, username: &str, password: &str) -> bool;
}

/// Rejects every external login.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExternalAuth;

impl ExternalAuthenticator for NoExternalAuth {
    fn authenticate(&self, source: &str, username: &str, _password: &str) -> bool {
        tracing::warn!(source, username, "No authenticator configured for password source");
        false
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AclEngine<'a> {
    settings: &'a Settings,
}

impl<'a> AclEngine<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// The directory's own ACL, ignoring its ancestors.
    pub fn directory_accessible(&self, dir: &Path, username: Option<&str>) -> bool {
        Acl::for_directory(self.settings, dir)
            .rule()
            .permits(username)
    }

    /// Whether `dir` and every ancestor up to the data source root are
    /// accessible.
    pub fn subtree_accessible(&self, dir: &ResolvedPath, username: Option<&str>) -> bool {
        let mut current = dir.data_source.root.clone();
        if !self.directory_accessible(&current, username) {
            return false;
        }
        for segment in dir.full_path.split('/').filter(|s| !s.is_empty()) {
            current.push(segment);
            if !self.directory_accessible(&current, username) {
                tracing::debug!(
                    ds = %dir.data_source.name,
                    path = %dir.full_path,
                    denied_at = %current.display(),
                    "Directory hidden by ACL",
                );
                return false;
            }
        }
        true
    }

    /// Part access rules of `username` for every data source.
    pub fn part_access(&self, username: Option<&str>) -> HashMap<String, PartAccessRules> {
        self.settings
            .data_sources
            .values()
            .map(|ds| {
                let rules = UsersFile::load(self.settings, ds).part_access(username);
                (ds.name.clone(), rules)
            })
            .collect()
    }

    /// Check a login against the users files of every auth-enabled data
    /// source; the first data source that defines the user decides. The
    /// reserved `anonymous` section can never log in.
    ///
    /// `verify_internal(stored, candidate)` checks internal passwords.
    pub fn authenticate<F>(
        &self,
        username: &str,
        password: &str,
        verify_internal: F,
        external: &dyn ExternalAuthenticator,
    ) -> bool
    where
        F: Fn(&str, &str) -> bool,
    {
        if username.eq_ignore_ascii_case(ANONYMOUS) {
            tracing::debug!(username, "Login as reserved user refused");
            return false;
        }
        for ds in self.settings.auth_sources() {
            let Some(credential) = UsersFile::load(self.settings, ds).credential(username) else {
                continue;
            };
            let ok = match &credential {
                Credential::Internal { password: stored } => verify_internal(stored, password),
                Credential::External { source } => {
                    external.authenticate(source, username, password)
                }
            };
            tracing::debug!(ds = %ds.name, username, ok, "Users file login attempt");
            return ok;
        }
        false
    }
}
