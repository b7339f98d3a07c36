//! Immutable process-wide settings: the data source registry, reserved file
//! names inside data directories, and the global part-type filter.
//!
//! Loaded once at startup (see [`Settings::from_env`]) and shared behind an
//! `Arc`; nothing mutates it afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Reserved per-directory subdirectory holding metadata, ACL and icons.
pub const DEFAULT_METADATA_DIR: &str = "0000-index";
pub const DEFAULT_METADATA_FILE: &str = "metadata.ini";
pub const DEFAULT_USERS_FILE: &str = "users.ini";
pub const DEFAULT_ACL_FILE: &str = "acl.ini";
pub const DEFAULT_DIR_ICON: &str = "logo.png";
pub const DEFAULT_DIR_TEXT_ICON: &str = "logo-text.png";
pub const DEFAULT_THUMBNAIL_DIR: &str = "thumbnails";
pub const DEFAULT_DOWNLOAD_ROOT: &str = "./downloads";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_STATIC_PREFIX: &str = "/static";
pub const DEFAULT_BROWSE_PREFIX: &str = "/browse";

/// Directory cache entries live this long unless invalidated.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default rendered thumbnail size in pixels (width, height).
pub const DEFAULT_THUMBNAIL_SIZE: (u32, u32) = (120, 120);

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

/// A named, rooted filesystem tree of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub name: String,
    /// Absolute root directory.
    pub root: PathBuf,
    /// Public URL the root is served under, if it is served directly.
    pub static_url: Option<String>,
    /// Whether this data source's users file may authenticate logins.
    pub auth: bool,
}

impl DataSource {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            static_url: None,
            auth: true,
        }
    }
}

/// Parse a `name=/abs/path;other=/abs/path` data source list.
///
/// Names are limited to `[A-Za-z0-9_-]` because they appear in URLs.
pub fn parse_data_sources(spec: &str) -> Result<Vec<DataSource>, CoreError> {
    let mut out = Vec::new();

    for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, path) = entry.split_once('=').ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid data source entry '{entry}'. Expected name=/absolute/path"
            ))
        })?;
        let name = name.trim();
        let path = path.trim();

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::Validation(format!(
                "Invalid data source name '{name}'"
            )));
        }

        let root = PathBuf::from(path);
        if !root.is_absolute() {
            return Err(CoreError::Validation(format!(
                "Data source '{name}' root must be absolute, got '{path}'"
            )));
        }

        if out.iter().any(|ds: &DataSource| ds.name == name) {
            return Err(CoreError::Validation(format!(
                "Data source '{name}' is defined twice"
            )));
        }

        out.push(DataSource::new(name, root));
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_sources: BTreeMap<String, Arc<DataSource>>,
    pub metadata_dir: String,
    pub metadata_file: String,
    pub users_file: String,
    pub acl_file: String,
    pub dir_icon: String,
    pub dir_text_icon: String,
    pub thumbnail_dir: String,
    /// Global part-type filter (lower-cased). `None` lists every file.
    pub part_types: Option<Vec<String>>,
    /// Where built archives are written.
    pub download_root: PathBuf,
    pub cache_ttl: Duration,
    pub default_language: String,
    /// Prefix for static URLs of data sources without their own `static_url`.
    pub static_prefix: String,
    /// Prefix of directory URLs in the tree JSON.
    pub browse_prefix: String,
    pub thumbnail_size: (u32, u32),
}

impl Settings {
    /// Settings with every knob at its default and the given data sources.
    pub fn with_data_sources(data_sources: Vec<DataSource>) -> Self {
        Self {
            data_sources: data_sources
                .into_iter()
                .map(|ds| (ds.name.clone(), Arc::new(ds)))
                .collect(),
            metadata_dir: DEFAULT_METADATA_DIR.to_string(),
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            users_file: DEFAULT_USERS_FILE.to_string(),
            acl_file: DEFAULT_ACL_FILE.to_string(),
            dir_icon: DEFAULT_DIR_ICON.to_string(),
            dir_text_icon: DEFAULT_DIR_TEXT_ICON.to_string(),
            thumbnail_dir: DEFAULT_THUMBNAIL_DIR.to_string(),
            part_types: None,
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_ROOT),
            cache_ttl: DEFAULT_CACHE_TTL,
            default_language: DEFAULT_LANGUAGE.to_string(),
            static_prefix: DEFAULT_STATIC_PREFIX.to_string(),
            browse_prefix: DEFAULT_BROWSE_PREFIX.to_string(),
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }

    /// Load settings from environment variables.
    ///
    /// | Env Var                          | Default         |
    /// |----------------------------------|-----------------|
    /// | `DATA_SOURCES`                   | **required**    |
    /// | `DATA_SOURCE_<NAME>_STATIC_URL`  | --              |
    /// | `DATA_SOURCE_<NAME>_AUTH`        | `true`          |
    /// | `METADATA_DIR`                   | `0000-index`    |
    /// | `METADATA_FILE`                  | `metadata.ini`  |
    /// | `USERS_FILE`                     | `users.ini`     |
    /// | `ACL_FILE`                       | `acl.ini`       |
    /// | `DIR_ICON`                       | `logo.png`      |
    /// | `DIR_TEXT_ICON`                  | `logo-text.png` |
    /// | `THUMBNAIL_DIR`                  | `thumbnails`    |
    /// | `PART_TYPES`                     | -- (no filter)  |
    /// | `DOWNLOAD_ROOT`                  | `./downloads`   |
    /// | `DIRECTORY_CACHE_TTL_SECS`       | `60`            |
    /// | `DEFAULT_LANGUAGE`               | `en`            |
    /// | `STATIC_PREFIX`                  | `/static`       |
    /// | `BROWSE_PREFIX`                  | `/browse`       |
    /// | `THUMBNAIL_WIDTH` / `_HEIGHT`    | `120` / `120`   |
    ///
    /// # Panics
    ///
    /// Panics if `DATA_SOURCES` is missing or malformed, or a numeric
    /// variable does not parse. Misconfiguration should fail fast.
    pub fn from_env() -> Self {
        let spec = std::env::var("DATA_SOURCES").expect("DATA_SOURCES must be set");
        let mut data_sources =
            parse_data_sources(&spec).unwrap_or_else(|e| panic!("Invalid DATA_SOURCES: {e}"));
        assert!(!data_sources.is_empty(), "DATA_SOURCES must not be empty");

        for ds in &mut data_sources {
            let env_name = ds.name.to_ascii_uppercase().replace('-', "_");
            ds.static_url = std::env::var(format!("DATA_SOURCE_{env_name}_STATIC_URL")).ok();
            ds.auth = std::env::var(format!("DATA_SOURCE_{env_name}_AUTH"))
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true);
        }

        let mut settings = Self::with_data_sources(data_sources);

        let string_var = |name: &str, default: &str| -> String {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        let u64_var = |name: &str, default: u64| -> u64 {
            std::env::var(name)
                .ok()
                .map(|v| {
                    v.parse()
                        .unwrap_or_else(|_| panic!("{name} must be a valid u64"))
                })
                .unwrap_or(default)
        };

        settings.metadata_dir = string_var("METADATA_DIR", DEFAULT_METADATA_DIR);
        settings.metadata_file = string_var("METADATA_FILE", DEFAULT_METADATA_FILE);
        settings.users_file = string_var("USERS_FILE", DEFAULT_USERS_FILE);
        settings.acl_file = string_var("ACL_FILE", DEFAULT_ACL_FILE);
        settings.dir_icon = string_var("DIR_ICON", DEFAULT_DIR_ICON);
        settings.dir_text_icon = string_var("DIR_TEXT_ICON", DEFAULT_DIR_TEXT_ICON);
        settings.thumbnail_dir = string_var("THUMBNAIL_DIR", DEFAULT_THUMBNAIL_DIR);
        settings.part_types = std::env::var("PART_TYPES").ok().map(|v| split_list(&v));
        settings.download_root = PathBuf::from(string_var("DOWNLOAD_ROOT", DEFAULT_DOWNLOAD_ROOT));
        settings.cache_ttl = Duration::from_secs(u64_var(
            "DIRECTORY_CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL.as_secs(),
        ));
        settings.default_language = string_var("DEFAULT_LANGUAGE", DEFAULT_LANGUAGE);
        settings.static_prefix = string_var("STATIC_PREFIX", DEFAULT_STATIC_PREFIX);
        settings.browse_prefix = string_var("BROWSE_PREFIX", DEFAULT_BROWSE_PREFIX);
        settings.thumbnail_size = (
            u64_var("THUMBNAIL_WIDTH", DEFAULT_THUMBNAIL_SIZE.0 as u64) as u32,
            u64_var("THUMBNAIL_HEIGHT", DEFAULT_THUMBNAIL_SIZE.1 as u64) as u32,
        );

        settings
    }

    /// Look up a data source by name.
    pub fn data_source(&self, name: &str) -> Option<&Arc<DataSource>> {
        self.data_sources.get(name)
    }

    /// Data sources whose users files may authenticate logins.
    pub fn auth_sources(&self) -> impl Iterator<Item = &Arc<DataSource>> {
        self.data_sources.values().filter(|ds| ds.auth)
    }

    /// Public URL of a file inside a data source. Uses the data source's own
    /// `static_url` when set, else `<static_prefix>/ds/<name>/<path>`.
    pub fn static_url(&self, ds: &DataSource, path: &str) -> String {
        let path = path.trim_start_matches('/');
        match &ds.static_url {
            Some(base) => format!("{}/{path}", base.trim_end_matches('/')),
            None => format!(
                "{}/ds/{}/{path}",
                self.static_prefix.trim_end_matches('/'),
                ds.name
            ),
        }
    }

    /// Whether the global part-type filter lets `part_type` through.
    pub fn part_type_listed(&self, part_type: &str) -> bool {
        match &self.part_types {
            None => true,
            Some(types) => types.iter().any(|t| t.eq_ignore_ascii_case(part_type)),
        }
    }
}

/// Split a comma-separated list, trimming and lower-casing entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
