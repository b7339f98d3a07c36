//! Directory metadata: display label, column schema, per-part annotations and
//! thumbnail search paths.
//!
//! Each directory may carry `<metadata_dir>/<metadata_file>` in this schema:
//!
//! ```ini
//! [directory]
//! label = Gears
//! label/de = Zahnräder
//! include = ../common
//! include_parameters = /shared
//! include_thumbnails = ../images
//!
//! [parameters]
//! diameter.label = Diameter
//! diameter.label/de = Durchmesser
//! diameter.type = number
//!
//! [part:gear-12]
//! diameter = 12
//! material/de = Stahl
//! ```
//!
//! Includes name other directories of the same data source, relative to the
//! including directory or absolute from the data source root. `include`
//! pulls in both parameters and thumbnails, the other two keys one of them.
//! Included definitions are merged first and local ones override them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::ini_file::{select_language, ConfigFile, ConfigRead};
use crate::paths::{self, ResolvedPath};
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const SECTION_DIRECTORY: &str = "directory";
pub const SECTION_PARAMETERS: &str = "parameters";
pub const PART_SECTION_PREFIX: &str = "part:";

pub const KEY_LABEL: &str = "label";
pub const KEY_TYPE: &str = "type";
pub const KEY_INCLUDE: &str = "include";
pub const KEY_INCLUDE_PARAMETERS: &str = "include_parameters";
pub const KEY_INCLUDE_THUMBNAILS: &str = "include_thumbnails";

/// Image extensions recognised as part thumbnails.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Link,
}

impl ColumnType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "link" => Some(Self::Link),
            _ => None,
        }
    }
}

/// A display column of a directory's part table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub handle: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// `part base name -> column handle -> value`.
pub type PartsData = HashMap<String, HashMap<String, String>>;

/// A directory holding part thumbnails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailDir {
    pub absolute: PathBuf,
    /// Path relative to the data source root.
    pub relative: String,
}

/// Everything a directory node needs from its metadata, includes resolved.
#[derive(Debug, Clone, Default)]
pub struct DirectoryMetadata {
    pub label: Option<String>,
    pub columns: Vec<Column>,
    pub parts: PartsData,
    /// Search order for thumbnails; the directory's own folder comes first.
    pub thumbnail_dirs: Vec<ThumbnailDir>,
}

// ---------------------------------------------------------------------------
// Single metadata file
// ---------------------------------------------------------------------------

/// The metadata file of one directory, without includes.
#[derive(Debug)]
pub struct Metadata {
    path: PathBuf,
    language: String,
    config: Option<ConfigFile>,
}

impl Metadata {
    pub fn for_directory(settings: &Settings, dir: &Path, language: &str) -> Self {
        Self {
            path: dir.join(&settings.metadata_dir).join(&settings.metadata_file),
            language: language.to_string(),
            config: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parse the file. Returns `false` when it is missing, unparsable, or
    /// has neither a `[directory]` nor a `[parameters]` section.
    pub fn parse(&mut self) -> bool {
        match ConfigFile::read(&self.path) {
            ConfigRead::Parsed(config) => {
                let recognised = config.has_section(SECTION_DIRECTORY)
                    || config.has_section(SECTION_PARAMETERS);
                if !recognised {
                    tracing::debug!(path = %self.path.display(), "Metadata file has no schema section");
                    return false;
                }
                self.config = Some(config);
                true
            }
            ConfigRead::Unparsable(error) => {
                tracing::warn!(path = %self.path.display(), %error, "Ignoring unparsable metadata file");
                false
            }
            ConfigRead::Missing => false,
        }
    }

    pub fn label(&self) -> Option<String> {
        self.config
            .as_ref()?
            .section(SECTION_DIRECTORY)?
            .localized(KEY_LABEL, &self.language)
            .map(str::to_string)
    }

    /// Columns in declaration order.
    ///
    /// Keys are `<handle>.label[/lang]` and `<handle>.type`; a bare
    /// `<handle>[/lang] = Label` is shorthand for the label.
    pub fn columns(&self) -> Vec<Column> {
        let Some(section) = self
            .config
            .as_ref()
            .and_then(|c| c.section(SECTION_PARAMETERS))
        else {
            return Vec::new();
        };

        let mut labels: IndexMap<&str, Vec<(Option<&str>, &str)>> = IndexMap::new();
        let mut types: HashMap<&str, &str> = HashMap::new();

        for entry in &section.entries {
            let (handle, attribute) = match entry.key.rsplit_once('.') {
                Some((handle, attr)) if attr == KEY_LABEL || attr == KEY_TYPE => (handle, attr),
                _ => (entry.key.as_str(), KEY_LABEL),
            };

            let slot = labels.entry(handle).or_default();
            if attribute == KEY_TYPE {
                types.insert(handle, entry.value.as_str());
            } else {
                slot.push((entry.language.as_deref(), entry.value.as_str()));
            }
        }

        labels
            .into_iter()
            .map(|(handle, variants)| {
                let label = select_language(variants, &self.language)
                    .unwrap_or(handle)
                    .to_string();
                let column_type = match types.get(handle) {
                    None => ColumnType::Text,
                    Some(name) => ColumnType::from_name(name).unwrap_or_else(|| {
                        tracing::warn!(handle, column_type = %name, "Unknown column type, using text");
                        ColumnType::Text
                    }),
                };
                Column {
                    handle: handle.to_string(),
                    label,
                    column_type,
                }
            })
            .collect()
    }

    pub fn parts_data(&self) -> PartsData {
        let Some(config) = self.config.as_ref() else {
            return PartsData::new();
        };

        let mut out = PartsData::new();
        for (name, section) in config.sections_with_prefix(PART_SECTION_PREFIX) {
            let values = out.entry(name.to_string()).or_default();
            let mut handles: Vec<&str> = Vec::new();
            for entry in &section.entries {
                if !handles.contains(&entry.key.as_str()) {
                    handles.push(&entry.key);
                }
            }
            for handle in handles {
                if let Some(value) = section.localized(handle, &self.language) {
                    values.insert(handle.to_string(), value.to_string());
                }
            }
        }
        out
    }

    /// Include directives in declaration order as `(path, parameters, thumbnails)`.
    fn includes(&self) -> Vec<(String, bool, bool)> {
        let Some(section) = self
            .config
            .as_ref()
            .and_then(|c| c.section(SECTION_DIRECTORY))
        else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for entry in &section.entries {
            let (parameters, thumbnails) = match entry.key.as_str() {
                KEY_INCLUDE => (true, true),
                KEY_INCLUDE_PARAMETERS => (true, false),
                KEY_INCLUDE_THUMBNAILS => (false, true),
                _ => continue,
            };
            for path in entry.value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                out.push((path.to_string(), parameters, thumbnails));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Include-aware loader
// ---------------------------------------------------------------------------

/// Loads [`DirectoryMetadata`] for directories, following include chains.
pub struct MetadataStore<'a> {
    settings: &'a Settings,
    language: &'a str,
}

impl<'a> MetadataStore<'a> {
    pub fn new(settings: &'a Settings, language: &'a str) -> Self {
        Self { settings, language }
    }

    pub fn load(&self, dir: &ResolvedPath) -> DirectoryMetadata {
        let mut local = Metadata::for_directory(self.settings, &dir.absolute, self.language);
        let label = if local.exists() && local.parse() {
            local.label()
        } else {
            None
        };

        let mut columns = IndexMap::new();
        let mut parts = PartsData::new();
        let mut thumbnail_dirs = Vec::new();
        let mut visited = HashSet::new();

        self.merge_layer(
            dir,
            (true, true),
            &mut visited,
            &mut columns,
            &mut parts,
            &mut thumbnail_dirs,
        );

        DirectoryMetadata {
            label,
            columns: columns.into_values().collect(),
            parts,
            thumbnail_dirs,
        }
    }

    /// Merge one directory's metadata and, before it, everything it includes.
    ///
    /// `visited` holds `(directory, wants)` pairs already merged; revisiting
    /// one contributes nothing, which also terminates include cycles.
    fn merge_layer(
        &self,
        dir: &ResolvedPath,
        wants: (bool, bool),
        visited: &mut HashSet<(PathBuf, bool, bool)>,
        columns: &mut IndexMap<String, Column>,
        parts: &mut PartsData,
        thumbnail_dirs: &mut Vec<ThumbnailDir>,
    ) {
        let (want_parameters, want_thumbnails) = wants;
        let identity = dir
            .absolute
            .canonicalize()
            .unwrap_or_else(|_| dir.absolute.clone());
        if !visited.insert((identity, want_parameters, want_thumbnails)) {
            tracing::debug!(
                ds = %dir.data_source.name,
                path = %dir.full_path,
                "Metadata include already resolved, skipping",
            );
            return;
        }

        if want_thumbnails {
            let relative = join_relative(
                &join_relative(&dir.full_path, &self.settings.metadata_dir),
                &self.settings.thumbnail_dir,
            );
            let own = ThumbnailDir {
                absolute: dir
                    .absolute
                    .join(&self.settings.metadata_dir)
                    .join(&self.settings.thumbnail_dir),
                relative,
            };
            if !thumbnail_dirs.contains(&own) {
                thumbnail_dirs.push(own);
            }
        }

        let mut meta = Metadata::for_directory(self.settings, &dir.absolute, self.language);
        if !meta.exists() || !meta.parse() {
            return;
        }

        for (include, parameters, thumbnails) in meta.includes() {
            let wants = (parameters && want_parameters, thumbnails && want_thumbnails);
            if wants == (false, false) {
                continue;
            }
            match self.resolve_include(dir, &include) {
                Some(target) => {
                    self.merge_layer(&target, wants, visited, columns, parts, thumbnail_dirs)
                }
                None => tracing::warn!(
                    ds = %dir.data_source.name,
                    path = %dir.full_path,
                    include = %include,
                    "Metadata include does not resolve to a directory",
                ),
            }
        }

        if want_parameters {
            for column in meta.columns() {
                match columns.get_mut(&column.handle) {
                    Some(existing) => *existing = column,
                    None => {
                        columns.insert(column.handle.clone(), column);
                    }
                }
            }
            for (name, values) in meta.parts_data() {
                parts.entry(name).or_default().extend(values);
            }
        }
    }

    fn resolve_include(&self, dir: &ResolvedPath, include: &str) -> Option<ResolvedPath> {
        let target = if include.starts_with('/') {
            include.to_string()
        } else {
            join_relative(&dir.full_path, include)
        };
        paths::resolve(self.settings, &dir.data_source.name, &target).ok()
    }
}

/// Map part base names to thumbnail paths (relative to the data source
/// root), scanning `dirs` in order. The first image for a base name wins.
pub fn scan_thumbnails(dirs: &[ThumbnailDir]) -> HashMap<String, String> {
    let mut out = HashMap::new();

    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(&dir.absolute) else {
            continue;
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        for name in names {
            let Some((base, ext)) = name.rsplit_once('.') else {
                continue;
            };
            if !THUMBNAIL_EXTENSIONS
                .iter()
                .any(|t| t.eq_ignore_ascii_case(ext))
            {
                continue;
            }
            out.entry(base.to_string())
                .or_insert_with(|| join_relative(&dir.relative, &name));
        }
    }

    out
}

/// Join two `/`-separated relative paths, tolerating an empty base.
pub fn join_relative(base: &str, tail: &str) -> String {
    if base.is_empty() {
        tail.to_string()
    } else {
        format!("{base}/{tail}")
    }
}
