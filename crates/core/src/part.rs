//! Part files and their name anatomy.
//!
//! `gear.prt.3` is version 3 of the version group `gear.prt`; its part type
//! is `prt` and its base name (used for annotations and thumbnails) `gear`.
//! A trailing all-digit segment only counts as a version when the name has
//! at least three dot-separated segments.

use std::collections::HashMap;

use serde::Serialize;

use crate::hashing::part_identity_hash;

/// The pieces of a part file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartName {
    pub base_name: String,
    pub part_type: String,
    /// `0` when unversioned. Numbers too large to hold saturate.
    pub version: u64,
    pub version_group_key: String,
}

impl PartName {
    pub fn parse(file_name: &str) -> Self {
        let (unversioned, version) = match file_name.rsplit_once('.') {
            Some((head, tail))
                if head.contains('.')
                    && !tail.is_empty()
                    && tail.bytes().all(|b| b.is_ascii_digit()) =>
            {
                (head, tail.parse().unwrap_or(u64::MAX))
            }
            _ => (file_name, 0),
        };

        let (base_name, part_type) = match unversioned.rsplit_once('.') {
            Some((base, ext)) => (base, ext),
            None => (unversioned, ""),
        };

        Self {
            base_name: base_name.to_string(),
            part_type: part_type.to_ascii_lowercase(),
            version,
            version_group_key: unversioned.to_string(),
        }
    }
}

/// A listed file of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartFile {
    pub ds_name: String,
    /// Full path of the containing directory.
    pub dir_path: String,
    pub file_name: String,
    pub base_name: String,
    pub part_type: String,
    pub version: u64,
    pub version_group_key: String,
    pub accessible: bool,
    pub size: u64,
    /// Thumbnail path relative to the data source root.
    pub thumbnail: Option<String>,
}

impl PartFile {
    pub fn new(ds_name: &str, dir_path: &str, file_name: &str, size: u64) -> Self {
        let name = PartName::parse(file_name);
        Self {
            ds_name: ds_name.to_string(),
            dir_path: dir_path.to_string(),
            file_name: file_name.to_string(),
            base_name: name.base_name,
            part_type: name.part_type,
            version: name.version,
            version_group_key: name.version_group_key,
            accessible: false,
            size,
            thumbnail: None,
        }
    }

    pub fn content_hash(&self) -> String {
        part_identity_hash(&self.ds_name, &self.dir_path, &self.file_name)
    }
}

/// Keep one part per version group, the one with the highest version.
/// Survivors stay in the position their group first appeared.
pub fn collapse_versions(parts: Vec<PartFile>) -> Vec<PartFile> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<PartFile> = Vec::with_capacity(parts.len());

    for part in parts {
        match slots.get(&part.version_group_key) {
            Some(&idx) => {
                if part.version > out[idx].version {
                    out[idx] = part;
                }
            }
            None => {
                slots.insert(part.version_group_key.clone(), out.len());
                out.push(part);
            }
        }
    }

    out
}
