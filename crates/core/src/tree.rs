//! Directory nodes and the tree that builds, caches and populates them.
//!
//! Construction is two-phase. [`DirectoryTree::get_or_build`] resolves the
//! path, decides accessibility and loads metadata; the listing of children
//! and parts is filled in on first traversal and memoised per node.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::acl::AclEngine;
use crate::cache::{CacheKey, DirectoryCache};
use crate::error::CoreError;
use crate::localized::LocalizedResources;
use crate::metadata::{
    join_relative, scan_thumbnails, Column, DirectoryMetadata, MetadataStore, PartsData,
    ThumbnailDir,
};
use crate::part::{collapse_versions, PartFile};
use crate::paths::{self, ResolvedPath};
use crate::settings::Settings;
use crate::viewer::Viewer;

/// Children and parts of a directory, in name order.
#[derive(Debug, Default)]
pub struct Listing {
    pub directories: Vec<Arc<DirectoryNode>>,
    pub parts: Vec<PartFile>,
}

#[derive(Debug)]
pub struct DirectoryNode {
    pub location: ResolvedPath,
    pub name: String,
    /// Full path of the parent directory.
    pub relative_path: String,
    pub accessible: bool,
    pub label: Option<String>,
    pub columns: Vec<Column>,
    pub part_annotations: PartsData,
    pub thumbnail_dirs: Vec<ThumbnailDir>,
    pub resources: LocalizedResources,
    pub viewer: Arc<Viewer>,
    listing: OnceLock<Listing>,
}

impl DirectoryNode {
    pub fn ds_name(&self) -> &str {
        &self.location.data_source.name
    }

    pub fn full_path(&self) -> &str {
        &self.location.full_path
    }

    pub fn absolute(&self) -> &Path {
        &self.location.absolute
    }

    pub fn is_root(&self) -> bool {
        self.location.is_root()
    }

    /// Metadata label, or the directory name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Path of a metadata-directory file relative to the data source root.
    pub fn metadata_file_path(&self, settings: &Settings, file_name: &str) -> String {
        join_relative(
            &join_relative(self.full_path(), &settings.metadata_dir),
            file_name,
        )
    }

    /// Whether the listing has been populated.
    pub fn is_populated(&self) -> bool {
        self.listing.get().is_some()
    }

    /// Whether the directory has visible subdirectories. Uses the listing
    /// when populated, otherwise a shallow scan that skips ACL checks.
    pub fn has_children(&self, settings: &Settings) -> bool {
        if !self.accessible {
            return false;
        }
        if let Some(listing) = self.listing.get() {
            return !listing.directories.is_empty();
        }
        match std::fs::read_dir(self.absolute()) {
            Ok(entries) => entries.filter_map(Result::ok).any(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                visible_name(&name, settings) && e.path().is_dir()
            }),
            Err(_) => false,
        }
    }

    /// Annotation values of a part, keyed by column handle.
    pub fn annotations_for(&self, part: &PartFile) -> Option<&HashMap<String, String>> {
        self.part_annotations.get(&part.base_name)
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            self.ds_name(),
            self.full_path(),
            self.viewer.identity(),
            &self.viewer.language,
        )
    }
}

fn visible_name(name: &str, settings: &Settings) -> bool {
    name != settings.metadata_dir && !name.starts_with('.')
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

pub struct DirectoryTree {
    settings: Arc<Settings>,
    cache: DirectoryCache,
}

impl DirectoryTree {
    pub fn new(settings: Arc<Settings>) -> Self {
        let cache = DirectoryCache::new(settings.cache_ttl);
        Self { settings, cache }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Resolve and construct (or fetch from cache) the node at `path`.
    ///
    /// Accessibility covers the directory and all of its ancestors.
    pub fn get_or_build(
        &self,
        ds_name: &str,
        path: &str,
        viewer: &Arc<Viewer>,
    ) -> Result<Arc<DirectoryNode>, CoreError> {
        let location = paths::resolve(&self.settings, ds_name, path)?;
        let key = CacheKey::new(
            ds_name,
            &location.full_path,
            viewer.identity(),
            &viewer.language,
        );
        if let Some(node) = self.cache.get(&key) {
            return Ok(node);
        }

        let accessible = AclEngine::new(&self.settings)
            .subtree_accessible(&location, viewer.username.as_deref());
        let node = Arc::new(self.build_node(location, accessible, viewer));
        self.cache.put(key, Arc::clone(&node));
        Ok(node)
    }

    /// The node's listing, populating it on first use.
    pub fn listing<'n>(&self, node: &'n DirectoryNode) -> &'n Listing {
        node.listing.get_or_init(|| self.populate(node))
    }

    pub fn find_part<'n>(&self, node: &'n DirectoryNode, file_name: &str) -> Option<&'n PartFile> {
        self.listing(node)
            .parts
            .iter()
            .find(|p| p.file_name == file_name)
    }

    /// Drop cached nodes of `(ds, path)` for one viewer identity.
    pub fn invalidate(&self, ds_name: &str, full_path: &str, identity: &str) {
        self.cache.invalidate(ds_name, full_path, identity);
    }

    fn build_node(&self, location: ResolvedPath, accessible: bool, viewer: &Arc<Viewer>) -> DirectoryNode {
        let (metadata, resources) = if accessible {
            let metadata = MetadataStore::new(&self.settings, &viewer.language).load(&location);
            let resources = LocalizedResources::scan(
                &self.settings,
                &location.absolute.join(&self.settings.metadata_dir),
                &viewer.language,
            );
            (metadata, resources)
        } else {
            (DirectoryMetadata::default(), LocalizedResources::default())
        };

        DirectoryNode {
            name: location.name(),
            relative_path: location.parent_path().to_string(),
            location,
            accessible,
            label: metadata.label,
            columns: metadata.columns,
            part_annotations: metadata.parts,
            thumbnail_dirs: metadata.thumbnail_dirs,
            resources,
            viewer: Arc::clone(viewer),
            listing: OnceLock::new(),
        }
    }

    fn populate(&self, node: &DirectoryNode) -> Listing {
        if !node.accessible {
            return Listing::default();
        }

        let entries = match std::fs::read_dir(node.absolute()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    ds = %node.ds_name(),
                    path = %node.full_path(),
                    error = %e,
                    "Failed to list directory",
                );
                return Listing::default();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| visible_name(name, &self.settings))
            .collect();
        names.sort();

        let acl = AclEngine::new(&self.settings);
        let thumbnails = scan_thumbnails(&node.thumbnail_dirs);
        let username = node.viewer.username.as_deref();

        let mut directories = Vec::new();
        let mut parts = Vec::new();

        for name in names {
            let absolute = node.absolute().join(&name);

            if absolute.is_dir() {
                let child_path = join_relative(node.full_path(), &name);
                let key = CacheKey::new(
                    node.ds_name(),
                    &child_path,
                    node.viewer.identity(),
                    &node.viewer.language,
                );
                if let Some(child) = self.cache.get(&key) {
                    if child.accessible {
                        directories.push(child);
                    }
                    continue;
                }

                let Ok(location) = paths::resolve(&self.settings, node.ds_name(), &child_path) else {
                    tracing::debug!(ds = %node.ds_name(), path = %child_path, "Skipping unresolvable directory");
                    continue;
                };
                if !acl.directory_accessible(&location.absolute, username) {
                    continue;
                }

                let child = Arc::new(self.build_node(location, true, &node.viewer));
                self.cache.put(child.cache_key(), Arc::clone(&child));
                directories.push(child);
            } else if absolute.is_file() {
                let Ok(file) = paths::resolve_file(&node.location, &name) else {
                    continue;
                };
                let size = std::fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
                let mut part = PartFile::new(node.ds_name(), node.full_path(), &name, size);
                if !self.settings.part_type_listed(&part.part_type) {
                    continue;
                }
                part.accessible = node.viewer.part_type_allowed(node.ds_name(), &part.part_type);
                part.thumbnail = thumbnails.get(&part.base_name).cloned();
                parts.push(part);
            }
        }

        let parts = collapse_versions(parts);
        tracing::debug!(
            ds = %node.ds_name(),
            path = %node.full_path(),
            directories = directories.len(),
            parts = parts.len(),
            "Populated directory",
        );

        Listing { directories, parts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::PartAccessRules;
    use crate::settings::DataSource;
    use assert_matches::assert_matches;

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: std::path::PathBuf,
        tree: DirectoryTree,
    }

    impl Fixture {
        fn new(configure: impl FnOnce(&mut Settings)) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().join("ds1");
            std::fs::create_dir_all(root.join("widgets/gears")).unwrap();
            std::fs::create_dir_all(root.join("widgets/0000-index/thumbnails")).unwrap();
            std::fs::create_dir_all(root.join("secret")).unwrap();
            std::fs::create_dir_all(root.join("secret/0000-index")).unwrap();
            std::fs::write(root.join("secret/0000-index/acl.ini"), "[allow]\nusers = alice\n").unwrap();
            for f in ["part.prt", "part.prt.1", "part.prt.2", "notes.txt", ".hidden.prt"] {
                std::fs::write(root.join("widgets").join(f), b"data").unwrap();
            }
            std::fs::write(root.join("widgets/0000-index/thumbnails/part.png"), b"png").unwrap();

            let mut settings = Settings::with_data_sources(vec![DataSource::new("ds1", &root)]);
            configure(&mut settings);
            Self {
                _tmp: tmp,
                root,
                tree: DirectoryTree::new(Arc::new(settings)),
            }
        }
    }

    fn viewer(user: Option<&str>) -> Arc<Viewer> {
        Arc::new(
            Viewer::new(user.map(str::to_string), "en")
                .with_part_access("ds1", PartAccessRules::from_list("prt")),
        )
    }

    #[test]
    fn root_listing_skips_metadata_and_inaccessible_dirs() {
        let fx = Fixture::new(|_| {});
        let root = fx.tree.get_or_build("ds1", "", &viewer(None)).unwrap();
        assert!(root.is_root());

        let names: Vec<_> = fx
            .tree
            .listing(&root)
            .directories
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, ["widgets"]);

        let root = fx.tree.get_or_build("ds1", "", &viewer(Some("alice"))).unwrap();
        assert_eq!(fx.tree.listing(&root).directories.len(), 2);
    }

    #[test]
    fn inaccessible_directory_has_empty_listing() {
        let fx = Fixture::new(|_| {});
        std::fs::write(fx.root.join("secret/file.prt"), b"x").unwrap();

        let node = fx.tree.get_or_build("ds1", "secret", &viewer(Some("bob"))).unwrap();
        assert!(!node.accessible);
        let listing = fx.tree.listing(&node);
        assert!(listing.parts.is_empty());
        assert!(listing.directories.is_empty());
        assert!(!node.has_children(fx.tree.settings()));
    }

    #[test]
    fn parts_are_collapsed_and_annotated() {
        let fx = Fixture::new(|_| {});
        let node = fx.tree.get_or_build("ds1", "widgets", &viewer(None)).unwrap();
        let parts = &fx.tree.listing(&node).parts;

        let names: Vec<_> = parts.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, ["notes.txt", "part.prt.2"]);

        let part = &parts[1];
        assert!(part.accessible);
        assert_eq!(part.version, 2);
        assert_eq!(part.size, 4);
        assert_eq!(part.thumbnail.as_deref(), Some("widgets/0000-index/thumbnails/part.png"));
        assert!(!parts[0].accessible);
    }

    #[test]
    fn global_part_type_filter_drops_files() {
        let fx = Fixture::new(|s| s.part_types = Some(vec!["prt".into()]));
        let node = fx.tree.get_or_build("ds1", "widgets", &viewer(None)).unwrap();
        let parts = &fx.tree.listing(&node).parts;
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].file_name, "part.prt.2");
    }

    #[test]
    fn nodes_are_cached_per_viewer() {
        let fx = Fixture::new(|_| {});
        let anon = viewer(None);
        let a = fx.tree.get_or_build("ds1", "widgets", &anon).unwrap();
        let b = fx.tree.get_or_build("ds1", "/widgets/", &anon).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = fx.tree.get_or_build("ds1", "widgets", &viewer(Some("alice"))).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        fx.tree.invalidate("ds1", "widgets", "anonymous");
        let d = fx.tree.get_or_build("ds1", "widgets", &anon).unwrap();
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[test]
    fn children_built_during_listing_are_cached() {
        let fx = Fixture::new(|_| {});
        let anon = viewer(None);
        let widgets = fx.tree.get_or_build("ds1", "widgets", &anon).unwrap();
        let listed = Arc::clone(&fx.tree.listing(&widgets).directories[0]);
        let direct = fx.tree.get_or_build("ds1", "widgets/gears", &anon).unwrap();
        assert!(Arc::ptr_eq(&listed, &direct));
        assert_eq!(direct.relative_path, "widgets");
    }

    #[test]
    fn has_children_without_population() {
        let fx = Fixture::new(|_| {});
        let widgets = fx.tree.get_or_build("ds1", "widgets", &viewer(None)).unwrap();
        assert!(!widgets.is_populated());
        assert!(widgets.has_children(fx.tree.settings()));

        let gears = fx.tree.get_or_build("ds1", "widgets/gears", &viewer(None)).unwrap();
        assert!(!gears.has_children(fx.tree.settings()));
    }

    #[test]
    fn vanished_directory_lists_empty() {
        let fx = Fixture::new(|_| {});
        let gears = fx.tree.get_or_build("ds1", "widgets/gears", &viewer(None)).unwrap();
        std::fs::remove_dir(fx.root.join("widgets/gears")).unwrap();
        let listing = fx.tree.listing(&gears);
        assert!(listing.parts.is_empty());
        assert!(listing.directories.is_empty());
    }

    #[test]
    fn escapes_are_denied() {
        let fx = Fixture::new(|_| {});
        assert_matches!(
            fx.tree.get_or_build("ds1", "../..", &viewer(None)),
            Err(CoreError::PathDenied)
        );
        assert_matches!(
            fx.tree.get_or_build("nope", "", &viewer(None)),
            Err(CoreError::PathDenied)
        );
    }
}
