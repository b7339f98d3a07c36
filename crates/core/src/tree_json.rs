//! Tree-widget JSON for the directory navigation pane.
//!
//! The tree is opened along the path to the selected directory; every other
//! node only reports whether it has children so the client can load it lazily.

use serde::Serialize;

use crate::metadata::join_relative;
use crate::tree::{DirectoryNode, DirectoryTree};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeState {
    pub opened: bool,
    pub disabled: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TreeChildren {
    Nodes(Vec<TreeNode>),
    HasChildren(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub text: String,
    /// Small icon shown beside the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Image replacing the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub url: String,
    pub state: NodeState,
    pub children: TreeChildren,
}

/// Browse URL of a directory.
pub fn browse_url(tree: &DirectoryTree, node: &DirectoryNode) -> String {
    let base = format!(
        "{}/{}",
        tree.settings().browse_prefix.trim_end_matches('/'),
        node.ds_name()
    );
    if node.is_root() {
        base
    } else {
        format!("{base}/{}", node.full_path())
    }
}

/// Render `node`, expanding the branch that leads to `target_path`.
pub fn format_dir(tree: &DirectoryTree, node: &DirectoryNode, target_path: &str) -> TreeNode {
    let settings = tree.settings();
    let target = target_path.trim_matches('/');
    let static_url = |file: &String| {
        settings.static_url(
            &node.location.data_source,
            &join_relative(&join_relative(node.full_path(), &settings.metadata_dir), file),
        )
    };

    let on_path = node.is_root()
        || target == node.full_path()
        || target.starts_with(&format!("{}/", node.full_path()));
    let selected = target == node.full_path();

    let mut state = NodeState {
        selected,
        disabled: !node.accessible,
        ..NodeState::default()
    };

    let children = if on_path && !selected && node.accessible {
        state.opened = true;
        TreeChildren::Nodes(
            tree.listing(node)
                .directories
                .iter()
                .map(|child| format_dir(tree, child, target))
                .collect(),
        )
    } else {
        TreeChildren::HasChildren(node.has_children(settings))
    };

    TreeNode {
        id: node.full_path().to_string(),
        text: node.display_label().to_string(),
        icon: node.resources.text_icon.as_ref().map(&static_url),
        image: node.resources.icon.as_ref().map(&static_url),
        url: browse_url(tree, node),
        state,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{DataSource, Settings};
    use crate::viewer::Viewer;
    use std::sync::Arc;

    fn fixture() -> (tempfile::TempDir, DirectoryTree) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ds1");
        std::fs::create_dir_all(root.join("widgets/gears/small")).unwrap();
        std::fs::create_dir_all(root.join("widgets/bolts")).unwrap();
        std::fs::create_dir_all(root.join("tools")).unwrap();
        std::fs::create_dir_all(root.join("widgets/0000-index")).unwrap();
        std::fs::write(root.join("widgets/0000-index/logo-text_de.png"), b"x").unwrap();
        std::fs::write(
            root.join("widgets/0000-index/metadata.ini"),
            "[directory]\nlabel = Widgets\nlabel/de = Bauteile\n",
        )
        .unwrap();
        let settings = Settings::with_data_sources(vec![DataSource::new("ds1", &root)]);
        (tmp, DirectoryTree::new(Arc::new(settings)))
    }

    #[test]
    fn expands_branch_to_target() {
        let (_tmp, tree) = fixture();
        let viewer = Arc::new(Viewer::new(None, "de"));
        let root = tree.get_or_build("ds1", "", &viewer).unwrap();

        let json = format_dir(&tree, &root, "widgets/gears");
        assert!(json.state.opened);
        assert_eq!(json.url, "/browse/ds1");

        let TreeChildren::Nodes(top) = &json.children else {
            panic!("root should be expanded");
        };
        assert_eq!(top.len(), 2);
        let tools = &top[0];
        assert_eq!(tools.id, "tools");
        assert_eq!(tools.children, TreeChildren::HasChildren(false));

        let widgets = &top[1];
        assert_eq!(widgets.text, "Bauteile");
        assert_eq!(
            widgets.icon.as_deref(),
            Some("/static/ds/ds1/widgets/0000-index/logo-text_de.png")
        );
        assert!(widgets.state.opened);

        let TreeChildren::Nodes(inner) = &widgets.children else {
            panic!("widgets should be expanded");
        };
        let names: Vec<_> = inner.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(names, ["widgets/bolts", "widgets/gears"]);

        let gears = &inner[1];
        assert!(gears.state.selected);
        assert!(!gears.state.opened);
        assert_eq!(gears.children, TreeChildren::HasChildren(true));
        assert_eq!(gears.url, "/browse/ds1/widgets/gears");
    }

    #[test]
    fn serializes_children_flag_as_bool() {
        let (_tmp, tree) = fixture();
        let viewer = Arc::new(Viewer::new(None, "en"));
        let tools = tree.get_or_build("ds1", "tools", &viewer).unwrap();
        let value = serde_json::to_value(format_dir(&tree, &tools, "tools")).unwrap();
        assert_eq!(value["children"], serde_json::json!(false));
        assert_eq!(value["state"]["selected"], serde_json::json!(true));
        assert!(value.get("icon").is_none());
    }
}
