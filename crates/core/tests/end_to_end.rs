//! Browse a directory as a user, mark its part and build the batch archive.

use std::sync::Arc;

use partvault_core::batch::memory::MemoryBatchStore;
use partvault_core::batch::{archive, BatchState, DownloadBatchEngine, PartSelection};
use partvault_core::settings::{DataSource, Settings};
use partvault_core::tree::DirectoryTree;
use partvault_core::viewer::Viewer;

#[tokio::test]
async fn versioned_part_is_browsed_marked_and_archived() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("ds1");
    std::fs::create_dir_all(root.join("widgets")).unwrap();
    std::fs::create_dir_all(root.join("0000-index")).unwrap();
    for name in ["part.prt", "part.prt.1", "part.prt.2"] {
        std::fs::write(root.join("widgets").join(name), name.as_bytes()).unwrap();
    }
    std::fs::write(
        root.join("0000-index/users.ini"),
        "[alice]\npassword = secret\nparts = prt\n",
    )
    .unwrap();

    let mut settings = Settings::with_data_sources(vec![DataSource::new("ds1", &root)]);
    settings.download_root = tmp.path().join("downloads");
    let settings = Arc::new(settings);

    let tree = DirectoryTree::new(Arc::clone(&settings));
    let viewer = Arc::new(Viewer::load(&settings, Some("alice".into()), "en"));
    let node = tree.get_or_build("ds1", "/widgets", &viewer).unwrap();

    let parts = &tree.listing(&node).parts;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].file_name, "part.prt.2");
    assert!(parts[0].accessible);

    let engine = DownloadBatchEngine::new(Arc::new(MemoryBatchStore::new()), Arc::clone(&settings));
    let batch = engine.create_batch(viewer.username.as_deref()).await.unwrap();
    let summary = engine
        .toggle_parts(
            &tree,
            &batch,
            &node,
            &[PartSelection {
                name: "part.prt.2".into(),
                mark: true,
            }],
        )
        .await
        .unwrap();
    assert_eq!(summary.marked, 1);

    let preparing = engine.prepare_build(&batch).await.unwrap();
    assert_eq!(preparing.state, BatchState::Preparing);
    let done = engine.run_build(batch.id).await.unwrap();
    assert_eq!(done.state, BatchState::Done);

    let path = engine.archive_path(&done).unwrap();
    assert_eq!(
        path,
        settings
            .download_root
            .join(&batch.key)
            .join(format!("parts-{}.zip", batch.id))
    );
    assert_eq!(
        archive::entry_names(&path).unwrap(),
        [format!("parts-{}/part.prt.2", batch.id)]
    );
}

#[tokio::test]
async fn anonymous_viewer_sees_parts_but_cannot_mark_them() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("ds1");
    std::fs::create_dir_all(root.join("widgets")).unwrap();
    std::fs::write(root.join("widgets/part.prt"), b"x").unwrap();

    let settings = Arc::new(Settings::with_data_sources(vec![DataSource::new("ds1", &root)]));
    let tree = DirectoryTree::new(Arc::clone(&settings));
    let viewer = Arc::new(Viewer::load(&settings, None, "en"));
    let node = tree.get_or_build("ds1", "widgets", &viewer).unwrap();
    assert!(!tree.listing(&node).parts[0].accessible);

    let engine = DownloadBatchEngine::new(Arc::new(MemoryBatchStore::new()), settings);
    let batch = engine.create_batch(None).await.unwrap();
    let result = engine
        .toggle_parts(
            &tree,
            &batch,
            &node,
            &[PartSelection {
                name: "part.prt".into(),
                mark: true,
            }],
        )
        .await;
    assert!(matches!(result, Err(partvault_core::error::CoreError::Forbidden(_))));
}
