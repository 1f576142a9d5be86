use super::*;
use crate::test_support::{request, resolved};

#[test]
fn workspace_is_unique_and_removed_on_drop() {
    let root = tempfile::tempdir().unwrap();
    let a = RunWorkspace::create(Some(root.path())).unwrap();
    let b = RunWorkspace::create(Some(root.path())).unwrap();
    assert_ne!(a.run_id(), b.run_id());
    assert_ne!(a.path(), b.path());
    assert!(a.path().starts_with(root.path()));
    let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(&format!("newsreel-run-{}-", a.run_id())));

    let path = a.path().to_path_buf();
    drop(a);
    assert!(!path.exists());
    let path = b.path().to_path_buf();
    b.close();
    assert!(!path.exists());
}

#[test]
fn materializes_every_asset_by_role() {
    let ws = RunWorkspace::create(None).unwrap();
    let req = request(&[1.0, 2.0], true, true);
    let assets = resolved(&req);
    let files = ws.materialize(&assets).unwrap();
    assert_eq!(files.len(), 5);

    let clip = files.path(AssetRole::Clip(1)).unwrap();
    assert_eq!(clip.file_name().unwrap(), "clip_001.png");
    assert_eq!(
        std::fs::read(clip).unwrap(),
        assets.clips[1].bytes.as_slice()
    );
    assert_eq!(
        files.path(AssetRole::Voice).unwrap().file_name().unwrap(),
        "voice.wav"
    );
    assert_eq!(
        files.path(AssetRole::Music).unwrap().file_name().unwrap(),
        "music.mp3"
    );
}

#[test]
fn missing_role_is_a_graph_error() {
    let files = MaterializedAssets::default();
    assert!(files.is_empty());
    assert!(matches!(
        files.path(AssetRole::Logo),
        Err(NewsreelError::GraphConstruction(_))
    ));
}
