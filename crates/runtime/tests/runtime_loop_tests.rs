use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use gd_assets::{cipher, BundleBuilder, BundleError, PROJECT_SOURCE_ENTRY};
use gd_project::GdError;
use gd_runtime::{
    bootstrap, ModuleLocator, RuntimeConfig, RuntimeError, RuntimeScene, RuntimeState, SceneCode,
    StaticBackend,
};
use serde_json::{json, Value};

fn project_source(major: u64, scenes: Value) -> String {
    json!({
        "GDVersion": { "Major": major, "Minor": 2, "Build": 11120, "Revision": 0 },
        "Info": { "Name": "Runner", "WindowWidth": 640, "WindowHeight": 480 },
        "Objects": [{ "name": "Hero", "type": "Sprite" }],
        "Scenes": scenes,
    })
    .to_string()
}

fn two_scenes() -> Value {
    json!([
        {
            "name": "Title",
            "Instances": [{ "name": "Hero", "x": 1, "y": 2, "layer": "" }],
            "Events": []
        },
        { "name": "Level 1", "Events": [] }
    ])
}

fn write_bundle(dir: &Path, source: &str) -> PathBuf {
    let path = dir.join("gam.egd");
    let mut builder = BundleBuilder::new();
    builder
        .add_project_source(source)
        .expect("add source")
        .add("fonts/title.ttf", vec![7; 32])
        .expect("add font");
    builder.write(&path).expect("write bundle");
    path
}

fn config_for(bundle: PathBuf) -> gd_runtime::ResolvedConfig {
    RuntimeConfig {
        bundle_path: Some(bundle),
        ..RuntimeConfig::default()
    }
    .resolve()
}

fn locator() -> ModuleLocator {
    ModuleLocator::new("/opt/runner", "runner", "so")
}

fn returning(codes: Vec<i32>) -> impl Fn() -> Box<dyn SceneCode> {
    move || -> Box<dyn SceneCode> {
        let mut codes = codes.clone().into_iter();
        Box::new(move |_scene: &mut RuntimeScene| codes.next().unwrap_or(-1))
    }
}

#[test]
fn bundle_boots_into_the_first_scene_and_runs_to_quit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = write_bundle(dir.path(), &project_source(2, two_scenes()));
    let entered = Rc::new(RefCell::new(Vec::new()));
    let log = entered.clone();

    let mut backend = StaticBackend::new();
    backend.register("Title", move || -> Box<dyn SceneCode> {
        let log = log.clone();
        Box::new(move |scene: &mut RuntimeScene| {
            log.borrow_mut().push(scene.objects().len());
            1
        })
    });
    backend.register("Level 1", returning(vec![-1, -2]));

    let mut session = bootstrap::start(&config_for(bundle), locator(), Box::new(backend))
        .expect("bootstrap");
    assert_eq!(session.state(), RuntimeState::Running);
    assert_eq!(session.window().width, 640);
    assert_eq!(session.loader().active_scene(), Some("Title"));

    let font = session
        .context_mut()
        .load_font("fonts/title.ttf")
        .expect("font from bundle")
        .len();
    assert_eq!(font, 32);

    session.run().expect("run");
    assert_eq!(session.state(), RuntimeState::Terminated);
    assert_eq!(session.steps(), 3);
    assert_eq!(*entered.borrow(), vec![1]);
    assert_eq!(session.loader().live_modules(), 0);
    assert_eq!(session.context().fonts().loaded(), 0);
}

#[test]
fn missing_bundle_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = bootstrap::start(
        &config_for(dir.path().join("gam.egd")),
        locator(),
        Box::new(StaticBackend::new()),
    )
    .err()
    .expect("no bundle on disk");

    assert!(matches!(
        err,
        RuntimeError::Bundle(BundleError::NotFound { .. })
    ));
}

#[test]
fn undecodable_source_is_a_malformed_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = write_bundle(dir.path(), "{ this is not json");

    let err = bootstrap::start(&config_for(bundle), locator(), Box::new(StaticBackend::new()))
        .err()
        .expect("malformed source");
    assert!(err.is_malformed_document());
}

#[test]
fn non_utf8_source_is_a_malformed_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gam.egd");
    let encrypted = cipher::encrypt(&[0xFF, 0xFE, b'{', b'}']).expect("encrypt");
    let mut builder = BundleBuilder::new();
    builder.add(PROJECT_SOURCE_ENTRY, encrypted).expect("add raw src");
    builder.write(&path).expect("write bundle");

    let err = bootstrap::start(&config_for(path), locator(), Box::new(StaticBackend::new()))
        .err()
        .expect("invalid utf-8");
    assert!(err.is_malformed_document());
}

#[test]
fn legacy_major_version_is_rejected_by_the_player() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = write_bundle(dir.path(), &project_source(1, two_scenes()));

    let err = bootstrap::start(&config_for(bundle), locator(), Box::new(StaticBackend::new()))
        .err()
        .expect("too old");
    assert!(matches!(
        err,
        RuntimeError::Document(GdError::VersionTooOld { .. })
    ));
}

#[test]
fn project_without_scenes_stops_before_loading_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = write_bundle(dir.path(), &project_source(2, json!([])));

    let err = bootstrap::start(&config_for(bundle), locator(), Box::new(StaticBackend::new()))
        .err()
        .expect("no scenes");
    assert!(matches!(err, RuntimeError::NoSceneToLoad));
}

#[test]
fn missing_scene_code_is_reported_with_its_symbol() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = write_bundle(dir.path(), &project_source(2, two_scenes()));

    let err = bootstrap::start(&config_for(bundle), locator(), Box::new(StaticBackend::new()))
        .err()
        .expect("no code for Title");
    match err {
        RuntimeError::SymbolResolutionFailure { symbol, .. } => {
            assert_eq!(symbol, "GDSceneEventsTitle");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
