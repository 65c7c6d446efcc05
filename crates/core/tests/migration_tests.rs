mod common;

use gd_project::migration::EXTERNAL_LAYOUTS_EXTENSION;
use gd_project::{
    DocumentMigrator, LoadProfile, MigrationWarning, ObjectFactory, ProjectCodec, VersionTuple,
    CURRENT_VERSION,
};
use serde_json::json;

use common::{catalog, image_list_project_body, legacy_project_body, with_version};

#[test]
fn code_only_parameters_are_inserted_depth_first() {
    let catalog = catalog();
    let mut document = with_version(VersionTuple::new(2, 1, 10822, 0), legacy_project_body());

    let report = DocumentMigrator::new(&catalog)
        .migrate(&mut document)
        .expect("migration succeeds");

    let scenes = document.section("Scenes").expect("scenes");
    let top = &scenes[0]["Events"][0];
    assert_eq!(top["Actions"][0]["parameters"], json!(["", "Coin", "0", "0"]));
    assert_eq!(
        top["Events"][0]["Actions"][0]["parameters"],
        json!(["Hero", "Physics", "10", ""])
    );
    // No code-only position: untouched.
    assert_eq!(
        top["Conditions"][0]["SubInstructions"][0]["parameters"],
        json!(["score", ">", "10"])
    );
    let external = document.section("ExternalEvents").expect("external events");
    assert_eq!(
        external[0]["Events"][0]["Actions"][0]["parameters"],
        json!(["", "Crate", "5", "5"])
    );
    assert_eq!(report.from_version, VersionTuple::new(2, 1, 10822, 0));
    assert_eq!(report.to_version, CURRENT_VERSION);
    assert_eq!(document.version(), CURRENT_VERSION);
}

#[test]
fn extensions_are_renamed_before_parameters_are_inserted() {
    let catalog = catalog();
    let mut document = with_version(VersionTuple::new(2, 0, 10600, 0), legacy_project_body());

    let report = DocumentMigrator::new(&catalog)
        .migrate(&mut document)
        .expect("migration succeeds");

    let action = &document.section("Scenes").expect("scenes")[0]["Events"][0]["Events"][0]["Actions"][0];
    assert_eq!(action["type"], json!("PhysicsBehavior::ApplyForce"));
    // The renamed type is found in the catalog, so no unknown-type warning.
    assert!(!report
        .warnings
        .iter()
        .any(|warning| matches!(warning, MigrationWarning::UnknownInstructionType { .. })));
    let extensions = &document.section("Info").expect("info")["Extensions"];
    assert_eq!(
        extensions,
        &json!(["PhysicsBehavior", EXTERNAL_LAYOUTS_EXTENSION])
    );
    let applied: Vec<&str> = report.applied_rules().collect();
    assert_eq!(
        applied,
        vec![
            "require_external_layouts_extension",
            "rename_retired_extensions",
            "insert_code_only_parameters",
        ]
    );
}

#[test]
fn parameter_window_closes_after_build_10822() {
    let catalog = catalog();
    let mut document = with_version(VersionTuple::new(2, 1, 10823, 0), legacy_project_body());

    let report = DocumentMigrator::new(&catalog)
        .migrate(&mut document)
        .expect("migration succeeds");

    let action = &document.section("Scenes").expect("scenes")[0]["Events"][0]["Actions"][0];
    assert_eq!(action["parameters"], json!(["Coin", "0", "0"]));
    let applied: Vec<&str> = report.applied_rules().collect();
    assert_eq!(applied, vec!["rename_retired_extensions"]);
}

#[test]
fn unknown_instruction_types_are_reported_once() {
    let catalog = catalog();
    let mut document = with_version(
        VersionTuple::new(2, 0, 10000, 0),
        json!({
            "Scenes": [{ "name": "Main", "Events": [{
                "type": "BuiltinCommonInstructions::Standard",
                "Actions": [
                    { "type": "Mystery", "parameters": ["a"] },
                    { "type": "Mystery", "parameters": ["b"] }
                ]
            }] }]
        }),
    );

    let report = DocumentMigrator::new(&catalog)
        .migrate(&mut document)
        .expect("unknown types do not fail migration");

    let unknown: Vec<&MigrationWarning> = report
        .warnings
        .iter()
        .filter(|warning| matches!(warning, MigrationWarning::UnknownInstructionType { .. }))
        .collect();
    assert_eq!(
        unknown,
        vec![&MigrationWarning::UnknownInstructionType {
            instruction: "Mystery".to_string()
        }]
    );
    let actions = &document.section("Scenes").expect("scenes")[0]["Events"][0]["Actions"];
    assert_eq!(actions[0]["parameters"], json!(["a"]));
}

#[test]
fn migrating_twice_changes_nothing_the_second_time() {
    let catalog = catalog();
    let mut document = with_version(VersionTuple::new(2, 0, 10400, 0), image_list_project_body());
    let migrator = DocumentMigrator::new(&catalog);

    let first = migrator.migrate(&mut document).expect("first pass");
    assert!(first.changed());
    assert!(first
        .warnings
        .iter()
        .any(|warning| matches!(warning, MigrationWarning::NotBackwardCompatible { .. })));
    let after_first = document.clone();

    let second = migrator.migrate(&mut document).expect("second pass");
    assert!(!second.changed());
    assert_eq!(document, after_first);
}

/// Round trips at each version boundary keep the scene count, object count
/// and the shape of the instruction trees.
#[test]
fn round_trip_preserves_shape_at_every_boundary() {
    let catalog = catalog();
    let factory = ObjectFactory::default();
    let boundaries = [
        (VersionTuple::new(1, 9, 9000, 0), image_list_project_body()),
        (VersionTuple::new(2, 0, 10498, 0), image_list_project_body()),
        (VersionTuple::new(2, 1, 10822, 0), legacy_project_body()),
        (CURRENT_VERSION, legacy_project_body()),
    ];

    for (version, body) in boundaries {
        let codec = ProjectCodec::new(&catalog, &factory).with_profile(LoadProfile::Editor);
        let decoded = codec
            .decode(with_version(version, body))
            .unwrap_or_else(|err| panic!("{version} decodes: {err}"));
        let project = decoded.project;
        assert_eq!(project.scenes.len(), 2, "{version}");
        assert_eq!(project.objects.len(), 2, "{version}");
        assert_eq!(project.instruction_count(), 5, "{version}");

        let reencoded = codec.encode(&project).expect("encodes");
        assert_eq!(reencoded.version(), CURRENT_VERSION);
        let again = codec.decode(reencoded).expect("decodes again");
        assert_eq!(again.project, project, "{version}");
        assert!(!again.migration.changed(), "{version}");
    }
}

#[test]
fn image_list_boundary_migrates_resources() {
    let catalog = catalog();
    let factory = ObjectFactory::default();
    let codec = ProjectCodec::new(&catalog, &factory);

    let old = codec
        .decode(with_version(VersionTuple::new(2, 0, 10498, 0), image_list_project_body()))
        .expect("decodes");
    assert_eq!(old.project.resources.resources.len(), 1);
    assert_eq!(old.project.resources.folders[0].resources, vec!["hero.png"]);

    // One build later the flat list is no longer recognised.
    let newer = codec
        .decode(with_version(VersionTuple::new(2, 0, 10499, 0), image_list_project_body()))
        .expect("decodes");
    assert!(newer.project.resources.resources.is_empty());
}
