#![allow(dead_code)]

use gd_project::{InstructionCatalog, ParameterSignature, ProjectDocument, VersionTuple};
use serde_json::{json, Value};

/// Catalog with one instruction per shape the fixtures need.
pub fn catalog() -> InstructionCatalog {
    InstructionCatalog::new()
        .with(
            "Create",
            vec![
                ParameterSignature::code_only("currentScene"),
                ParameterSignature::visible("objectList"),
                ParameterSignature::visible("expression"),
                ParameterSignature::visible("expression"),
            ],
        )
        .with(
            "PhysicsBehavior::ApplyForce",
            vec![
                ParameterSignature::visible("object"),
                ParameterSignature::visible("behavior"),
                ParameterSignature::visible("expression"),
                ParameterSignature::code_only("currentScene"),
            ],
        )
        .with(
            "VarScene",
            vec![
                ParameterSignature::visible("scenevar"),
                ParameterSignature::visible("operator"),
                ParameterSignature::visible("expression"),
            ],
        )
        .with("Or", Vec::new())
}

pub fn with_version(version: VersionTuple, body: Value) -> ProjectDocument {
    let mut document = ProjectDocument::from_value(body).expect("fixture is an object");
    document.set_version(version);
    document
}

/// A project as written by releases that predate code-only parameters.
/// Event trees are nested so depth-first traversal is exercised.
pub fn legacy_project_body() -> Value {
    json!({
        "Info": { "Name": "Platformer", "Author": "tests", "Extensions": ["PhysicsAutomatism"] },
        "Objects": [
            { "name": "Hero", "type": "Sprite", "animations": [] },
            { "name": "Crate", "type": "Sprite" }
        ],
        "Variables": [{ "name": "lives", "value": 3 }],
        "Scenes": [
            {
                "name": "Level 1",
                "Objects": [{ "name": "Coin", "type": "Sprite" }],
                "Instances": [{ "name": "Hero", "x": 10, "y": 20, "layer": "" }],
                "Events": [
                    {
                        "type": "BuiltinCommonInstructions::Standard",
                        "Conditions": [
                            { "type": "Or", "parameters": [], "SubInstructions": [
                                { "type": "VarScene", "parameters": ["score", ">", "10"] }
                            ] }
                        ],
                        "Actions": [
                            { "type": "Create", "parameters": ["Coin", "0", "0"] }
                        ],
                        "Events": [
                            {
                                "type": "BuiltinCommonInstructions::Standard",
                                "Actions": [
                                    { "type": "PhysicsAutomatism::ApplyForce", "parameters": ["Hero", "Physics", "10"] }
                                ]
                            }
                        ]
                    }
                ]
            },
            { "name": "Game Over" }
        ],
        "ExternalEvents": [
            {
                "name": "Shared",
                "associatedScene": "Level 1",
                "Events": [
                    { "type": "BuiltinCommonInstructions::Standard",
                      "Actions": [{ "type": "Create", "parameters": ["Crate", "5", "5"] }] }
                ]
            }
        ]
    })
}

/// Same project with the flat image list of the oldest releases.
pub fn image_list_project_body() -> Value {
    let mut body = legacy_project_body();
    let root = body.as_object_mut().expect("fixture is an object");
    root.insert(
        "Images".to_string(),
        json!([{ "name": "hero.png", "file": "hero.png" }]),
    );
    root.insert(
        "ImageFolders".to_string(),
        json!([{ "name": "Sprites", "content": ["hero.png"] }]),
    );
    body
}
