//! In-memory project model.
//!
//! Entities mirror the document sections one to one. Payloads that only the
//! editor or the renderer interpret (object content, extra event fields,
//! instance properties) are kept verbatim as JSON so they survive a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::factory::DEFAULT_OBJECT_KIND;
use crate::mangler::mangled_scene_name;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub properties: ProjectProperties,
    pub resources: ResourcesManager,
    pub objects: Vec<Object>,
    pub object_groups: Vec<ObjectGroup>,
    pub variables: Vec<Variable>,
    pub scenes: Vec<Scene>,
    pub external_events: Vec<ExternalEvents>,
    pub external_layouts: Vec<ExternalLayout>,
    pub external_source_files: Vec<SourceFile>,
}

impl Project {
    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn scene_index(&self, name: &str) -> Option<usize> {
        self.scenes.iter().position(|scene| scene.name == name)
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|object| object.name == name)
    }

    /// Number of instructions in every scene and external event, sub-trees
    /// included.
    pub fn instruction_count(&self) -> usize {
        let scenes: usize = self
            .scenes
            .iter()
            .map(|scene| count_instructions(&scene.events))
            .sum();
        let external: usize = self
            .external_events
            .iter()
            .map(|events| count_instructions(&events.events))
            .sum();
        scenes + external
    }
}

fn count_instructions(events: &[Event]) -> usize {
    events
        .iter()
        .map(|event| {
            event
                .conditions
                .iter()
                .chain(event.actions.iter())
                .map(Instruction::tree_size)
                .sum::<usize>()
                + count_instructions(&event.sub_events)
        })
        .sum()
}

fn default_window_width() -> u32 {
    800
}

fn default_window_height() -> u32 {
    600
}

fn default_max_fps() -> u32 {
    60
}

fn default_min_fps() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_object_kind() -> String {
    DEFAULT_OBJECT_KIND.to_string()
}

fn default_background() -> [u8; 3] {
    [209, 209, 209]
}

fn default_language() -> String {
    "C++".to_string()
}

/// The `Info` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProperties {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Author", default)]
    pub author: String,
    #[serde(rename = "WindowWidth", default = "default_window_width")]
    pub window_width: u32,
    #[serde(rename = "WindowHeight", default = "default_window_height")]
    pub window_height: u32,
    #[serde(rename = "MaxFPS", default = "default_max_fps")]
    pub max_fps: u32,
    #[serde(rename = "MinFPS", default = "default_min_fps")]
    pub min_fps: u32,
    #[serde(rename = "VerticalSync", default)]
    pub vertical_sync: bool,
    #[serde(rename = "FirstLayout", default)]
    pub first_layout: String,
    #[serde(rename = "Extensions", default)]
    pub used_extensions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ProjectProperties {
    fn default() -> Self {
        Self {
            name: String::new(),
            author: String::new(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            max_fps: default_max_fps(),
            min_fps: default_min_fps(),
            vertical_sync: false,
            first_layout: String::new(),
            used_extensions: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesManager {
    #[serde(rename = "Resources", default)]
    pub resources: Vec<Resource>,
    #[serde(rename = "ResourceFolders", default)]
    pub folders: Vec<ResourceFolder>,
}

impl ResourcesManager {
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default = "Resource::default_kind")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default = "default_true")]
    pub smoothed: bool,
    #[serde(rename = "alwaysLoaded", default)]
    pub always_loaded: bool,
}

impl Resource {
    fn default_kind() -> String {
        "image".to_string()
    }

    pub fn image(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            kind: Self::default_kind(),
            name: name.into(),
            file: file.into(),
            smoothed: true,
            always_loaded: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFolder {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    #[serde(rename = "type", default = "default_object_kind")]
    pub kind: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Type-specific payload.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            variables: Vec::new(),
            content: Map::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGroup {
    pub name: String,
    #[serde(default)]
    pub objects: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub visibility: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An object placed in a scene or an external layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "name")]
    pub object: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub layer: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(rename = "SubInstructions", default)]
    pub sub_instructions: Vec<Instruction>,
}

impl Instruction {
    pub fn new(kind: impl Into<String>, parameters: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            parameters,
            ..Self::default()
        }
    }

    /// This instruction plus all its sub-instructions.
    pub fn tree_size(&self) -> usize {
        1 + self
            .sub_instructions
            .iter()
            .map(Instruction::tree_size)
            .sum::<usize>()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub folded: bool,
    #[serde(rename = "Conditions", default)]
    pub conditions: Vec<Instruction>,
    #[serde(rename = "Actions", default)]
    pub actions: Vec<Instruction>,
    #[serde(rename = "Events", default)]
    pub sub_events: Vec<Event>,
    /// Fields specific to the event type (comments, loops, links...).
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Event {
    pub fn standard() -> Self {
        Self {
            kind: "BuiltinCommonInstructions::Standard".to_string(),
            disabled: false,
            folded: false,
            conditions: Vec::new(),
            actions: Vec::new(),
            sub_events: Vec::new(),
            properties: Map::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "background", default = "default_background")]
    pub background_color: [u8; 3],
    #[serde(rename = "Objects", default)]
    pub objects: Vec<Object>,
    #[serde(rename = "ObjectGroups", default)]
    pub object_groups: Vec<ObjectGroup>,
    #[serde(rename = "Variables", default)]
    pub variables: Vec<Variable>,
    #[serde(rename = "Layers", default)]
    pub layers: Vec<Layer>,
    #[serde(rename = "Instances", default)]
    pub instances: Vec<Instance>,
    #[serde(rename = "Events", default)]
    pub events: Vec<Event>,
    /// Scene settings read by other tools (window behaviour, physics...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            background_color: default_background(),
            objects: Vec::new(),
            object_groups: Vec::new(),
            variables: Vec::new(),
            layers: Vec::new(),
            instances: Vec::new(),
            events: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Identifier used to name this scene's code symbol.
    pub fn mangled_name(&self) -> String {
        mangled_scene_name(&self.name)
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|object| object.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvents {
    pub name: String,
    #[serde(rename = "associatedScene", default)]
    pub associated_scene: String,
    #[serde(rename = "Events", default)]
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalLayout {
    pub name: String,
    #[serde(rename = "associatedScene", default)]
    pub associated_scene: String,
    #[serde(rename = "Instances", default)]
    pub instances: Vec<Instance>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub file: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
