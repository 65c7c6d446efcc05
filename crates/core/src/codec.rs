//! Conversion between project documents and the in-memory model.
//!
//! Decoding runs the compatibility gate, then the migrator, then reads the
//! document section by section. Problems confined to one entry of user
//! content are logged and the entry is skipped; problems with the shape of
//! the document itself fail the load.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::catalog::InstructionCatalog;
use crate::document::{sections, ProjectDocument};
use crate::error::{GdError, GdResult};
use crate::factory::{Creation, ObjectFactory, DEFAULT_OBJECT_KIND};
use crate::migration::{DocumentMigrator, MigrationReport};
use crate::model::{
    Event, ExternalEvents, Object, ObjectGroup, Project, ProjectProperties, Resource,
    ResourceFolder, ResourcesManager, Scene, Variable,
};
use crate::version::{self, Compatibility, VersionTuple, CURRENT_VERSION};

/// How strictly the compatibility gate treats documents from the first major
/// release line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadProfile {
    /// Player: such documents are refused.
    #[default]
    Runtime,
    /// Authoring tools: such documents are migrated with a warning.
    Editor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    NewerVersion { found: VersionTuple },
    LegacyVersion { found: VersionTuple },
    MissingSection { section: String },
    SkippedEntry { section: String, reason: String },
    UnknownObjectType { object: String, object_type: String },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::NewerVersion { found } => write!(
                f,
                "project was saved with {found}, newer than {CURRENT_VERSION}; some content may be lost"
            ),
            DecodeWarning::LegacyVersion { found } => write!(
                f,
                "project was saved with {found}; it is upgraded directly, check it carefully"
            ),
            DecodeWarning::MissingSection { section } => {
                write!(f, "section '{section}' is missing")
            }
            DecodeWarning::SkippedEntry { section, reason } => {
                write!(f, "skipped an entry of '{section}': {reason}")
            }
            DecodeWarning::UnknownObjectType {
                object,
                object_type,
            } => write!(
                f,
                "object '{object}' has unknown type '{object_type}' and is kept as a generic object"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    pub project: Project,
    pub compatibility: Compatibility,
    pub migration: MigrationReport,
    pub warnings: Vec<DecodeWarning>,
}

pub struct ProjectCodec<'a> {
    catalog: &'a InstructionCatalog,
    factory: &'a ObjectFactory,
    profile: LoadProfile,
}

impl<'a> ProjectCodec<'a> {
    pub fn new(catalog: &'a InstructionCatalog, factory: &'a ObjectFactory) -> Self {
        Self {
            catalog,
            factory,
            profile: LoadProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: LoadProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn profile(&self) -> LoadProfile {
        self.profile
    }

    pub fn decode_str(&self, text: &str) -> GdResult<Decoded> {
        self.decode(ProjectDocument::parse(text)?)
    }

    #[instrument(skip_all, fields(profile = ?self.profile))]
    pub fn decode(&self, mut document: ProjectDocument) -> GdResult<Decoded> {
        let mut warnings = Vec::new();
        let found = document.version();

        match self.profile {
            LoadProfile::Runtime => version::ensure_supported(found)?,
            LoadProfile::Editor if found.major <= 1 => {
                push(&mut warnings, DecodeWarning::LegacyVersion { found });
            }
            LoadProfile::Editor => {}
        }
        let compatibility = version::compare(found, CURRENT_VERSION);
        if compatibility == Compatibility::Newer {
            push(&mut warnings, DecodeWarning::NewerVersion { found });
        }

        let migration = DocumentMigrator::new(self.catalog).migrate(&mut document)?;

        let mut reader = SectionReader {
            document: &document,
            factory: self.factory,
            warnings,
        };
        let project = Project {
            properties: reader.properties()?,
            resources: reader.resources()?,
            objects: reader.objects_section()?,
            object_groups: reader.lenient_section(sections::OBJECT_GROUPS)?,
            variables: reader.lenient_section(sections::VARIABLES)?,
            scenes: reader.scenes()?,
            external_events: reader.external_events()?,
            external_layouts: reader.lenient_section(sections::EXTERNAL_LAYOUTS)?,
            external_source_files: reader.lenient_section(sections::EXTERNAL_SOURCE_FILES)?,
        };
        info!(
            scenes = project.scenes.len(),
            objects = project.objects.len(),
            warnings = reader.warnings.len(),
            "project decoded"
        );

        Ok(Decoded {
            project,
            compatibility,
            migration,
            warnings: reader.warnings,
        })
    }

    /// Builds the document for `project`, stamped with the running version.
    pub fn encode(&self, project: &Project) -> GdResult<ProjectDocument> {
        let mut root = Map::new();
        root.insert(
            version::VERSION_ELEMENT.to_string(),
            CURRENT_VERSION.to_element(),
        );
        root.insert(sections::INFO.to_string(), to_value(&project.properties)?);
        root.insert(sections::RESOURCES.to_string(), to_value(&project.resources)?);
        root.insert(sections::OBJECTS.to_string(), to_value(&project.objects)?);
        root.insert(
            sections::OBJECT_GROUPS.to_string(),
            to_value(&project.object_groups)?,
        );
        root.insert(sections::VARIABLES.to_string(), to_value(&project.variables)?);
        root.insert(sections::SCENES.to_string(), to_value(&project.scenes)?);
        root.insert(
            sections::EXTERNAL_EVENTS.to_string(),
            to_value(&project.external_events)?,
        );
        root.insert(
            sections::EXTERNAL_LAYOUTS.to_string(),
            to_value(&project.external_layouts)?,
        );
        root.insert(
            sections::EXTERNAL_SOURCE_FILES.to_string(),
            to_value(&project.external_source_files)?,
        );
        Ok(ProjectDocument::from_map(root))
    }

    pub fn encode_string(&self, project: &Project) -> GdResult<String> {
        self.encode(project)?.to_string_pretty()
    }
}

fn to_value<T: Serialize>(value: &T) -> GdResult<Value> {
    serde_json::to_value(value).map_err(|err| GdError::Serialization(err.to_string()))
}

fn push(warnings: &mut Vec<DecodeWarning>, warning: DecodeWarning) {
    warn!(%warning, "project load");
    warnings.push(warning);
}

/// Scene keys read into typed fields; everything else lands in `Scene::extra`.
const SCENE_KEYS: &[&str] = &[
    "name",
    "title",
    "background",
    "Objects",
    "ObjectGroups",
    "Variables",
    "Layers",
    "Instances",
    "Events",
];

struct SectionReader<'d> {
    document: &'d ProjectDocument,
    factory: &'d ObjectFactory,
    warnings: Vec<DecodeWarning>,
}

impl<'d> SectionReader<'d> {
    fn warn(&mut self, warning: DecodeWarning) {
        push(&mut self.warnings, warning);
    }

    fn missing(&mut self, section: &str) {
        self.warn(DecodeWarning::MissingSection {
            section: section.to_string(),
        });
    }

    fn skipped(&mut self, section: &str, reason: impl Into<String>) {
        self.warn(DecodeWarning::SkippedEntry {
            section: section.to_string(),
            reason: reason.into(),
        });
    }

    /// A top-level list section. Absent sections read as empty with a
    /// warning; a section that is not a list fails the load.
    fn list_section(&mut self, name: &str) -> GdResult<&'d [Value]> {
        let document = self.document;
        match document.section(name) {
            None => {
                self.missing(name);
                Ok(&[])
            }
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(GdError::MalformedDocument(format!(
                "section '{name}' must be a list"
            ))),
        }
    }

    fn lenient_section<T: DeserializeOwned>(&mut self, name: &str) -> GdResult<Vec<T>> {
        let items = self.list_section(name)?;
        Ok(self.lenient_items(name, items))
    }

    /// Decodes each entry on its own, skipping the ones that do not fit.
    fn lenient_items<T: DeserializeOwned>(&mut self, context: &str, items: &[Value]) -> Vec<T> {
        let mut decoded = Vec::with_capacity(items.len());
        for item in items {
            match T::deserialize(item) {
                Ok(value) => decoded.push(value),
                Err(err) => self.skipped(context, err.to_string()),
            }
        }
        decoded
    }

    fn nested_items<T: DeserializeOwned>(
        &mut self,
        context: &str,
        container: &Map<String, Value>,
        key: &str,
    ) -> GdResult<Vec<T>> {
        match container.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(self.lenient_items(context, items)),
            Some(_) => Err(GdError::MalformedDocument(format!(
                "'{key}' of {context} must be a list"
            ))),
        }
    }

    fn properties(&mut self) -> GdResult<ProjectProperties> {
        let Some(info) = self.document.section(sections::INFO) else {
            self.missing(sections::INFO);
            return Ok(ProjectProperties::default());
        };
        ProjectProperties::deserialize(info)
            .map_err(|err| GdError::MalformedDocument(format!("Info: {err}")))
    }

    fn resources(&mut self) -> GdResult<ResourcesManager> {
        let document = self.document;
        let Some(section) = document.section(sections::RESOURCES) else {
            self.missing(sections::RESOURCES);
            return Ok(ResourcesManager::default());
        };
        let section = section.as_object().ok_or_else(|| {
            GdError::MalformedDocument("section 'Resources' must be an object".to_string())
        })?;
        let resources: Vec<Resource> = self.nested_items(sections::RESOURCES, section, "Resources")?;
        let folders: Vec<ResourceFolder> =
            self.nested_items(sections::RESOURCES, section, "ResourceFolders")?;
        Ok(ResourcesManager { resources, folders })
    }

    fn objects_section(&mut self) -> GdResult<Vec<Object>> {
        let items = self.list_section(sections::OBJECTS)?;
        Ok(self.objects(sections::OBJECTS, items))
    }

    fn objects(&mut self, context: &str, items: &[Value]) -> Vec<Object> {
        let mut objects = Vec::with_capacity(items.len());
        for item in items {
            let Some(fields) = item.as_object() else {
                self.skipped(context, "object entry is not a map");
                continue;
            };
            let Some(name) = fields.get("name").and_then(Value::as_str) else {
                self.skipped(context, "object without a name");
                continue;
            };
            let kind = match fields.get("type") {
                None => DEFAULT_OBJECT_KIND,
                Some(Value::String(kind)) => kind.as_str(),
                Some(_) => {
                    self.skipped(context, format!("object '{name}' has a non-text type"));
                    continue;
                }
            };
            let mut object = match self.factory.create(kind, name) {
                Creation::Created(object) => object,
                Creation::WrongKind(object) => {
                    self.warn(DecodeWarning::UnknownObjectType {
                        object: name.to_string(),
                        object_type: kind.to_string(),
                    });
                    object
                }
            };
            object.variables = match fields.get("variables") {
                Some(Value::Array(variables)) => self.lenient_items::<Variable>(context, variables),
                _ => Vec::new(),
            };
            object.content = fields
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "name" | "type" | "variables"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            objects.push(object);
        }
        objects
    }

    fn scenes(&mut self) -> GdResult<Vec<Scene>> {
        let items = self.list_section(sections::SCENES)?;
        let mut scenes = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            scenes.push(self.scene(index, item)?);
        }
        Ok(scenes)
    }

    fn scene(&mut self, index: usize, item: &Value) -> GdResult<Scene> {
        let fields = item
            .as_object()
            .ok_or_else(|| GdError::MalformedDocument(format!("scene #{index} is not a map")))?;
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| GdError::MalformedDocument(format!("scene #{index} has no name")))?;
        let context = format!("scene '{name}'");
        let malformed = |err: serde_json::Error| GdError::MalformedDocument(format!("{context}: {err}"));

        let mut scene = Scene::new(name);
        if let Some(title) = fields.get("title") {
            scene.title = String::deserialize(title).map_err(malformed)?;
        }
        if let Some(background) = fields.get("background") {
            scene.background_color = <[u8; 3]>::deserialize(background).map_err(malformed)?;
        }
        scene.objects = match fields.get("Objects") {
            None => Vec::new(),
            Some(Value::Array(items)) => self.objects(&context, items),
            Some(_) => {
                return Err(GdError::MalformedDocument(format!(
                    "'Objects' of {context} must be a list"
                )))
            }
        };
        scene.object_groups = self.nested_items::<ObjectGroup>(&context, fields, "ObjectGroups")?;
        scene.variables = self.nested_items(&context, fields, "Variables")?;
        scene.layers = self.nested_items(&context, fields, "Layers")?;
        scene.instances = self.nested_items(&context, fields, "Instances")?;
        scene.events = self.nested_items::<Event>(&context, fields, "Events")?;
        scene.extra = fields
            .iter()
            .filter(|(key, _)| !SCENE_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(scene)
    }

    fn external_events(&mut self) -> GdResult<Vec<ExternalEvents>> {
        let section = sections::EXTERNAL_EVENTS;
        let items = self.list_section(section)?;
        let mut decoded = Vec::with_capacity(items.len());
        for item in items {
            let Some(fields) = item.as_object() else {
                self.skipped(section, "external events entry is not a map");
                continue;
            };
            let Some(name) = fields.get("name").and_then(Value::as_str) else {
                self.skipped(section, "external events without a name");
                continue;
            };
            let context = format!("external events '{name}'");
            let associated_scene = match fields.get("associatedScene") {
                None => String::new(),
                Some(Value::String(scene)) => scene.clone(),
                Some(_) => {
                    self.skipped(section, format!("{context} has a non-text associated scene"));
                    continue;
                }
            };
            let events = match fields.get("Events") {
                None => Vec::new(),
                Some(Value::Array(events)) => self.lenient_items::<Event>(&context, events),
                Some(_) => {
                    self.skipped(section, format!("'Events' of {context} is not a list"));
                    continue;
                }
            };
            decoded.push(ExternalEvents {
                name: name.to_string(),
                associated_scene,
                events,
            });
        }
        Ok(decoded)
    }
}

#[cfg(test)]
#[path = "tests/codec_unit_tests.rs"]
mod tests;
