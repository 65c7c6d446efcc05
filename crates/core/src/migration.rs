//! Upgrades project documents written by older releases.
//!
//! Rules are evaluated in table order against the version the document
//! declared before migration, so several rules can fire for one document.
//! A failing rule restores the tree to its state before the first rule ran.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::InstructionCatalog;
use crate::document::{sections, ProjectDocument};
use crate::error::GdError;
use crate::factory::DEFAULT_OBJECT_KIND;
use crate::version::{VersionTuple, CURRENT_VERSION};

pub const EXTERNAL_LAYOUTS_EXTENSION: &str = "BuiltinExternalLayouts";

const RETIRED_EXTENSIONS: &[(&str, &str)] = &[
    ("PhysicsAutomatism", "PhysicsBehavior"),
    ("PlatformAutomatism", "PlatformBehavior"),
    ("PathfindingAutomatism", "PathfindingBehavior"),
];

/// Instruction lists an event may carry. Only loop events have the last one.
const EVENT_INSTRUCTION_LISTS: &[&str] = &["Conditions", "Actions", "whileConditions"];

const LEGACY_INFO_KEYS: &[(&str, &str)] = &[
    ("Nom", "Name"),
    ("Auteur", "Author"),
    ("WindowW", "WindowWidth"),
    ("WindowH", "WindowHeight"),
    ("FPSmax", "MaxFPS"),
    ("FPSmin", "MinFPS"),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTraceEntry {
    pub rule_id: String,
    pub changed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationWarning {
    /// An instruction type the catalog does not know. Its parameters were
    /// left untouched.
    UnknownInstructionType { instruction: String },
    /// Parameter insertion was due but no catalog was available, so every
    /// instruction kept its parameters.
    NoInstructionCatalog,
    /// A legacy image folder declared twice; only the first one was kept.
    DuplicateResourceFolder { folder: String },
    /// The document was rewritten and can no longer be opened by the
    /// release that saved it.
    NotBackwardCompatible { saved_with: VersionTuple },
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationWarning::UnknownInstructionType { instruction } => {
                write!(f, "unknown instruction type '{instruction}' left as is")
            }
            MigrationWarning::NoInstructionCatalog => write!(
                f,
                "no instruction catalog available, code-only parameters were not inserted"
            ),
            MigrationWarning::DuplicateResourceFolder { folder } => {
                write!(f, "duplicated resource folder '{folder}' removed")
            }
            MigrationWarning::NotBackwardCompatible { saved_with } => write!(
                f,
                "project was upgraded from {saved_with}; once saved it cannot be opened by that release anymore"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub from_version: VersionTuple,
    pub to_version: VersionTuple,
    pub entries: Vec<MigrationTraceEntry>,
    pub warnings: Vec<MigrationWarning>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        self.entries.iter().any(|entry| entry.changed)
    }

    pub fn applied_rules(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.rule_id.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationError {
    RuleFailed {
        rule_id: String,
        from_version: VersionTuple,
        message: String,
    },
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::RuleFailed {
                rule_id,
                from_version,
                message,
            } => write!(
                f,
                "migration rule '{rule_id}' failed on a {from_version} document: {message}"
            ),
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<MigrationError> for GdError {
    fn from(err: MigrationError) -> Self {
        GdError::MalformedDocument(err.to_string())
    }
}

/// What a transform may consult besides the tree.
pub struct RuleContext<'a> {
    pub catalog: &'a InstructionCatalog,
}

type Transform =
    fn(&mut Map<String, Value>, &RuleContext<'_>, &mut Vec<MigrationWarning>) -> Result<bool, String>;

#[derive(Clone, Copy)]
pub struct MigrationRule {
    pub id: &'static str,
    pub applies: fn(VersionTuple) -> bool,
    apply: Transform,
}

const MIGRATION_RULES: &[MigrationRule] = &[
    MigrationRule {
        id: "legacy_images_to_resources",
        applies: predates_resource_manager,
        apply: legacy_images_to_resources,
    },
    MigrationRule {
        id: "legacy_info_keys",
        applies: first_major_line,
        apply: legacy_info_keys,
    },
    MigrationRule {
        id: "require_external_layouts_extension",
        applies: predates_code_only_parameters,
        apply: require_external_layouts_extension,
    },
    MigrationRule {
        id: "rename_retired_extensions",
        applies: always,
        apply: rename_retired_extensions,
    },
    MigrationRule {
        id: "insert_code_only_parameters",
        applies: predates_code_only_parameters,
        apply: insert_code_only_parameters,
    },
];

pub fn migration_rules() -> &'static [MigrationRule] {
    MIGRATION_RULES
}

/// Documents saved before resources replaced the flat image list.
pub fn predates_resource_manager(version: VersionTuple) -> bool {
    version.major < 2 || (version.major == 2 && version.minor == 0 && version.build <= 10498)
}

/// Documents saved before code-only parameters were stored.
pub fn predates_code_only_parameters(version: VersionTuple) -> bool {
    version.major < 2 || (version.major == 2 && version.minor <= 1 && version.build <= 10822)
}

fn first_major_line(version: VersionTuple) -> bool {
    version.major < 2
}

fn always(_: VersionTuple) -> bool {
    true
}

pub struct DocumentMigrator<'a> {
    catalog: &'a InstructionCatalog,
}

impl<'a> DocumentMigrator<'a> {
    pub fn new(catalog: &'a InstructionCatalog) -> Self {
        Self { catalog }
    }

    /// Runs every applicable rule. On failure the document is left exactly as
    /// it was passed in.
    pub fn migrate(&self, document: &mut ProjectDocument) -> Result<MigrationReport, MigrationError> {
        let snapshot = document.clone();
        match self.migrate_inner(document) {
            Ok(report) => Ok(report),
            Err(err) => {
                *document = snapshot;
                Err(err)
            }
        }
    }

    fn migrate_inner(&self, document: &mut ProjectDocument) -> Result<MigrationReport, MigrationError> {
        let from_version = document.version();
        let context = RuleContext {
            catalog: self.catalog,
        };
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for rule in MIGRATION_RULES {
            if !(rule.applies)(from_version) {
                continue;
            }
            let changed = (rule.apply)(document.root_mut(), &context, &mut warnings).map_err(
                |message| MigrationError::RuleFailed {
                    rule_id: rule.id.to_string(),
                    from_version,
                    message,
                },
            )?;
            debug!(rule = rule.id, changed, "migration rule evaluated");
            entries.push(MigrationTraceEntry {
                rule_id: rule.id.to_string(),
                changed,
            });
        }

        let changed = entries.iter().any(|entry| entry.changed);
        let to_version = if changed {
            document.set_version(CURRENT_VERSION);
            warnings.push(MigrationWarning::NotBackwardCompatible {
                saved_with: from_version,
            });
            CURRENT_VERSION
        } else {
            from_version
        };
        for warning in &warnings {
            warn!(%warning, "project migration");
        }

        Ok(MigrationReport {
            from_version,
            to_version,
            entries,
            warnings,
        })
    }
}

fn legacy_images_to_resources(
    root: &mut Map<String, Value>,
    _: &RuleContext<'_>,
    warnings: &mut Vec<MigrationWarning>,
) -> Result<bool, String> {
    let images = root.remove(sections::LEGACY_IMAGES);
    let folders = root.remove(sections::LEGACY_IMAGE_FOLDERS);
    if images.is_none() && folders.is_none() {
        return Ok(false);
    }

    let mut resources = Vec::new();
    if let Some(images) = images {
        let Value::Array(images) = images else {
            return Err("Images must be an array".to_string());
        };
        for image in images {
            let Value::Object(mut image) = image else {
                // Left for the loader to report and skip.
                resources.push(image);
                continue;
            };
            image.insert("kind".to_string(), Value::from("image"));
            image
                .entry("smoothed".to_string())
                .or_insert(Value::Bool(true));
            image
                .entry("alwaysLoaded".to_string())
                .or_insert(Value::Bool(false));
            resources.push(Value::Object(image));
        }
    }

    let mut resource_folders = Vec::new();
    if let Some(folders) = folders {
        let Value::Array(folders) = folders else {
            return Err("ImageFolders must be an array".to_string());
        };
        let mut seen = HashSet::new();
        for folder in folders {
            let Value::Object(mut folder) = folder else {
                resource_folders.push(folder);
                continue;
            };
            let name = folder
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if !seen.insert(name.clone()) {
                warnings.push(MigrationWarning::DuplicateResourceFolder { folder: name });
                continue;
            }
            if let Some(content) = folder.remove("content") {
                folder.insert("resources".to_string(), content);
            }
            resource_folders.push(Value::Object(folder));
        }
    }

    let manager = root
        .entry(sections::RESOURCES.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| "Resources must be an object".to_string())?;
    append_to_array(manager, "Resources", resources)?;
    append_to_array(manager, "ResourceFolders", resource_folders)?;
    Ok(true)
}

fn append_to_array(
    map: &mut Map<String, Value>,
    key: &str,
    items: Vec<Value>,
) -> Result<(), String> {
    let target = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| format!("{key} must be an array"))?;
    target.extend(items);
    Ok(())
}

fn legacy_info_keys(
    root: &mut Map<String, Value>,
    _: &RuleContext<'_>,
    _: &mut Vec<MigrationWarning>,
) -> Result<bool, String> {
    let mut changed = false;

    if let Some(info) = root.get_mut(sections::INFO) {
        let info = info
            .as_object_mut()
            .ok_or_else(|| "Info must be an object".to_string())?;
        for (legacy, current) in LEGACY_INFO_KEYS {
            let Some(value) = info.remove(*legacy) else {
                continue;
            };
            changed = true;
            if info.contains_key(*current) {
                continue;
            }
            info.insert(current.to_string(), numeric_if_possible(value));
        }
    }

    if let Some(objects) = root.get_mut(sections::OBJECTS) {
        changed |= default_object_kinds(objects);
    }
    if let Some(Value::Array(scenes)) = root.get_mut(sections::SCENES) {
        for scene in scenes {
            if let Some(objects) = scene.get_mut("Objects") {
                changed |= default_object_kinds(objects);
            }
        }
    }
    Ok(changed)
}

fn default_object_kinds(objects: &mut Value) -> bool {
    let Some(objects) = objects.as_array_mut() else {
        return false;
    };
    let mut changed = false;
    for object in objects.iter_mut().filter_map(Value::as_object_mut) {
        if !object.contains_key("type") {
            object.insert("type".to_string(), Value::from(DEFAULT_OBJECT_KIND));
            changed = true;
        }
    }
    changed
}

/// Old releases wrote numbers as text in a few `Info` fields.
fn numeric_if_possible(value: Value) -> Value {
    match value.as_str().map(str::trim).map(str::parse::<u64>) {
        Some(Ok(number)) => Value::from(number),
        _ => value,
    }
}

fn used_extensions(root: &mut Map<String, Value>) -> Result<&mut Vec<Value>, String> {
    let info = root
        .entry(sections::INFO.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| "Info must be an object".to_string())?;
    info.entry(sections::USED_EXTENSIONS.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| "Info.Extensions must be an array".to_string())
}

fn require_external_layouts_extension(
    root: &mut Map<String, Value>,
    _: &RuleContext<'_>,
    _: &mut Vec<MigrationWarning>,
) -> Result<bool, String> {
    let extensions = used_extensions(root)?;
    if extensions
        .iter()
        .any(|extension| extension.as_str() == Some(EXTERNAL_LAYOUTS_EXTENSION))
    {
        return Ok(false);
    }
    extensions.push(Value::from(EXTERNAL_LAYOUTS_EXTENSION));
    Ok(true)
}

fn rename_retired_extensions(
    root: &mut Map<String, Value>,
    _: &RuleContext<'_>,
    _: &mut Vec<MigrationWarning>,
) -> Result<bool, String> {
    let mut changed = false;

    let declared = root
        .get_mut(sections::INFO)
        .and_then(Value::as_object_mut)
        .and_then(|info| info.get_mut(sections::USED_EXTENSIONS))
        .and_then(Value::as_array_mut);
    if let Some(extensions) = declared {
        for extension in extensions.iter_mut() {
            let Some(name) = extension.as_str() else {
                continue;
            };
            if let Some((_, replacement)) = RETIRED_EXTENSIONS.iter().find(|(old, _)| *old == name)
            {
                *extension = Value::from(*replacement);
                changed = true;
            }
        }
    }

    for_each_instruction(root, &mut |instruction| {
        let Some(kind) = instruction.get("type").and_then(Value::as_str) else {
            return Ok(());
        };
        let Some((extension, rest)) = kind.split_once("::") else {
            return Ok(());
        };
        if let Some((_, replacement)) = RETIRED_EXTENSIONS
            .iter()
            .find(|(old, _)| *old == extension)
        {
            let renamed = format!("{replacement}::{rest}");
            instruction.insert("type".to_string(), Value::from(renamed));
            changed = true;
        }
        Ok(())
    })?;
    Ok(changed)
}

fn insert_code_only_parameters(
    root: &mut Map<String, Value>,
    context: &RuleContext<'_>,
    warnings: &mut Vec<MigrationWarning>,
) -> Result<bool, String> {
    if context.catalog.is_empty() {
        warnings.push(MigrationWarning::NoInstructionCatalog);
        return Ok(false);
    }
    let mut changed = false;
    let mut reported = HashSet::new();

    for_each_instruction(root, &mut |instruction| {
        let kind = instruction
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(signature) = context.catalog.signature(&kind) else {
            if reported.insert(kind.clone()) {
                warnings.push(MigrationWarning::UnknownInstructionType { instruction: kind });
            }
            return Ok(());
        };
        let parameters = instruction
            .entry("parameters".to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| format!("parameters of '{kind}' must be an array"))?;
        // Only documents missing parameters are padded, which keeps the rule
        // idempotent.
        for (position, parameter) in signature.iter().enumerate() {
            if parameters.len() >= signature.len() {
                break;
            }
            if !parameter.code_only {
                continue;
            }
            let position = position.min(parameters.len());
            parameters.insert(position, Value::from(""));
            changed = true;
        }
        Ok(())
    })?;
    Ok(changed)
}

/// Visits every instruction of every scene and external event, depth first:
/// each instruction list of an event, then its sub-events. Sub-instructions are visited
/// right after their parent.
fn for_each_instruction(
    root: &mut Map<String, Value>,
    visit: &mut dyn FnMut(&mut Map<String, Value>) -> Result<(), String>,
) -> Result<(), String> {
    for section in [sections::SCENES, sections::EXTERNAL_EVENTS] {
        let Some(containers) = root.get_mut(section) else {
            continue;
        };
        let containers = containers
            .as_array_mut()
            .ok_or_else(|| format!("{section} must be an array"))?;
        for container in containers {
            if let Some(events) = container.get_mut("Events") {
                walk_events(events, visit)?;
            }
        }
    }
    Ok(())
}

fn walk_events(
    events: &mut Value,
    visit: &mut dyn FnMut(&mut Map<String, Value>) -> Result<(), String>,
) -> Result<(), String> {
    let events = events
        .as_array_mut()
        .ok_or_else(|| "event list must be an array".to_string())?;
    for event in events.iter_mut().filter_map(Value::as_object_mut) {
        for list in EVENT_INSTRUCTION_LISTS {
            if let Some(instructions) = event.get_mut(*list) {
                walk_instructions(instructions, visit)?;
            }
        }
        if let Some(sub_events) = event.get_mut("Events") {
            walk_events(sub_events, visit)?;
        }
    }
    Ok(())
}

fn walk_instructions(
    instructions: &mut Value,
    visit: &mut dyn FnMut(&mut Map<String, Value>) -> Result<(), String>,
) -> Result<(), String> {
    let instructions = instructions
        .as_array_mut()
        .ok_or_else(|| "instruction list must be an array".to_string())?;
    for instruction in instructions.iter_mut().filter_map(Value::as_object_mut) {
        visit(instruction)?;
        if let Some(sub_instructions) = instruction.get_mut("SubInstructions") {
            walk_instructions(sub_instructions, visit)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/migration_unit_tests.rs"]
mod tests;
