//! Live scene instances.

use gd_project::{Object, Project, Variable};
use serde_json::Value;
use tracing::warn;

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub layer: String,
}

/// A scene being played. Built fresh every time the scene is entered.
#[derive(Debug)]
pub struct RuntimeScene {
    index: usize,
    name: String,
    instance_id: u64,
    frame: u64,
    objects: Vec<SceneObject>,
    variables: Vec<Variable>,
}

impl RuntimeScene {
    /// Builds scene `index` of `project`. Instances of objects declared
    /// neither in the scene nor globally are skipped.
    pub fn build(project: &Project, index: usize, instance_id: u64) -> RuntimeResult<Self> {
        let layout = project
            .scene(index)
            .ok_or(RuntimeError::SceneConstruction {
                index,
                count: project.scenes.len(),
            })?;

        let mut objects = Vec::with_capacity(layout.instances.len());
        for instance in &layout.instances {
            let declared: Option<&Object> = layout
                .object(&instance.object)
                .or_else(|| project.object(&instance.object));
            let Some(declared) = declared else {
                warn!(scene = %layout.name, object = %instance.object, "instance of an unknown object skipped");
                continue;
            };
            objects.push(SceneObject {
                name: declared.name.clone(),
                kind: declared.kind.clone(),
                x: instance.x,
                y: instance.y,
                layer: instance.layer.clone(),
            });
        }

        Ok(Self {
            index,
            name: layout.name.clone(),
            instance_id,
            frame: 0,
            objects,
            variables: layout.variables.clone(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinguishes successive entries into the same scene.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn advance_frame(&mut self) {
        self.frame += 1;
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|variable| variable.name == name)
            .map(|variable| &variable.value)
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        match self.variables.iter_mut().find(|variable| variable.name == name) {
            Some(variable) => variable.value = value,
            None => self.variables.push(Variable {
                name: name.to_string(),
                value,
            }),
        }
    }
}
