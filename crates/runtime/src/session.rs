//! The runtime loop.
//!
//! `Initializing -> Running -> (Switching -> Running)* -> Quitting -> Terminated`

use gd_project::Project;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::context::RuntimeContext;
use crate::error::{RuntimeError, RuntimeResult};
use crate::module::CodeModuleLoader;
use crate::scene::RuntimeScene;

/// Step code asking the session to quit.
pub const QUIT_CODE: i32 = -2;
/// Step code asking the session to stay on the current scene.
pub const CONTINUE_CODE: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RuntimeState {
    Initializing,
    Running,
    Switching,
    Quitting,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Quit,
    SwitchTo(usize),
}

impl StepOutcome {
    /// Maps a raw step code. `None` for codes outside the protocol.
    pub fn from_code(code: i32, scene_count: usize) -> Option<Self> {
        match code {
            QUIT_CODE => Some(StepOutcome::Quit),
            CONTINUE_CODE => Some(StepOutcome::Continue),
            index if index >= 0 && (index as usize) < scene_count => {
                Some(StepOutcome::SwitchTo(index as usize))
            }
            _ => None,
        }
    }
}

/// Headless stand-in for the game window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowHandle {
    pub title: String,
    pub width: u32,
    pub height: u32,
    open: bool,
}

impl WindowHandle {
    pub fn open(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

pub struct RuntimeSession {
    project: Project,
    context: RuntimeContext,
    loader: CodeModuleLoader,
    window: WindowHandle,
    scene: Option<RuntimeScene>,
    state: RuntimeState,
    next_instance_id: u64,
    steps: u64,
    unknown_codes: u64,
}

impl RuntimeSession {
    /// Enters the first scene. Fails before touching the loader when the
    /// project has no scene.
    #[instrument(skip_all, fields(project = %project.properties.name))]
    pub fn start(
        project: Project,
        context: RuntimeContext,
        loader: CodeModuleLoader,
    ) -> RuntimeResult<Self> {
        if project.scenes.is_empty() {
            return Err(RuntimeError::NoSceneToLoad);
        }
        let window = WindowHandle::open(
            project.properties.name.clone(),
            project.properties.window_width,
            project.properties.window_height,
        );
        let mut session = Self {
            project,
            context,
            loader,
            window,
            scene: None,
            state: RuntimeState::Initializing,
            next_instance_id: 0,
            steps: 0,
            unknown_codes: 0,
        };
        if let Err(err) = session.enter_scene(0) {
            session.teardown();
            return Err(err);
        }
        session.state = RuntimeState::Running;
        info!(scene = %session.project.scenes[0].name, "session started");
        Ok(session)
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RuntimeContext {
        &mut self.context
    }

    pub fn loader(&self) -> &CodeModuleLoader {
        &self.loader
    }

    pub fn window(&self) -> &WindowHandle {
        &self.window
    }

    pub fn scene(&self) -> Option<&RuntimeScene> {
        self.scene.as_ref()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Step codes that were outside the protocol and treated as continue.
    pub fn unknown_codes(&self) -> u64 {
        self.unknown_codes
    }

    /// Runs one step of the active scene and applies its outcome.
    pub fn step(&mut self) -> RuntimeResult<StepOutcome> {
        if self.state != RuntimeState::Running {
            return Err(RuntimeError::InvalidState {
                state: self.state,
                expected: RuntimeState::Running,
            });
        }
        let scene_count = self.project.scenes.len();
        let code = match self.scene.as_mut() {
            Some(scene) => {
                scene.advance_frame();
                self.loader.step(scene)
            }
            None => None,
        };
        let Some(code) = code else {
            return Err(RuntimeError::InvalidState {
                state: RuntimeState::Initializing,
                expected: RuntimeState::Running,
            });
        };
        self.steps += 1;

        let outcome = StepOutcome::from_code(code, scene_count).unwrap_or_else(|| {
            warn!(code, scene_count, "unknown step code treated as continue");
            self.unknown_codes += 1;
            StepOutcome::Continue
        });
        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::Quit => self.quit(),
            StepOutcome::SwitchTo(index) => self.switch_to(index)?,
        }
        Ok(outcome)
    }

    /// Steps until the session terminates.
    pub fn run(&mut self) -> RuntimeResult<()> {
        while self.state == RuntimeState::Running {
            self.step()?;
        }
        Ok(())
    }

    fn switch_to(&mut self, index: usize) -> RuntimeResult<()> {
        self.state = RuntimeState::Switching;
        if let Err(err) = self.enter_scene(index) {
            self.teardown();
            return Err(err);
        }
        self.state = RuntimeState::Running;
        Ok(())
    }

    /// Drops the current scene, builds a fresh one, then swaps the module.
    fn enter_scene(&mut self, index: usize) -> RuntimeResult<()> {
        self.scene = None;
        let scene = RuntimeScene::build(&self.project, index, self.next_instance_id)?;
        self.next_instance_id += 1;
        self.loader.load(scene.name())?;
        info!(scene = scene.name(), instance = scene.instance_id(), "scene entered");
        self.scene = Some(scene);
        Ok(())
    }

    pub fn quit(&mut self) {
        if matches!(self.state, RuntimeState::Quitting | RuntimeState::Terminated) {
            return;
        }
        self.state = RuntimeState::Quitting;
        self.teardown();
        info!(steps = self.steps, "session terminated");
    }

    fn teardown(&mut self) {
        self.scene = None;
        self.context.shutdown();
        self.loader.unload();
        self.window.close();
        self.state = RuntimeState::Terminated;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
