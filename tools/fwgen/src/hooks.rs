//! Pre/post build hook scheduling
//!
//! The build tool calls `fwgen hook pre` before compiling and
//! `fwgen hook post --target <firmware.bin>` after linking. Each phase runs
//! its registered actions in order and stops at the first error.

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;

use crate::build_info::Step;
use crate::config::{ConfigSource, Settings};
use crate::{archive, build_info, bundle, splash};

/// Build phase a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Phase {
    /// Before compilation
    Pre,
    /// After the firmware image is linked
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pre => write!(f, "pre"),
            Phase::Post => write!(f, "post"),
        }
    }
}

/// Everything a hook may look at.
pub struct HookContext<'a> {
    pub config: &'a dyn ConfigSource,
    pub settings: &'a Settings,
    /// Build target (the firmware image in the post phase)
    pub target: Option<&'a Path>,
}

/// A build action
pub type Hook = Box<dyn Fn(&HookContext<'_>) -> Result<()>>;

struct Registered {
    name: String,
    hook: Hook,
}

/// Ordered pre/post action lists.
#[derive(Default)]
pub struct HookScheduler {
    pre: Vec<Registered>,
    post: Vec<Registered>,
}

impl HookScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre_action(
        &mut self,
        name: impl Into<String>,
        hook: impl Fn(&HookContext<'_>) -> Result<()> + 'static,
    ) -> &mut Self {
        self.add(Phase::Pre, name.into(), Box::new(hook))
    }

    pub fn add_post_action(
        &mut self,
        name: impl Into<String>,
        hook: impl Fn(&HookContext<'_>) -> Result<()> + 'static,
    ) -> &mut Self {
        self.add(Phase::Post, name.into(), Box::new(hook))
    }

    fn add(&mut self, phase: Phase, name: String, hook: Hook) -> &mut Self {
        self.actions_mut(phase).push(Registered { name, hook });
        self
    }

    fn actions(&self, phase: Phase) -> &[Registered] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    fn actions_mut(&mut self, phase: Phase) -> &mut Vec<Registered> {
        match phase {
            Phase::Pre => &mut self.pre,
            Phase::Post => &mut self.post,
        }
    }

    /// Names of the actions registered for `phase`, in run order
    pub fn names(&self, phase: Phase) -> Vec<&str> {
        self.actions(phase).iter().map(|a| a.name.as_str()).collect()
    }

    /// Run every action of `phase`. Returns the number of actions run.
    pub fn run(&self, phase: Phase, ctx: &HookContext<'_>) -> Result<usize> {
        let actions = self.actions(phase);
        tracing::info!("Running {} {} hook(s)", actions.len(), phase);

        for action in actions {
            tracing::info!("[{}] {}", phase, action.name);
            (action.hook)(ctx)
                .with_context(|| format!("{} hook '{}' failed", phase, action.name))?;
        }
        Ok(actions.len())
    }
}

/// The hooks a firmware build runs.
pub fn default_hooks() -> HookScheduler {
    let mut hooks = HookScheduler::new();
    hooks
        .add_pre_action("build-info", |ctx| {
            build_info::generate(ctx.config, ctx.settings, Step::PreHook).map(|_| ())
        })
        .add_pre_action("splash", |ctx| {
            splash::update_for_environment(ctx.config, ctx.settings, false).map(|_| ())
        })
        .add_pre_action("web-assets", |ctx| {
            bundle::write_configured(ctx.settings).map(|_| ())
        })
        .add_post_action("archive-firmware", archive_target);
    hooks
}

/// Archival never fails the build; problems are reported as warnings.
fn archive_target(ctx: &HookContext<'_>) -> Result<()> {
    let Some(target) = ctx.target else {
        tracing::warn!("No firmware target given, skipping archival");
        return Ok(());
    };

    if let Err(e) = archive::archive_firmware(ctx.config, ctx.settings, target) {
        tracing::warn!("Error copying firmware: {:#}", e);
    }
    Ok(())
}
