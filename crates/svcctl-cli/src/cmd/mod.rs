pub mod params;
pub mod plan;
pub mod render;
pub mod run;
pub mod service;
pub mod validate;

use crate::interrupt::cancel_on_interrupt;
use crate::output::{print_json, print_report};
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use svcctl_core::descriptor::Descriptor;
use svcctl_core::orchestrator::{Invocation, Orchestrator};
use svcctl_core::paths;

/// Global flags shared by every subcommand.
pub struct Ctx {
    pub root: PathBuf,
    pub file: Option<PathBuf>,
    pub json: bool,
    pub timeout: Option<Duration>,
    pub command_timeout: Option<Duration>,
}

impl Ctx {
    pub fn descriptor_path(&self) -> PathBuf {
        match &self.file {
            Some(file) => file.clone(),
            None => paths::descriptor_path(&self.root),
        }
    }

    pub fn load(&self) -> anyhow::Result<Descriptor> {
        let path = self.descriptor_path();
        Descriptor::load(&path)
            .with_context(|| format!("failed to load descriptor {}", path.display()))
    }

    fn invocation(&self, invocation: Invocation) -> Invocation {
        invocation.with_timeouts(self.timeout, self.command_timeout)
    }
}

/// Run a phase to completion and print its report. Any outcome other than
/// success is returned as an error after the report is printed.
pub fn execute(ctx: &Ctx, descriptor: &Descriptor, invocation: Invocation) -> anyhow::Result<()> {
    let invocation = ctx.invocation(invocation);
    let cancel = cancel_on_interrupt()?;
    let report = Orchestrator::new(descriptor)
        .with_cancel(cancel)
        .run(&invocation)?;

    if ctx.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    report.ensure_success()?;
    Ok(())
}
