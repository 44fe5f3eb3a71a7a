use super::Ctx;
use crate::output::{print_json, print_table};
use svcctl_core::orchestrator::{self, Invocation};
use svcctl_core::types::PhaseName;

pub struct PlanArgs {
    pub phase: String,
    pub service: Option<String>,
    pub config: Option<String>,
    pub action: Option<String>,
    pub args: Vec<String>,
}

/// Resolve and expand a phase without running anything.
pub fn run(ctx: &Ctx, args: PlanArgs) -> anyhow::Result<()> {
    let phase: PhaseName = args.phase.parse()?;
    let descriptor = ctx.load()?;

    let mut invocation = Invocation::phase(phase);
    invocation.service = args.service;
    invocation.config = args.config;
    if let Some(action) = args.action {
        invocation = invocation.with_action(action, args.args);
    }
    let invocation = invocation.with_timeouts(ctx.timeout, ctx.command_timeout);
    let prepared = orchestrator::prepare(&descriptor, &invocation)?;

    if ctx.json {
        return print_json(&prepared);
    }

    let target = match (&prepared.service, &prepared.config) {
        (Some(s), Some(c)) => format!(" ({s}/{c})"),
        _ => String::new(),
    };
    println!("Phase: {}{target}", prepared.phase);
    println!("Working directory: {}", prepared.cwd.display());
    if let Some(t) = prepared.phase_timeout {
        println!("Phase timeout: {}s", t.as_secs());
    }
    if let Some(t) = prepared.command_timeout {
        println!("Command timeout: {}s", t.as_secs());
    }
    if !prepared.env.is_empty() {
        let keys: Vec<&str> = prepared.env.iter().map(|(k, _)| k.as_str()).collect();
        println!("Environment: {}", keys.join(", "));
    }
    println!();

    if prepared.plan.is_empty() {
        println!("No commands.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = prepared
        .plan
        .iter()
        .map(|c| vec![c.index.to_string(), c.command.clone()])
        .collect();
    print_table(&["#", "COMMAND"], &rows);
    Ok(())
}
