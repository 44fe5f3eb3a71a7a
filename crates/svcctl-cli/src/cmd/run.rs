use super::{execute, Ctx};
use svcctl_core::orchestrator::Invocation;
use svcctl_core::types::PhaseName;

pub fn run(ctx: &Ctx, phase: &str) -> anyhow::Result<()> {
    let phase: PhaseName = phase.parse()?;
    if phase.is_service_scoped() {
        anyhow::bail!(
            "phase '{phase}' needs a service and configuration; use 'svcctl service {} <service> <config>'",
            phase.as_str().trim_start_matches("service.")
        );
    }
    let descriptor = ctx.load()?;
    execute(ctx, &descriptor, Invocation::phase(phase))
}
