use super::{execute, Ctx};
use crate::output::{print_json, print_table};
use clap::Subcommand;
use svcctl_core::orchestrator::Invocation;
use svcctl_core::types::PhaseName;

#[derive(Subcommand)]
pub enum ServiceSubcommand {
    /// Run the service.load phase for a service configuration
    Load { service: String, config: String },

    /// Run the service.unload phase for a service configuration
    Unload { service: String, config: String },

    /// Run the service.do phase with an action and its arguments
    Do {
        service: String,
        config: String,
        action: String,
        /// Passed verbatim to `{args}`, joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List declared services, configurations and actions
    List,
}

pub fn run(ctx: &Ctx, subcmd: ServiceSubcommand) -> anyhow::Result<()> {
    let descriptor = ctx.load()?;
    let invocation = match subcmd {
        ServiceSubcommand::Load { service, config } => {
            Invocation::service(PhaseName::ServiceLoad, service, config)
        }
        ServiceSubcommand::Unload { service, config } => {
            Invocation::service(PhaseName::ServiceUnload, service, config)
        }
        ServiceSubcommand::Do {
            service,
            config,
            action,
            args,
        } => Invocation::service(PhaseName::ServiceDo, service, config).with_action(action, args),
        ServiceSubcommand::List => return list(ctx, &descriptor),
    };
    execute(ctx, &descriptor, invocation)
}

fn list(ctx: &Ctx, descriptor: &svcctl_core::descriptor::Descriptor) -> anyhow::Result<()> {
    if ctx.json {
        let items: Vec<serde_json::Value> = descriptor
            .services
            .iter()
            .map(|s| {
                let configs: Vec<&str> = s.config_names().collect();
                serde_json::json!({
                    "name": s.name,
                    "configs": configs,
                    "actions": s.actions,
                    "template": descriptor.template_path(s),
                })
            })
            .collect();
        return print_json(&items);
    }

    if descriptor.services.is_empty() {
        println!("No services declared.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = descriptor
        .services
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.config_names().collect::<Vec<_>>().join(", "),
                s.actions.keys().collect::<Vec<_>>().join(", "),
            ]
        })
        .collect();
    print_table(&["SERVICE", "CONFIGS", "ACTIONS"], &rows);
    Ok(())
}
