//! Expansion of a phase's command templates into a concrete plan.
//!
//! `{action}` and `{args}` are substituted verbatim. Nothing here quotes or
//! validates them: whoever can invoke `service.do` can inject arbitrary shell
//! into the expanded command.

use crate::error::{Result, SvcError};
use crate::resolve::ResolvedParameterSet;
use crate::template::{Scope, Syntax, Template};
use serde::Serialize;

pub const SERVICE_TOKEN: &str = "service";
pub const CONFIG_TOKEN: &str = "config";
pub const ACTION_TOKEN: &str = "action";
pub const ARGS_TOKEN: &str = "args";
pub const ACTION_COMMAND_TOKEN: &str = "action_command";

/// Values available to command templates. Absent fields are unresolvable.
#[derive(Debug, Clone, Default)]
pub struct ExpansionContext<'a> {
    pub params: Option<&'a ResolvedParameterSet>,
    pub service: Option<&'a str>,
    pub config: Option<&'a str>,
    pub action: Option<&'a str>,
    pub args: Option<String>,
    pub action_command: Option<&'a str>,
}

impl<'a> ExpansionContext<'a> {
    /// Context for a service-scoped phase, taking service and config from `params`.
    pub fn for_service(params: &'a ResolvedParameterSet) -> Self {
        Self {
            params: Some(params),
            service: Some(params.service()),
            config: Some(params.config()),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: &'a str, args: &[String]) -> Self {
        self.action = Some(action);
        self.args = Some(args.join(" "));
        self
    }

    pub fn with_action_command(mut self, command: Option<&'a str>) -> Self {
        self.action_command = command;
        self
    }
}

impl Scope for ExpansionContext<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            SERVICE_TOKEN => self.service,
            CONFIG_TOKEN => self.config,
            ACTION_TOKEN => self.action,
            ARGS_TOKEN => self.args.as_deref(),
            ACTION_COMMAND_TOKEN => self.action_command,
            _ => self.params.and_then(|p| p.get(name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub index: usize,
    pub template: String,
    pub command: String,
}

/// Fully substituted commands, in descriptor order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandPlan {
    pub commands: Vec<PlannedCommand>,
}

impl CommandPlan {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedCommand> {
        self.commands.iter()
    }
}

pub fn expand(commands: &[String], ctx: &ExpansionContext<'_>) -> Result<CommandPlan> {
    let mut planned = Vec::with_capacity(commands.len());
    for (index, source) in commands.iter().enumerate() {
        let template = Template::parse(source, Syntax::Command)?;
        let command = template
            .render(ctx)
            .map_err(|missing| SvcError::UnresolvedPlaceholder {
                placeholder: missing.0,
                index,
                command: source.clone(),
            })?;
        planned.push(PlannedCommand {
            index,
            template: source.clone(),
            command,
        });
    }
    Ok(CommandPlan { commands: planned })
}
