//! Parameter resolution for a (service, configuration) pair.
//!
//! Layers are folded left to right: project-global, then service, then
//! configuration. Derived defaults are filled in afterwards and never replace
//! an explicit value.

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::params::{OrderedMap, ParamLayer};
use crate::paths;
use crate::template::{Scope, Syntax, Template};
use serde::Serialize;
use std::collections::HashMap;

pub const SERVICE: &str = "SERVICE";
pub const CONFIG: &str = "CONFIG";
pub const PROJECT: &str = "PROJECT";
pub const HOME: &str = "HOME";
pub const SOCKET_NAME: &str = "SOCKET_NAME";
pub const LOGGING_BASE: &str = "LOGGING_BASE";
pub const LOGGING_DIR: &str = "LOGGING_DIR";
pub const UNIT_NAME: &str = "UNIT_NAME";

/// Block name of the environment mapping in unit templates.
pub const ENV_BLOCK: &str = "env";

/// Final parameters for one (service, configuration) pair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParameterSet {
    service: String,
    config: String,
    params: OrderedMap,
    env: OrderedMap,
}

impl ResolvedParameterSet {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    pub fn params(&self) -> &OrderedMap {
        &self.params
    }

    /// Environment entries in insertion order.
    pub fn env(&self) -> &[(String, String)] {
        self.env.as_slice()
    }

    pub fn unit_name(&self) -> &str {
        self.params.get(UNIT_NAME).unwrap_or_default()
    }
}

impl Scope for ResolvedParameterSet {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    fn entries(&self, block: &str) -> Option<&[(String, String)]> {
        (block == ENV_BLOCK).then(|| self.env.as_slice())
    }
}

pub fn resolve(descriptor: &Descriptor, service: &str, config: &str) -> Result<ResolvedParameterSet> {
    let service_def = descriptor.service(service)?;
    let config_def = service_def.config(config)?;

    let layers = [&descriptor.params, &service_def.params, &config_def.params];
    let mut merged = layers
        .iter()
        .fold(ParamLayer::default(), |mut acc, layer| {
            acc.scalars.overlay(&layer.scalars);
            acc.env.overlay(&layer.env);
            acc
        });

    // Values may refer to the pair they are resolved for; anything else in
    // braces is left as written.
    let tokens: HashMap<String, String> = [
        ("service", service),
        ("config", config),
        ("project", descriptor.project.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for value in merged.scalars.values_mut().chain(merged.env.values_mut()) {
        if value.contains('{') {
            *value = Template::parse(value, Syntax::Command)?.render_lenient(&tokens);
        }
    }

    let mut params = merged.scalars;
    params.insert(SERVICE, service);
    params.insert(CONFIG, config);
    params.insert(PROJECT, descriptor.project.as_str());
    params.insert_default(HOME, descriptor.root.to_string_lossy());
    params.insert_default(SOCKET_NAME, format!("{service}.{config}.sock"));
    params.insert_default(
        LOGGING_BASE,
        format!("{}/{}", paths::DEFAULT_LOGGING_ROOT, descriptor.project),
    );
    let logging_base = params.get(LOGGING_BASE).unwrap_or_default().trim_end_matches('/').to_string();
    params.insert_default(LOGGING_DIR, format!("{logging_base}/{service}"));
    params.insert_default(
        UNIT_NAME,
        format!("{}.{service}.{config}.service", descriptor.project),
    );

    let env = match service_def.env_prefix.as_deref().filter(|p| !p.is_empty()) {
        Some(prefix) => merged
            .env
            .iter()
            .map(|(k, v)| (format!("{prefix}_{k}"), v.to_string()))
            .collect(),
        None => merged.env,
    };

    Ok(ResolvedParameterSet {
        service: service.to_string(),
        config: config.to_string(),
        params,
        env,
    })
}
