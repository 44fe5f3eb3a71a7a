use crate::error::{Result, SvcError};
use crate::params::{OrderedMap, ParamLayer};
use crate::paths;
use crate::template::{Syntax, Template};
use crate::types::PhaseName;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// DescriptorWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PhaseDef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseDef {
    #[serde(default)]
    pub commands: Vec<String>,
    /// Glob list carried through for release tooling; never executed.
    #[serde(default)]
    pub include: Vec<String>,
    /// Publish destination carried through for release tooling; opaque.
    #[serde(default)]
    pub publish: Option<Value>,
    /// Budget for the whole phase. Unset means unbounded.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Budget for each command of the phase. Unset means unbounded.
    #[serde(default)]
    pub command_timeout_seconds: Option<u64>,
}

/// `build:` with no body still declares the phase (as a no-op).
fn declared_phase<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<PhaseDef>, D::Error> {
    Ok(Some(Option::<PhaseDef>::deserialize(d)?.unwrap_or_default()))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicePhases {
    #[serde(default, deserialize_with = "declared_phase")]
    pub load: Option<PhaseDef>,
    #[serde(default, deserialize_with = "declared_phase")]
    pub unload: Option<PhaseDef>,
    #[serde(default, rename = "do", deserialize_with = "declared_phase")]
    pub do_: Option<PhaseDef>,
}

// ---------------------------------------------------------------------------
// ServiceDef / ConfigDef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDef {
    pub name: String,
    pub params: ParamLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigBody {
    #[serde(default)]
    params: ParamLayer,
}

/// `configs` is either a list of names or an ordered mapping name → body.
fn deserialize_configs<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<ConfigDef>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(ConfigDef {
                    name,
                    params: ParamLayer::default(),
                }),
                other => Err(D::Error::custom(format!(
                    "configuration names must be strings, got {other:?}"
                ))),
            })
            .collect(),
        Some(Value::Mapping(map)) => map
            .into_iter()
            .map(|(k, v)| {
                let Value::String(name) = k else {
                    return Err(D::Error::custom("configuration names must be strings"));
                };
                let body: ConfigBody = if v.is_null() {
                    ConfigBody::default()
                } else {
                    serde_yaml::from_value(v).map_err(D::Error::custom)?
                };
                Ok(ConfigDef {
                    name,
                    params: body.params,
                })
            })
            .collect(),
        Some(_) => Err(D::Error::custom(
            "configs must be a list of names or a mapping of name to parameters",
        )),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDef {
    #[serde(skip)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_configs")]
    pub configs: Vec<ConfigDef>,
    #[serde(default)]
    pub params: ParamLayer,
    /// Every env key is exported as `<PREFIX>_<KEY>`.
    #[serde(default)]
    pub env_prefix: Option<String>,
    /// Unit template override for this service.
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Named command fragments for `service.do`, exposed as `{action_command}`.
    #[serde(default)]
    pub actions: OrderedMap,
}

impl ServiceDef {
    pub fn config(&self, name: &str) -> Result<&ConfigDef> {
        self.configs
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SvcError::not_found("configuration", format!("{}/{name}", self.name)))
    }

    pub fn config_names(&self) -> impl Iterator<Item = &str> {
        self.configs.iter().map(|c| c.name.as_str())
    }
}

fn deserialize_services<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<ServiceDef>, D::Error> {
    let mapping = Option::<serde_yaml::Mapping>::deserialize(d)?.unwrap_or_default();
    mapping
        .into_iter()
        .map(|(k, v)| {
            let Value::String(name) = k else {
                return Err(D::Error::custom("service names must be strings"));
            };
            let v = if v.is_null() {
                Value::Mapping(Default::default())
            } else {
                v
            };
            let mut service: ServiceDef = serde_yaml::from_value(v)
                .map_err(|e| D::Error::custom(format!("service '{name}': {e}")))?;
            service.name = name;
            Ok(service)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Descriptor (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    pub project: String,
    #[serde(default)]
    pub tag_policy: Option<String>,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub params: ParamLayer,
    #[serde(default = "default_unit_template")]
    pub unit_template: PathBuf,
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    #[serde(default, deserialize_with = "declared_phase")]
    pub setup: Option<PhaseDef>,
    #[serde(default, deserialize_with = "declared_phase")]
    pub codestyle: Option<PhaseDef>,
    #[serde(default, deserialize_with = "declared_phase")]
    pub build: Option<PhaseDef>,
    #[serde(default, deserialize_with = "declared_phase")]
    pub test: Option<PhaseDef>,
    #[serde(default, deserialize_with = "declared_phase")]
    pub release: Option<PhaseDef>,
    #[serde(default, deserialize_with = "declared_phase")]
    pub cleanup: Option<PhaseDef>,
    #[serde(default)]
    pub service: Option<ServicePhases>,
    #[serde(default, deserialize_with = "deserialize_services")]
    pub services: Vec<ServiceDef>,
    /// Directory the descriptor was loaded from.
    #[serde(skip)]
    pub root: PathBuf,
    /// The descriptor file itself, absolute when loaded from disk.
    #[serde(skip)]
    pub path: PathBuf,
}

fn default_unit_template() -> PathBuf {
    PathBuf::from(paths::DEFAULT_UNIT_TEMPLATE)
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_UNIT_DIR)
}

impl Descriptor {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SvcError::DescriptorNotFound(path.to_path_buf()));
        }
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let data = std::fs::read_to_string(&path)?;
        let mut descriptor = Self::from_yaml(&data, paths::descriptor_root(&path))?;
        descriptor.path = path;
        Ok(descriptor)
    }

    /// Parse and check structural invariants (unique, well-formed names).
    pub fn from_yaml(data: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut descriptor: Descriptor = serde_yaml::from_str(data)?;
        descriptor.root = root.into();
        descriptor.path = paths::descriptor_path(&descriptor.root);
        descriptor.check()?;
        Ok(descriptor)
    }

    fn check(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(SvcError::InvalidDescriptor("project must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for service in &self.services {
            paths::validate_name("service", &service.name)?;
            if !seen.insert(service.name.as_str()) {
                return Err(SvcError::InvalidDescriptor(format!(
                    "duplicate service '{}'",
                    service.name
                )));
            }
            let mut configs = HashSet::new();
            for config in &service.configs {
                paths::validate_name("configuration", &config.name)?;
                if !configs.insert(config.name.as_str()) {
                    return Err(SvcError::InvalidDescriptor(format!(
                        "duplicate configuration '{}' in service '{}'",
                        config.name, service.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn phase(&self, name: PhaseName) -> Option<&PhaseDef> {
        let service = self.service.as_ref();
        match name {
            PhaseName::Setup => self.setup.as_ref(),
            PhaseName::Codestyle => self.codestyle.as_ref(),
            PhaseName::Build => self.build.as_ref(),
            PhaseName::Test => self.test.as_ref(),
            PhaseName::Release => self.release.as_ref(),
            PhaseName::Cleanup => self.cleanup.as_ref(),
            PhaseName::ServiceLoad => service.and_then(|s| s.load.as_ref()),
            PhaseName::ServiceUnload => service.and_then(|s| s.unload.as_ref()),
            PhaseName::ServiceDo => service.and_then(|s| s.do_.as_ref()),
        }
    }

    pub fn require_phase(&self, name: PhaseName) -> Result<&PhaseDef> {
        self.phase(name)
            .ok_or_else(|| SvcError::not_found("phase", name.as_str()))
    }

    pub fn phases(&self) -> Vec<(PhaseName, &PhaseDef)> {
        PhaseName::all()
            .iter()
            .filter_map(|p| self.phase(*p).map(|def| (*p, def)))
            .collect()
    }

    pub fn service(&self, name: &str) -> Result<&ServiceDef> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SvcError::not_found("service", name))
    }

    /// Template file for a service: its own override, else the shared template.
    pub fn template_path(&self, service: &ServiceDef) -> PathBuf {
        let rel = service.template.as_ref().unwrap_or(&self.unit_template);
        self.root.join(rel)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Soft checks on top of the hard invariants enforced at load time.
    pub fn validate(&self) -> Vec<DescriptorWarning> {
        let mut warnings = Vec::new();

        for (phase, def) in self.phases() {
            for (i, command) in def.commands.iter().enumerate() {
                if command.trim().is_empty() {
                    warnings.push(DescriptorWarning {
                        level: WarnLevel::Warning,
                        message: format!("phase '{phase}' command #{i} is empty"),
                    });
                    continue;
                }
                let template = match Template::parse(command, Syntax::Command) {
                    Ok(t) => t,
                    Err(e) => {
                        warnings.push(DescriptorWarning {
                            level: WarnLevel::Error,
                            message: format!("phase '{phase}' command #{i}: {e}"),
                        });
                        continue;
                    }
                };
                if phase.is_service_scoped() {
                    continue;
                }
                // Global phases have no service context to draw from.
                for name in template.placeholders() {
                    warnings.push(DescriptorWarning {
                        level: WarnLevel::Error,
                        message: format!(
                            "phase '{phase}' command #{i} uses '{{{name}}}' but '{phase}' is not service-scoped"
                        ),
                    });
                }
            }
            if def.timeout_seconds == Some(0) || def.command_timeout_seconds == Some(0) {
                warnings.push(DescriptorWarning {
                    level: WarnLevel::Warning,
                    message: format!("phase '{phase}' has a zero timeout (treated as unbounded)"),
                });
            }
            if !def.include.is_empty() && phase != PhaseName::Release {
                warnings.push(DescriptorWarning {
                    level: WarnLevel::Warning,
                    message: format!("phase '{phase}' declares 'include', which only release uses"),
                });
            }
        }

        for service in &self.services {
            if service.configs.is_empty() {
                warnings.push(DescriptorWarning {
                    level: WarnLevel::Warning,
                    message: format!("service '{}' declares no configurations", service.name),
                });
            }
            if !self.template_path(service).exists() {
                warnings.push(DescriptorWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "unit template for service '{}' not found: {}",
                        service.name,
                        self.template_path(service).display()
                    ),
                });
            }
        }

        if !self.services.is_empty() && self.service.is_none() {
            warnings.push(DescriptorWarning {
                level: WarnLevel::Warning,
                message: "services are declared but no 'service' phases are defined".into(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
