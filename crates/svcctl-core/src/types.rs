use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PhaseName
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhaseName {
    #[serde(rename = "setup")]
    Setup,
    #[serde(rename = "codestyle")]
    Codestyle,
    #[serde(rename = "build")]
    Build,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "release")]
    Release,
    #[serde(rename = "cleanup")]
    Cleanup,
    #[serde(rename = "service.load")]
    ServiceLoad,
    #[serde(rename = "service.unload")]
    ServiceUnload,
    #[serde(rename = "service.do")]
    ServiceDo,
}

impl PhaseName {
    pub fn all() -> &'static [PhaseName] {
        &[
            PhaseName::Setup,
            PhaseName::Codestyle,
            PhaseName::Build,
            PhaseName::Test,
            PhaseName::Release,
            PhaseName::Cleanup,
            PhaseName::ServiceLoad,
            PhaseName::ServiceUnload,
            PhaseName::ServiceDo,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseName::Setup => "setup",
            PhaseName::Codestyle => "codestyle",
            PhaseName::Build => "build",
            PhaseName::Test => "test",
            PhaseName::Release => "release",
            PhaseName::Cleanup => "cleanup",
            PhaseName::ServiceLoad => "service.load",
            PhaseName::ServiceUnload => "service.unload",
            PhaseName::ServiceDo => "service.do",
        }
    }

    /// Service-scoped phases need a (service, configuration) pair to run.
    pub fn is_service_scoped(self) -> bool {
        matches!(
            self,
            PhaseName::ServiceLoad | PhaseName::ServiceUnload | PhaseName::ServiceDo
        )
    }

    pub fn takes_action(self) -> bool {
        self == PhaseName::ServiceDo
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseName {
    type Err = crate::error::SvcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup" => Ok(PhaseName::Setup),
            "codestyle" => Ok(PhaseName::Codestyle),
            "build" => Ok(PhaseName::Build),
            "test" => Ok(PhaseName::Test),
            "release" => Ok(PhaseName::Release),
            "cleanup" => Ok(PhaseName::Cleanup),
            "service.load" | "load" => Ok(PhaseName::ServiceLoad),
            "service.unload" | "unload" => Ok(PhaseName::ServiceUnload),
            "service.do" | "do" => Ok(PhaseName::ServiceDo),
            _ => Err(crate::error::SvcError::not_found("phase", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::TimedOut => "timed_out",
            StepStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
