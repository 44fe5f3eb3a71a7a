use std::path::PathBuf;
use thiserror::Error;

/// Which budget a timed-out command ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutScope {
    Command,
    Phase,
}

impl std::fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutScope::Command => f.write_str("command"),
            TimeoutScope::Phase => f.write_str("phase"),
        }
    }
}

/// A time budget as `30s`, or `500ms` when it is not whole seconds.
pub fn format_budget(millis: u64) -> String {
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}

#[derive(Debug, Error)]
pub enum SvcError {
    #[error("descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("missing parameter '{0}' required by unit template")]
    MissingParameter(String),

    #[error("unresolved placeholder '{{{placeholder}}}' in command #{index}: {command}")]
    UnresolvedPlaceholder {
        placeholder: String,
        index: usize,
        command: String,
    },

    #[error("template syntax error at line {line}: {message}")]
    TemplateSyntax { line: usize, message: String },

    #[error("invalid invocation of phase '{phase}': {reason}")]
    InvalidInvocation { phase: String, reason: String },

    #[error("{context}: command #{index} exited with {status}: {command}")]
    CommandExecution {
        context: String,
        index: usize,
        command: String,
        status: String,
        output: String,
    },

    #[error("{context}: {scope} timeout after {} in command #{index}: {command}", format_budget(*.budget_ms))]
    Timeout {
        context: String,
        scope: TimeoutScope,
        budget_ms: u64,
        index: usize,
        command: String,
    },

    #[error("{context}: cancelled during command #{index}: {command}")]
    Cancelled {
        context: String,
        index: usize,
        command: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl SvcError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        SvcError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SvcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_placeholder_message_shows_braces() {
        let err = SvcError::UnresolvedPlaceholder {
            placeholder: "undefined_token".to_string(),
            index: 2,
            command: "echo {undefined_token}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unresolved placeholder '{undefined_token}' in command #2: echo {undefined_token}"
        );
    }

    #[test]
    fn budgets_keep_sub_second_precision() {
        assert_eq!(format_budget(1000), "1s");
        assert_eq!(format_budget(90_000), "90s");
        assert_eq!(format_budget(500), "500ms");
        assert_eq!(format_budget(1500), "1500ms");
    }

    #[test]
    fn timeout_message_names_scope_and_budget() {
        let err = SvcError::Timeout {
            context: "phase 'test'".to_string(),
            scope: TimeoutScope::Phase,
            budget_ms: 400,
            index: 1,
            command: "sleep 60".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "phase 'test': phase timeout after 400ms in command #1: sleep 60"
        );
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = SvcError::not_found("service", "webapp");
        assert_eq!(err.to_string(), "service not found: webapp");
    }
}
