//! Lifecycle orchestration: phase lookup, resolution, expansion and strictly
//! sequential execution.
//!
//! Execution stops at the first command that does not succeed. Completed
//! commands are never rolled back and nothing is retried.

use crate::descriptor::Descriptor;
use crate::error::{Result, SvcError, TimeoutScope};
use crate::expand::{self, CommandPlan, ExpansionContext};
use crate::paths;
use crate::resolve::{self, HOME};
use crate::runner::{CancelToken, CommandRunner, CommandSpec, ShellRunner, Termination};
use crate::types::{PhaseName, StepStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Invocation {
    pub phase: PhaseName,
    pub service: Option<String>,
    pub config: Option<String>,
    pub action: Option<String>,
    pub args: Vec<String>,
    /// Overrides the phase budget from the descriptor.
    pub timeout: Option<Duration>,
    /// Overrides the per-command budget from the descriptor.
    pub command_timeout: Option<Duration>,
}

impl Invocation {
    pub fn phase(phase: PhaseName) -> Self {
        Self {
            phase,
            service: None,
            config: None,
            action: None,
            args: Vec::new(),
            timeout: None,
            command_timeout: None,
        }
    }

    pub fn service(phase: PhaseName, service: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            config: Some(config.into()),
            ..Self::phase(phase)
        }
    }

    pub fn with_action(mut self, action: impl Into<String>, args: Vec<String>) -> Self {
        self.action = Some(action.into());
        self.args = args;
        self
    }

    pub fn with_timeouts(mut self, phase: Option<Duration>, command: Option<Duration>) -> Self {
        self.timeout = phase;
        self.command_timeout = command;
        self
    }
}

// ---------------------------------------------------------------------------
// PreparedRun
// ---------------------------------------------------------------------------

/// Everything needed to execute a phase. Building one performs all
/// resolution, so no command starts against incomplete parameters.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedRun {
    pub phase: PhaseName,
    pub service: Option<String>,
    pub config: Option<String>,
    pub plan: CommandPlan,
    /// Descriptor location first, then the resolved `env` mapping.
    #[serde(skip)]
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub phase_timeout: Option<Duration>,
    pub command_timeout: Option<Duration>,
}

fn seconds(value: Option<u64>) -> Option<Duration> {
    value.filter(|s| *s > 0).map(Duration::from_secs)
}

/// Lets a nested `svcctl` find this descriptor from any working directory.
fn descriptor_env(descriptor: &Descriptor) -> Vec<(String, String)> {
    vec![
        (
            paths::ROOT_ENV.to_string(),
            descriptor.root.to_string_lossy().into_owned(),
        ),
        (
            paths::FILE_ENV.to_string(),
            descriptor.path.to_string_lossy().into_owned(),
        ),
    ]
}

pub fn prepare(descriptor: &Descriptor, invocation: &Invocation) -> Result<PreparedRun> {
    let phase = invocation.phase;
    let def = descriptor.require_phase(phase)?;
    let phase_timeout = invocation.timeout.or(seconds(def.timeout_seconds));
    let command_timeout = invocation
        .command_timeout
        .or(seconds(def.command_timeout_seconds));

    if !phase.is_service_scoped() {
        if invocation.service.is_some() || invocation.action.is_some() {
            debug!(%phase, "ignoring service arguments for global phase");
        }
        let plan = expand::expand(&def.commands, &ExpansionContext::default())?;
        return Ok(PreparedRun {
            phase,
            service: None,
            config: None,
            plan,
            env: descriptor_env(descriptor),
            cwd: descriptor.root.clone(),
            phase_timeout,
            command_timeout,
        });
    }

    let (Some(service), Some(config)) = (invocation.service.as_deref(), invocation.config.as_deref())
    else {
        return Err(SvcError::InvalidInvocation {
            phase: phase.to_string(),
            reason: "a service and a configuration are required".to_string(),
        });
    };
    let action = match (phase.takes_action(), invocation.action.as_deref()) {
        (true, None) => {
            return Err(SvcError::InvalidInvocation {
                phase: phase.to_string(),
                reason: "an action is required".to_string(),
            })
        }
        (true, Some(a)) => Some(a),
        (false, _) => None,
    };

    let params = resolve::resolve(descriptor, service, config)?;
    let service_def = descriptor.service(service)?;
    let mut ctx = ExpansionContext::for_service(&params);
    if let Some(action) = action {
        ctx = ctx
            .with_action(action, &invocation.args)
            .with_action_command(service_def.actions.get(action));
    }
    let plan = expand::expand(&def.commands, &ctx)?;
    let mut env = descriptor_env(descriptor);
    env.extend(params.env().iter().cloned());

    Ok(PreparedRun {
        phase,
        service: Some(service.to_string()),
        config: Some(config.to_string()),
        env,
        cwd: params
            .get(HOME)
            .map(PathBuf::from)
            .unwrap_or_else(|| descriptor.root.clone()),
        plan,
        phase_timeout,
        command_timeout,
    })
}

// ---------------------------------------------------------------------------
// ExecutionReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub command: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Succeeded,
    Failed { index: usize },
    TimedOut {
        index: usize,
        scope: TimeoutScope,
        budget_ms: u64,
    },
    Cancelled { index: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub phase: PhaseName,
    pub service: Option<String>,
    pub config: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub planned: usize,
    pub steps: Vec<StepReport>,
    pub outcome: PhaseOutcome,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == PhaseOutcome::Succeeded
    }

    /// The step that stopped the phase, if it did not succeed.
    pub fn failed_step(&self) -> Option<&StepReport> {
        if self.succeeded() {
            return None;
        }
        self.steps.last()
    }

    /// `phase 'service.load' (webapp/prod)` or `phase 'build'`.
    pub fn context(&self) -> String {
        match (&self.service, &self.config) {
            (Some(s), Some(c)) => format!("phase '{}' ({s}/{c})", self.phase),
            _ => format!("phase '{}'", self.phase),
        }
    }

    /// Map a failed report onto the error taxonomy.
    pub fn ensure_success(&self) -> Result<()> {
        let Some(step) = self.failed_step() else {
            return Ok(());
        };
        let context = self.context();
        let err = match &self.outcome {
            PhaseOutcome::Succeeded => return Ok(()),
            PhaseOutcome::Failed { index } => SvcError::CommandExecution {
                context,
                index: *index,
                command: step.command.clone(),
                status: match step.exit_code {
                    Some(code) => format!("exit code {code}"),
                    None => "no exit code".to_string(),
                },
                output: step.output.clone(),
            },
            PhaseOutcome::TimedOut {
                index,
                scope,
                budget_ms,
            } => SvcError::Timeout {
                context,
                scope: *scope,
                budget_ms: *budget_ms,
                index: *index,
                command: step.command.clone(),
            },
            PhaseOutcome::Cancelled { index } => SvcError::Cancelled {
                context,
                index: *index,
                command: step.command.clone(),
            },
        };
        Err(err)
    }

    pub fn into_result(self) -> Result<Self> {
        self.ensure_success()?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a, R: CommandRunner = ShellRunner> {
    descriptor: &'a Descriptor,
    runner: R,
    cancel: CancelToken,
}

impl<'a> Orchestrator<'a, ShellRunner> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self::with_runner(descriptor, ShellRunner)
    }
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
    pub fn with_runner(descriptor: &'a Descriptor, runner: R) -> Self {
        Self {
            descriptor,
            runner,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve and expand everything up front, then execute in order.
    /// Structural problems are returned as errors before anything runs;
    /// execution problems are reported in the returned report.
    pub fn run(&self, invocation: &Invocation) -> Result<ExecutionReport> {
        let prepared = prepare(self.descriptor, invocation)?;
        Ok(self.execute(&prepared))
    }

    pub fn execute(&self, prepared: &PreparedRun) -> ExecutionReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let service = prepared.service.as_deref().unwrap_or("-");
        let config = prepared.config.as_deref().unwrap_or("-");
        info!(
            %run_id,
            phase = %prepared.phase,
            service,
            config,
            commands = prepared.plan.len(),
            "phase started"
        );

        let phase_deadline = prepared.phase_timeout.map(|t| Instant::now() + t);
        let phase_ms = millis(prepared.phase_timeout);
        let mut steps = Vec::with_capacity(prepared.plan.len());
        let mut outcome = PhaseOutcome::Succeeded;

        for planned in prepared.plan.iter() {
            let index = planned.index;

            if self.cancel.is_cancelled() {
                steps.push(not_started(index, &planned.command, StepStatus::Cancelled));
                outcome = PhaseOutcome::Cancelled { index };
                break;
            }

            let remaining = phase_deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining.is_some_and(|r| r.is_zero()) {
                steps.push(not_started(index, &planned.command, StepStatus::TimedOut));
                outcome = PhaseOutcome::TimedOut {
                    index,
                    scope: TimeoutScope::Phase,
                    budget_ms: phase_ms,
                };
                break;
            }

            let (timeout, scope) = match (prepared.command_timeout, remaining) {
                (Some(c), Some(r)) if r < c => (Some(r), TimeoutScope::Phase),
                (Some(c), _) => (Some(c), TimeoutScope::Command),
                (None, Some(r)) => (Some(r), TimeoutScope::Phase),
                (None, None) => (None, TimeoutScope::Command),
            };

            debug!(index, command = %planned.command, "running command");
            let start = Instant::now();
            let result = self.runner.run(&CommandSpec {
                command: &planned.command,
                cwd: &prepared.cwd,
                env: &prepared.env,
                timeout,
                cancel: &self.cancel,
            });
            let duration_ms = start.elapsed().as_millis() as u64;

            let (status, exit_code) = match result.termination {
                Termination::Exited { code } if result.success => (StepStatus::Succeeded, code),
                Termination::Exited { code } => (StepStatus::Failed, code),
                Termination::TimedOut => (StepStatus::TimedOut, None),
                Termination::Cancelled => (StepStatus::Cancelled, None),
            };
            steps.push(StepReport {
                index,
                command: planned.command.clone(),
                status,
                exit_code,
                output: result.output,
                duration_ms,
            });

            match status {
                StepStatus::Succeeded => continue,
                StepStatus::Failed => {
                    warn!(index, command = %planned.command, ?exit_code, "command failed");
                    outcome = PhaseOutcome::Failed { index };
                }
                StepStatus::TimedOut => {
                    let budget_ms = match scope {
                        TimeoutScope::Phase => phase_ms,
                        TimeoutScope::Command => millis(timeout),
                    };
                    warn!(index, command = %planned.command, %scope, budget_ms, "command timed out");
                    outcome = PhaseOutcome::TimedOut {
                        index,
                        scope,
                        budget_ms,
                    };
                }
                StepStatus::Cancelled => {
                    warn!(index, command = %planned.command, "command cancelled");
                    outcome = PhaseOutcome::Cancelled { index };
                }
            }
            break;
        }

        let report = ExecutionReport {
            run_id,
            phase: prepared.phase,
            service: prepared.service.clone(),
            config: prepared.config.clone(),
            started_at,
            finished_at: Utc::now(),
            planned: prepared.plan.len(),
            steps,
            outcome,
        };
        info!(
            %run_id,
            phase = %report.phase,
            executed = report.steps.len(),
            succeeded = report.succeeded(),
            "phase finished"
        );
        report
    }
}

fn millis(budget: Option<Duration>) -> u64 {
    budget.unwrap_or_default().as_millis() as u64
}

fn not_started(index: usize, command: &str, status: StepStatus) -> StepReport {
    StepReport {
        index,
        command: command.to_string(),
        status,
        exit_code: None,
        output: "not started".to_string(),
        duration_ms: 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
