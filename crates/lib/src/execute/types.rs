//! Types for running transformation trees.
//!
//! This module defines the configuration, the run report and the errors
//! that stop a run before it starts.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{ResultStore, StoreError};
use crate::tree::DefinitionError;
use crate::unit::UnitState;

/// Why a unit did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
  /// A `run_if` result was not `true`.
  ConditionFalse(String),
  /// A `run_unless` result was `true`.
  ConditionTrue(String),
  /// A `depends_on` unit failed or did not run.
  DependencyFailed(String),
  /// An enclosing group was skipped or failed.
  AncestorSkipped(String),
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::ConditionFalse(name) => write!(f, "run-if:{name}"),
      SkipReason::ConditionTrue(name) => write!(f, "run-unless:{name}"),
      SkipReason::DependencyFailed(name) => write!(f, "depends-on:{name}"),
      SkipReason::AncestorSkipped(name) => write!(f, "ancestor:{name}"),
    }
  }
}

/// What stopped a run before every unit was visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HaltCause {
  /// A unit failed while abort-on-failure (or fail-fast) was in effect.
  AbortOnFailure,
  /// A unit raised an unexpected error or panicked.
  Unexpected(String),
  /// The run's cancel token was set.
  Cancelled,
}

/// Where and why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Halt {
  /// For failures the unit that failed, for cancellation the first unit that
  /// was not started.
  pub unit: String,
  pub cause: HaltCause,
}

/// Result of running a tree.
#[derive(Debug, Default)]
pub struct RunReport {
  /// Every recorded outcome, keyed by unit name.
  pub store: ResultStore,

  /// Units that ran, failed ones included, in execution order.
  pub executed: Vec<String>,

  /// Units whose outcome is a failure, in execution order.
  pub failed: Vec<String>,

  /// Units that were skipped, with the reason, in execution order.
  pub skipped: Vec<(String, SkipReason)>,

  /// Set if the run stopped before visiting every unit.
  pub halted: Option<Halt>,
}

impl RunReport {
  /// Returns true if nothing failed and the run was not halted.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.halted.is_none()
  }

  /// Returns true if every unit was visited (run or skipped).
  pub fn is_complete(&self) -> bool {
    self.halted.is_none()
  }

  /// Final state of a unit in this run. `None` if it was never reached.
  pub fn state_of(&self, name: &str) -> Option<UnitState> {
    if self.executed.iter().any(|n| n == name) {
      Some(UnitState::Executed)
    } else if self.skipped.iter().any(|(n, _)| n == name) {
      Some(UnitState::Skipped)
    } else {
      None
    }
  }

  /// Why `name` was skipped, if it was.
  pub fn skip_reason(&self, name: &str) -> Option<&SkipReason> {
    self.skipped.iter().find(|(n, _)| n == name).map(|(_, reason)| reason)
  }

  /// Returns the number of units visited.
  pub fn total(&self) -> usize {
    self.executed.len() + self.skipped.len()
  }
}

/// Errors that prevent a run from starting or finishing.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The tree breaks a tree-wide rule.
  #[error("invalid tree: {0}")]
  InvalidTree(#[from] DefinitionError),

  /// The root folder does not exist or is not a directory.
  #[error("root folder is not a directory: {0}")]
  RootFolder(PathBuf),

  /// The store rejected an outcome.
  #[error("store error: {0}")]
  Store(#[from] StoreError),
}

/// Configuration for running a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteConfig {
  /// Treat every failure as if the unit had abort-on-failure set.
  pub fail_fast: bool,

  /// Turn panics inside units into unexpected errors.
  pub catch_panics: bool,

  /// Only log the plan, run nothing.
  pub dry_run: bool,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      fail_fast: false,
      catch_panics: true,
      dry_run: false,
    }
  }
}

/// Shared flag to stop a run between two units.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}
