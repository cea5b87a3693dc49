//! Types shared by every transformation unit.
//!
//! This module defines where a unit finds its file, the errors raised while a
//! unit is being configured, and the failures a unit reports while executing.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a unit finds the file it acts on.
///
/// A file is either resolved against the root folder of the transformed
/// project, or read at execution time from the result of an earlier unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFile {
  /// The root folder itself. Groups, log units and expanders act here.
  Root,
  /// A path relative to the root folder.
  Relative(PathBuf),
  /// An absolute path taken from the named result-store entry.
  FromResult(String),
}

impl fmt::Display for TargetFile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TargetFile::Root => write!(f, "."),
      TargetFile::Relative(path) => write!(f, "{}", path.display()),
      TargetFile::FromResult(name) => write!(f, "<result:{}>", name),
    }
  }
}

/// Lifecycle of a unit.
///
/// Transitions only move forward. `Executed` and `Skipped` are per-run states
/// reported by the coordinator; the tree itself never goes past `Registered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
  /// No target file yet.
  Unconfigured,
  /// Ready to be registered, but not owned by any group.
  Configured,
  /// Owned by a group (or the tree root itself).
  Registered,
  /// Ran during the current run.
  Executed,
  /// Not run because a governing condition or dependency said so.
  Skipped,
}

/// Errors raised while a unit is being set up.
///
/// These are definition-time mistakes and are never recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
  /// The name is empty or whitespace.
  #[error("unit name cannot be blank")]
  BlankName,

  /// Names are set once.
  #[error("unit is already named '{current}', cannot rename it to '{requested}'")]
  NameAlreadySet { current: String, requested: String },

  /// The target path or result name is empty.
  #[error("target file of {unit} cannot be blank")]
  BlankTargetFile { unit: String },

  /// A relative file and a result-provided file were both set.
  #[error("target file of {unit} is already set as {existing}")]
  TargetFileConflict { unit: String, existing: TargetFile },

  /// `add_multiple` was given no files.
  #[error("{unit} needs at least one file to fan out over")]
  EmptyFanOut { unit: String },

  /// Only operations can be fanned out over files.
  #[error("template {unit} must be an operation")]
  NotAnOperation { unit: String },

  /// A fan-out template already has a target file.
  #[error("template {unit} must not have a target file, it is bound per file")]
  TemplateFileSet { unit: String },

  /// A required setting of a concrete unit is empty.
  #[error("{field} of {unit} cannot be blank")]
  BlankField { unit: String, field: &'static str },
}

/// An expected failure of a unit's action.
///
/// Failures are recorded in the result store rather than propagated, so later
/// units can branch on them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExecutionFailure {
  pub message: String,
}

impl ExecutionFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Error returned by a unit's action.
#[derive(Debug, Error)]
pub enum UnitError {
  /// The action could not complete, for a reason the unit anticipated.
  #[error(transparent)]
  Failed(#[from] ExecutionFailure),

  /// Anything the unit did not anticipate. Stops the run regardless of policy.
  #[error("unexpected error: {0}")]
  Unexpected(anyhow::Error),
}

impl UnitError {
  /// Create an expected failure.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed(ExecutionFailure::new(message))
  }

  /// Create an unexpected error.
  pub fn unexpected(error: impl Into<anyhow::Error>) -> Self {
    Self::Unexpected(error.into())
  }
}

impl From<std::io::Error> for UnitError {
  fn from(e: std::io::Error) -> Self {
    Self::failed(format!("io error: {e}"))
  }
}
