//! Test doubles for refit-lib.
//!
//! Small conditions and operations with predictable behavior, used to build
//! trees in unit tests without touching real project files.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::execute::CancelToken;
use crate::unit::{Condition, Operation, TargetFile, UnitContext, UnitError};

/// Condition with a fixed answer.
pub struct Const(pub bool);

impl Condition for Const {
  fn kind(&self) -> &'static str {
    "Const"
  }

  fn description(&self, _target: &TargetFile) -> String {
    format!("Always {}", self.0)
  }

  fn evaluate(&self, _ctx: &UnitContext<'_>) -> Result<bool, UnitError> {
    Ok(self.0)
  }
}

/// Operation that returns a fixed value.
#[derive(Clone)]
pub struct Echo(Value);

impl Echo {
  pub fn new(value: impl Into<Value>) -> Self {
    Self(value.into())
  }
}

impl Operation for Echo {
  fn kind(&self) -> &'static str {
    "Echo"
  }

  fn description(&self, target: &TargetFile) -> String {
    format!("Echo {} for {}", self.0, target)
  }

  fn execute(&self, _ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    Ok(self.0.clone())
  }
}

/// Operation that always fails.
#[derive(Clone)]
pub struct Fail(pub &'static str);

impl Operation for Fail {
  fn kind(&self) -> &'static str {
    "Fail"
  }

  fn description(&self, _target: &TargetFile) -> String {
    format!("Fail with '{}'", self.0)
  }

  fn execute(&self, _ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    Err(UnitError::failed(self.0))
  }
}

/// Operation that returns an unexpected error.
#[derive(Clone)]
pub struct Broken;

impl Operation for Broken {
  fn kind(&self) -> &'static str {
    "Broken"
  }

  fn description(&self, _target: &TargetFile) -> String {
    "Break unexpectedly".to_string()
  }

  fn execute(&self, _ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    Err(UnitError::unexpected(anyhow::anyhow!("invariant violated")))
  }
}

/// Operation that panics.
#[derive(Clone)]
pub struct Panic;

impl Operation for Panic {
  fn kind(&self) -> &'static str {
    "Panic"
  }

  fn description(&self, _target: &TargetFile) -> String {
    "Panic".to_string()
  }

  fn execute(&self, _ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    panic!("unit panicked on purpose")
  }
}

/// Operation that reads its target file into a string.
#[derive(Clone)]
pub struct ReadFile;

impl Operation for ReadFile {
  fn kind(&self) -> &'static str {
    "ReadFile"
  }

  fn description(&self, target: &TargetFile) -> String {
    format!("Read {target}")
  }

  fn execute(&self, ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    Ok(Value::String(std::fs::read_to_string(&ctx.file)?))
  }
}

/// Operation that counts how often it ran.
#[derive(Clone, Default)]
pub struct Count(pub Arc<AtomicUsize>);

impl Count {
  pub fn get(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}

impl Operation for Count {
  fn kind(&self) -> &'static str {
    "Count"
  }

  fn description(&self, _target: &TargetFile) -> String {
    "Count runs".to_string()
  }

  fn execute(&self, _ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    Ok(Value::from(self.0.fetch_add(1, Ordering::SeqCst) + 1))
  }
}

/// Operation that cancels the run it is part of.
#[derive(Clone)]
pub struct Cancel(pub CancelToken);

impl Operation for Cancel {
  fn kind(&self) -> &'static str {
    "Cancel"
  }

  fn description(&self, _target: &TargetFile) -> String {
    "Cancel the run".to_string()
  }

  fn execute(&self, _ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    self.0.cancel();
    Ok(Value::Null)
  }
}
