//! Shared test helpers for engine integration tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use refit_lib::unit::{Condition, Operation, TargetFile, UnitContext, UnitError};
use serde_json::Value;
use tempfile::TempDir;

/// Isolated project folder.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write `content` to `path` below the project root, creating parents.
  pub fn write(&self, path: &str, content: &str) {
    let full = self.temp.path().join(path);
    if let Some(parent) = full.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
  }
}

/// Condition that reports whether its target file exists.
pub struct FileExists;

impl Condition for FileExists {
  fn kind(&self) -> &'static str {
    "FileExists"
  }

  fn description(&self, target: &TargetFile) -> String {
    format!("Check if {target} exists")
  }

  fn evaluate(&self, ctx: &UnitContext<'_>) -> Result<bool, UnitError> {
    Ok(ctx.file.exists())
  }
}

/// Operation that appends its unit name to a shared journal and returns a
/// fixed value.
#[derive(Clone)]
pub struct Journal {
  entries: Arc<Mutex<Vec<String>>>,
  value: Value,
  fail: bool,
}

impl Journal {
  pub fn new() -> Self {
    Self {
      entries: Arc::default(),
      value: Value::Null,
      fail: false,
    }
  }

  pub fn returning(&self, value: impl Into<Value>) -> Self {
    Self {
      value: value.into(),
      ..self.clone()
    }
  }

  pub fn failing(&self) -> Self {
    Self {
      fail: true,
      ..self.clone()
    }
  }

  pub fn entries(&self) -> Vec<String> {
    self.entries.lock().unwrap().clone()
  }
}

impl Operation for Journal {
  fn kind(&self) -> &'static str {
    "Journal"
  }

  fn description(&self, target: &TargetFile) -> String {
    format!("Journal run on {target}")
  }

  fn execute(&self, ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    self.entries.lock().unwrap().push(ctx.name.to_string());
    if self.fail {
      return Err(UnitError::failed(format!("{} failed", ctx.name)));
    }
    Ok(self.value.clone())
  }
}

/// Operation that overwrites its target file.
#[derive(Clone)]
pub struct WriteFile(pub &'static str);

impl Operation for WriteFile {
  fn kind(&self) -> &'static str {
    "WriteFile"
  }

  fn description(&self, target: &TargetFile) -> String {
    format!("Write '{}' to {target}", self.0)
  }

  fn execute(&self, ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    std::fs::write(&ctx.file, self.0)?;
    Ok(Value::Null)
  }
}
