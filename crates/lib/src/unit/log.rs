//! Log unit: writes a message, optionally built from earlier results.

use serde_json::Value;
use tracing::{Level, debug, error, info, trace, warn};

use super::{Operation, TargetFile, UnitContext, UnitError};
use crate::store::ResultStore;
use crate::template;

/// Emits a message through `tracing` when it runs.
///
/// The message is a template. Each `{}` slot is filled, in order, with the
/// value of the result named in `attributes`; `{name}` reads the named result
/// directly. See [`crate::template`] for the syntax.
#[derive(Debug, Clone)]
pub struct LogUnit {
  message: String,
  level: Level,
  attributes: Vec<String>,
}

impl LogUnit {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level: Level::INFO,
      attributes: Vec::new(),
    }
  }

  pub fn with_level(mut self, level: Level) -> Self {
    self.level = level;
    self
  }

  pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.attributes = attributes.into_iter().map(Into::into).collect();
    self
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn level(&self) -> Level {
    self.level
  }

  pub fn attributes(&self) -> &[String] {
    &self.attributes
  }

  fn emit(&self, unit: &str, text: &str) {
    if self.level == Level::ERROR {
      error!(unit, "{}", text);
    } else if self.level == Level::WARN {
      warn!(unit, "{}", text);
    } else if self.level == Level::INFO {
      info!(unit, "{}", text);
    } else if self.level == Level::DEBUG {
      debug!(unit, "{}", text);
    } else {
      trace!(unit, "{}", text);
    }
  }
}

impl Operation for LogUnit {
  fn kind(&self) -> &'static str {
    "Log"
  }

  fn description(&self, _target: &TargetFile) -> String {
    format!("Log message '{}'", self.message)
  }

  fn rendered_description(&self, _target: &TargetFile, store: &ResultStore) -> String {
    match template::render(&self.message, &self.attributes, store) {
      Ok(text) => format!("Log message '{text}'"),
      Err(_) => format!("Log message '{}'", self.message),
    }
  }

  fn execute(&self, ctx: &UnitContext<'_>) -> Result<Value, UnitError> {
    let text = template::render(&self.message, &self.attributes, ctx.store)
      .map_err(|e| UnitError::failed(format!("cannot render log message: {e}")))?;
    self.emit(ctx.name, &text);
    Ok(Value::String(text))
  }
}
