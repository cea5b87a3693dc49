//! Named result store.
//!
//! Every unit that runs leaves exactly one [`Outcome`] here, keyed by its
//! name, whether it succeeded or failed. Later units read these entries to
//! decide whether to run and which values to use.
//!
//! A store lives for one run. It serializes to JSON so an embedding
//! application can persist it, but the engine itself never does.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::template::{Resolver, TemplateError};
use crate::unit::{ExecutionFailure, UnitError};

/// Recorded result of running one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
  /// Name of the unit that produced this outcome.
  pub unit: String,
  /// Value produced on success, if any.
  pub value: Option<Value>,
  /// Failure, if the unit could not complete.
  pub error: Option<ExecutionFailure>,
}

impl Outcome {
  /// A successful outcome. `Value::Null` is stored as "no value".
  pub fn value(unit: impl Into<String>, value: Value) -> Self {
    Self {
      unit: unit.into(),
      value: (!value.is_null()).then_some(value),
      error: None,
    }
  }

  /// A successful outcome without a value.
  pub fn empty(unit: impl Into<String>) -> Self {
    Self {
      unit: unit.into(),
      value: None,
      error: None,
    }
  }

  /// A failed outcome.
  pub fn failure(unit: impl Into<String>, failure: ExecutionFailure) -> Self {
    Self {
      unit: unit.into(),
      value: None,
      error: Some(failure),
    }
  }

  pub fn is_success(&self) -> bool {
    self.error.is_none()
  }

  /// The boolean value, if this is a successful boolean outcome.
  pub fn as_bool(&self) -> Option<bool> {
    match (&self.error, &self.value) {
      (None, Some(Value::Bool(b))) => Some(*b),
      _ => None,
    }
  }
}

/// Errors raised when reading from or writing to the store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
  /// Nothing is recorded under the name.
  #[error("no result recorded for '{0}'")]
  Absent(String),

  /// The unit ran and failed, so it has no value.
  #[error("unit '{name}' failed: {failure}")]
  Failed { name: String, failure: ExecutionFailure },

  /// The unit succeeded without producing a value.
  #[error("unit '{0}' produced no value")]
  NoValue(String),

  /// Entries are write-once.
  #[error("result for '{0}' is already recorded")]
  AlreadyRecorded(String),

  /// The value does not deserialize into the requested type.
  #[error("result for '{name}' has an unexpected type: {message}")]
  Type { name: String, message: String },
}

impl From<StoreError> for UnitError {
  fn from(e: StoreError) -> Self {
    UnitError::failed(e.to_string())
  }
}

/// Per-run mapping from unit name to outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultStore {
  entries: HashMap<String, Outcome>,
}

impl ResultStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an outcome under the name of the unit that produced it.
  ///
  /// # Errors
  ///
  /// Entries are write-once: recording a second outcome for the same name
  /// returns `AlreadyRecorded` and leaves the first one in place.
  pub fn record(&mut self, outcome: Outcome) -> Result<(), StoreError> {
    if self.entries.contains_key(&outcome.unit) {
      return Err(StoreError::AlreadyRecorded(outcome.unit));
    }
    self.entries.insert(outcome.unit.clone(), outcome);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&Outcome> {
    self.entries.get(name)
  }

  /// The value produced by `name`.
  ///
  /// # Errors
  ///
  /// Fails if nothing is recorded for `name`, if the unit failed, or if it
  /// produced no value.
  pub fn get_value(&self, name: &str) -> Result<&Value, StoreError> {
    let outcome = self.get(name).ok_or_else(|| StoreError::Absent(name.to_string()))?;
    if let Some(failure) = &outcome.error {
      return Err(StoreError::Failed {
        name: name.to_string(),
        failure: failure.clone(),
      });
    }
    outcome.value.as_ref().ok_or_else(|| StoreError::NoValue(name.to_string()))
  }

  /// The value produced by `name`, deserialized into `T`.
  pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
    let value = self.get_value(name)?;
    serde_json::from_value(value.clone()).map_err(|e| StoreError::Type {
      name: name.to_string(),
      message: e.to_string(),
    })
  }

  /// Whether `name` ran successfully and produced `true`.
  pub fn is_true(&self, name: &str) -> bool {
    self.get(name).and_then(Outcome::as_bool).unwrap_or(false)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
    self.entries.iter().map(|(name, outcome)| (name.as_str(), outcome))
  }
}

impl Resolver for ResultStore {
  fn resolve(&self, name: &str) -> Result<String, TemplateError> {
    let value = self.get_value(name).map_err(|e| TemplateError::Unresolved {
      name: name.to_string(),
      reason: e.to_string(),
    })?;
    Ok(match value {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    })
  }
}
