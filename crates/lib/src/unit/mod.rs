//! Transformation units.
//!
//! A unit is one named step of a transformation tree. Concrete steps implement
//! one of two capabilities:
//!
//! - [`Condition`] - evaluates to a boolean, typically used to decide whether
//!   later units run
//! - [`Operation`] - returns an arbitrary value or performs a side effect on
//!   the target file
//!
//! A [`Unit`] wraps a capability (or a container role) together with the
//! settings every unit shares: its name, its target file, its failure policy
//! and the results that govern whether it runs.
//!
//! # Example
//!
//! ```ignore
//! let check = Unit::condition(PomDependencyExists::new("com.x", "lib")?)
//!   .relative("pom.xml")?
//!   .named("has-lib")?;
//!
//! let bump = Unit::operation(BumpVersion::new("2.0"))
//!   .relative("pom.xml")?
//!   .run_if("has-lib")
//!   .abort_on_failure(true);
//! ```

mod log;
mod types;

pub use log::LogUnit;
pub use types::*;

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::store::ResultStore;

/// Everything a unit can see while it runs.
pub struct UnitContext<'a> {
  /// Final name of the running unit.
  pub name: &'a str,
  /// Root folder of the transformed project.
  pub root: &'a Path,
  /// The unit's target file, already resolved to a full path.
  pub file: PathBuf,
  /// Results of every unit that ran before this one.
  pub store: &'a ResultStore,
}

/// A unit that evaluates to `true` or `false`.
pub trait Condition: Send + Sync {
  /// Short type name, used to derive names for unnamed units.
  fn kind(&self) -> &'static str;

  /// Human readable description of what the condition checks.
  fn description(&self, target: &TargetFile) -> String;

  /// Evaluate the condition against the resolved target file.
  fn evaluate(&self, ctx: &UnitContext<'_>) -> Result<bool, UnitError>;
}

/// A unit that acts on its target file and may produce a value.
///
/// Operations must be cloneable so one definition can be fanned out over many
/// files (see [`crate::tree::TransformationTree::add_multiple`]).
pub trait Operation: OperationClone + Send + Sync {
  /// Short type name, used to derive names for unnamed units.
  fn kind(&self) -> &'static str;

  /// Human readable description of what the operation does.
  fn description(&self, target: &TargetFile) -> String;

  /// Description with earlier results filled in. Falls back to
  /// [`Operation::description`].
  fn rendered_description(&self, target: &TargetFile, _store: &ResultStore) -> String {
    self.description(target)
  }

  /// Perform the operation. `Value::Null` means "no value".
  fn execute(&self, ctx: &UnitContext<'_>) -> Result<Value, UnitError>;
}

/// Object-safe cloning for boxed operations.
pub trait OperationClone {
  fn clone_box(&self) -> Box<dyn Operation>;
}

impl<T> OperationClone for T
where
  T: Operation + Clone + 'static,
{
  fn clone_box(&self) -> Box<dyn Operation> {
    Box::new(self.clone())
  }
}

impl Clone for Box<dyn Operation> {
  fn clone(&self) -> Self {
    self.clone_box()
  }
}

/// What a unit does when it runs.
pub(crate) enum Behavior {
  /// The tree root. Accepts children without having a parent.
  Template,
  /// A plain container of units.
  Group,
  /// Container of per-file copies created by `add_multiple`.
  Expander { kind: &'static str, files: usize },
  Condition(Box<dyn Condition>),
  Operation(Box<dyn Operation>),
}

impl Behavior {
  pub(crate) fn kind(&self) -> &'static str {
    match self {
      Behavior::Template => "Template",
      Behavior::Group => "Group",
      Behavior::Expander { .. } => "MultipleOperations",
      Behavior::Condition(c) => c.kind(),
      Behavior::Operation(o) => o.kind(),
    }
  }

  pub(crate) fn is_container(&self) -> bool {
    matches!(self, Behavior::Template | Behavior::Group | Behavior::Expander { .. })
  }
}

/// A transformation unit before and after it is registered into a tree.
pub struct Unit {
  pub(crate) name: Option<String>,
  pub(crate) target: Option<TargetFile>,
  pub(crate) abort_on_failure: bool,
  pub(crate) run_if: Vec<String>,
  pub(crate) run_unless: Vec<String>,
  pub(crate) depends_on: Vec<String>,
  pub(crate) behavior: Behavior,
}

impl Unit {
  fn with_behavior(behavior: Behavior, target: Option<TargetFile>) -> Self {
    Self {
      name: None,
      target,
      abort_on_failure: false,
      run_if: Vec::new(),
      run_unless: Vec::new(),
      depends_on: Vec::new(),
      behavior,
    }
  }

  /// Wrap a condition. Its target file must be set before registration.
  pub fn condition(condition: impl Condition + 'static) -> Self {
    Self::with_behavior(Behavior::Condition(Box::new(condition)), None)
  }

  /// Wrap an operation. Its target file must be set before registration.
  pub fn operation(operation: impl Operation + 'static) -> Self {
    Self::with_behavior(Behavior::Operation(Box::new(operation)), None)
  }

  /// An empty group acting on the root folder.
  pub fn group() -> Self {
    Self::with_behavior(Behavior::Group, Some(TargetFile::Root))
  }

  /// A log unit acting on the root folder.
  pub fn log(log: LogUnit) -> Self {
    Self::with_behavior(Behavior::Operation(Box::new(log)), Some(TargetFile::Root))
  }

  pub(crate) fn operation_box(operation: Box<dyn Operation>) -> Self {
    Self::with_behavior(Behavior::Operation(operation), None)
  }

  pub(crate) fn template(name: String) -> Self {
    let mut unit = Self::with_behavior(Behavior::Template, Some(TargetFile::Root));
    unit.name = Some(name);
    unit
  }

  pub(crate) fn expander(kind: &'static str, files: usize) -> Self {
    Self::with_behavior(Behavior::Expander { kind, files }, Some(TargetFile::Root))
  }

  /// Set the unit's name. A name can only be set once.
  pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ConfigurationError> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(ConfigurationError::BlankName);
    }
    if let Some(current) = &self.name {
      return Err(ConfigurationError::NameAlreadySet {
        current: current.clone(),
        requested: name,
      });
    }
    self.name = Some(name);
    Ok(())
  }

  /// Builder form of [`Unit::set_name`].
  pub fn named(mut self, name: impl Into<String>) -> Result<Self, ConfigurationError> {
    self.set_name(name)?;
    Ok(self)
  }

  /// Act on a file relative to the root folder.
  ///
  /// Fails if the path is blank, or if the file was already set from a result.
  pub fn set_relative(&mut self, path: impl Into<PathBuf>) -> Result<(), ConfigurationError> {
    let path = path.into();
    if path.as_os_str().to_string_lossy().trim().is_empty() {
      return Err(ConfigurationError::BlankTargetFile { unit: self.label() });
    }
    if let Some(existing @ TargetFile::FromResult(_)) = &self.target {
      return Err(ConfigurationError::TargetFileConflict {
        unit: self.label(),
        existing: existing.clone(),
      });
    }
    self.target = Some(TargetFile::Relative(path));
    Ok(())
  }

  /// Builder form of [`Unit::set_relative`].
  pub fn relative(mut self, path: impl Into<PathBuf>) -> Result<Self, ConfigurationError> {
    self.set_relative(path)?;
    Ok(self)
  }

  /// Act on the absolute path stored as the value of result `name`.
  ///
  /// Fails if the name is blank, or if a relative file was already set.
  pub fn set_absolute_from(&mut self, name: impl Into<String>) -> Result<(), ConfigurationError> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(ConfigurationError::BlankTargetFile { unit: self.label() });
    }
    if let Some(existing @ TargetFile::Relative(_)) = &self.target {
      return Err(ConfigurationError::TargetFileConflict {
        unit: self.label(),
        existing: existing.clone(),
      });
    }
    self.target = Some(TargetFile::FromResult(name));
    Ok(())
  }

  /// Builder form of [`Unit::set_absolute_from`].
  pub fn absolute_from(mut self, name: impl Into<String>) -> Result<Self, ConfigurationError> {
    self.set_absolute_from(name)?;
    Ok(self)
  }

  /// Halt the whole run if this unit fails.
  pub fn abort_on_failure(mut self, abort: bool) -> Self {
    self.abort_on_failure = abort;
    self
  }

  /// Run only if the result named `condition` is `true`.
  pub fn run_if(mut self, condition: impl Into<String>) -> Self {
    self.run_if.push(condition.into());
    self
  }

  /// Run only if the result named `condition` is not `true`.
  pub fn run_unless(mut self, condition: impl Into<String>) -> Self {
    self.run_unless.push(condition.into());
    self
  }

  /// Run only if the unit named `unit` ran and succeeded.
  pub fn depends_on(mut self, unit: impl Into<String>) -> Self {
    self.depends_on.push(unit.into());
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn target(&self) -> Option<&TargetFile> {
    self.target.as_ref()
  }

  pub fn is_file_set(&self) -> bool {
    self.target.is_some()
  }

  pub fn is_abort_on_failure(&self) -> bool {
    self.abort_on_failure
  }

  /// Type name of the unit (`Group`, `Log`, `PomDependencyExists`, ...).
  pub fn kind(&self) -> &'static str {
    self.behavior.kind()
  }

  /// Lifecycle state of a unit that is not yet owned by a tree.
  pub fn state(&self) -> UnitState {
    if self.is_file_set() {
      UnitState::Configured
    } else {
      UnitState::Unconfigured
    }
  }

  /// Names of every result this unit reads before or while running.
  pub fn references(&self) -> impl Iterator<Item = &str> {
    let file_ref = match &self.target {
      Some(TargetFile::FromResult(name)) => Some(name.as_str()),
      _ => None,
    };
    self
      .run_if
      .iter()
      .chain(&self.run_unless)
      .chain(&self.depends_on)
      .map(String::as_str)
      .chain(file_ref)
  }

  /// Human readable description. Does not touch any state.
  pub fn description(&self) -> String {
    let target = self.target.clone().unwrap_or(TargetFile::Root);
    match &self.behavior {
      Behavior::Template => format!("Transformation template '{}'", self.label()),
      Behavior::Group => "Transformation unit group".to_string(),
      Behavior::Expander { kind, files } => format!("Perform {kind} on {files} files"),
      Behavior::Condition(c) => c.description(&target),
      Behavior::Operation(o) => o.description(&target),
    }
  }

  /// Description as it reads at execution time.
  ///
  /// A target read from an earlier result shows the resolved path, and log
  /// messages show their rendered text. Anything that cannot be resolved yet
  /// keeps its raw form.
  pub fn describe(&self, store: &ResultStore) -> String {
    let target = match &self.target {
      Some(TargetFile::FromResult(name)) => match store.get_as::<String>(name) {
        Ok(path) => TargetFile::Relative(PathBuf::from(path)),
        Err(_) => TargetFile::FromResult(name.clone()),
      },
      Some(target) => target.clone(),
      None => TargetFile::Root,
    };
    match &self.behavior {
      Behavior::Condition(c) => c.description(&target),
      Behavior::Operation(o) => o.rendered_description(&target, store),
      _ => self.description(),
    }
  }

  /// Name if set, otherwise the kind. Used in error messages.
  pub(crate) fn label(&self) -> String {
    self.name.clone().unwrap_or_else(|| self.kind().to_string())
  }
}

impl std::fmt::Debug for Unit {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Unit")
      .field("kind", &self.kind())
      .field("name", &self.name)
      .field("target", &self.target)
      .field("abort_on_failure", &self.abort_on_failure)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::store::Outcome;
  use crate::util::testutil::{Const, Echo, ReadFile};

  #[test]
  fn name_can_only_be_set_once() {
    let mut unit = Unit::operation(Echo::new("x"));
    unit.set_name("first").unwrap();

    let err = unit.set_name("second").unwrap_err();
    assert_eq!(
      err,
      ConfigurationError::NameAlreadySet {
        current: "first".into(),
        requested: "second".into(),
      }
    );
    assert_eq!(unit.name(), Some("first"));
  }

  #[test]
  fn blank_names_are_rejected() {
    let err = Unit::operation(Echo::new("x")).named("   ").unwrap_err();
    assert_eq!(err, ConfigurationError::BlankName);
  }

  #[test]
  fn blank_target_file_is_rejected() {
    let err = Unit::condition(Const(true)).relative("").unwrap_err();
    assert!(matches!(err, ConfigurationError::BlankTargetFile { .. }));
  }

  #[test]
  fn relative_after_absolute_conflicts() {
    let unit = Unit::operation(Echo::new("x")).absolute_from("locate").unwrap();
    let err = unit.relative("pom.xml").unwrap_err();
    assert_eq!(
      err,
      ConfigurationError::TargetFileConflict {
        unit: "Echo".into(),
        existing: TargetFile::FromResult("locate".into()),
      }
    );
  }

  #[test]
  fn absolute_after_relative_conflicts() {
    let unit = Unit::operation(Echo::new("x")).relative("pom.xml").unwrap();
    let err = unit.absolute_from("locate").unwrap_err();
    assert!(matches!(err, ConfigurationError::TargetFileConflict { .. }));
  }

  #[test]
  fn same_mechanism_replaces_the_path() {
    let unit = Unit::operation(Echo::new("x"))
      .relative("a.txt")
      .unwrap()
      .relative("b.txt")
      .unwrap();
    assert_eq!(unit.target(), Some(&TargetFile::Relative(PathBuf::from("b.txt"))));
  }

  #[test]
  fn state_follows_configuration() {
    let unit = Unit::condition(Const(true));
    assert_eq!(unit.state(), UnitState::Unconfigured);
    let unit = unit.relative("pom.xml").unwrap();
    assert_eq!(unit.state(), UnitState::Configured);
    assert_eq!(Unit::group().state(), UnitState::Configured);
  }

  #[test]
  fn references_cover_every_governing_result() {
    let unit = Unit::operation(Echo::new("x"))
      .absolute_from("locate")
      .unwrap()
      .run_if("a")
      .run_unless("b")
      .depends_on("c");
    let refs: Vec<_> = unit.references().collect();
    assert_eq!(refs, vec!["a", "b", "c", "locate"]);
  }

  #[test]
  fn boxed_operations_clone() {
    let op: Box<dyn Operation> = Box::new(Echo::new("hello"));
    let copy = op.clone();
    assert_eq!(copy.kind(), "Echo");
  }

  #[test]
  fn describe_resolves_target_from_results() {
    let unit = Unit::operation(ReadFile).absolute_from("locate").unwrap();
    let mut store = ResultStore::new();

    assert_eq!(unit.describe(&store), unit.description());

    store.record(Outcome::value("locate", json!("/work/pom.xml"))).unwrap();
    let described = unit.describe(&store);
    assert!(described.contains("/work/pom.xml"), "{described}");
    assert!(!described.contains("<result:locate>"), "{described}");
  }

  #[test]
  fn describe_renders_log_messages() {
    let unit = Unit::log(LogUnit::new("java {}").with_attributes(["java-version"]));
    let mut store = ResultStore::new();

    assert_eq!(unit.describe(&store), "Log message 'java {}'");

    store.record(Outcome::value("java-version", json!("17"))).unwrap();
    assert_eq!(unit.describe(&store), "Log message 'java 17'");
    assert_eq!(unit.description(), "Log message 'java {}'");
  }
}
