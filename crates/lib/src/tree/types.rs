//! Identifiers and errors for transformation trees.

use std::fmt;

use thiserror::Error;

use crate::unit::ConfigurationError;

/// Handle to a unit stored in a [`super::TransformationTree`].
///
/// Ids are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) usize);

impl fmt::Display for UnitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Structural mistakes in how a tree is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
  /// A unit was added to a group that has no parent yet.
  #[error(
    "cannot add {unit} to group {group}: the group has to be added to a parent first \
     (another group, or the transformation template)"
  )]
  UnrootedGroup { group: String, unit: String },

  /// The unit is already owned by a group.
  #[error("{unit} is already registered in {parent}")]
  AlreadyRegistered { unit: String, parent: String },

  /// The tree root was added as a child.
  #[error("the transformation template cannot be added to {parent}")]
  TemplateAsChild { parent: String },

  /// A sibling in the same group already has this name.
  #[error("cannot add {unit} to {group}: the name is already registered there")]
  NameCollision { group: String, unit: String },

  /// The unit has no target file.
  #[error("neither a relative nor an absolute file has been set for {unit}")]
  FileNotSet { unit: String },

  /// Children can only be added to the root, groups and expanders.
  #[error("{unit} is not a group and cannot accept children")]
  NotAGroup { unit: String },

  /// The id does not belong to this tree.
  #[error("unknown unit {0}")]
  UnknownUnit(UnitId),

  /// Two units anywhere in the tree share a name.
  #[error("name '{name}' is used by more than one unit (at {first} and {second})")]
  DuplicateName { name: String, first: String, second: String },

  /// A governing result or file source names no unit of the tree.
  #[error("{unit} refers to '{reference}', which is not a unit of this tree")]
  UnknownReference { unit: String, reference: String },

  /// A referenced unit runs after, or contains, the unit reading it.
  #[error("{unit} refers to '{reference}', which does not run before it")]
  ForwardReference { unit: String, reference: String },

  /// Units read each other's results in a loop.
  #[error("reference cycle detected at {unit}")]
  ReferenceCycle { unit: String },
}

/// Any error raised while building a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
  #[error("configuration error: {0}")]
  Configuration(#[from] ConfigurationError),

  #[error("definition error: {0}")]
  Definition(#[from] DefinitionError),
}
