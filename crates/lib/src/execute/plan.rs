//! Ordered description of what a run would do.

use std::fmt;

use crate::tree::{DefinitionError, TransformationTree};

/// One unit of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
  /// Dotted order path, e.g. `2.1`.
  pub position: String,
  /// Nesting depth; top-level units have depth 1.
  pub depth: usize,
  pub name: String,
  pub kind: &'static str,
  pub description: String,
}

impl fmt::Display for PlanEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let indent = "  ".repeat(self.depth.saturating_sub(1));
    write!(f, "{indent}{} {}: {}", self.position, self.name, self.description)
  }
}

/// Describe every unit below the root in execution order, without running
/// anything.
///
/// # Errors
///
/// Returns the first tree-wide rule the tree breaks.
pub fn plan(tree: &TransformationTree) -> Result<Vec<PlanEntry>, DefinitionError> {
  tree.validate()?;

  let entries = tree
    .walk()
    .into_iter()
    .filter(|id| *id != tree.root())
    .filter_map(|id| {
      let unit = tree.unit(id)?;
      let position = tree.position_of(id)?;
      Some(PlanEntry {
        depth: position.split('.').count(),
        position,
        name: unit.name()?.to_string(),
        kind: unit.kind(),
        description: unit.description(),
      })
    })
    .collect();
  Ok(entries)
}
