//! Tree-wide checks run before execution.
//!
//! Registration only sees one group at a time. Results are keyed by unit name
//! across the whole run, so before a tree executes we check that:
//!
//! - every name is unique in the tree
//! - every referenced result (`run_if`, `run_unless`, `depends_on`, and
//!   files read from a result) names a unit of the tree
//! - references form no cycle
//! - every referenced unit runs before the unit that reads it

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::{DefinitionError, TransformationTree, UnitId};

/// Graph of "result of A is read by B" edges between named units.
pub struct ReferenceGraph<'t> {
  tree: &'t TransformationTree,
  graph: DiGraph<UnitId, ()>,
  nodes: HashMap<&'t str, NodeIndex>,
  /// Execution position of each unit, in depth-first order.
  positions: HashMap<&'t str, usize>,
}

impl<'t> ReferenceGraph<'t> {
  /// Build the graph.
  ///
  /// # Errors
  ///
  /// Returns `DuplicateName` if two units share a name, and `UnknownReference`
  /// if a unit reads a result no unit produces.
  pub fn from_tree(tree: &'t TransformationTree) -> Result<Self, DefinitionError> {
    let order = tree.walk();
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (pos, id) in order.iter().enumerate() {
      let name = tree.name_of(*id).unwrap_or_default();
      if let Some(&first) = positions.get(name) {
        return Err(DefinitionError::DuplicateName {
          name: name.to_string(),
          first: tree.position_of(order[first]).unwrap_or_default(),
          second: tree.position_of(*id).unwrap_or_default(),
        });
      }
      positions.insert(name, pos);
      nodes.insert(name, graph.add_node(*id));
    }

    for id in &order {
      let Some(unit) = tree.unit(*id) else { continue };
      let name = tree.name_of(*id).unwrap_or_default();
      let reader = nodes[name];
      for reference in unit.references() {
        let Some(&source) = nodes.get(reference) else {
          return Err(DefinitionError::UnknownReference {
            unit: name.to_string(),
            reference: reference.to_string(),
          });
        };
        graph.add_edge(source, reader, ());
      }
    }

    Ok(Self {
      tree,
      graph,
      nodes,
      positions,
    })
  }

  /// Check for cycles and for references to units that run later.
  pub fn check(&self) -> Result<(), DefinitionError> {
    toposort(&self.graph, None).map_err(|cycle| DefinitionError::ReferenceCycle {
      unit: self.name(self.graph[cycle.node_id()]),
    })?;

    for edge in self.graph.raw_edges() {
      let source = self.graph[edge.source()];
      let reader = self.graph[edge.target()];
      if self.position(source) >= self.position(reader) {
        return Err(DefinitionError::ForwardReference {
          unit: self.name(reader),
          reference: self.name(source),
        });
      }
    }
    Ok(())
  }

  /// Units that read the result of `name` directly.
  pub fn readers_of(&self, name: &str) -> Vec<UnitId> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut readers: Vec<_> = self
      .graph
      .neighbors_directed(idx, Direction::Outgoing)
      .map(|n| self.graph[n])
      .collect();
    readers.sort_by_key(|id| self.position(*id));
    readers.dedup();
    readers
  }

  fn name(&self, id: UnitId) -> String {
    self.tree.name_of(id).unwrap_or_default().to_string()
  }

  fn position(&self, id: UnitId) -> usize {
    let name = self.tree.name_of(id).unwrap_or_default();
    self.positions.get(name).copied().unwrap_or(usize::MAX)
  }
}

/// Run every tree-wide check.
pub fn validate(tree: &TransformationTree) -> Result<(), DefinitionError> {
  ReferenceGraph::from_tree(tree)?.check()
}
