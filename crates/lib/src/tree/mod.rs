//! Transformation trees.
//!
//! A tree owns every unit in an arena and links them through [`UnitId`]s: a
//! group keeps the ordered ids of its children, and every child keeps the id
//! of its parent. The root is the transformation template; it is the only
//! container that accepts children without having a parent itself.
//!
//! Registration rules, checked in this order by every `add*` method:
//!
//! 1. the receiving group must already be attached to a parent
//! 2. the unit must not be attached anywhere yet
//! 3. its name must not be taken by a sibling (siblings only: names are not
//!    checked across groups at registration time, see [`validate`])
//! 4. its target file must be set
//!
//! A registered unit gets its 1-based `order` (its position among the group's
//! children) and a name, derived as `<parent>-<order>-<Kind>` if none was
//! given. Failed registrations leave the tree unchanged.
//!
//! The tree is mutated through `&mut self`, so registration is always
//! exclusive. Threads that register concurrently share it behind a `Mutex`.

mod types;
pub mod validate;

pub use types::*;

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{Level, debug};

use crate::unit::{Behavior, ConfigurationError, LogUnit, TargetFile, Unit, UnitState};

const ROOT: UnitId = UnitId(0);

struct Node {
  unit: Unit,
  order: Option<usize>,
  parent: Option<UnitId>,
  children: Vec<UnitId>,
  child_names: HashSet<String>,
}

impl Node {
  fn new(unit: Unit) -> Self {
    Self {
      unit,
      order: None,
      parent: None,
      children: Vec::new(),
      child_names: HashSet::new(),
    }
  }
}

/// An ordered tree of transformation units rooted at a template.
pub struct TransformationTree {
  nodes: Vec<Node>,
}

impl TransformationTree {
  /// Create a tree whose root template is called `name`.
  pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(ConfigurationError::BlankName);
    }
    Ok(Self {
      nodes: vec![Node::new(Unit::template(name))],
    })
  }

  /// Id of the root template.
  pub fn root(&self) -> UnitId {
    ROOT
  }

  /// Name of the root template.
  pub fn name(&self) -> &str {
    self.nodes[ROOT.0].unit.name().unwrap_or_default()
  }

  /// Hand a unit to the tree without attaching it anywhere.
  ///
  /// The unit stays unreachable until [`attach`](Self::attach)ed to a group.
  pub fn insert(&mut self, unit: Unit) -> UnitId {
    let id = UnitId(self.nodes.len());
    self.nodes.push(Node::new(unit));
    id
  }

  /// Attach an inserted unit to `parent`, returning its final name.
  pub fn attach(&mut self, parent: UnitId, child: UnitId) -> Result<String, TreeError> {
    self.register(parent, child, false)
  }

  /// Register `unit` into `parent`, returning its final name.
  pub fn add(&mut self, parent: UnitId, unit: Unit) -> Result<String, TreeError> {
    let id = self.add_unit(parent, unit)?;
    Ok(self.nodes[id.0].unit.label())
  }

  /// Name `unit`, then register it into `parent`.
  pub fn add_named(&mut self, parent: UnitId, mut unit: Unit, name: impl Into<String>) -> Result<String, TreeError> {
    unit.set_name(name)?;
    self.add(parent, unit)
  }

  /// Register `unit` into `parent`, returning its id.
  ///
  /// Use this for groups, which need their id to receive children.
  pub fn add_unit(&mut self, parent: UnitId, unit: Unit) -> Result<UnitId, TreeError> {
    let id = self.insert(unit);
    match self.register(parent, id, false) {
      Ok(_) => Ok(id),
      Err(e) => {
        // register does not mutate on failure, so the new node is still last
        self.nodes.pop();
        Err(e)
      }
    }
  }

  /// Register a new empty group into `parent`.
  pub fn add_group(&mut self, parent: UnitId, name: Option<&str>) -> Result<UnitId, TreeError> {
    let mut group = Unit::group();
    if let Some(name) = name {
      group.set_name(name)?;
    }
    self.add_unit(parent, group)
  }

  /// Fan one operation out over several files.
  ///
  /// `template` must be an operation without a target file. One copy is made
  /// per file, named `<expander>-<n>` and bound to that file. All copies live
  /// in a single expander child of `parent`, so the fan-out occupies one
  /// ordered slot. The template's name, failure policy and governing results
  /// apply to the expander; copies inherit the failure policy.
  ///
  /// # Errors
  ///
  /// An empty file list is a configuration error.
  pub fn add_multiple<I, P>(&mut self, parent: UnitId, template: Unit, files: I) -> Result<String, TreeError>
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    let label = template.label();
    let Behavior::Operation(operation) = &template.behavior else {
      return Err(ConfigurationError::NotAnOperation { unit: label }.into());
    };
    if template.is_file_set() {
      return Err(ConfigurationError::TemplateFileSet { unit: label }.into());
    }

    let files: Vec<PathBuf> = files.into_iter().map(Into::into).collect();
    if files.is_empty() {
      return Err(ConfigurationError::EmptyFanOut { unit: label }.into());
    }
    if files.iter().any(|f| f.as_os_str().to_string_lossy().trim().is_empty()) {
      return Err(ConfigurationError::BlankTargetFile { unit: label }.into());
    }

    let operation = operation.clone();
    let Unit {
      name,
      abort_on_failure,
      run_if,
      run_unless,
      depends_on,
      ..
    } = template;

    let mut expander = Unit::expander(operation.kind(), files.len());
    expander.name = name;
    expander.abort_on_failure = abort_on_failure;
    expander.run_if = run_if;
    expander.run_unless = run_unless;
    expander.depends_on = depends_on;

    let expander_id = self.add_unit(parent, expander)?;
    let expander_name = self.nodes[expander_id.0].unit.label();

    for (i, file) in files.into_iter().enumerate() {
      let mut copy = Unit::operation_box(operation.clone());
      copy.name = Some(format!("{}-{}", expander_name, i + 1));
      copy.target = Some(TargetFile::Relative(file));
      copy.abort_on_failure = abort_on_failure;
      let copy_id = self.insert(copy);
      self.register(expander_id, copy_id, true)?;
    }

    Ok(expander_name)
  }

  /// Register a log unit.
  pub fn log(&mut self, parent: UnitId, message: impl Into<String>) -> Result<String, TreeError> {
    self.add(parent, Unit::log(LogUnit::new(message)))
  }

  /// Register a log unit with an explicit severity.
  pub fn log_at(&mut self, parent: UnitId, level: Level, message: impl Into<String>) -> Result<String, TreeError> {
    self.add(parent, Unit::log(LogUnit::new(message).with_level(level)))
  }

  /// Register a log unit whose `{}` slots are filled from named results.
  pub fn log_with<I, S>(&mut self, parent: UnitId, message: impl Into<String>, attributes: I) -> Result<String, TreeError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.add(parent, Unit::log(LogUnit::new(message).with_attributes(attributes)))
  }

  /// Register a log unit with a severity and named results.
  pub fn log_at_with<I, S>(
    &mut self,
    parent: UnitId,
    level: Level,
    message: impl Into<String>,
    attributes: I,
  ) -> Result<String, TreeError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let log = LogUnit::new(message).with_level(level).with_attributes(attributes);
    self.add(parent, Unit::log(log))
  }

  fn register(&mut self, parent: UnitId, child: UnitId, internal: bool) -> Result<String, TreeError> {
    let (order, name) = {
      let parent_node = self.nodes.get(parent.0).ok_or(DefinitionError::UnknownUnit(parent))?;
      let child_node = self.nodes.get(child.0).ok_or(DefinitionError::UnknownUnit(child))?;
      let group = parent_node.unit.label();
      let unit = child_node.unit.label();

      match parent_node.unit.behavior {
        Behavior::Template | Behavior::Group => {}
        Behavior::Expander { .. } if internal => {}
        _ => return Err(DefinitionError::NotAGroup { unit: group }.into()),
      }
      if matches!(child_node.unit.behavior, Behavior::Template) {
        return Err(DefinitionError::TemplateAsChild { parent: group }.into());
      }
      if parent_node.parent.is_none() && !matches!(parent_node.unit.behavior, Behavior::Template) {
        return Err(DefinitionError::UnrootedGroup { group, unit }.into());
      }
      if let Some(existing) = child_node.parent {
        return Err(
          DefinitionError::AlreadyRegistered {
            unit,
            parent: self.nodes[existing.0].unit.label(),
          }
          .into(),
        );
      }
      if let Some(name) = child_node.unit.name()
        && parent_node.child_names.contains(name)
      {
        return Err(DefinitionError::NameCollision { group, unit }.into());
      }
      if !child_node.unit.is_file_set() {
        return Err(DefinitionError::FileNotSet { unit }.into());
      }

      // Order is the position after the append, so the first child gets 1
      let order = parent_node.children.len() + 1;
      let name = match child_node.unit.name() {
        Some(name) => name.to_string(),
        None => {
          let derived = format!("{}-{}-{}", group, order, child_node.unit.kind());
          if parent_node.child_names.contains(&derived) {
            return Err(DefinitionError::NameCollision { group, unit: derived }.into());
          }
          derived
        }
      };
      (order, name)
    };

    let parent_node = &mut self.nodes[parent.0];
    parent_node.children.push(child);
    parent_node.child_names.insert(name.clone());

    let child_node = &mut self.nodes[child.0];
    child_node.order = Some(order);
    child_node.parent = Some(parent);
    child_node.unit.name = Some(name.clone());

    debug!(unit = %name, parent = %parent, order, "registered unit");
    Ok(name)
  }

  pub fn unit(&self, id: UnitId) -> Option<&Unit> {
    self.nodes.get(id.0).map(|n| &n.unit)
  }

  pub fn name_of(&self, id: UnitId) -> Option<&str> {
    self.unit(id).and_then(Unit::name)
  }

  /// 1-based position of the unit among its siblings. `None` for the root
  /// and for detached units.
  pub fn order_of(&self, id: UnitId) -> Option<usize> {
    self.nodes.get(id.0).and_then(|n| n.order)
  }

  pub fn parent_of(&self, id: UnitId) -> Option<UnitId> {
    self.nodes.get(id.0).and_then(|n| n.parent)
  }

  /// Children of a container, in execution order.
  pub fn children(&self, id: UnitId) -> &[UnitId] {
    self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or_default()
  }

  /// Names of a container's children, in execution order.
  ///
  /// This is the value a container records when it runs.
  pub fn child_names(&self, id: UnitId) -> Vec<String> {
    self
      .children(id)
      .iter()
      .filter_map(|c| self.name_of(*c))
      .map(str::to_string)
      .collect()
  }

  pub fn is_container(&self, id: UnitId) -> bool {
    self.unit(id).is_some_and(|u| u.behavior.is_container())
  }

  /// Lifecycle state of a unit as far as the tree knows.
  pub fn state_of(&self, id: UnitId) -> Option<UnitState> {
    let node = self.nodes.get(id.0)?;
    if id == ROOT || node.parent.is_some() {
      Some(UnitState::Registered)
    } else {
      Some(node.unit.state())
    }
  }

  /// Dotted order path of a unit, e.g. `2.1` for the first child of the
  /// root's second child. The root has an empty path.
  pub fn position_of(&self, id: UnitId) -> Option<String> {
    let mut orders = Vec::new();
    let mut current = id;
    while current != ROOT {
      let node = self.nodes.get(current.0)?;
      orders.push(node.order?.to_string());
      current = node.parent?;
    }
    orders.reverse();
    Some(orders.join("."))
  }

  /// Every registered unit, depth-first in execution order, root first.
  pub fn walk(&self) -> Vec<UnitId> {
    let mut order = Vec::new();
    let mut stack = vec![ROOT];
    while let Some(id) = stack.pop() {
      order.push(id);
      stack.extend(self.children(id).iter().rev());
    }
    order
  }

  /// First registered unit called `name`, in execution order.
  pub fn find(&self, name: &str) -> Option<UnitId> {
    self.walk().into_iter().find(|id| self.name_of(*id) == Some(name))
  }

  /// Child of `group` called `name`.
  pub fn find_in(&self, group: UnitId, name: &str) -> Option<UnitId> {
    self.children(group).iter().copied().find(|id| self.name_of(*id) == Some(name))
  }

  /// Number of registered units, the root included.
  pub fn len(&self) -> usize {
    self.walk().len()
  }

  /// Whether the tree has nothing but its root.
  pub fn is_empty(&self) -> bool {
    self.children(ROOT).is_empty()
  }

  /// Check tree-wide rules that registration alone cannot enforce.
  pub fn validate(&self) -> Result<(), DefinitionError> {
    validate::validate(self)
  }
}
