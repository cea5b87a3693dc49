//! Tree execution module.
//!
//! This module provides the coordinator that runs a transformation tree. It
//! handles:
//! - Depth-first, order-ascending traversal
//! - Run-if, run-unless and depends-on skip tracking
//! - Recording every outcome in the result store
//! - Halting on abort-on-failure, unexpected errors and cancellation
//!
//! Execution is strictly sequential. Units run one at a time on the calling
//! thread, so a unit always sees the outcomes of every unit before it.

pub mod plan;
pub mod types;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, error, info, warn};

pub use plan::{PlanEntry, plan};
pub use types::{CancelToken, ExecuteConfig, ExecuteError, Halt, HaltCause, RunReport, SkipReason};

use crate::store::Outcome;
use crate::tree::{TransformationTree, UnitId};
use crate::unit::{Behavior, ExecutionFailure, TargetFile, Unit, UnitContext, UnitError};

/// Runs transformation trees.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
  config: ExecuteConfig,
  cancel: CancelToken,
}

impl Coordinator {
  pub fn new(config: ExecuteConfig) -> Self {
    Self {
      config,
      cancel: CancelToken::new(),
    }
  }

  /// Use an externally owned cancel token.
  pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
    self.cancel = token;
    self
  }

  /// A handle to this coordinator's cancel token.
  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  pub fn config(&self) -> &ExecuteConfig {
    &self.config
  }

  /// Describe what [`run`](Self::run) would do.
  pub fn plan(&self, tree: &TransformationTree) -> Result<Vec<PlanEntry>, ExecuteError> {
    Ok(plan::plan(tree)?)
  }

  /// Run every unit of `tree` against the project in `root`.
  ///
  /// Unit failures do not make this return an error: they are recorded in
  /// the report, which may describe a partially completed run.
  ///
  /// # Errors
  ///
  /// Returns `InvalidTree` if the tree breaks a tree-wide rule, and
  /// `RootFolder` if `root` is not a directory. Nothing runs in either case.
  pub fn run(&self, tree: &TransformationTree, root: &Path) -> Result<RunReport, ExecuteError> {
    tree.validate()?;
    if !root.is_dir() {
      return Err(ExecuteError::RootFolder(root.to_path_buf()));
    }

    if self.config.dry_run {
      let entries = plan::plan(tree)?;
      info!(tree = tree.name(), units = entries.len(), "dry run, nothing will be executed");
      for entry in &entries {
        info!(position = %entry.position, unit = %entry.name, "{}", entry.description);
      }
      return Ok(RunReport::default());
    }

    info!(
      tree = tree.name(),
      units = tree.len(),
      root = %root.display(),
      "starting run"
    );

    let mut run = Run {
      tree,
      root,
      config: &self.config,
      cancel: &self.cancel,
      report: RunReport::default(),
    };
    run.walk()?;
    let report = run.report;

    info!(
      executed = report.executed.len(),
      failed = report.failed.len(),
      skipped = report.skipped.len(),
      halted = report.halted.is_some(),
      "run complete"
    );

    Ok(report)
  }
}

/// Run `tree` with a fresh coordinator.
pub fn execute_tree(tree: &TransformationTree, root: &Path, config: &ExecuteConfig) -> Result<RunReport, ExecuteError> {
  Coordinator::new(config.clone()).run(tree, root)
}

/// What the walk does after visiting a unit.
enum Step {
  /// The unit ran, visit its children next.
  Descend,
  /// The unit and everything below it are done.
  Next,
  Halt,
}

enum Invocation {
  Done(Value),
  Failed(ExecutionFailure),
  Unexpected(String),
}

struct Run<'a> {
  tree: &'a TransformationTree,
  root: &'a Path,
  config: &'a ExecuteConfig,
  cancel: &'a CancelToken,
  report: RunReport,
}

impl Run<'_> {
  /// Depth-first walk over an explicit stack of `(group, next child)` frames,
  /// so nesting depth is bounded by memory rather than the call stack.
  fn walk(&mut self) -> Result<(), ExecuteError> {
    let tree = self.tree;
    let root = tree.root();
    let mut stack: Vec<(UnitId, usize)> = Vec::new();

    match self.visit(root)? {
      Step::Descend => stack.push((root, 0)),
      Step::Next => {}
      Step::Halt => return Ok(()),
    }

    while let Some(frame) = stack.last_mut() {
      let (group, next) = *frame;
      let Some(&child) = tree.children(group).get(next) else {
        stack.pop();
        continue;
      };
      frame.1 += 1;

      match self.visit(child)? {
        Step::Descend => stack.push((child, 0)),
        Step::Next => {}
        Step::Halt => return Ok(()),
      }
    }
    Ok(())
  }

  fn visit(&mut self, id: UnitId) -> Result<Step, ExecuteError> {
    let tree = self.tree;
    let Some(unit) = tree.unit(id) else {
      return Ok(Step::Next);
    };
    let name = unit.name().unwrap_or_default().to_string();

    if self.cancel.is_cancelled() {
      warn!(unit = %name, "run cancelled");
      self.report.halted = Some(Halt {
        unit: name,
        cause: HaltCause::Cancelled,
      });
      return Ok(Step::Halt);
    }

    if let Some(reason) = self.skip_reason(unit) {
      self.skip_subtree(id, reason);
      return Ok(Step::Next);
    }

    debug!(
      unit = %name,
      kind = unit.kind(),
      description = %unit.describe(&self.report.store),
      "executing unit"
    );
    let invocation = self.invoke(id, unit, &name);
    self.report.executed.push(name.clone());

    match invocation {
      Invocation::Done(value) => {
        debug!(unit = %name, "unit succeeded");
        self.report.store.record(Outcome::value(&name, value))?;
      }
      Invocation::Failed(failure) => {
        error!(unit = %name, error = %failure, "unit failed");
        self.report.store.record(Outcome::failure(&name, failure))?;
        self.report.failed.push(name.clone());

        if unit.is_abort_on_failure() || self.config.fail_fast {
          warn!(unit = %name, "aborting run after failure");
          self.report.halted = Some(Halt {
            unit: name,
            cause: HaltCause::AbortOnFailure,
          });
          return Ok(Step::Halt);
        }
        // only leaves can fail, there is nothing below to visit
        return Ok(Step::Next);
      }
      Invocation::Unexpected(message) => {
        error!(unit = %name, error = %message, "unexpected error, stopping run");
        let failure = ExecutionFailure::new(format!("unexpected error: {message}"));
        self.report.store.record(Outcome::failure(&name, failure))?;
        self.report.failed.push(name.clone());
        self.report.halted = Some(Halt {
          unit: name,
          cause: HaltCause::Unexpected(message),
        });
        return Ok(Step::Halt);
      }
    }

    Ok(Step::Descend)
  }

  fn skip_reason(&self, unit: &Unit) -> Option<SkipReason> {
    let store = &self.report.store;
    if let Some(name) = unit.run_if.iter().find(|n| !store.is_true(n)) {
      return Some(SkipReason::ConditionFalse(name.clone()));
    }
    if let Some(name) = unit.run_unless.iter().find(|n| store.is_true(n)) {
      return Some(SkipReason::ConditionTrue(name.clone()));
    }
    unit
      .depends_on
      .iter()
      .find(|n| !store.get(n).is_some_and(Outcome::is_success))
      .map(|n| SkipReason::DependencyFailed(n.clone()))
  }

  /// Mark `id` skipped for `reason`, and everything below it skipped because
  /// of `id`.
  fn skip_subtree(&mut self, id: UnitId, reason: SkipReason) {
    let tree = self.tree;
    let name = tree.name_of(id).unwrap_or_default().to_string();
    warn!(unit = %name, reason = %reason, "skipping unit");
    self.report.skipped.push((name.clone(), reason));

    let mut stack: Vec<UnitId> = tree.children(id).iter().rev().copied().collect();
    while let Some(current) = stack.pop() {
      let current_name = tree.name_of(current).unwrap_or_default().to_string();
      debug!(unit = %current_name, ancestor = %name, "skipping unit");
      self
        .report
        .skipped
        .push((current_name, SkipReason::AncestorSkipped(name.clone())));
      stack.extend(tree.children(current).iter().rev());
    }
  }

  fn resolve_file(&self, unit: &Unit) -> Result<PathBuf, ExecutionFailure> {
    match unit.target() {
      None | Some(TargetFile::Root) => Ok(self.root.to_path_buf()),
      Some(TargetFile::Relative(path)) => Ok(self.root.join(path)),
      Some(TargetFile::FromResult(source)) => self
        .report
        .store
        .get_as::<String>(source)
        .map(PathBuf::from)
        .map_err(|e| ExecutionFailure::new(format!("cannot resolve target file: {e}"))),
    }
  }

  fn invoke(&self, id: UnitId, unit: &Unit, name: &str) -> Invocation {
    if unit.behavior.is_container() {
      return Invocation::Done(Value::from(self.tree.child_names(id)));
    }

    let file = match self.resolve_file(unit) {
      Ok(file) => file,
      Err(failure) => return Invocation::Failed(failure),
    };
    let ctx = UnitContext {
      name,
      root: self.root,
      file,
      store: &self.report.store,
    };

    let call = || match &unit.behavior {
      Behavior::Condition(condition) => condition.evaluate(&ctx).map(Value::Bool),
      Behavior::Operation(operation) => operation.execute(&ctx),
      // containers are handled above
      _ => Ok(Value::Null),
    };

    let result = if self.config.catch_panics {
      match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => return Invocation::Unexpected(panic_message(payload.as_ref())),
      }
    } else {
      call()
    };

    match result {
      Ok(value) => Invocation::Done(value),
      Err(UnitError::Failed(failure)) => Invocation::Failed(failure),
      Err(UnitError::Unexpected(e)) => Invocation::Unexpected(format!("{e:#}")),
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    format!("unit panicked: {s}")
  } else if let Some(s) = payload.downcast_ref::<String>() {
    format!("unit panicked: {s}")
  } else {
    "unit panicked".to_string()
  }
}
