//! refit-lib: composition engine for project transformations
//!
//! A transformation is a tree of small units run in a fixed order against a
//! project folder:
//! - `Unit`: a condition or operation bound to a target file
//! - `TransformationTree`: ordered groups of units, rooted at a template
//! - `ResultStore`: outcome of every unit that ran, keyed by name
//! - `Coordinator`: walks the tree depth-first and records outcomes
//!
//! Units decide whether they run from earlier results (`run_if`,
//! `run_unless`, `depends_on`), and may stop the whole run when they fail
//! (`abort_on_failure`).

pub mod execute;
pub mod store;
pub mod template;
pub mod tree;
pub mod unit;
mod util;

pub use execute::{Coordinator, ExecuteConfig, ExecuteError, RunReport, execute_tree};
pub use store::{Outcome, ResultStore};
pub use tree::{TransformationTree, TreeError, UnitId};
pub use unit::{Condition, LogUnit, Operation, TargetFile, Unit, UnitContext, UnitError};
