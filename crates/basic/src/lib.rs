//! refit-basic: ready-made units for refit transformation trees
//!
//! - `PomDependencyExists`: checks whether a Maven POM declares a dependency

pub mod pom;

pub use pom::{Dependency, PomDependencyExists, PomError, parse_dependencies, read_dependencies};
