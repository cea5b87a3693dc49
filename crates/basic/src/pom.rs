//! Maven POM conditions.
//!
//! Only the dependencies declared directly under `<project><dependencies>`
//! are considered. Entries under `<dependencyManagement>`, profiles and
//! plugins are ignored, as are properties: versions are compared as written.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use refit_lib::unit::{Condition, ConfigurationError, TargetFile, UnitContext, UnitError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

const DEPENDENCY_PATH: [&str; 3] = ["project", "dependencies", "dependency"];

/// A dependency declared in a POM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dependency {
  pub group_id: String,
  pub artifact_id: String,
  pub version: Option<String>,
  pub scope: Option<String>,
}

/// Errors raised while reading a POM file.
#[derive(Debug, Error)]
pub enum PomError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("malformed xml at byte {position}: {message}")]
  Xml { position: u64, message: String },

  #[error("root element is <{0}>, expected <project>")]
  NotAProject(String),

  #[error("unexpected end of file inside <{0}>")]
  Truncated(String),

  #[error("no <project> element found")]
  MissingProject,
}

/// Read the direct dependencies of the POM at `path`.
pub fn read_dependencies(path: &Path) -> Result<Vec<Dependency>, PomError> {
  let xml = std::fs::read_to_string(path)?;
  parse_dependencies(&xml)
}

/// Parse the direct dependencies out of POM text.
///
/// Dependencies missing a group or artifact id are skipped.
pub fn parse_dependencies(xml: &str) -> Result<Vec<Dependency>, PomError> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut buf = Vec::new();
  let mut path: Vec<String> = Vec::new();
  let mut current: Option<Dependency> = None;
  let mut dependencies = Vec::new();
  let mut seen_root = false;
  // Text of the field being read. Comments and CDATA split it into pieces.
  let mut field_text = String::new();

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(e)) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if path.is_empty() && name != "project" {
          return Err(PomError::NotAProject(name));
        }
        seen_root = true;
        field_text.clear();
        path.push(name);
        if path == DEPENDENCY_PATH {
          current = Some(Dependency::default());
        }
      }
      Ok(Event::Empty(e)) => {
        if path.is_empty() {
          let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
          if name != "project" {
            return Err(PomError::NotAProject(name));
          }
          seen_root = true;
        }
      }
      Ok(Event::Text(e)) => {
        if current.is_some() && dependency_field(&path).is_some() {
          let text = e.unescape().map_err(|err| PomError::Xml {
            position: reader.buffer_position(),
            message: err.to_string(),
          })?;
          field_text.push_str(&text);
        }
      }
      Ok(Event::CData(e)) => {
        if current.is_some() && dependency_field(&path).is_some() {
          field_text.push_str(&String::from_utf8_lossy(&e));
        }
      }
      Ok(Event::End(_)) => {
        if let Some(dependency) = current.as_mut()
          && let Some(field) = dependency_field(&path)
        {
          let text = std::mem::take(&mut field_text).trim().to_string();
          if !text.is_empty() {
            match field {
              "groupId" => dependency.group_id = text,
              "artifactId" => dependency.artifact_id = text,
              "version" => dependency.version = Some(text),
              "scope" => dependency.scope = Some(text),
              _ => {}
            }
          }
        }
        if path == DEPENDENCY_PATH
          && let Some(dependency) = current.take()
          && !dependency.group_id.is_empty()
          && !dependency.artifact_id.is_empty()
        {
          dependencies.push(dependency);
        }
        path.pop();
      }
      Ok(Event::Eof) => {
        if let Some(open) = path.last() {
          return Err(PomError::Truncated(open.clone()));
        }
        if !seen_root {
          return Err(PomError::MissingProject);
        }
        break;
      }
      Err(e) => {
        return Err(PomError::Xml {
          position: reader.error_position(),
          message: e.to_string(),
        });
      }
      _ => {}
    }
    buf.clear();
  }

  Ok(dependencies)
}

/// Name of the dependency field `path` points into, if it points into one.
fn dependency_field(path: &[String]) -> Option<&str> {
  match path.split_last() {
    Some((field, parent)) if parent == DEPENDENCY_PATH => Some(field.as_str()),
    _ => None,
  }
}

/// Checks whether a POM file declares a dependency.
///
/// The first dependency with a matching group and artifact id decides: if a
/// version was requested it must match exactly, otherwise any version does.
///
/// A POM that cannot be read or parsed evaluates to `false` and the problem
/// is logged. With [`strict`](Self::strict) it is reported as a failure
/// instead.
#[derive(Debug, Clone)]
pub struct PomDependencyExists {
  group_id: String,
  artifact_id: String,
  version: Option<String>,
  strict: bool,
}

impl PomDependencyExists {
  pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Result<Self, ConfigurationError> {
    Ok(Self {
      group_id: non_blank(group_id.into(), "group id")?,
      artifact_id: non_blank(artifact_id.into(), "artifact id")?,
      version: None,
      strict: false,
    })
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Result<Self, ConfigurationError> {
    self.version = Some(non_blank(version.into(), "version")?);
    Ok(self)
  }

  /// Report unreadable POM files as failures instead of `false`.
  pub fn strict(mut self, strict: bool) -> Self {
    self.strict = strict;
    self
  }

  pub fn group_id(&self) -> &str {
    &self.group_id
  }

  pub fn artifact_id(&self) -> &str {
    &self.artifact_id
  }

  pub fn version(&self) -> Option<&str> {
    self.version.as_deref()
  }

  fn matches(&self, dependencies: &[Dependency]) -> bool {
    let Some(found) = dependencies
      .iter()
      .find(|d| d.group_id == self.group_id && d.artifact_id == self.artifact_id)
    else {
      return false;
    };
    match &self.version {
      None => true,
      Some(version) => found.version.as_ref() == Some(version),
    }
  }
}

fn non_blank(value: String, field: &'static str) -> Result<String, ConfigurationError> {
  if value.trim().is_empty() {
    return Err(ConfigurationError::BlankField {
      unit: "PomDependencyExists".to_string(),
      field,
    });
  }
  Ok(value)
}

impl Condition for PomDependencyExists {
  fn kind(&self) -> &'static str {
    "PomDependencyExists"
  }

  fn description(&self, target: &TargetFile) -> String {
    format!(
      "Check if dependency '{}:{}:{}' exists in POM file {}",
      self.group_id,
      self.artifact_id,
      self.version.as_deref().unwrap_or_default(),
      target
    )
  }

  fn evaluate(&self, ctx: &UnitContext<'_>) -> Result<bool, UnitError> {
    match read_dependencies(&ctx.file) {
      Ok(dependencies) => {
        let found = self.matches(&dependencies);
        debug!(
          unit = ctx.name,
          group = %self.group_id,
          artifact = %self.artifact_id,
          found,
          "checked POM dependency"
        );
        Ok(found)
      }
      Err(e) if self.strict => Err(UnitError::failed(format!(
        "cannot read POM file {}: {e}",
        ctx.file.display()
      ))),
      Err(e) => {
        error!(unit = ctx.name, file = %ctx.file.display(), error = %e, "cannot read POM file");
        Ok(false)
      }
    }
  }
}
