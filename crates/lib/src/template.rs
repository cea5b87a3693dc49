//! Message templates resolved against earlier results.
//!
//! Log messages and descriptions can refer to values that are only known once
//! earlier units have run. This module parses such templates and substitutes
//! the values lazily, at the moment the text is needed.
//!
//! # Template Syntax
//!
//! - `{}` - the next positional slot, bound to a result name supplied next to
//!   the template (the n-th `{}` takes the n-th name)
//! - `{name}` - the value of the result `name`
//! - `{{` and `}}` - literal braces
//!
//! # Example
//!
//! ```
//! use refit_lib::template::{parse, Segment};
//!
//! let segments = parse("found {} in {pom}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("found ".to_string()),
//!     Segment::Positional(0),
//!     Segment::Literal(" in ".to_string()),
//!     Segment::Named("pom".to_string()),
//! ]);
//! ```

use thiserror::Error;

/// A segment of parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text.
  Literal(String),
  /// The n-th `{}` slot (0-based).
  Positional(usize),
  /// A `{name}` reference.
  Named(String),
}

/// Errors that can occur during template parsing or rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unmatched '}}' at position {0}")]
  UnmatchedClose(usize),

  #[error("placeholder {index} has no result name bound to it ({available} given)")]
  MissingArgument { index: usize, available: usize },

  #[error("unresolved result: {name}: {reason}")]
  Unresolved { name: String, reason: String },
}

/// Source of values for named placeholders.
pub trait Resolver {
  /// Render the value recorded under `name`.
  fn resolve(&self, name: &str) -> Result<String, TemplateError>;
}

/// Parse a template into segments.
///
/// # Errors
///
/// Returns an error on an unclosed `{` or a lone `}`.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut positional = 0;
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      '{' => {
        if let Some((_, '{')) = chars.peek() {
          // Escaped: {{ -> {
          chars.next();
          literal.push('{');
          continue;
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut name = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          name.push(c);
        }

        if !found_close {
          return Err(TemplateError::Unclosed(pos));
        }

        let name = name.trim();
        if name.is_empty() {
          segments.push(Segment::Positional(positional));
          positional += 1;
        } else {
          segments.push(Segment::Named(name.to_string()));
        }
      }
      '}' => {
        if let Some((_, '}')) = chars.peek() {
          chars.next();
          literal.push('}');
        } else {
          return Err(TemplateError::UnmatchedClose(pos));
        }
      }
      _ => literal.push(ch),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse and render a template in one step.
///
/// `arguments` are the result names bound to the positional `{}` slots.
pub fn render(input: &str, arguments: &[String], resolver: &impl Resolver) -> Result<String, TemplateError> {
  let segments = parse(input)?;
  render_segments(&segments, arguments, resolver)
}

/// Render pre-parsed segments.
pub fn render_segments(
  segments: &[Segment],
  arguments: &[String],
  resolver: &impl Resolver,
) -> Result<String, TemplateError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Positional(index) => {
        let name = arguments.get(*index).ok_or(TemplateError::MissingArgument {
          index: *index,
          available: arguments.len(),
        })?;
        result.push_str(&resolver.resolve(name)?);
      }
      Segment::Named(name) => result.push_str(&resolver.resolve(name)?),
    }
  }

  Ok(result)
}
