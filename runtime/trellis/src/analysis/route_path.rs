use std::fmt::{Display, Formatter};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use super::{ErrorCode, ValidationError};

/// Characters that must be escaped when a value is interpolated into a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
/// A parsed route pattern, e.g. `/pets/{id}` or `/files/{path...}`.
///
/// Variables must span a whole segment.
/// A wildcard variable (`{name...}`) matches the rest of the path and must be the
/// last segment.
pub struct RoutePath {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable { name: String, wildcard: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpolationError {
    #[error("there is no value for the `{0}` path variable")]
    MissingValue(String),
    #[error(
        "`{0}` is a wildcard variable: wildcard segments can't be interpolated into a client-side path"
    )]
    Wildcard(String),
}

impl RoutePath {
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| {
            ValidationError::new(
                ErrorCode::InvalidPath,
                format!("`{path}` is not a valid route pattern: {reason}"),
            )
        };
        let Some(rest) = path.strip_prefix('/') else {
            return Err(invalid("it must begin with `/`".into()));
        };
        let raw_segments: Vec<&str> = if rest.is_empty() {
            vec![]
        } else {
            rest.split('/').collect()
        };
        let n_segments = raw_segments.len();
        let mut segments = Vec::with_capacity(n_segments);
        for (i, raw) in raw_segments.into_iter().enumerate() {
            if !raw.contains(['{', '}']) {
                segments.push(Segment::Literal(raw.to_owned()));
                continue;
            }
            let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                return Err(invalid(format!(
                    "`{raw}` mixes literal text and variables, or has an unclosed brace"
                )));
            };
            let (name, wildcard) = match inner.strip_suffix("...") {
                Some(name) => (name, true),
                None => (inner, false),
            };
            if name.is_empty() {
                return Err(invalid("path variables must have a name".into()));
            }
            if !is_identifier(name) {
                return Err(invalid(format!(
                    "`{name}` is not a valid variable name: use letters, digits and underscores only"
                )));
            }
            if wildcard && i + 1 != n_segments {
                return Err(invalid(format!(
                    "the wildcard variable `{name}` must be the last segment"
                )));
            }
            if segments.iter().any(|s| matches!(s, Segment::Variable { name: n, .. } if n == name)) {
                return Err(ValidationError::new(
                    ErrorCode::DuplicatePathVariable,
                    format!("`{path}` declares the `{name}` variable more than once"),
                ));
            }
            segments.push(Segment::Variable {
                name: name.to_owned(),
                wildcard,
            });
        }
        Ok(Self {
            raw: path.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The names of the variables in the pattern, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables().any(|v| v == name)
    }

    /// `true` if the variable called `name` is a wildcard.
    pub fn is_wildcard(&self, name: &str) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Variable { name: n, wildcard: true } if n == name))
    }

    /// Build a concrete path by replacing each variable with its value.
    ///
    /// Values are percent-encoded.
    /// Wildcard variables are rejected: a route such as `/files/{path...}` can be served,
    /// but it can't be targeted through interpolation.
    pub fn interpolate(&self, values: &[(&str, &str)]) -> Result<String, InterpolationError> {
        let mut path = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Variable { name, wildcard } => {
                    if *wildcard {
                        return Err(InterpolationError::Wildcard(name.clone()));
                    }
                    let Some((_, value)) = values.iter().find(|(key, _)| *key == name.as_str()) else {
                        return Err(InterpolationError::MissingValue(name.clone()));
                    };
                    path.extend(utf8_percent_encode(value, SEGMENT));
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    /// Match a concrete request path against the pattern, returning the captured
    /// variables on success.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let rest = path.strip_prefix('/')?;
        let mut parts: Vec<&str> = if rest.is_empty() {
            vec![]
        } else {
            rest.split('/').collect()
        };
        let mut captures = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Variable {
                    name,
                    wildcard: true,
                } => {
                    if i >= parts.len() {
                        return None;
                    }
                    captures.push((name.clone(), parts.split_off(i).join("/")));
                    return Some(captures);
                }
                Segment::Variable { name, .. } => {
                    let part = parts.get(i).filter(|p| !p.is_empty())?;
                    captures.push((name.clone(), decode(part)));
                }
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(captures)
    }

    /// How specific the pattern is, segment by segment: literals beat variables,
    /// variables beat wildcards.
    pub(crate) fn specificity(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(_) => 2,
                Segment::Variable {
                    wildcard: false, ..
                } => 1,
                Segment::Variable { wildcard: true, .. } => 0,
            })
            .collect()
    }
}

fn decode(part: &str) -> String {
    percent_encoding::percent_decode_str(part)
        .decode_utf8_lossy()
        .into_owned()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Display for RoutePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
