#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{fmt, str::FromStr};

use itertools::Itertools;
use nom::{
    bytes::complete::{tag, take_till},
    combinator::all_consuming,
    sequence::separated_pair,
    IResult,
};
use serde::{Serialize, Serializer};

use crate::expr::Variables;

/// A namespace pattern couldn't be understood.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PatternError {
    #[error("namespace pattern cannot be empty")]
    Empty,

    #[error("namespace pattern must begin with /: '{0}'")]
    NoLeadingSlash(String),

    #[error("namespace pattern has no elements: '{0}'")]
    NoElements(String),

    #[error("namespace pattern must begin with static element: '{0}'")]
    DynamicFirst(String),

    #[error("namespace pattern must end with static element: '{0}'")]
    DynamicLast(String),

    #[error("empty dynamic element in namespace pattern: '{0}'")]
    EmptyDirective(String),

    #[error("invalid path index in dynamic element '{0}'")]
    BadIndex(String),
}

/// A dynamic element couldn't be given a value.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BindError {
    #[error("index '{index}' out of bounds: '{path}'")]
    IndexOutOfBounds { index: i64, path: String },

    #[error("no value for dynamic element '{0}'")]
    NoValue(String),
}

/// Where a dynamic element gets its value from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Directive {
    /// The variable named after the element.
    Variable,
    /// A `/` separated component of the source file's path.  Negative indices count from the end.
    Path(i64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dynamic {
    /// First `:` separated part of the directive.
    pub name: String,
    /// The text between the braces, verbatim.
    pub description: String,
    pub directive: Directive,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Static(String),
    Dynamic(Dynamic),
}

/// A parsed namespace pattern such as `/proc/cpu/{label}/user`.
///
/// The first and last segments are always static.
#[derive(Clone, Debug, PartialEq)]
pub struct Namespace {
    segments: Vec<Segment>,
}

/// One element of a [`ResolvedNamespace`].  Dynamic elements remember the name they were bound
/// under.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub value: String,
    pub name: Option<String>,
}

/// A [`Namespace`] with every dynamic element bound to a concrete value.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedNamespace {
    elements: Vec<Element>,
}

/// ```abnf
/// directive  = positional / named
/// positional = name ":path:" index
/// named      = name *( ":" *any-char )
/// name       = *( any-char except ":" )
/// index      = [ "+" / "-" ] 1*DIGIT
/// ```
fn element_name(input: &str) -> IResult<&str, &str> {
    take_till(|c| c == ':')(input)
}

fn positional(input: &str) -> IResult<&str, (&str, i64)> {
    all_consuming(separated_pair(
        element_name,
        tag(":path:"),
        nom::character::complete::i64,
    ))(input)
}

fn is_substitution(part: &str) -> bool {
    part.len() >= 2 && part.starts_with('{') && part.ends_with('}')
}

fn dynamic(pattern: &str, description: &str) -> Result<Dynamic, PatternError> {
    if description.is_empty() {
        Err(PatternError::EmptyDirective(pattern.to_string()))?
    }

    if let Ok((_, (name, index))) = positional(description) {
        return Ok(Dynamic {
            name: name.to_string(),
            description: description.to_string(),
            directive: Directive::Path(index),
        });
    }

    // Looks positional but the index isn't an integer
    if let [_, "path", _] = description.split(':').collect_vec()[..] {
        Err(PatternError::BadIndex(description.to_string()))?
    }

    let (_, name) = element_name(description)
        .map_err(|_| PatternError::BadIndex(description.to_string()))?;
    Ok(Dynamic {
        name: name.to_string(),
        description: description.to_string(),
        directive: Directive::Variable,
    })
}

impl Namespace {
    /// Parses a pattern such as `/proc/{id}/{file:path:-1}/total`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let rest = match pattern.strip_prefix('/') {
            Some(rest) => rest,
            None if pattern.is_empty() => Err(PatternError::Empty)?,
            None => Err(PatternError::NoLeadingSlash(pattern.to_string()))?,
        };

        let parts = rest
            .split('/')
            .map(|p| p.trim_matches(&[' ', '\t', '\n'][..]))
            .filter(|p| !p.is_empty())
            .collect_vec();

        match (parts.first(), parts.last()) {
            (None, _) | (_, None) => Err(PatternError::NoElements(pattern.to_string()))?,
            (Some(first), _) if is_substitution(first) => {
                Err(PatternError::DynamicFirst(pattern.to_string()))?
            }
            (_, Some(last)) if is_substitution(last) => {
                Err(PatternError::DynamicLast(pattern.to_string()))?
            }
            _ => {}
        }

        let segments = parts
            .into_iter()
            .map(|part| -> Result<Segment, PatternError> {
                if is_substitution(part) {
                    Ok(Segment::Dynamic(dynamic(pattern, &part[1..part.len() - 1])?))
                } else {
                    Ok(Segment::Static(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn dynamic_segments(&self) -> impl Iterator<Item = &Dynamic> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Dynamic(d) => Some(d),
            Segment::Static(_) => None,
        })
    }

    /// Binds every dynamic element, either from `vars` or from a component of `source`.
    ///
    /// Binding stops at the first element that can't be resolved.
    pub fn bind<V: Variables + ?Sized>(
        &self,
        source: &str,
        vars: &V,
    ) -> Result<ResolvedNamespace, BindError> {
        let elements = self
            .segments
            .iter()
            .map(|segment| -> Result<Element, BindError> {
                let element = match segment {
                    Segment::Static(value) => Element {
                        value: value.clone(),
                        name: None,
                    },
                    Segment::Dynamic(d) => Element {
                        value: d.resolve(source, vars)?,
                        name: Some(d.name.clone()),
                    },
                };
                Ok(element)
            })
            .collect::<Result<Vec<_>, BindError>>()?;

        Ok(ResolvedNamespace { elements })
    }
}

impl Dynamic {
    fn resolve<V: Variables + ?Sized>(&self, source: &str, vars: &V) -> Result<String, BindError> {
        match self.directive {
            Directive::Path(index) => {
                let components = source.split('/').collect_vec();
                let len = components.len() as i64;
                let pos = if index < 0 { len + index } else { index };
                if pos < 0 || pos >= len {
                    Err(BindError::IndexOutOfBounds {
                        index,
                        path: source.to_string(),
                    })?
                }
                Ok(components[pos as usize].to_string())
            }
            Directive::Variable => vars
                .lookup(&self.name)
                .map(|v| v.to_string())
                .ok_or_else(|| BindError::NoValue(self.name.clone())),
        }
    }
}

impl FromStr for Namespace {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(s) => f.write_str(s),
            Segment::Dynamic(d) => write!(f, "{{{}}}", d.description),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.iter().join("/"))
    }
}

impl ResolvedNamespace {
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

impl fmt::Display for ResolvedNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.elements.iter().map(|e| &e.value).join("/"))
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for ResolvedNamespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
