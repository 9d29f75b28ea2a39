//! Route pattern compilation.
//!
//! A pattern is a `/` separated template. `:name` captures exactly one path segment, `*name`
//! captures the remainder of the path and must be the final segment, anything else is literal.
//!
//! ```text
//! /api/x/:uid/goals
//! ^^^^^^ ^^^^^^^^^^
//! prefix  segments = [Param(uid), Static(goals)]
//! ```
//!
//! The leading run of literal tokens becomes the indexing prefix under which the route is stored
//! in the route table; everything from the first dynamic token onwards becomes the compiled
//! segment list the matcher walks.

use crate::error::RouteError;
use crate::path::SplitPath;
use crate::ensure;
use std::fmt;
use std::sync::Arc;

/// One compiled unit of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal segment, compared as is.
    Static(Box<str>),
    /// `:name`, captures one segment.
    Param(Arc<str>),
    /// `*name`, captures the remaining path.
    Wildcard(Arc<str>),
}

impl Segment {
    fn parse(token: &str) -> Self {
        if let Some(name) = token.strip_prefix(':') {
            Segment::Param(Arc::from(name))
        } else if let Some(name) = token.strip_prefix('*') {
            Segment::Wildcard(Arc::from(name))
        } else {
            Segment::Static(Box::from(token))
        }
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Segment::Static(_))
    }

    /// The captured parameter name, `None` for literal segments.
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Static(_) => None,
            Segment::Param(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(literal) => f.write_str(literal),
            Segment::Param(name) => write!(f, ":{name}"),
            Segment::Wildcard(name) => write!(f, "*{name}"),
        }
    }
}

/// A validated, compiled route pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: Box<str>,
    prefix: Box<str>,
    segments: Box<[Segment]>,
    dynamic_count: usize,
}

impl Pattern {
    /// Compiles `raw`, failing when it holds more than one wildcard or a wildcard that is not
    /// the last segment.
    ///
    /// A trailing slash is ignored, so `/home/` and `/home` compile to the same pattern.
    pub fn compile(raw: &str) -> Result<Self, RouteError> {
        let mut prefix = String::with_capacity(raw.len());
        let mut segments = Vec::new();
        let mut wildcards = 0;

        for token in raw.split('/').filter(|token| !token.is_empty()) {
            let segment = Segment::parse(token);
            if segments.is_empty() && !segment.is_dynamic() {
                prefix.push('/');
                prefix.push_str(token);
                continue;
            }

            if matches!(segment, Segment::Wildcard(_)) {
                wildcards += 1;
            }
            segments.push(segment);
        }

        ensure!(wildcards <= 1, RouteError::too_many_wildcards(raw));
        ensure!(
            wildcards == 0 || matches!(segments.last(), Some(Segment::Wildcard(_))),
            RouteError::wildcard_not_last(raw)
        );

        if prefix.is_empty() {
            prefix.push('/');
        }

        let dynamic_count = segments.iter().filter(|segment| segment.is_dynamic()).count();
        Ok(Self { raw: raw.into(), prefix: prefix.into(), segments: segments.into(), dynamic_count })
    }

    /// The pattern as it was registered.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The literal indexing prefix, `/` when the pattern starts with a dynamic segment.
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Segments following the prefix.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of `:param` and `*wildcard` segments.
    #[inline]
    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    /// Index of the trailing wildcard within [`Pattern::segments`].
    #[inline]
    pub fn wildcard_position(&self) -> Option<usize> {
        match self.segments.last() {
            Some(Segment::Wildcard(_)) => Some(self.segments.len() - 1),
            _ => None,
        }
    }

    /// Whether the segments of `path` after the first `from` ones fit this pattern.
    ///
    /// Without a wildcard the number of remaining segments must equal the segment count, with a
    /// wildcard at position `n` at least `n` segments must remain. Literal segments must be equal.
    pub(crate) fn accepts(&self, path: &SplitPath, from: usize) -> bool {
        let remaining = path.len() - from;
        let arity = match self.wildcard_position() {
            Some(position) => remaining >= position,
            None => remaining == self.segments.len(),
        };

        arity
            && self.segments.iter().zip(path.segments_from(from)).all(|(segment, value)| match segment {
                Segment::Static(literal) => **literal == *value,
                Segment::Param(_) | Segment::Wildcard(_) => true,
            })
    }

    /// Walks the remaining segments and hands every capture to `capture` as `(name, start, end)`
    /// offsets into the path text.
    pub(crate) fn capture<F>(&self, path: &SplitPath, from: usize, mut capture: F)
    where
        F: FnMut(&Arc<str>, usize, usize),
    {
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(_) => {}
                Segment::Param(name) => {
                    let (start, end) = path.bounds(from + index);
                    capture(name, start, end);
                }
                Segment::Wildcard(name) => {
                    let start = path.tail_start(from + index);
                    capture(name, start, path.as_str().len());
                    break;
                }
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
