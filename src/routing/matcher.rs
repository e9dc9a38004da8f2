//! Path template matching.
//!
//! # Design Decisions
//! - Templates compile once into segments; no regex in the hot path
//! - Segment comparison is case-sensitive
//! - Trailing slashes are ignored on both sides
//! - Specificity is ranked per segment: literal > mixed > parameter

use std::cmp::Ordering;
use std::collections::HashMap;

/// One `/`-delimited piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `users`
    Literal(String),
    /// `{id}.json`: a single parameter wrapped in literal text.
    Mixed { prefix: String, name: String, suffix: String },
    /// `{id}`
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
            if open < close {
                let name = raw[open + 1..close].to_string();
                if open == 0 && close == raw.len() - 1 {
                    return Segment::Param(name);
                }
                return Segment::Mixed {
                    prefix: raw[..open].to_string(),
                    name,
                    suffix: raw[close + 1..].to_string(),
                };
            }
        }
        Segment::Literal(raw.to_string())
    }

    /// Higher is more specific.
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 2,
            Segment::Mixed { .. } => 1,
            Segment::Param(_) => 0,
        }
    }

    fn capture<'a>(&self, actual: &'a str) -> Option<Option<(&str, &'a str)>> {
        match self {
            Segment::Literal(lit) => (lit == actual).then_some(None),
            Segment::Param(name) => (!actual.is_empty()).then_some(Some((name.as_str(), actual))),
            Segment::Mixed { prefix, name, suffix } => {
                let inner = actual.strip_prefix(prefix.as_str())?.strip_suffix(suffix.as_str())?;
                (!inner.is_empty()).then_some(Some((name.as_str(), inner)))
            }
        }
    }
}

/// A compiled OpenAPI path template such as `/pets/{petId}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        Self {
            segments: split_path(template).map(Segment::parse).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a concrete path, returning the captured parameters.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let actual: Vec<&str> = split_path(path).collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, value) in self.segments.iter().zip(actual) {
            if let Some((name, captured)) = segment.capture(value)? {
                params.insert(name.to_string(), captured.to_string());
            }
        }
        Some(params)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Order templates so the more specific one sorts first.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match b.rank().cmp(&a.rank()) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        other.segments.len().cmp(&self.segments.len())
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let path = path.split('?').next().unwrap_or("");
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}
