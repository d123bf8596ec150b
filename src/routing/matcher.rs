//! Route path matching.
//!
//! # Responsibilities
//! - Compile `/items/{id}` and `/files/{proxy+}` templates into patterns
//! - Match request paths and capture parameter values
//! - Rank patterns so the most specific route is tried first
//!
//! # Design Decisions
//! - Segment-wise comparison, no regex in the request path
//! - Literal segments beat `{param}`, which beats `{greedy+}`
//! - Empty segments are ignored, so `/items/` and `/items` are the same route
//! - Matching is case-sensitive

use std::collections::BTreeMap;

use crate::routing::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    /// Captures the remaining path, at least one segment.
    Greedy(String),
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 2,
            Segment::Param(_) => 1,
            Segment::Greedy(_) => 0,
        }
    }
}

/// A compiled route path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a path template.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &'static str| ConfigError::InvalidPath {
            path: template.to_string(),
            reason,
        };

        if !template.starts_with('/') {
            return Err(invalid("must start with `/`"));
        }

        let raw: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, segment) in raw.iter().enumerate() {
            let parsed = match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => match name.strip_suffix('+') {
                    Some(greedy) => {
                        if i + 1 != raw.len() {
                            return Err(invalid("greedy parameter must be the last segment"));
                        }
                        Segment::Greedy(greedy.to_string())
                    }
                    None => Segment::Param(name.to_string()),
                },
                None => Segment::Literal(segment.to_string()),
            };
            if let Segment::Param(name) | Segment::Greedy(name) = &parsed {
                if name.is_empty() {
                    return Err(invalid("parameter name is empty"));
                }
            }
            segments.push(parsed);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Canonical form used to detect two templates naming the same route.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Param(_) => out.push_str("{}"),
                Segment::Greedy(_) => out.push_str("{+}"),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Per-segment ranks; compare lexicographically, larger is more specific.
    pub fn specificity(&self) -> Vec<u8> {
        self.segments.iter().map(Segment::rank).collect()
    }

    /// Match `path` (no query string) and return the captured parameters.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = BTreeMap::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.insert(name.clone(), (*value).to_string());
                }
                Segment::Greedy(name) => {
                    if parts.len() <= i {
                        return None;
                    }
                    params.insert(name.clone(), parts[i..].join("/"));
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let pattern = PathPattern::parse("/items").unwrap();
        assert_eq!(pattern.matches("/items"), Some(BTreeMap::new()));
        assert_eq!(pattern.matches("/items/"), Some(BTreeMap::new()));
        assert_eq!(pattern.matches("/items/1"), None);
        assert_eq!(pattern.matches("/Items"), None);
    }

    #[test]
    fn test_root() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/x").is_none());
        assert_eq!(pattern.canonical(), "/");
    }

    #[test]
    fn test_parameter_capture() {
        let pattern = PathPattern::parse("/items/{id}/tags/{tag}").unwrap();
        let params = pattern.matches("/items/42/tags/red").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert_eq!(params.get("tag").map(String::as_str), Some("red"));
        assert!(pattern.matches("/items/42/tags").is_none());
    }

    #[test]
    fn test_greedy_capture() {
        let pattern = PathPattern::parse("/files/{proxy+}").unwrap();
        let params = pattern.matches("/files/a/b/c.txt").unwrap();
        assert_eq!(params.get("proxy").map(String::as_str), Some("a/b/c.txt"));
        assert!(pattern.matches("/files").is_none());
    }

    #[test]
    fn test_invalid_templates() {
        assert!(PathPattern::parse("items").is_err());
        assert!(PathPattern::parse("/{proxy+}/tail").is_err());
        assert!(PathPattern::parse("/items/{}").is_err());
    }

    #[test]
    fn test_specificity_ordering() {
        let literal = PathPattern::parse("/items/new").unwrap();
        let param = PathPattern::parse("/items/{id}").unwrap();
        let greedy = PathPattern::parse("/items/{rest+}").unwrap();
        assert!(literal.specificity() > param.specificity());
        assert!(param.specificity() > greedy.specificity());
    }

    #[test]
    fn test_canonical_ignores_parameter_names() {
        let a = PathPattern::parse("/items/{id}").unwrap();
        let b = PathPattern::parse("/items/{itemId}/").unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }
}
