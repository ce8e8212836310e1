use crate::config::RouteConfig;
use crate::loader::ModuleId;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    fn parse(raw: &str) -> Self {
        let segments = split_path(raw)
            .map(|segment| {
                if segment.starts_with(':') {
                    Segment::Param
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    fn matches(&self, path: &str) -> bool {
        let mut parts = split_path(path);
        for segment in &self.segments {
            match (segment, parts.next()) {
                (Segment::Literal(expected), Some(actual)) if expected == actual => {}
                (Segment::Param, Some(_)) => {}
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Ordered mapping from URL paths to the module rendering them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<(RoutePattern, ModuleId)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(routes: &[RouteConfig]) -> Self {
        routes.iter().fold(Self::new(), |table, route| {
            table.with_route(&route.pattern, route.module.as_str())
        })
    }

    /// Append a route; earlier routes win when several match
    pub fn with_route(mut self, pattern: &str, module: impl Into<ModuleId>) -> Self {
        self.routes.push((RoutePattern::parse(pattern), module.into()));
        self
    }

    /// Module for a path; query string and fragment are ignored
    pub fn resolve(&self, path: &str) -> Option<&ModuleId> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, module)| module)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(pattern, _)| pattern.raw.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
