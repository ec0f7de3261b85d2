#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRule {
    Exact(String),
    Prefix(String),
}

impl RouteRule {
    fn matches(&self, path: &str) -> bool {
        match self {
            RouteRule::Exact(exact) => path == exact,
            RouteRule::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }

    /// Parses a comma-separated rule list. `=/path` is an exact match,
    /// anything else a prefix.
    pub fn parse_list(raw: &str) -> Vec<RouteRule> {
        crate::core::config::split_list(raw)
            .into_iter()
            .map(|rule| match rule.strip_prefix('=') {
                Some(exact) => RouteRule::Exact(exact.to_string()),
                None => RouteRule::Prefix(rule),
            })
            .collect()
    }
}

/// Decides whether a view can be used without a session.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<RouteRule>,
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new(vec![
            RouteRule::Exact("/".into()),
            RouteRule::Prefix("/explore".into()),
            RouteRule::Prefix("/p/".into()),
            RouteRule::Prefix("/a/".into()),
            RouteRule::Prefix("/auth/".into()),
        ])
    }
}

impl RouteClassifier {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// `location` may carry a query string or fragment; only the path is
    /// matched.
    pub fn is_public(&self, location: &str) -> bool {
        let path = location.split(['?', '#']).next().unwrap_or_default();
        self.rules.iter().any(|rule| rule.matches(path))
    }

    pub fn classify(&self, location: &str) -> RouteClass {
        if self.is_public(location) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }
}
