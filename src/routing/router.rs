//! Route table and lookup.
//!
//! # Responsibilities
//! - Collect routes at startup through a builder
//! - Freeze them into an immutable table
//! - Find the best route for a (method, path) pair
//!
//! # Design Decisions
//! - O(1) exact lookup for static patterns, tried first
//! - Otherwise a scan ranked by a total order, so the winner never depends
//!   on registration order
//! - Explicit `None` rather than a silent default

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::envelope::Method;
use crate::routing::matcher::{split_path, PathPattern, PatternMatch};

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route<H> {
    method: Method,
    pattern: PathPattern,
    name: String,
    handler: H,
}

impl<H> Route<H> {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Matched route plus the captured path variables.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub params: HashMap<String, String>,
}

/// Mutable collection of routes, frozen by [`RouteTableBuilder::build`].
#[derive(Debug)]
pub struct RouteTableBuilder<H> {
    routes: BTreeMap<(Method, String), Route<H>>,
}

impl<H> Default for RouteTableBuilder<H> {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }
}

impl<H> RouteTableBuilder<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. The same (method, pattern) registered twice keeps
    /// the later handler.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        name: impl Into<String>,
        handler: H,
    ) -> &mut Self {
        let route = Route {
            method,
            pattern: PathPattern::parse(pattern),
            name: name.into(),
            handler,
        };
        if let Some(previous) = self.routes.insert((method, pattern.to_string()), route) {
            tracing::debug!(
                method = %method,
                pattern,
                replaced = previous.name(),
                "Route registered twice, keeping the later handler"
            );
        }
        self
    }

    pub fn build(self) -> RouteTable<H> {
        let routes: Vec<Route<H>> = self.routes.into_values().collect();
        let mut exact: HashMap<Method, HashMap<String, usize>> = HashMap::new();
        for (index, route) in routes.iter().enumerate() {
            if route.pattern.is_static() {
                exact
                    .entry(route.method)
                    .or_default()
                    .insert(route.pattern.as_str().to_string(), index);
            }
        }
        RouteTable { routes, exact }
    }
}

/// Immutable route table.
#[derive(Debug)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
    exact: HashMap<Method, HashMap<String, usize>>,
}

impl<H> RouteTable<H> {
    pub fn builder() -> RouteTableBuilder<H> {
        RouteTableBuilder::new()
    }

    /// Find the best route for `method` and `path`.
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch<'_, H>> {
        if let Some(&index) = self.exact.get(&method).and_then(|paths| paths.get(path)) {
            return Some(RouteMatch {
                route: &self.routes[index],
                params: HashMap::new(),
            });
        }

        let input = split_path(path);
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .filter_map(|route| {
                route
                    .pattern
                    .match_segments(&input)
                    .map(|m| (route, m))
            })
            .max_by(|(a, am), (b, bm)| {
                rank(a, am, input.len()).cmp(&rank(b, bm, input.len()))
            })
            .map(|(route, m)| RouteMatch {
                route,
                params: m.params,
            })
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Ordering key for candidates, larger is better: score, exact segment
/// count, fewer variables, later first variable, then pattern text.
fn rank<'r, H>(
    route: &'r Route<H>,
    m: &PatternMatch,
    input_len: usize,
) -> (usize, bool, Reverse<usize>, usize, Reverse<&'r str>) {
    (
        m.score,
        route.pattern.segment_count() == input_len,
        Reverse(m.var_count),
        route.pattern.first_var_position().unwrap_or(usize::MAX),
        Reverse(route.pattern.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(routes: &[(Method, &str)]) -> RouteTable<&'static str> {
        let mut builder = RouteTable::builder();
        for (method, pattern) in routes {
            builder.register(*method, pattern, *pattern, "h");
        }
        builder.build()
    }

    fn winner(table: &RouteTable<&'static str>, method: Method, path: &str) -> Option<String> {
        table
            .find(method, path)
            .map(|m| m.route.pattern().as_str().to_string())
    }

    #[test]
    fn test_exact_match_wins() {
        let t = table(&[(Method::Get, "/users/:id"), (Method::Get, "/users/me")]);
        let m = t.find(Method::Get, "/users/me").unwrap();
        assert_eq!(m.route.name(), "/users/me");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_literal_beats_variable() {
        let t = table(&[(Method::Get, "/users/:id"), (Method::Get, "/users/active")]);
        assert_eq!(winner(&t, Method::Get, "/users/active").as_deref(), Some("/users/active"));

        let m = t.find(Method::Get, "/users/17").unwrap();
        assert_eq!(m.route.pattern().as_str(), "/users/:id");
        assert_eq!(m.params.get("id").map(String::as_str), Some("17"));
    }

    #[test]
    fn test_registration_order_independent() {
        let routes = [
            (Method::Get, "/a/:x/c"),
            (Method::Get, "/a/b/:y"),
            (Method::Get, "/:p/b/c/d"),
            (Method::Get, "/a/:x/:y"),
        ];
        let forward = table(&routes);
        let mut reversed = routes;
        reversed.reverse();
        let backward = table(&reversed);

        for path in ["/a/b/c", "/a/z/c", "/q/b/c/d", "/a/b/c/d", "/a/q/r"] {
            assert_eq!(
                winner(&forward, Method::Get, path),
                winner(&backward, Method::Get, path),
                "path {path}"
            );
        }
    }

    #[test]
    fn test_later_variable_wins_tie() {
        let t = table(&[(Method::Get, "/a/:x/c"), (Method::Get, "/a/b/:y")]);
        assert_eq!(winner(&t, Method::Get, "/a/b/c").as_deref(), Some("/a/b/:y"));
    }

    #[test]
    fn test_segment_count_tiebreak() {
        let t = table(&[(Method::Get, "/files/:id/raw"), (Method::Get, "/files/:id")]);
        assert_eq!(winner(&t, Method::Get, "/files/9").as_deref(), Some("/files/:id"));
    }

    #[test]
    fn test_higher_score_wins() {
        let t = table(&[(Method::Get, "/v1"), (Method::Get, "/v1/:name/detail")]);
        assert_eq!(
            winner(&t, Method::Get, "/v1/x/detail").as_deref(),
            Some("/v1/:name/detail")
        );
    }

    #[test]
    fn test_method_must_match() {
        let t = table(&[(Method::Post, "/users/:id")]);
        assert!(t.find(Method::Get, "/users/1").is_none());
        assert!(t.find(Method::Post, "/users/1").is_some());
    }

    #[test]
    fn test_no_match() {
        let t = table(&[(Method::Get, "/users/:id")]);
        assert!(t.find(Method::Get, "/orders/1").is_none());
        assert!(t.find(Method::Get, "/").is_none());
    }

    #[test]
    fn test_root_reaches_variable_route() {
        let t = table(&[(Method::Get, "/:page"), (Method::Get, "/about")]);
        let m = t.find(Method::Get, "/").unwrap();
        assert_eq!(m.route.pattern().as_str(), "/:page");
        assert_eq!(m.params.get("page").map(String::as_str), Some(""));
        assert_eq!(winner(&t, Method::Get, "/about").as_deref(), Some("/about"));
    }

    #[test]
    fn test_duplicate_registration_keeps_later() {
        let mut builder = RouteTable::builder();
        builder.register(Method::Get, "/x", "first", 1);
        builder.register(Method::Get, "/x", "second", 2);
        let t = builder.build();
        assert_eq!(t.len(), 1);
        assert_eq!(*t.find(Method::Get, "/x").unwrap().route.handler(), 2);
    }
}
