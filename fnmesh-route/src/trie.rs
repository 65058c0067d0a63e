use indexmap::IndexMap;

const PARAM_KEY: &str = ":";
const CATCHALL_KEY: &str = "*";

/// Errors from [`RouteTrie::insert`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// A wildcard (`:name` or `*name`) was inserted alongside an existing
    /// literal or a conflicting wildcard at the same level.
    #[error("path segment conflicts with an existing sibling at the same level")]
    Conflict,
    /// The exact `(path, trailing-slash)` slot was already occupied.
    #[error("route already exists for this path")]
    AlreadyExists,
}

/// A route matched at lookup time, with its bound wildcard names/values in
/// the order they were encountered descending the trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched<'a, R> {
    pub route: &'a R,
    pub params: Vec<(String, String)>,
}

#[derive(Debug)]
struct Node<R> {
    children: IndexMap<String, Node<R>>,
    /// Set only on nodes reached via the `":"` or `"*"` sentinel key: the
    /// parameter name to bind (`:id` -> `"id"`, `*suffix` -> `"suffix"`).
    param_name: Option<String>,
    bare: Option<R>,
    trailing: Option<R>,
}

impl<R> Node<R> {
    fn new(param_name: Option<String>) -> Self {
        Node { children: IndexMap::new(), param_name, bare: None, trailing: None }
    }

    fn is_empty(&self) -> bool {
        self.bare.is_none() && self.trailing.is_none() && self.children.is_empty()
    }
}

/// One application's path hierarchy. `R` is the route payload stored at each
/// terminal node (spec §3's `Route`, or any caller-chosen wrapper).
#[derive(Debug)]
pub struct RouteTrie<R> {
    root: Node<R>,
}

impl<R> Default for RouteTrie<R> {
    fn default() -> Self {
        RouteTrie { root: Node::new(None) }
    }
}

/// Split a path on `/`, discarding the leading empty segment and reporting
/// whether the original ended with `/` (spec §4.1's path parsing rule).
fn parse_path(path: &str) -> (Vec<String>, bool) {
    let without_leading = path.strip_prefix('/').unwrap_or(path);
    if without_leading.is_empty() {
        return (Vec::new(), true);
    }
    let mut segs: Vec<&str> = without_leading.split('/').collect();
    let trailing = segs.last() == Some(&"");
    if trailing {
        segs.pop();
    }
    (segs.into_iter().map(String::from).collect(), trailing)
}

/// Classify one raw path segment into its child-map key and, for wildcards,
/// the parameter name to bind.
fn classify(raw: &str) -> (String, Option<String>) {
    if let Some(name) = raw.strip_prefix(':') {
        (PARAM_KEY.to_string(), Some(name.to_string()))
    } else if let Some(name) = raw.strip_prefix('*') {
        (CATCHALL_KEY.to_string(), Some(name.to_string()))
    } else {
        (raw.to_string(), None)
    }
}

impl<R> RouteTrie<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `route` at `path`. Fails with [`RouteError::Conflict`] when the
    /// insert would create an ambiguous grammar (a wildcard beside a literal
    /// sibling, in either direction), and with [`RouteError::AlreadyExists`]
    /// when the exact `(path, trailing-slash)` slot is already occupied.
    pub fn insert(&mut self, path: &str, route: R) -> Result<(), RouteError> {
        let (parts, trailing) = parse_path(path);
        let mut node = &mut self.root;

        for raw in &parts {
            let (key, param_name) = classify(raw);

            if !node.children.contains_key(&key) {
                if !node.children.is_empty() {
                    let is_wildcard = key == PARAM_KEY || key == CATCHALL_KEY;
                    let has_wildcard_child =
                        node.children.contains_key(PARAM_KEY) || node.children.contains_key(CATCHALL_KEY);
                    if is_wildcard || has_wildcard_child {
                        return Err(RouteError::Conflict);
                    }
                }
                node.children.insert(key.clone(), Node::new(param_name));
            }

            node = node.children.get_mut(&key).expect("just inserted or pre-existing");
        }

        let slot = if trailing { &mut node.trailing } else { &mut node.bare };
        if slot.is_some() {
            return Err(RouteError::AlreadyExists);
        }
        *slot = Some(route);
        Ok(())
    }

    /// Longest-prefix match per spec §4.1: try `{literal, ":", "*"}` in order
    /// at each level; a `"*"` match stops immediately and consumes the rest
    /// of the path as that parameter's value.
    pub fn lookup(&self, path: &str) -> Option<Matched<'_, R>> {
        let (parts, trailing) = parse_path(path);
        let mut node = &self.root;
        let mut params = Vec::new();
        let mut i = 0;

        while i < parts.len() {
            let p = &parts[i];
            if let Some(child) = node.children.get(p.as_str()) {
                node = child;
                i += 1;
                continue;
            }
            if let Some(child) = node.children.get(PARAM_KEY) {
                if let Some(name) = &child.param_name {
                    params.push((name.clone(), p.clone()));
                }
                node = child;
                i += 1;
                continue;
            }
            if let Some(child) = node.children.get(CATCHALL_KEY) {
                let rest = parts[i..].join("/");
                if let Some(name) = &child.param_name {
                    params.push((name.clone(), rest));
                }
                node = child;
                i = parts.len();
                continue;
            }
            return None;
        }

        // bare/trailing are distinct entities (spec §3); never substitute one for the other.
        let route = if trailing { node.trailing.as_ref() } else { node.bare.as_ref() };
        route.map(|r| Matched { route: r, params })
    }

    /// Exact definition lookup by the route's own stored path (e.g.
    /// `"/blogs/:id"`, wildcard syntax included literally) — used by CRUD
    /// operations, as distinct from [`RouteTrie::lookup`]'s wildcard-matching
    /// of concrete request paths. Since the trie's grammar rules guarantee at
    /// most one wildcard child per level, descending a definition path
    /// always falls through to the same wildcard child `lookup` would use,
    /// so it lands on the right terminal node.
    pub fn get(&self, path: &str) -> Option<&R> {
        self.lookup(path).map(|m| m.route)
    }

    /// Mutable counterpart to [`RouteTrie::get`], for in-place route updates
    /// that must not disturb the trie's shape (path/app_name are immutable).
    pub fn get_mut(&mut self, path: &str) -> Option<&mut R> {
        let (parts, trailing) = parse_path(path);
        let mut node = &mut self.root;
        for raw in &parts {
            let (key, _) = classify(raw);
            node = node.children.get_mut(&key)?;
        }
        if trailing {
            node.trailing.as_mut()
        } else {
            node.bare.as_mut()
        }
    }

    /// Remove the route at `path`. Returns `true` if a route was removed.
    /// Recursion prunes empty nodes bottom-up as it unwinds, which reaches
    /// the same end state as walking down to find the shallowest prunable
    /// ancestor and clearing from there.
    pub fn delete(&mut self, path: &str) -> bool {
        let (parts, trailing) = parse_path(path);
        delete_rec(&mut self.root, &parts, trailing).0
    }

    /// Depth-first enumeration of every route, reconstructing each one's
    /// full path (wildcard segments rendered as `:name`/`*name`).
    pub fn for_each<'a>(&'a self, mut f: impl FnMut(&str, &'a R)) {
        walk(&self.root, &[], &mut f);
    }

    /// `true` once the root has no routes and no children left.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

fn delete_rec<R>(node: &mut Node<R>, parts: &[String], trailing: bool) -> (bool, bool) {
    if parts.is_empty() {
        let removed = if trailing { node.trailing.take().is_some() } else { node.bare.take().is_some() };
        return (removed, node.is_empty());
    }

    let (key, _) = classify(&parts[0]);
    let Some(child) = node.children.get_mut(&key) else {
        return (false, false);
    };

    let (removed, child_empty) = delete_rec(child, &parts[1..], trailing);
    if child_empty {
        node.children.shift_remove(&key);
    }
    (removed, node.is_empty())
}

fn walk<'a, R>(node: &'a Node<R>, prefix: &[String], f: &mut impl FnMut(&str, &'a R)) {
    let base = prefix.join("/");
    if let Some(r) = &node.bare {
        f(&format!("/{base}"), r);
    }
    if let Some(r) = &node.trailing {
        let path = if prefix.is_empty() { "/".to_string() } else { format!("/{base}/") };
        f(&path, r);
    }
    for (key, child) in &node.children {
        let seg = match key.as_str() {
            PARAM_KEY => format!(":{}", child.param_name.as_deref().unwrap_or("")),
            CATCHALL_KEY => format!("*{}", child.param_name.as_deref().unwrap_or("")),
            literal => literal.to_string(),
        };
        let mut next = prefix.to_vec();
        next.push(seg);
        walk(child, &next, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_with(paths: &[&str]) -> RouteTrie<String> {
        let mut t = RouteTrie::new();
        for p in paths {
            t.insert(p, p.to_string()).unwrap();
        }
        t
    }

    #[test]
    fn insert_then_lookup_roundtrips() {
        let t = trie_with(&["/blogs", "/blogs/:id", "/blogs/:id/comments"]);
        let m = t.lookup("/blogs").unwrap();
        assert_eq!(m.route, "/blogs");
        assert!(m.params.is_empty());
    }

    #[test]
    fn param_binding_scenario_from_spec() {
        let mut t: RouteTrie<String> = RouteTrie::new();
        t.insert("/blogs", "bare".into()).unwrap();
        t.insert("/blogs/:id", "by_id".into()).unwrap();
        t.insert("/blogs/:id/comments", "comments".into()).unwrap();
        t.insert("/blogs/:id/comments/:cid", "comment".into()).unwrap();
        t.insert("/blogs/:id/comments/:cid/*suffix", "suffixed".into()).unwrap();

        let m = t.lookup("/blogs/123/comments/456/test/extra").unwrap();
        assert_eq!(m.route, "suffixed");
        assert_eq!(
            m.params,
            vec![
                ("id".to_string(), "123".to_string()),
                ("cid".to_string(), "456".to_string()),
                ("suffix".to_string(), "test/extra".to_string()),
            ]
        );
    }

    #[test]
    fn bare_and_trailing_are_distinct() {
        let mut t: RouteTrie<String> = RouteTrie::new();
        t.insert("/blogs", "bare".into()).unwrap();
        t.insert("/blogs/", "trailing".into()).unwrap();
        assert_eq!(t.lookup("/blogs").unwrap().route, "bare");
        assert_eq!(t.lookup("/blogs/").unwrap().route, "trailing");
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut t = trie_with(&["/blogs"]);
        assert_eq!(t.insert("/blogs", "dup".into()), Err(RouteError::AlreadyExists));
    }

    #[test]
    fn conflict_scenarios_from_spec() {
        // Given /test/test exists, each of these must fail with Conflict.
        for conflicting in ["/:", "/*", "/test/:", "/test/*", "/:/test"] {
            let mut t = trie_with(&["/test/test"]);
            assert_eq!(
                t.insert(conflicting, "x".into()),
                Err(RouteError::Conflict),
                "expected conflict for {conflicting}"
            );
        }
    }

    #[test]
    fn wildcard_then_literal_also_conflicts() {
        let mut t = trie_with(&["/blogs/:id"]);
        assert_eq!(t.insert("/blogs/literal", "x".into()), Err(RouteError::Conflict));
    }

    #[test]
    fn delete_prunes_empty_subtree() {
        let mut t = trie_with(&["/a/b/c"]);
        assert!(t.delete("/a/b/c"));
        assert!(t.is_empty());
    }

    #[test]
    fn delete_leaves_siblings_intact() {
        let mut t = trie_with(&["/a/b", "/a/c"]);
        assert!(t.delete("/a/b"));
        assert!(!t.is_empty());
        assert!(t.lookup("/a/c").is_some());
        assert!(t.lookup("/a/b").is_none());
    }

    #[test]
    fn delete_missing_route_is_noop() {
        let mut t = trie_with(&["/a"]);
        assert!(!t.delete("/nope"));
    }

    #[test]
    fn for_each_enumerates_every_route_once() {
        let t = trie_with(&["/blogs", "/blogs/:id", "/blogs/:id/*suffix"]);
        let mut seen = Vec::new();
        t.for_each(|path, route| seen.push((path.to_string(), route.clone())));
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("/blogs".to_string(), "/blogs".to_string()),
                ("/blogs/:id".to_string(), "/blogs/:id".to_string()),
                ("/blogs/:id/*suffix".to_string(), "/blogs/:id/*suffix".to_string()),
            ]
        );
    }

    #[test]
    fn root_path_round_trips() {
        let mut t: RouteTrie<String> = RouteTrie::new();
        t.insert("/", "root".into()).unwrap();
        assert_eq!(t.lookup("/").unwrap().route, "root");
    }
}
