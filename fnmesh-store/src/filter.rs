use regex::Regex;

/// Filter for `GetApps` (spec §4.2): matches app names against a SQL-LIKE
/// `name` pattern (`%` -> `.*?`), anchored at both ends.
#[derive(Debug, Clone, Default)]
pub struct AppFilter {
    pub name: Option<String>,
}

/// Filter for `GetRoutes` (spec §4.2): matches on any of `app_name`, `path`,
/// `image`, each independently using the same `%` translation.
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub app_name: Option<String>,
    pub path: Option<String>,
    pub image: Option<String>,
}

/// Compile a SQL-LIKE pattern (`%` as wildcard) into a regex anchored at
/// both ends, so backend implementations agree on filter semantics
/// (spec §4.2: "Filter semantics must match across every backend").
pub fn like_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    for part in pattern.split('%') {
        out.push_str(&regex::escape(part));
        out.push_str(".*?");
    }
    // split('%') always yields at least one piece, with one extra ".*?" per
    // '%' found; strip the trailing ".*?" introduced by the final split piece
    // only when the pattern didn't actually end with '%'.
    if !pattern.ends_with('%') {
        out.truncate(out.len() - ".*?".len());
    }
    out.push('$');
    Regex::new(&out).expect("pattern compiled from escaped literals is always valid")
}

impl AppFilter {
    pub fn matches(&self, name: &str) -> bool {
        match &self.name {
            Some(pattern) => like_to_regex(pattern).is_match(name),
            None => true,
        }
    }
}

impl RouteFilter {
    pub fn matches(&self, app_name: &str, path: &str, image: &str) -> bool {
        let field_matches = |pattern: &Option<String>, value: &str| match pattern {
            Some(p) => like_to_regex(p).is_match(value),
            None => true,
        };
        field_matches(&self.app_name, app_name) && field_matches(&self.path, path) && field_matches(&self.image, image)
    }
}
