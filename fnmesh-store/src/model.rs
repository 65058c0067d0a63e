use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A namespace grouping routes and shared config (spec §3). `name` is the
/// unique key; `config` merges on update (empty value deletes the key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        App { name: name.into(), config: HashMap::new() }
    }

    /// Merge `patch` into `self.config`: absent keys retain their prior
    /// value, present keys with an empty value are removed, anything else
    /// is inserted/overwritten (spec §3, §8).
    pub fn merge_config(&mut self, patch: HashMap<String, String>) {
        merge(&mut self.config, patch);
    }
}

/// Execution type for a route (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Sync,
    Async,
}

/// Container I/O format (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteFormat {
    Default,
    Http,
    Json,
}

/// A `(path, image)` binding under an app, with execution parameters
/// (spec §3). Uniquely keyed by `(app_name, path)`; `path` and `app_name`
/// are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub app_name: String,
    pub path: String,
    pub image: String,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    pub format: RouteFormat,
    pub memory: u32,
    pub cpu_shares: u32,
    pub timeout_secs: u32,
    pub idle_timeout_secs: u32,
    pub max_concurrency: u32,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl Route {
    /// `nameless path`: parameter names stripped (`:id` -> `:`), per spec §6
    /// and the GLOSSARY — used by SQL backends for a wildcard-matching index.
    /// Kept here so any backend can derive it without re-parsing segments.
    pub fn nameless_path(&self) -> String {
        self.path
            .split('/')
            .map(|seg| {
                if seg.starts_with(':') {
                    ":"
                } else if seg.starts_with('*') {
                    "*"
                } else {
                    seg
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Merge `config`/`headers` patches the way [`App::merge_config`] does.
    pub fn merge_update(&mut self, config_patch: HashMap<String, String>, headers_patch: HashMap<String, Vec<String>>) {
        merge(&mut self.config, config_patch);
        merge_headers(&mut self.headers, headers_patch);
    }
}

fn merge(target: &mut HashMap<String, String>, patch: HashMap<String, String>) {
    for (k, v) in patch {
        if v.is_empty() {
            target.remove(&k);
        } else {
            target.insert(k, v);
        }
    }
}

fn merge_headers(target: &mut HashMap<String, Vec<String>>, patch: HashMap<String, Vec<String>>) {
    for (k, v) in patch {
        if v.is_empty() {
            target.remove(&k);
        } else {
            target.insert(k, v);
        }
    }
}

/// A unit of async work (spec §3). `id` must be unique and non-empty;
/// `priority` must be set to `0`, `1`, or `2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub app_name: String,
    pub path: String,
    pub image: String,
    pub priority: u8,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub delay_sec: u32,
    /// `None` until [`crate::queue`]-equivalent reservation logic sets it.
    pub reserved_until: Option<u64>,
}

impl Task {
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.priority <= 2
    }
}

/// Ephemeral execution config assembled per request (spec §3) and handed to
/// the worker pool / container driver.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub id: String,
    pub app_name: String,
    pub path: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub format: RouteFormat,
    pub timeout_secs: u32,
    pub idle_timeout_secs: u32,
    pub memory: u32,
    pub max_concurrency: u32,
    pub stdin: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_config_deletes_on_empty_value() {
        let mut app = App::new("myapp");
        app.config.insert("a".into(), "1".into());
        app.config.insert("b".into(), "2".into());
        let mut patch = HashMap::new();
        patch.insert("a".into(), String::new());
        patch.insert("c".into(), "3".into());
        app.merge_config(patch);
        assert_eq!(app.config.get("a"), None);
        assert_eq!(app.config.get("b"), Some(&"2".to_string()));
        assert_eq!(app.config.get("c"), Some(&"3".to_string()));
    }

    #[test]
    fn nameless_path_strips_param_names() {
        let route = Route {
            app_name: "a".into(),
            path: "/blogs/:id/comments/:cid/*suffix".into(),
            image: "img".into(),
            route_type: RouteType::Sync,
            format: RouteFormat::Default,
            memory: 128,
            cpu_shares: 0,
            timeout_secs: 30,
            idle_timeout_secs: 30,
            max_concurrency: 1,
            headers: HashMap::new(),
            config: HashMap::new(),
        };
        assert_eq!(route.nameless_path(), "/blogs/:/comments/:/*");
    }
}
