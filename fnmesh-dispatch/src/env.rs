use fnmesh_store::Route;
use http::{HeaderMap, Method};
use std::collections::HashMap;

/// `K=V` -> env-var-safe key: uppercased, hyphens become underscores (spec §4.5 step 5).
fn env_key(raw: &str) -> String {
    raw.to_uppercase().replace('-', "_")
}

/// Build the fixed keys, app/route config (route overrides app), `PARAM_*`,
/// and `HEADER_*` env vars for one dispatch (spec §4.5 step 5).
pub fn build_env(
    method: &Method,
    route: &Route,
    request_url: &str,
    app_config: &HashMap<String, String>,
    params: &[(String, String)],
    headers: &HeaderMap,
) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("METHOD".to_string(), method.to_string());
    env.insert("ROUTE".to_string(), route.path.clone());
    env.insert("REQUEST_URL".to_string(), request_url.to_string());

    for (k, v) in app_config {
        env.insert(env_key(k), v.clone());
    }
    for (k, v) in &route.config {
        env.insert(env_key(k), v.clone());
    }

    for (name, value) in params {
        env.insert(format!("PARAM_{}", env_key(name)), value.clone());
    }

    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        env.insert(format!("HEADER_{}", env_key(name.as_str())), values.join(" "));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnmesh_store::{RouteFormat, RouteType};
    use http::HeaderValue;

    fn route() -> Route {
        let mut config = HashMap::new();
        config.insert("db-url".to_string(), "route-value".to_string());
        Route {
            app_name: "myapp".into(),
            path: "/blogs/:id".into(),
            image: "img".into(),
            route_type: RouteType::Sync,
            format: RouteFormat::Default,
            memory: 128,
            cpu_shares: 0,
            timeout_secs: 30,
            idle_timeout_secs: 30,
            max_concurrency: 1,
            headers: HashMap::new(),
            config,
        }
    }

    #[test]
    fn fixed_keys_are_present() {
        let mut headers = HeaderMap::new();
        let env = build_env(&Method::GET, &route(), "http://x/blogs/1", &HashMap::new(), &[], &headers);
        assert_eq!(env.get("METHOD"), Some(&"GET".to_string()));
        assert_eq!(env.get("ROUTE"), Some(&"/blogs/:id".to_string()));
        assert_eq!(env.get("REQUEST_URL"), Some(&"http://x/blogs/1".to_string()));
        headers.clear();
    }

    #[test]
    fn route_config_overrides_app_config() {
        let mut app_config = HashMap::new();
        app_config.insert("db-url".to_string(), "app-value".to_string());
        let env = build_env(&Method::GET, &route(), "http://x", &app_config, &[], &HeaderMap::new());
        assert_eq!(env.get("DB_URL"), Some(&"route-value".to_string()));
    }

    #[test]
    fn params_are_prefixed_and_transformed() {
        let params = vec![("id".to_string(), "42".to_string())];
        let env = build_env(&Method::GET, &route(), "http://x", &HashMap::new(), &params, &HeaderMap::new());
        assert_eq!(env.get("PARAM_ID"), Some(&"42".to_string()));
    }

    #[test]
    fn headers_join_multiple_values_with_space() {
        let mut headers = HeaderMap::new();
        headers.append("X-Trace", HeaderValue::from_static("v1"));
        headers.append("X-Trace", HeaderValue::from_static("v2"));
        let env = build_env(&Method::GET, &route(), "http://x", &HashMap::new(), &[], &headers);
        assert_eq!(env.get("HEADER_X_TRACE"), Some(&"v1 v2".to_string()));
    }
}
