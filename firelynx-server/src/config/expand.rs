//! Route-to-app expansion
//!
//! Routes that carry static-data overrides get a private clone of their
//! target app with the merged data installed. Expansion is a pure
//! function of `(apps, endpoints)`; the result is computed during
//! validation, stored on the config, and read-only afterwards.

use std::collections::HashMap;

use super::app::App;
use super::endpoint::Endpoint;
use super::StaticData;

/// Derived set of per-route app clones plus the route bindings that
/// point at them.
#[derive(Debug, Default)]
pub struct Expansion {
    apps: Vec<App>,
    bindings: HashMap<(usize, usize), usize>,
}

impl Expansion {
    /// The expanded app clones, in endpoint/route order.
    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// The clone bound to the route at `(endpoint_index, route_index)`,
    /// when that route carried overrides.
    pub fn app_for_route(&self, endpoint_index: usize, route_index: usize) -> Option<&App> {
        self.bindings
            .get(&(endpoint_index, route_index))
            .map(|&i| &self.apps[i])
    }

    /// Look up a clone by its derived id.
    pub fn find_app(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.id == id)
    }
}

/// Derive the expansion for a config's apps and endpoints.
///
/// For every route with static data whose app id resolves in `apps`, a
/// clone named `"<app_id>#<endpoint_index>:<route_index>"` is produced
/// with the route data merged over the app data (route keys win). The
/// original app stays in place for routes without overrides.
pub fn expand(apps: &[App], endpoints: &[Endpoint]) -> Expansion {
    let mut expansion = Expansion::default();

    for (endpoint_index, endpoint) in endpoints.iter().enumerate() {
        for (route_index, route) in endpoint.routes.iter().enumerate() {
            let Some(route_data) = &route.static_data else {
                continue;
            };
            let Some(app) = apps.iter().find(|a| a.id == route.app_id) else {
                continue;
            };

            let mut clone = app.clone();
            clone.id = clone_id(&app.id, endpoint_index, route_index);
            clone
                .config
                .set_static_data(merge_static_data(app.config.static_data(), route_data));

            expansion
                .bindings
                .insert((endpoint_index, route_index), expansion.apps.len());
            expansion.apps.push(clone);
        }
    }

    expansion
}

/// Derived id for a per-route app clone.
pub fn clone_id(app_id: &str, endpoint_index: usize, route_index: usize) -> String {
    format!("{}#{}:{}", app_id, endpoint_index, route_index)
}

/// Merge route static data over app static data. Route keys override
/// app keys wholesale; no deep merging.
fn merge_static_data(app_data: Option<&StaticData>, route_data: &StaticData) -> StaticData {
    let mut merged = app_data.cloned().unwrap_or_default();
    for (key, value) in route_data {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::app::{AppConfig, EchoApp, Evaluator, RisorEvaluator, ScriptApp};
    use crate::config::endpoint::{Route, RouteCondition};

    fn script_app(id: &str, static_data: Option<StaticData>) -> App {
        App {
            id: id.to_string(),
            config: AppConfig::Script(ScriptApp::new(
                Evaluator::Risor(RisorEvaluator {
                    code: "x := 1".to_string(),
                    timeout: None,
                }),
                static_data,
                None,
            )),
        }
    }

    fn route_to(app_id: &str, static_data: Option<StaticData>) -> Route {
        Route {
            app_id: app_id.to_string(),
            condition: Some(RouteCondition::HttpPath {
                path: "/x".to_string(),
                method: None,
            }),
            static_data,
        }
    }

    fn endpoint(id: &str, routes: Vec<Route>) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            listener_id: "main".to_string(),
            extra_listener_ids: Vec::new(),
            routes,
        }
    }

    fn data(pairs: &[(&str, serde_json::Value)]) -> StaticData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_routes_without_overrides_produce_no_clones() {
        let apps = vec![script_app("a", None)];
        let endpoints = vec![endpoint("e1", vec![route_to("a", None)])];
        let expansion = expand(&apps, &endpoints);
        assert!(expansion.is_empty());
        assert!(expansion.app_for_route(0, 0).is_none());
    }

    #[test]
    fn test_two_overriding_routes_yield_two_clones() {
        let apps = vec![script_app("a", None)];
        let endpoints = vec![endpoint(
            "e1",
            vec![
                route_to("a", Some(data(&[("tenant", json!("one"))]))),
                route_to("a", Some(data(&[("tenant", json!("two"))]))),
            ],
        )];

        let expansion = expand(&apps, &endpoints);
        assert_eq!(expansion.apps().len(), 2);
        assert_eq!(expansion.apps()[0].id, "a#0:0");
        assert_eq!(expansion.apps()[1].id, "a#0:1");
        assert_eq!(expansion.app_for_route(0, 0).unwrap().id, "a#0:0");
        assert_eq!(expansion.app_for_route(0, 1).unwrap().id, "a#0:1");
    }

    #[test]
    fn test_route_data_overrides_app_data() {
        let apps = vec![script_app(
            "a",
            Some(data(&[("region", json!("eu")), ("tier", json!("free"))])),
        )];
        let endpoints = vec![endpoint(
            "e1",
            vec![route_to("a", Some(data(&[("tier", json!("pro"))])))],
        )];

        let expansion = expand(&apps, &endpoints);
        let clone = expansion.app_for_route(0, 0).unwrap();
        let merged = clone.config.static_data().unwrap();
        assert_eq!(merged["region"], json!("eu"));
        assert_eq!(merged["tier"], json!("pro"));
    }

    #[test]
    fn test_dangling_app_refs_are_skipped() {
        let apps = vec![script_app("a", None)];
        let endpoints = vec![endpoint(
            "e1",
            vec![route_to("missing", Some(data(&[("k", json!(1))])))],
        )];
        let expansion = expand(&apps, &endpoints);
        assert!(expansion.is_empty());
    }

    #[test]
    fn test_echo_clone_keeps_config() {
        let apps = vec![App {
            id: "a".to_string(),
            config: AppConfig::Echo(EchoApp {
                response: "hi".to_string(),
            }),
        }];
        let endpoints = vec![endpoint(
            "e1",
            vec![route_to("a", Some(data(&[("k", json!(1))])))],
        )];

        let expansion = expand(&apps, &endpoints);
        let clone = expansion.app_for_route(0, 0).unwrap();
        assert_eq!(clone.id, "a#0:0");
        // echo has no static-data slot; the clone's config is unchanged
        assert!(clone.config.static_data().is_none());
    }
}
