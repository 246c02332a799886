//! Domain configuration model
//!
//! Typed in-memory representation of the server configuration: pure data
//! plus structural query helpers. Values are immutable once validated;
//! "mutation" means building a new `Config` and moving it through a
//! transaction. No I/O happens in this module.

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::proto::settings;

pub mod app;
pub mod endpoint;
pub mod expand;
pub mod listener;
pub mod loader;
pub mod validate;
pub mod wire;

pub use app::{
    builtin, App, AppConfig, CompiledMcpServer, CompiledScript, CompositeScriptApp, EchoApp,
    Evaluator, EvaluatorKind, ExtismEvaluator, McpApp, McpPrompt, McpResource, McpTool,
    McpToolHandler, McpTransport, RisorEvaluator, ScriptApp, StarlarkEvaluator,
};
pub use endpoint::{Endpoint, HttpRoute, Route, RouteCondition};
pub use expand::Expansion;
pub use listener::{GrpcListenerOptions, HttpListenerOptions, Listener, ListenerKind, ListenerOptions};
pub use validate::{ValidationError, ValidationErrors, ValidationKind};

/// The sole supported configuration version tag.
pub const VERSION_V1: &str = "v1";

/// All version tags this build understands.
pub const SUPPORTED_VERSIONS: &[&str] = &[VERSION_V1];

/// JSON-shaped key/value data attached to routes and apps.
pub type StaticData = serde_json::Map<String, serde_json::Value>;

/// Log output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Unspecified,
    Txt,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Txt => "text",
            Self::Json => "json",
        }
    }
}

/// Log verbosity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Unspecified,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

/// Logging section of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}

/// The entire in-memory configuration document.
///
/// Constructed by the schema bridge (`wire::from_wire`) or, for the
/// initial empty state, by [`Config::default`]. After a successful
/// [`Config::validate`] the value also carries its derived state: the
/// route-expansion result and the compiled artifacts cached on the app
/// configs.
#[derive(Debug)]
pub struct Config {
    pub version: String,
    pub logging: LogConfig,
    pub listeners: Vec<Listener>,
    pub endpoints: Vec<Endpoint>,
    pub apps: Vec<App>,

    /// Wire message captured at ingestion; used as the base for
    /// `to_wire` so fields the conversion does not interpret survive a
    /// round-trip.
    pub(crate) source_wire: Option<Box<settings::ServerConfig>>,

    pub(crate) derived: Derived,
}

/// Write-once state attached to a config by validation.
#[derive(Debug, Default)]
pub(crate) struct Derived {
    pub(crate) validated: AtomicBool,
    pub(crate) expansion: OnceCell<Expansion>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: VERSION_V1.to_string(),
            logging: LogConfig::default(),
            listeners: Vec::new(),
            endpoints: Vec::new(),
            apps: Vec::new(),
            source_wire: None,
            derived: Derived::default(),
        }
    }
}

impl Config {
    /// Look up a listener by id.
    pub fn find_listener(&self, id: &str) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.id == id)
    }

    /// Look up an endpoint by id.
    pub fn find_endpoint(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// Look up an app by id in the declared app set.
    ///
    /// Route-expanded clones are not part of the declared set; use
    /// [`Config::find_effective_app`] to include them.
    pub fn find_app(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.id == id)
    }

    /// Look up an app by id across the declared set and, once the
    /// config is validated, the route-expanded clones.
    pub fn find_effective_app(&self, id: &str) -> Option<&App> {
        self.find_app(id)
            .or_else(|| self.expansion().and_then(|x| x.find_app(id)))
    }

    /// All listeners of the given protocol kind.
    pub fn listeners_by_kind(&self, kind: ListenerKind) -> impl Iterator<Item = &Listener> {
        self.listeners.iter().filter(move |l| l.kind() == Some(kind))
    }

    /// All script apps using the given evaluator kind.
    pub fn apps_by_evaluator_kind(&self, kind: EvaluatorKind) -> impl Iterator<Item = &App> {
        self.apps
            .iter()
            .filter(move |a| a.evaluator_kind() == Some(kind))
    }

    /// Every endpoint attached to the given listener.
    pub fn endpoints_for_listener<'a>(
        &'a self,
        listener_id: &'a str,
    ) -> impl Iterator<Item = &'a Endpoint> {
        self.endpoints
            .iter()
            .filter(move |e| e.listener_id == listener_id)
    }

    /// Resolve the app a route points at, honoring route expansion.
    ///
    /// When the route carries static-data overrides and the config is
    /// validated, this resolves to the expanded clone; otherwise it
    /// falls back to the declared app table. Built-in app ids resolve
    /// to `None` here because built-ins have no definition to return.
    pub fn resolved_app(&self, endpoint_id: &str, route_index: usize) -> Option<&App> {
        let (endpoint_index, endpoint) = self
            .endpoints
            .iter()
            .enumerate()
            .find(|(_, e)| e.id == endpoint_id)?;
        let route = endpoint.routes.get(route_index)?;

        if let Some(expansion) = self.expansion() {
            if let Some(clone) = expansion.app_for_route(endpoint_index, route_index) {
                return Some(clone);
            }
        }
        self.find_app(&route.app_id)
    }

    /// Structural equality through the canonical wire form.
    ///
    /// Round-tripping canonicalizes semantically equivalent
    /// representations (producer extras in the side-channel base do not
    /// participate).
    pub fn equals(&self, other: &Config) -> bool {
        wire::to_wire_canonical(self) == wire::to_wire_canonical(other)
    }

    /// Run the full validation pass.
    ///
    /// Accumulates every failed invariant rather than stopping at the
    /// first. On success the `validation_completed` latch flips and the
    /// derived state (expansion, compiled artifacts) is populated.
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        validate::run(self)
    }

    /// Whether a validation pass has completed successfully.
    pub fn validation_completed(&self) -> bool {
        self.derived.validated.load(Ordering::Acquire)
    }

    /// The route-expansion result, present once validated.
    pub fn expansion(&self) -> Option<&Expansion> {
        self.derived.expansion.get()
    }

    pub(crate) fn mark_validated(&self) {
        self.derived.validated.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            listeners: vec![
                Listener {
                    id: "main".to_string(),
                    address: ":8080".to_string(),
                    options: Some(ListenerOptions::Http(HttpListenerOptions::default())),
                },
                Listener {
                    id: "rpc".to_string(),
                    address: ":9090".to_string(),
                    options: Some(ListenerOptions::Grpc(GrpcListenerOptions::default())),
                },
            ],
            endpoints: vec![Endpoint {
                id: "e1".to_string(),
                listener_id: "main".to_string(),
                extra_listener_ids: Vec::new(),
                routes: vec![Route {
                    app_id: "a1".to_string(),
                    condition: Some(RouteCondition::HttpPath {
                        path: "/echo".to_string(),
                        method: None,
                    }),
                    static_data: None,
                }],
            }],
            apps: vec![App {
                id: "a1".to_string(),
                config: AppConfig::Echo(EchoApp {
                    response: "hi".to_string(),
                }),
            }],
            ..Config::default()
        }
    }

    #[test]
    fn test_find_helpers_return_none_for_missing_ids() {
        let config = sample_config();
        assert!(config.find_listener("main").is_some());
        assert!(config.find_listener("nope").is_none());
        assert!(config.find_endpoint("e1").is_some());
        assert!(config.find_endpoint("nope").is_none());
        assert!(config.find_app("a1").is_some());
        assert!(config.find_app("nope").is_none());
    }

    #[test]
    fn test_listeners_by_kind_filters_protocol() {
        let config = sample_config();
        let http: Vec<_> = config.listeners_by_kind(ListenerKind::Http).collect();
        assert_eq!(http.len(), 1);
        assert_eq!(http[0].id, "main");
        let grpc: Vec<_> = config.listeners_by_kind(ListenerKind::Grpc).collect();
        assert_eq!(grpc.len(), 1);
        assert_eq!(grpc[0].id, "rpc");
    }

    #[test]
    fn test_endpoints_for_listener() {
        let config = sample_config();
        let attached: Vec<_> = config.endpoints_for_listener("main").collect();
        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].id, "e1");
        assert_eq!(config.endpoints_for_listener("rpc").count(), 0);
    }

    #[test]
    fn test_apps_by_evaluator_kind() {
        let mut config = sample_config();
        config.apps.push(App {
            id: "s1".to_string(),
            config: AppConfig::Script(app::ScriptApp::new(
                Evaluator::Risor(app::RisorEvaluator {
                    code: "x := 1".to_string(),
                    timeout: None,
                }),
                None,
                None,
            )),
        });

        let risor: Vec<_> = config.apps_by_evaluator_kind(EvaluatorKind::Risor).collect();
        assert_eq!(risor.len(), 1);
        assert_eq!(risor[0].id, "s1");
        assert_eq!(
            config.apps_by_evaluator_kind(EvaluatorKind::Starlark).count(),
            0
        );
    }

    #[test]
    fn test_resolved_app_follows_expansion_binding() {
        let mut config = sample_config();
        config.endpoints[0].routes[0].static_data =
            Some([("tenant".to_string(), serde_json::json!("one"))].into_iter().collect());

        // Before validation there is no expansion; the declared app
        // resolves.
        assert_eq!(config.resolved_app("e1", 0).unwrap().id, "a1");

        config.validate().expect("valid");
        assert_eq!(config.resolved_app("e1", 0).unwrap().id, "a1#0:0");
        assert!(config.resolved_app("e1", 1).is_none());
        assert!(config.resolved_app("ghost", 0).is_none());
    }

    #[test]
    fn test_http_routes_view() {
        let config = sample_config();
        let routes: Vec<_> = config.endpoints[0].http_routes().collect();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/echo");
        assert_eq!(routes[0].app_id, "a1");
    }

    #[test]
    fn test_validation_latch_starts_unset() {
        let config = sample_config();
        assert!(!config.validation_completed());
        assert!(config.expansion().is_none());
    }

    #[test]
    fn test_equals_is_structural() {
        let a = sample_config();
        let b = sample_config();
        assert!(a.equals(&b));

        let mut c = sample_config();
        c.listeners[0].address = ":8081".to_string();
        assert!(!a.equals(&c));
    }
}
