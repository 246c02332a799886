//! Endpoint and route model
//!
//! An endpoint attaches a set of routes to exactly one listener. Routes
//! map a matching condition to an app id; the app itself is resolved
//! through the config's app table, never owned by the route.

use std::fmt;

use super::StaticData;

/// A named attachment point on a listener.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub id: String,

    /// The listener this endpoint attaches to (canonical single id).
    pub listener_id: String,

    /// Surplus ids from older documents that carried a list of
    /// listeners. Kept through conversion so validation can reject
    /// multi-listener endpoints with a precise error.
    pub extra_listener_ids: Vec<String>,

    pub routes: Vec<Route>,
}

impl Endpoint {
    /// Lazy view over the subset of routes with an HTTP path condition.
    pub fn http_routes(&self) -> impl Iterator<Item = HttpRoute<'_>> {
        self.routes.iter().filter_map(|route| match &route.condition {
            Some(RouteCondition::HttpPath { path, method }) => Some(HttpRoute {
                path,
                method: method.as_deref(),
                app_id: &route.app_id,
                static_data: route.static_data.as_ref(),
            }),
            _ => None,
        })
    }
}

/// Flattened view of an HTTP route, produced by [`Endpoint::http_routes`].
#[derive(Debug, Clone, Copy)]
pub struct HttpRoute<'a> {
    pub path: &'a str,
    pub method: Option<&'a str>,
    pub app_id: &'a str,
    pub static_data: Option<&'a StaticData>,
}

/// A condition-to-app mapping scoped to an endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    pub app_id: String,

    /// Absent when the wire document carried no recognized rule;
    /// validation rejects that state.
    pub condition: Option<RouteCondition>,

    /// Per-route overrides merged over the target app's static data
    /// during route expansion.
    pub static_data: Option<StaticData>,
}

/// Route matching condition.
///
/// `McpResource` exists in the model ahead of its wire field; the
/// validator rejects configurations containing it until the wire
/// carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteCondition {
    HttpPath { path: String, method: Option<String> },
    GrpcService { service: String },
    McpResource { resource: String },
}

impl RouteCondition {
    /// Stable condition kind name, used in diagnostics and conflict keys.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpPath { .. } => "http_path",
            Self::GrpcService { .. } => "grpc_service",
            Self::McpResource { .. } => "mcp_resource",
        }
    }

    /// The condition's match value. For HTTP conditions with a method
    /// the method participates, so `GET /foo` and `POST /foo` are
    /// distinct values.
    pub fn value(&self) -> String {
        match self {
            Self::HttpPath { path, method: Some(m) } => format!("{} {}", m, path),
            Self::HttpPath { path, method: None } => path.clone(),
            Self::GrpcService { service } => service.clone(),
            Self::McpResource { resource } => resource.clone(),
        }
    }

    /// Whether the match value is empty (structurally invalid).
    pub fn value_is_empty(&self) -> bool {
        match self {
            Self::HttpPath { path, .. } => path.is_empty(),
            Self::GrpcService { service } => service.is_empty(),
            Self::McpResource { resource } => resource.is_empty(),
        }
    }

    /// `kind:value` key under which two routes on the same listener
    /// collide.
    pub fn conflict_key(&self) -> String {
        format!("{}:{}", self.kind(), self.value())
    }
}

impl fmt::Display for RouteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.conflict_key())
    }
}
