//! Cross-object configuration validation
//!
//! Enforces every integrity rule the wire schema cannot express. Checks
//! run in a fixed order and accumulate failures instead of
//! short-circuiting, so one pass reports everything an operator must
//! fix. Each error carries a stable [`ValidationKind`] sentinel.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use super::app::{builtin, AppConfig, CompileError};
use super::endpoint::RouteCondition;
use super::expand;
use super::{Config, SUPPORTED_VERSIONS};

/// Stable machine-readable category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    UnsupportedVersion,
    EmptyId,
    EmptyAddress,
    DuplicateId,
    DuplicateAddress,
    MissingProtocolOptions,
    ListenerNotFound,
    MultipleListenerRefs,
    EmptyAppRef,
    MissingCondition,
    EmptyConditionValue,
    UnsupportedCondition,
    AppNotFound,
    RouteConflict,
    CompositeRefNotFound,
    CompileFailed,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsupportedVersion => "unsupported_version",
            Self::EmptyId => "empty_id",
            Self::EmptyAddress => "empty_address",
            Self::DuplicateId => "duplicate_id",
            Self::DuplicateAddress => "duplicate_address",
            Self::MissingProtocolOptions => "missing_protocol_options",
            Self::ListenerNotFound => "listener_not_found",
            Self::MultipleListenerRefs => "multiple_listener_refs",
            Self::EmptyAppRef => "empty_app_ref",
            Self::MissingCondition => "missing_condition",
            Self::EmptyConditionValue => "empty_condition_value",
            Self::UnsupportedCondition => "unsupported_condition",
            Self::AppNotFound => "app_not_found",
            Self::RouteConflict => "route_conflict",
            Self::CompositeRefNotFound => "composite_ref_not_found",
            Self::CompileFailed => "compile_failed",
        };
        write!(f, "{}", name)
    }
}

/// A single failed invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported config version {found:?} (supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("{entity} at index {index} has an empty id")]
    EmptyId { entity: &'static str, index: usize },

    #[error("listener {listener_id:?} has an empty address")]
    EmptyAddress { listener_id: String },

    #[error("duplicate {entity} id {id:?}")]
    DuplicateId { entity: &'static str, id: String },

    #[error("duplicate listener address {address:?} (listeners {first:?} and {second:?})")]
    DuplicateAddress {
        address: String,
        first: String,
        second: String,
    },

    #[error("listener {listener_id:?} declares no protocol options")]
    MissingProtocolOptions { listener_id: String },

    #[error("endpoint {endpoint_id:?} references unknown listener {listener_id:?}")]
    ListenerNotFound {
        endpoint_id: String,
        listener_id: String,
    },

    #[error("endpoint {endpoint_id:?} references {count} listeners; exactly one is required")]
    MultipleListenerRefs { endpoint_id: String, count: usize },

    #[error("endpoint {endpoint_id:?} route {route_index} has an empty app id")]
    EmptyAppRef {
        endpoint_id: String,
        route_index: usize,
    },

    #[error("endpoint {endpoint_id:?} route {route_index} has no condition")]
    MissingCondition {
        endpoint_id: String,
        route_index: usize,
    },

    #[error("endpoint {endpoint_id:?} route {route_index} has an empty {condition_kind} value")]
    EmptyConditionValue {
        endpoint_id: String,
        route_index: usize,
        condition_kind: &'static str,
    },

    #[error(
        "endpoint {endpoint_id:?} route {route_index} uses {condition_kind}, which is not yet carried by the wire schema"
    )]
    UnsupportedCondition {
        endpoint_id: String,
        route_index: usize,
        condition_kind: &'static str,
    },

    #[error("endpoint {endpoint_id:?} route {route_index} references unknown app {app_id:?}")]
    AppNotFound {
        endpoint_id: String,
        route_index: usize,
        app_id: String,
    },

    #[error(
        "route conflict on listener {listener_id:?}: endpoints {first_endpoint:?} and {second_endpoint:?} both claim {condition}"
    )]
    RouteConflict {
        listener_id: String,
        condition: String,
        first_endpoint: String,
        second_endpoint: String,
    },

    #[error("composite app {app_id:?} references unknown script app {reference:?}")]
    CompositeRefNotFound { app_id: String, reference: String },

    #[error("app {app_id:?} failed to compile: {source}")]
    CompileFailed {
        app_id: String,
        #[source]
        source: CompileError,
    },
}

impl ValidationError {
    /// The stable sentinel kind of this error.
    pub fn kind(&self) -> ValidationKind {
        match self {
            Self::UnsupportedVersion { .. } => ValidationKind::UnsupportedVersion,
            Self::EmptyId { .. } => ValidationKind::EmptyId,
            Self::EmptyAddress { .. } => ValidationKind::EmptyAddress,
            Self::DuplicateId { .. } => ValidationKind::DuplicateId,
            Self::DuplicateAddress { .. } => ValidationKind::DuplicateAddress,
            Self::MissingProtocolOptions { .. } => ValidationKind::MissingProtocolOptions,
            Self::ListenerNotFound { .. } => ValidationKind::ListenerNotFound,
            Self::MultipleListenerRefs { .. } => ValidationKind::MultipleListenerRefs,
            Self::EmptyAppRef { .. } => ValidationKind::EmptyAppRef,
            Self::MissingCondition { .. } => ValidationKind::MissingCondition,
            Self::EmptyConditionValue { .. } => ValidationKind::EmptyConditionValue,
            Self::UnsupportedCondition { .. } => ValidationKind::UnsupportedCondition,
            Self::AppNotFound { .. } => ValidationKind::AppNotFound,
            Self::RouteConflict { .. } => ValidationKind::RouteConflict,
            Self::CompositeRefNotFound { .. } => ValidationKind::CompositeRefNotFound,
            Self::CompileFailed { .. } => ValidationKind::CompileFailed,
        }
    }
}

/// The accumulated join of every failed invariant from one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Whether any accumulated error has the given sentinel kind.
    pub fn has_kind(&self, kind: ValidationKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }
}

impl fmt::Display for ValidationErrors {
    // Joined with "; " so single-line log output stays readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Run the full validation pass over a config.
pub(crate) fn run(config: &Config) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_version(config, &mut errors);
    check_listeners(config, &mut errors);
    check_endpoints(config, &mut errors);

    // Route expansion joins the implicit apps to the declared set for
    // the reference and uniqueness checks below.
    let expansion = expand::expand(&config.apps, &config.endpoints);

    check_apps(config, &expansion, &mut errors);
    check_route_refs(config, &expansion, &mut errors);
    check_composites(config, &mut errors);
    check_route_conflicts(config, &mut errors);

    if errors.is_empty() {
        // Repeated validation recomputes an identical expansion; only
        // the first result is kept.
        let _ = config.derived.expansion.set(expansion);
        config.mark_validated();
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_version(config: &Config, errors: &mut ValidationErrors) {
    if !SUPPORTED_VERSIONS.contains(&config.version.as_str()) {
        errors.push(ValidationError::UnsupportedVersion {
            found: config.version.clone(),
            supported: SUPPORTED_VERSIONS.join(", "),
        });
    }
}

fn check_listeners(config: &Config, errors: &mut ValidationErrors) {
    let mut seen_ids = HashSet::new();
    let mut seen_addresses: HashMap<&str, &str> = HashMap::new();

    for (index, listener) in config.listeners.iter().enumerate() {
        if listener.id.is_empty() {
            errors.push(ValidationError::EmptyId {
                entity: "listener",
                index,
            });
        } else if !seen_ids.insert(listener.id.as_str()) {
            errors.push(ValidationError::DuplicateId {
                entity: "listener",
                id: listener.id.clone(),
            });
        }

        if listener.address.is_empty() {
            errors.push(ValidationError::EmptyAddress {
                listener_id: listener.id.clone(),
            });
        } else if let Some(first) = seen_addresses.insert(&listener.address, &listener.id) {
            errors.push(ValidationError::DuplicateAddress {
                address: listener.address.clone(),
                first: first.to_string(),
                second: listener.id.clone(),
            });
        }

        if listener.options.is_none() {
            errors.push(ValidationError::MissingProtocolOptions {
                listener_id: listener.id.clone(),
            });
        }
    }
}

fn check_endpoints(config: &Config, errors: &mut ValidationErrors) {
    let mut seen_ids = HashSet::new();

    for (index, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.id.is_empty() {
            errors.push(ValidationError::EmptyId {
                entity: "endpoint",
                index,
            });
        } else if !seen_ids.insert(endpoint.id.as_str()) {
            errors.push(ValidationError::DuplicateId {
                entity: "endpoint",
                id: endpoint.id.clone(),
            });
        }

        if !endpoint.extra_listener_ids.is_empty() {
            errors.push(ValidationError::MultipleListenerRefs {
                endpoint_id: endpoint.id.clone(),
                count: 1 + endpoint.extra_listener_ids.len(),
            });
        }

        if config.find_listener(&endpoint.listener_id).is_none() {
            errors.push(ValidationError::ListenerNotFound {
                endpoint_id: endpoint.id.clone(),
                listener_id: endpoint.listener_id.clone(),
            });
        }

        for (route_index, route) in endpoint.routes.iter().enumerate() {
            if route.app_id.is_empty() {
                errors.push(ValidationError::EmptyAppRef {
                    endpoint_id: endpoint.id.clone(),
                    route_index,
                });
            }

            match &route.condition {
                None => errors.push(ValidationError::MissingCondition {
                    endpoint_id: endpoint.id.clone(),
                    route_index,
                }),
                Some(condition @ RouteCondition::McpResource { .. }) => {
                    errors.push(ValidationError::UnsupportedCondition {
                        endpoint_id: endpoint.id.clone(),
                        route_index,
                        condition_kind: condition.kind(),
                    });
                }
                Some(condition) if condition.value_is_empty() => {
                    errors.push(ValidationError::EmptyConditionValue {
                        endpoint_id: endpoint.id.clone(),
                        route_index,
                        condition_kind: condition.kind(),
                    });
                }
                Some(_) => {}
            }
        }
    }
}

fn check_apps(config: &Config, expansion: &expand::Expansion, errors: &mut ValidationErrors) {
    let mut seen_ids = HashSet::new();

    for (index, app) in config.apps.iter().chain(expansion.apps().iter()).enumerate() {
        if app.id.is_empty() {
            errors.push(ValidationError::EmptyId {
                entity: "app",
                index,
            });
        } else if !seen_ids.insert(app.id.as_str()) {
            errors.push(ValidationError::DuplicateId {
                entity: "app",
                id: app.id.clone(),
            });
        }

        if let Err(source) = app.config.compile() {
            errors.push(ValidationError::CompileFailed {
                app_id: app.id.clone(),
                source,
            });
        }
    }
}

fn check_route_refs(config: &Config, expansion: &expand::Expansion, errors: &mut ValidationErrors) {
    for (endpoint_index, endpoint) in config.endpoints.iter().enumerate() {
        for (route_index, route) in endpoint.routes.iter().enumerate() {
            if route.app_id.is_empty() {
                // Already reported as an empty app ref.
                continue;
            }
            let resolves = expansion.app_for_route(endpoint_index, route_index).is_some()
                || config.find_app(&route.app_id).is_some()
                || builtin::is_builtin(&route.app_id);
            if !resolves {
                errors.push(ValidationError::AppNotFound {
                    endpoint_id: endpoint.id.clone(),
                    route_index,
                    app_id: route.app_id.clone(),
                });
            }
        }
    }
}

fn check_composites(config: &Config, errors: &mut ValidationErrors) {
    for app in &config.apps {
        let AppConfig::CompositeScript(composite) = &app.config else {
            continue;
        };
        for reference in &composite.script_app_ids {
            if config.find_app(reference).is_none() {
                errors.push(ValidationError::CompositeRefNotFound {
                    app_id: app.id.clone(),
                    reference: reference.clone(),
                });
            }
        }
    }
}

fn check_route_conflicts(config: &Config, errors: &mut ValidationErrors) {
    // Claims are keyed by (listener, condition kind:value); identical
    // conditions on different listeners never collide.
    let mut claims: HashMap<(String, String), String> = HashMap::new();

    for endpoint in &config.endpoints {
        for route in &endpoint.routes {
            let Some(condition) = &route.condition else {
                continue;
            };
            if condition.value_is_empty() {
                continue;
            }
            let key = (endpoint.listener_id.clone(), condition.conflict_key());
            match claims.get(&key) {
                Some(first) => errors.push(ValidationError::RouteConflict {
                    listener_id: endpoint.listener_id.clone(),
                    condition: condition.conflict_key(),
                    first_endpoint: first.clone(),
                    second_endpoint: endpoint.id.clone(),
                }),
                None => {
                    claims.insert(key, endpoint.id.clone());
                }
            }
        }
    }
}
