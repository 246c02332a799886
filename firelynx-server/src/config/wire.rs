//! Schema bridge: wire document ↔ domain model
//!
//! `from_wire` projects a decoded protobuf document into the domain
//! model; `to_wire` goes the other way. The decoded message is captured
//! at ingestion and reused as the base for `to_wire`, so fields the
//! conversion does not interpret survive a round-trip. The bridge never
//! invents defaults beyond the ones the schema defines (a zero duration
//! defers to the listener runtime).

use std::time::Duration;

use thiserror::Error;

use crate::proto::settings;

use super::app::{
    App, AppConfig, CompositeScriptApp, EchoApp, Evaluator, ExtismEvaluator, McpApp, McpPrompt,
    McpResource, McpTool, McpToolHandler, McpTransport, RisorEvaluator, ScriptApp,
    StarlarkEvaluator,
};
use super::endpoint::{Endpoint, Route, RouteCondition};
use super::listener::{GrpcListenerOptions, HttpListenerOptions, Listener, ListenerOptions};
use super::{Config, Derived, LogConfig, LogFormat, LogLevel, StaticData};

/// Failure to project a wire document into the domain model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("endpoint at index {index} has no id")]
    MissingEndpointId { index: usize },

    #[error("endpoint {endpoint_id:?} references no listeners")]
    EmptyListenerRefs { endpoint_id: String },

    #[error("app {app_id:?} has no recognized config variant")]
    MissingAppVariant { app_id: String },

    #[error("script app {app_id:?} has no evaluator")]
    MissingEvaluator { app_id: String },

    #[error("mcp app {app_id:?} tool {tool:?} has no handler")]
    MissingToolHandler { app_id: String, tool: String },

    #[error("{field} must not be negative")]
    NegativeValue { field: String },
}

/// Project a wire document into the domain model.
///
/// The input message is captured as the side-channel base for
/// [`to_wire`]. Unknown enum values degrade to `Unspecified`.
pub fn from_wire(doc: &settings::ServerConfig) -> Result<Config, ConversionError> {
    let logging = doc
        .logging
        .as_ref()
        .map(log_config_from_wire)
        .unwrap_or_default();

    let listeners = doc
        .listeners
        .iter()
        .map(listener_from_wire)
        .collect::<Result<Vec<_>, _>>()?;

    let endpoints = doc
        .endpoints
        .iter()
        .enumerate()
        .map(|(index, e)| endpoint_from_wire(index, e))
        .collect::<Result<Vec<_>, _>>()?;

    let apps = doc
        .apps
        .iter()
        .map(app_from_wire)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Config {
        version: doc.version().to_string(),
        logging,
        listeners,
        endpoints,
        apps,
        source_wire: Some(Box::new(doc.clone())),
        derived: Derived::default(),
    })
}

/// Serialize a config back to the wire form.
///
/// When a side-channel base was captured at ingestion it is used as the
/// starting point and only the semantically meaningful fields are
/// overwritten.
pub fn to_wire(config: &Config) -> settings::ServerConfig {
    let mut doc = config
        .source_wire
        .as_deref()
        .cloned()
        .unwrap_or_default();
    write_semantic_fields(config, &mut doc);
    doc
}

/// Serialize a config to a fresh wire document, ignoring the
/// side-channel base. [`Config::equals`] compares these so producer
/// extras never affect structural equality.
pub fn to_wire_canonical(config: &Config) -> settings::ServerConfig {
    let mut doc = settings::ServerConfig::default();
    write_semantic_fields(config, &mut doc);
    doc
}

fn write_semantic_fields(config: &Config, doc: &mut settings::ServerConfig) {
    doc.version = Some(config.version.clone());
    doc.logging = Some(log_config_to_wire(&config.logging));
    doc.listeners = config.listeners.iter().map(listener_to_wire).collect();
    doc.endpoints = config.endpoints.iter().map(endpoint_to_wire).collect();
    doc.apps = config.apps.iter().map(app_to_wire).collect();
}

// ---------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------

fn log_config_from_wire(options: &settings::LogOptions) -> LogConfig {
    // The generated accessors fall back to Unspecified for enum values
    // this build does not know.
    let format = match options.format() {
        settings::log_options::Format::Txt => LogFormat::Txt,
        settings::log_options::Format::Json => LogFormat::Json,
        settings::log_options::Format::Unspecified => LogFormat::Unspecified,
    };
    let level = match options.level() {
        settings::log_options::Level::Debug => LogLevel::Debug,
        settings::log_options::Level::Info => LogLevel::Info,
        settings::log_options::Level::Warn => LogLevel::Warn,
        settings::log_options::Level::Error => LogLevel::Error,
        settings::log_options::Level::Fatal => LogLevel::Fatal,
        settings::log_options::Level::Unspecified => LogLevel::Unspecified,
    };
    LogConfig { format, level }
}

fn log_config_to_wire(logging: &LogConfig) -> settings::LogOptions {
    let format = match logging.format {
        LogFormat::Unspecified => settings::log_options::Format::Unspecified,
        LogFormat::Txt => settings::log_options::Format::Txt,
        LogFormat::Json => settings::log_options::Format::Json,
    };
    let level = match logging.level {
        LogLevel::Unspecified => settings::log_options::Level::Unspecified,
        LogLevel::Debug => settings::log_options::Level::Debug,
        LogLevel::Info => settings::log_options::Level::Info,
        LogLevel::Warn => settings::log_options::Level::Warn,
        LogLevel::Error => settings::log_options::Level::Error,
        LogLevel::Fatal => settings::log_options::Level::Fatal,
    };
    settings::LogOptions {
        format: Some(format as i32),
        level: Some(level as i32),
    }
}

// ---------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------

fn listener_from_wire(listener: &settings::Listener) -> Result<Listener, ConversionError> {
    let id = listener.id().to_string();
    let options = match &listener.protocol_options {
        Some(settings::listener::ProtocolOptions::Http(http)) => {
            Some(ListenerOptions::Http(HttpListenerOptions {
                read_timeout: duration_from_wire(
                    http.read_timeout.as_ref(),
                    &field(&id, "http.read_timeout"),
                )?,
                write_timeout: duration_from_wire(
                    http.write_timeout.as_ref(),
                    &field(&id, "http.write_timeout"),
                )?,
                idle_timeout: duration_from_wire(
                    http.idle_timeout.as_ref(),
                    &field(&id, "http.idle_timeout"),
                )?,
                drain_timeout: duration_from_wire(
                    http.drain_timeout.as_ref(),
                    &field(&id, "http.drain_timeout"),
                )?,
            }))
        }
        Some(settings::listener::ProtocolOptions::Grpc(grpc)) => {
            let max_concurrent_streams = match grpc.max_concurrent_streams {
                Some(v) if v < 0 => {
                    return Err(ConversionError::NegativeValue {
                        field: field(&id, "grpc.max_concurrent_streams"),
                    })
                }
                Some(v) => Some(v as u32),
                None => None,
            };
            Some(ListenerOptions::Grpc(GrpcListenerOptions {
                max_connection_idle: duration_from_wire(
                    grpc.max_connection_idle.as_ref(),
                    &field(&id, "grpc.max_connection_idle"),
                )?,
                max_connection_age: duration_from_wire(
                    grpc.max_connection_age.as_ref(),
                    &field(&id, "grpc.max_connection_age"),
                )?,
                max_concurrent_streams,
            }))
        }
        None => None,
    };

    Ok(Listener {
        id,
        address: listener.address().to_string(),
        options,
    })
}

fn field(listener_id: &str, suffix: &str) -> String {
    format!("listener {:?} {}", listener_id, suffix)
}

fn listener_to_wire(listener: &Listener) -> settings::Listener {
    let protocol_options = listener.options.as_ref().map(|options| match options {
        ListenerOptions::Http(http) => {
            settings::listener::ProtocolOptions::Http(settings::HttpListenerOptions {
                read_timeout: Some(duration_to_wire(http.read_timeout)),
                write_timeout: Some(duration_to_wire(http.write_timeout)),
                idle_timeout: Some(duration_to_wire(http.idle_timeout)),
                drain_timeout: Some(duration_to_wire(http.drain_timeout)),
            })
        }
        ListenerOptions::Grpc(grpc) => {
            settings::listener::ProtocolOptions::Grpc(settings::GrpcListenerOptions {
                max_connection_idle: Some(duration_to_wire(grpc.max_connection_idle)),
                max_connection_age: Some(duration_to_wire(grpc.max_connection_age)),
                max_concurrent_streams: grpc.max_concurrent_streams.map(|v| v as i32),
            })
        }
    });

    settings::Listener {
        id: Some(listener.id.clone()),
        address: Some(listener.address.clone()),
        protocol_options,
    }
}

// ---------------------------------------------------------------------
// Endpoints and routes
// ---------------------------------------------------------------------

fn endpoint_from_wire(
    index: usize,
    endpoint: &settings::Endpoint,
) -> Result<Endpoint, ConversionError> {
    let id = endpoint
        .id
        .clone()
        .ok_or(ConversionError::MissingEndpointId { index })?;

    let mut listener_ids = endpoint.listener_ids.iter();
    let listener_id = listener_ids
        .next()
        .cloned()
        .ok_or_else(|| ConversionError::EmptyListenerRefs {
            endpoint_id: id.clone(),
        })?;

    Ok(Endpoint {
        id,
        listener_id,
        // Surplus ids from the legacy list form are kept so validation
        // can reject them with a precise error.
        extra_listener_ids: listener_ids.cloned().collect(),
        routes: endpoint.routes.iter().map(route_from_wire).collect(),
    })
}

fn route_from_wire(route: &settings::Route) -> Route {
    let condition = match &route.rule {
        Some(settings::route::Rule::Http(http)) => Some(RouteCondition::HttpPath {
            path: http.path().to_string(),
            method: http.method.clone(),
        }),
        Some(settings::route::Rule::Grpc(grpc)) => Some(RouteCondition::GrpcService {
            service: grpc.service().to_string(),
        }),
        None => None,
    };

    Route {
        app_id: route.app_id().to_string(),
        condition,
        static_data: route.static_data.as_ref().map(struct_to_json),
    }
}

fn endpoint_to_wire(endpoint: &Endpoint) -> settings::Endpoint {
    let mut listener_ids = Vec::with_capacity(1 + endpoint.extra_listener_ids.len());
    listener_ids.push(endpoint.listener_id.clone());
    listener_ids.extend(endpoint.extra_listener_ids.iter().cloned());

    settings::Endpoint {
        id: Some(endpoint.id.clone()),
        listener_ids,
        routes: endpoint.routes.iter().map(route_to_wire).collect(),
    }
}

fn route_to_wire(route: &Route) -> settings::Route {
    let rule = match &route.condition {
        Some(RouteCondition::HttpPath { path, method }) => {
            Some(settings::route::Rule::Http(settings::HttpRule {
                path: Some(path.clone()),
                method: method.clone(),
            }))
        }
        Some(RouteCondition::GrpcService { service }) => {
            Some(settings::route::Rule::Grpc(settings::GrpcRule {
                service: Some(service.clone()),
            }))
        }
        // No wire field exists yet; validation rejects this variant
        // before any config carrying it can be committed.
        Some(RouteCondition::McpResource { .. }) => None,
        None => None,
    };

    settings::Route {
        app_id: Some(route.app_id.clone()),
        static_data: route.static_data.as_ref().map(json_to_struct),
        rule,
    }
}

// ---------------------------------------------------------------------
// Apps
// ---------------------------------------------------------------------

fn app_from_wire(app: &settings::AppDefinition) -> Result<App, ConversionError> {
    let id = app.id().to_string();

    let config = match &app.config {
        Some(settings::app_definition::Config::Echo(echo)) => AppConfig::Echo(EchoApp {
            response: echo.response().to_string(),
        }),
        Some(settings::app_definition::Config::Script(script)) => {
            AppConfig::Script(script_from_wire(script, &id)?)
        }
        Some(settings::app_definition::Config::Mcp(mcp)) => {
            AppConfig::Mcp(mcp_from_wire(mcp, &id)?)
        }
        Some(settings::app_definition::Config::CompositeScript(composite)) => {
            AppConfig::CompositeScript(CompositeScriptApp {
                script_app_ids: composite.script_app_ids.clone(),
                static_data: composite.static_data.as_ref().map(struct_to_json),
            })
        }
        None => return Err(ConversionError::MissingAppVariant { app_id: id }),
    };

    Ok(App { id, config })
}

fn script_from_wire(
    script: &settings::ScriptApp,
    context: &str,
) -> Result<ScriptApp, ConversionError> {
    let evaluator = match &script.evaluator {
        Some(settings::script_app::Evaluator::Risor(e)) => Evaluator::Risor(RisorEvaluator {
            code: e.code().to_string(),
            timeout: optional_duration_from_wire(
                e.timeout.as_ref(),
                &format!("script {:?} risor.timeout", context),
            )?,
        }),
        Some(settings::script_app::Evaluator::Starlark(e)) => {
            Evaluator::Starlark(StarlarkEvaluator {
                code: e.code().to_string(),
                timeout: optional_duration_from_wire(
                    e.timeout.as_ref(),
                    &format!("script {:?} starlark.timeout", context),
                )?,
            })
        }
        Some(settings::script_app::Evaluator::Extism(e)) => Evaluator::Extism(ExtismEvaluator {
            code: e.code().to_string(),
            entrypoint: e.entrypoint().to_string(),
        }),
        None => {
            return Err(ConversionError::MissingEvaluator {
                app_id: context.to_string(),
            })
        }
    };

    Ok(ScriptApp::new(
        evaluator,
        script.static_data.as_ref().map(struct_to_json),
        optional_duration_from_wire(
            script.timeout.as_ref(),
            &format!("script {:?} timeout", context),
        )?,
    ))
}

fn mcp_from_wire(mcp: &settings::McpApp, app_id: &str) -> Result<McpApp, ConversionError> {
    let transport = match &mcp.transport {
        Some(settings::mcp_app::Transport::StreamableHttp(t)) => {
            Some(McpTransport::StreamableHttp {
                path: t.path().to_string(),
            })
        }
        Some(settings::mcp_app::Transport::Sse(t)) => Some(McpTransport::Sse {
            path: t.path().to_string(),
        }),
        None => None,
    };

    let tools = mcp
        .tools
        .iter()
        .map(|tool| {
            let handler = match &tool.handler {
                Some(settings::mcp_tool::Handler::Script(script)) => McpToolHandler::Script(
                    script_from_wire(script, &format!("{}/tools/{}", app_id, tool.name()))?,
                ),
                Some(settings::mcp_tool::Handler::Builtin(builtin)) => {
                    McpToolHandler::Builtin(builtin.id().to_string())
                }
                None => {
                    return Err(ConversionError::MissingToolHandler {
                        app_id: app_id.to_string(),
                        tool: tool.name().to_string(),
                    })
                }
            };
            Ok(McpTool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                handler,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let resources = mcp
        .resources
        .iter()
        .map(|r| McpResource {
            name: r.name().to_string(),
            uri: r.uri().to_string(),
            mime_type: r.mime_type.clone(),
        })
        .collect();

    let prompts = mcp
        .prompts
        .iter()
        .map(|p| McpPrompt {
            name: p.name().to_string(),
            description: p.description().to_string(),
        })
        .collect();

    Ok(McpApp::new(
        mcp.server_name().to_string(),
        mcp.server_version().to_string(),
        transport,
        tools,
        resources,
        prompts,
        mcp.middlewares.clone(),
    ))
}

fn app_to_wire(app: &App) -> settings::AppDefinition {
    let config = match &app.config {
        AppConfig::Echo(echo) => settings::app_definition::Config::Echo(settings::EchoApp {
            response: Some(echo.response.clone()),
        }),
        AppConfig::Script(script) => {
            settings::app_definition::Config::Script(script_to_wire(script))
        }
        AppConfig::Mcp(mcp) => settings::app_definition::Config::Mcp(mcp_to_wire(mcp)),
        AppConfig::CompositeScript(composite) => {
            settings::app_definition::Config::CompositeScript(settings::CompositeScriptApp {
                script_app_ids: composite.script_app_ids.clone(),
                static_data: composite.static_data.as_ref().map(json_to_struct),
            })
        }
    };

    settings::AppDefinition {
        id: Some(app.id.clone()),
        config: Some(config),
    }
}

fn script_to_wire(script: &ScriptApp) -> settings::ScriptApp {
    let evaluator = match &script.evaluator {
        Evaluator::Risor(e) => {
            settings::script_app::Evaluator::Risor(settings::RisorEvaluator {
                code: Some(e.code.clone()),
                timeout: e.timeout.map(duration_to_wire),
            })
        }
        Evaluator::Starlark(e) => {
            settings::script_app::Evaluator::Starlark(settings::StarlarkEvaluator {
                code: Some(e.code.clone()),
                timeout: e.timeout.map(duration_to_wire),
            })
        }
        Evaluator::Extism(e) => {
            settings::script_app::Evaluator::Extism(settings::ExtismEvaluator {
                code: Some(e.code.clone()),
                entrypoint: Some(e.entrypoint.clone()),
            })
        }
    };

    settings::ScriptApp {
        static_data: script.static_data.as_ref().map(json_to_struct),
        timeout: script.timeout.map(duration_to_wire),
        evaluator: Some(evaluator),
    }
}

fn mcp_to_wire(mcp: &McpApp) -> settings::McpApp {
    let transport = mcp.transport.as_ref().map(|t| match t {
        McpTransport::StreamableHttp { path } => settings::mcp_app::Transport::StreamableHttp(
            settings::McpStreamableHttpTransport {
                path: Some(path.clone()),
            },
        ),
        McpTransport::Sse { path } => settings::mcp_app::Transport::Sse(settings::McpSseTransport {
            path: Some(path.clone()),
        }),
    });

    let tools = mcp
        .tools
        .iter()
        .map(|tool| {
            let handler = match &tool.handler {
                McpToolHandler::Script(script) => {
                    settings::mcp_tool::Handler::Script(script_to_wire(script))
                }
                McpToolHandler::Builtin(id) => {
                    settings::mcp_tool::Handler::Builtin(settings::BuiltinToolHandler {
                        id: Some(id.clone()),
                    })
                }
            };
            settings::McpTool {
                name: Some(tool.name.clone()),
                description: Some(tool.description.clone()),
                handler: Some(handler),
            }
        })
        .collect();

    settings::McpApp {
        server_name: Some(mcp.server_name.clone()),
        server_version: Some(mcp.server_version.clone()),
        tools,
        resources: mcp
            .resources
            .iter()
            .map(|r| settings::McpResource {
                name: Some(r.name.clone()),
                uri: Some(r.uri.clone()),
                mime_type: r.mime_type.clone(),
            })
            .collect(),
        prompts: mcp
            .prompts
            .iter()
            .map(|p| settings::McpPrompt {
                name: Some(p.name.clone()),
                description: Some(p.description.clone()),
            })
            .collect(),
        middlewares: mcp.middlewares.clone(),
        transport,
    }
}

// ---------------------------------------------------------------------
// Well-known type helpers
// ---------------------------------------------------------------------

fn duration_from_wire(
    duration: Option<&prost_types::Duration>,
    field: &str,
) -> Result<Duration, ConversionError> {
    match duration {
        None => Ok(Duration::ZERO),
        Some(d) if d.seconds < 0 || d.nanos < 0 => Err(ConversionError::NegativeValue {
            field: field.to_string(),
        }),
        Some(d) => Ok(Duration::new(d.seconds as u64, d.nanos as u32)),
    }
}

fn optional_duration_from_wire(
    duration: Option<&prost_types::Duration>,
    field: &str,
) -> Result<Option<Duration>, ConversionError> {
    match duration {
        None => Ok(None),
        some => duration_from_wire(some, field).map(Some),
    }
}

pub(crate) fn duration_to_wire(duration: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: duration.as_secs() as i64,
        nanos: duration.subsec_nanos() as i32,
    }
}

/// Convert a well-known `Struct` into JSON-shaped static data.
pub fn struct_to_json(data: &prost_types::Struct) -> StaticData {
    data.fields
        .iter()
        .map(|(key, value)| (key.clone(), value_to_json(value)))
        .collect()
}

fn value_to_json(value: &prost_types::Value) -> serde_json::Value {
    use prost_types::value::Kind;

    match &value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(struct_to_json(s)),
        Some(Kind::ListValue(l)) => {
            serde_json::Value::Array(l.values.iter().map(value_to_json).collect())
        }
    }
}

/// Convert JSON-shaped static data into a well-known `Struct`.
pub fn json_to_struct(data: &StaticData) -> prost_types::Struct {
    prost_types::Struct {
        fields: data
            .iter()
            .map(|(key, value)| (key.clone(), json_to_value(value)))
            .collect(),
    }
}

fn json_to_value(value: &serde_json::Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(*b),
        serde_json::Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Kind::StringValue(s.clone()),
        serde_json::Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_value).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(json_to_struct(map)),
    };

    prost_types::Value { kind: Some(kind) }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn wire_doc() -> settings::ServerConfig {
        settings::ServerConfig {
            version: Some("v1".to_string()),
            logging: Some(settings::LogOptions {
                format: Some(settings::log_options::Format::Json as i32),
                level: Some(settings::log_options::Level::Info as i32),
            }),
            listeners: vec![settings::Listener {
                id: Some("main".to_string()),
                address: Some(":8080".to_string()),
                protocol_options: Some(settings::listener::ProtocolOptions::Http(
                    settings::HttpListenerOptions {
                        read_timeout: Some(prost_types::Duration {
                            seconds: 30,
                            nanos: 0,
                        }),
                        ..Default::default()
                    },
                )),
            }],
            endpoints: vec![settings::Endpoint {
                id: Some("e1".to_string()),
                listener_ids: vec!["main".to_string()],
                routes: vec![settings::Route {
                    app_id: Some("a1".to_string()),
                    static_data: None,
                    rule: Some(settings::route::Rule::Http(settings::HttpRule {
                        path: Some("/echo".to_string()),
                        method: None,
                    })),
                }],
            }],
            apps: vec![settings::AppDefinition {
                id: Some("a1".to_string()),
                config: Some(settings::app_definition::Config::Echo(settings::EchoApp {
                    response: Some("hi".to_string()),
                })),
            }],
        }
    }

    #[test]
    fn test_from_wire_projects_domain_model() {
        let config = from_wire(&wire_doc()).expect("converts");
        assert_eq!(config.version, "v1");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(
            config.listeners[0].http_options().unwrap().read_timeout,
            Duration::from_secs(30)
        );
        assert_eq!(config.endpoints[0].listener_id, "main");
        assert_eq!(config.apps[0].id, "a1");
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let config = from_wire(&wire_doc()).expect("converts");
        let reparsed = from_wire(&to_wire(&config)).expect("round-trips");
        assert!(config.equals(&reparsed));
    }

    #[test]
    fn test_unknown_enum_degrades_to_unspecified() {
        let mut doc = wire_doc();
        doc.logging.as_mut().unwrap().format = Some(99);
        let config = from_wire(&doc).expect("converts");
        assert_eq!(config.logging.format, LogFormat::Unspecified);
    }

    #[test]
    fn test_missing_endpoint_id_fails() {
        let mut doc = wire_doc();
        doc.endpoints[0].id = None;
        assert_eq!(
            from_wire(&doc).unwrap_err(),
            ConversionError::MissingEndpointId { index: 0 }
        );
    }

    #[test]
    fn test_empty_listener_refs_fails() {
        let mut doc = wire_doc();
        doc.endpoints[0].listener_ids.clear();
        assert_eq!(
            from_wire(&doc).unwrap_err(),
            ConversionError::EmptyListenerRefs {
                endpoint_id: "e1".to_string()
            }
        );
    }

    #[test]
    fn test_legacy_listener_list_is_tolerated() {
        let mut doc = wire_doc();
        doc.endpoints[0]
            .listener_ids
            .push("secondary".to_string());
        let config = from_wire(&doc).expect("converts");
        assert_eq!(config.endpoints[0].listener_id, "main");
        assert_eq!(
            config.endpoints[0].extra_listener_ids,
            vec!["secondary".to_string()]
        );
        // The surplus id survives the trip back out.
        let out = to_wire(&config);
        assert_eq!(out.endpoints[0].listener_ids.len(), 2);
    }

    #[test]
    fn test_missing_app_variant_fails() {
        let mut doc = wire_doc();
        doc.apps[0].config = None;
        assert_eq!(
            from_wire(&doc).unwrap_err(),
            ConversionError::MissingAppVariant {
                app_id: "a1".to_string()
            }
        );
    }

    #[test]
    fn test_script_without_evaluator_fails() {
        let mut doc = wire_doc();
        doc.apps[0].config = Some(settings::app_definition::Config::Script(
            settings::ScriptApp::default(),
        ));
        assert_eq!(
            from_wire(&doc).unwrap_err(),
            ConversionError::MissingEvaluator {
                app_id: "a1".to_string()
            }
        );
    }

    #[test]
    fn test_negative_duration_fails() {
        let mut doc = wire_doc();
        if let Some(settings::listener::ProtocolOptions::Http(http)) =
            doc.listeners[0].protocol_options.as_mut()
        {
            http.read_timeout = Some(prost_types::Duration {
                seconds: -1,
                nanos: 0,
            });
        }
        assert!(matches!(
            from_wire(&doc).unwrap_err(),
            ConversionError::NegativeValue { .. }
        ));
    }

    #[test]
    fn test_static_data_survives_round_trip() {
        let mut doc = wire_doc();
        let data: StaticData = [
            ("name".to_string(), json!("svc")),
            ("weight".to_string(), json!(1.5)),
            ("flags".to_string(), json!([true, false])),
            ("nested".to_string(), json!({"k": "v"})),
            ("nothing".to_string(), json!(null)),
        ]
        .into_iter()
        .collect();
        doc.endpoints[0].routes[0].static_data = Some(json_to_struct(&data));

        let config = from_wire(&doc).expect("converts");
        let parsed = config.endpoints[0].routes[0].static_data.as_ref().unwrap();
        assert_eq!(parsed, &data);

        let out = to_wire(&config);
        let round = struct_to_json(out.endpoints[0].routes[0].static_data.as_ref().unwrap());
        assert_eq!(round, data);
    }

    #[test]
    fn test_script_app_round_trips() {
        let mut doc = wire_doc();
        doc.apps.push(settings::AppDefinition {
            id: Some("s1".to_string()),
            config: Some(settings::app_definition::Config::Script(
                settings::ScriptApp {
                    static_data: None,
                    timeout: Some(prost_types::Duration {
                        seconds: 10,
                        nanos: 0,
                    }),
                    evaluator: Some(settings::script_app::Evaluator::Starlark(
                        settings::StarlarkEvaluator {
                            code: Some("x = 1".to_string()),
                            timeout: None,
                        },
                    )),
                },
            )),
        });

        let config = from_wire(&doc).expect("converts");
        let app = config.find_app("s1").unwrap();
        let AppConfig::Script(script) = &app.config else {
            panic!("expected script app");
        };
        assert_eq!(script.timeout, Some(Duration::from_secs(10)));
        assert!(matches!(script.evaluator, Evaluator::Starlark(_)));

        let reparsed = from_wire(&to_wire(&config)).expect("round-trips");
        assert!(config.equals(&reparsed));
    }

    #[test]
    fn test_mcp_app_round_trips() {
        let mut doc = wire_doc();
        doc.apps.push(settings::AppDefinition {
            id: Some("tools".to_string()),
            config: Some(settings::app_definition::Config::Mcp(settings::McpApp {
                server_name: Some("tools".to_string()),
                server_version: Some("1.0.0".to_string()),
                tools: vec![settings::McpTool {
                    name: Some("lookup".to_string()),
                    description: Some("look things up".to_string()),
                    handler: Some(settings::mcp_tool::Handler::Builtin(
                        settings::BuiltinToolHandler {
                            id: Some("builtin:echo".to_string()),
                        },
                    )),
                }],
                resources: vec![settings::McpResource {
                    name: Some("readme".to_string()),
                    uri: Some("file:///README".to_string()),
                    mime_type: None,
                }],
                prompts: Vec::new(),
                middlewares: vec!["auth".to_string()],
                transport: Some(settings::mcp_app::Transport::StreamableHttp(
                    settings::McpStreamableHttpTransport {
                        path: Some("/mcp".to_string()),
                    },
                )),
            })),
        });

        let config = from_wire(&doc).expect("converts");
        let app = config.find_app("tools").unwrap();
        let AppConfig::Mcp(mcp) = &app.config else {
            panic!("expected mcp app");
        };
        assert_eq!(mcp.transport.as_ref().unwrap().path(), "/mcp");
        assert_eq!(mcp.tools[0].name, "lookup");
        assert_eq!(mcp.middlewares, vec!["auth".to_string()]);

        let reparsed = from_wire(&to_wire(&config)).expect("round-trips");
        assert!(config.equals(&reparsed));
    }

    #[test]
    fn test_mcp_tool_without_handler_fails() {
        let mut doc = wire_doc();
        doc.apps.push(settings::AppDefinition {
            id: Some("tools".to_string()),
            config: Some(settings::app_definition::Config::Mcp(settings::McpApp {
                tools: vec![settings::McpTool {
                    name: Some("orphan".to_string()),
                    description: None,
                    handler: None,
                }],
                ..Default::default()
            })),
        });
        assert_eq!(
            from_wire(&doc).unwrap_err(),
            ConversionError::MissingToolHandler {
                app_id: "tools".to_string(),
                tool: "orphan".to_string()
            }
        );
    }

    #[test]
    fn test_composite_app_round_trips() {
        let mut doc = wire_doc();
        doc.apps.push(settings::AppDefinition {
            id: Some("pipeline".to_string()),
            config: Some(settings::app_definition::Config::CompositeScript(
                settings::CompositeScriptApp {
                    script_app_ids: vec!["s1".to_string(), "s2".to_string()],
                    static_data: None,
                },
            )),
        });

        let config = from_wire(&doc).expect("converts");
        let AppConfig::CompositeScript(composite) = &config.find_app("pipeline").unwrap().config
        else {
            panic!("expected composite app");
        };
        assert_eq!(composite.script_app_ids.len(), 2);

        let reparsed = from_wire(&to_wire(&config)).expect("round-trips");
        assert!(config.equals(&reparsed));
    }

    #[test]
    fn test_absent_scalars_stay_distinct_from_empty() {
        let mut doc = wire_doc();
        doc.version = None;
        let config = from_wire(&doc).expect("converts");
        // Accessor default: absent projects to empty, which validation
        // then rejects as unsupported.
        assert_eq!(config.version, "");
    }
}
