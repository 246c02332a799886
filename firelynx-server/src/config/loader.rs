//! TOML document loader
//!
//! Parses a single TOML document into a generic tree and projects it
//! onto the wire schema through one canonical mapping. The loader is
//! purely syntactic: unknown keys fail with a path-qualified error,
//! durations use the human grammar (`"30s"`, `"5m"`), and every
//! semantic check lives in the validator.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::proto::settings;

use super::wire::{duration_to_wire, json_to_struct};
use super::StaticData;

/// Load and project a TOML configuration file.
pub fn load_file(path: impl AsRef<Path>) -> Result<settings::ServerConfig> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    load_str(&raw)
}

/// Load and project a TOML configuration document from a string.
pub fn load_str(raw: &str) -> Result<settings::ServerConfig> {
    let document: Document = Figment::from(Toml::string(raw)).extract()?;
    project(document).map_err(Error::from)
}

// ---------------------------------------------------------------------
// Projection structs (isomorphic to the wire schema)
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    version: Option<String>,
    logging: Option<LoggingSection>,
    #[serde(default)]
    listeners: Vec<ListenerSection>,
    #[serde(default)]
    endpoints: Vec<EndpointSection>,
    #[serde(default)]
    apps: Vec<AppSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingSection {
    format: Option<FormatName>,
    level: Option<LevelName>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FormatName {
    Unspecified,
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LevelName {
    Unspecified,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListenerSection {
    id: Option<String>,
    address: Option<String>,
    http: Option<HttpOptionsSection>,
    grpc: Option<GrpcOptionsSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpOptionsSection {
    #[serde(default, with = "humantime_serde")]
    read_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    write_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    idle_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    drain_timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrpcOptionsSection {
    #[serde(default, with = "humantime_serde")]
    max_connection_idle: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    max_connection_age: Option<Duration>,
    max_concurrent_streams: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EndpointSection {
    id: Option<String>,
    listener_id: Option<String>,
    #[serde(default)]
    listener_ids: Vec<String>,
    #[serde(default)]
    routes: Vec<RouteSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteSection {
    app_id: Option<String>,
    http_path: Option<String>,
    http_method: Option<String>,
    grpc_service: Option<String>,
    mcp_resource: Option<String>,
    static_data: Option<StaticData>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppSection {
    id: Option<String>,
    echo: Option<EchoSection>,
    script: Option<ScriptSection>,
    mcp: Option<McpSection>,
    composite_script: Option<CompositeSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EchoSection {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptSection {
    static_data: Option<StaticData>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    risor: Option<CodeSection>,
    starlark: Option<CodeSection>,
    extism: Option<ExtismSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CodeSection {
    code: Option<String>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtismSection {
    code: Option<String>,
    entrypoint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McpSection {
    server_name: Option<String>,
    server_version: Option<String>,
    streamable_http: Option<TransportSection>,
    sse: Option<TransportSection>,
    #[serde(default)]
    tools: Vec<McpToolSection>,
    #[serde(default)]
    resources: Vec<McpResourceSection>,
    #[serde(default)]
    prompts: Vec<McpPromptSection>,
    #[serde(default)]
    middlewares: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransportSection {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McpToolSection {
    name: Option<String>,
    description: Option<String>,
    script: Option<ScriptSection>,
    builtin: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McpResourceSection {
    name: Option<String>,
    uri: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McpPromptSection {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompositeSection {
    #[serde(default)]
    script_app_ids: Vec<String>,
    static_data: Option<StaticData>,
}

// ---------------------------------------------------------------------
// Projection onto the wire schema
// ---------------------------------------------------------------------

fn project(document: Document) -> std::result::Result<settings::ServerConfig, figment::Error> {
    Ok(settings::ServerConfig {
        version: document.version,
        logging: document.logging.map(project_logging),
        listeners: document
            .listeners
            .into_iter()
            .enumerate()
            .map(|(i, l)| project_listener(i, l))
            .collect::<std::result::Result<_, _>>()?,
        endpoints: document
            .endpoints
            .into_iter()
            .enumerate()
            .map(|(i, e)| project_endpoint(i, e))
            .collect::<std::result::Result<_, _>>()?,
        apps: document
            .apps
            .into_iter()
            .enumerate()
            .map(|(i, a)| project_app(i, a))
            .collect::<std::result::Result<_, _>>()?,
    })
}

fn project_logging(section: LoggingSection) -> settings::LogOptions {
    let format = section.format.map(|f| {
        let value = match f {
            FormatName::Unspecified => settings::log_options::Format::Unspecified,
            FormatName::Text => settings::log_options::Format::Txt,
            FormatName::Json => settings::log_options::Format::Json,
        };
        value as i32
    });
    let level = section.level.map(|l| {
        let value = match l {
            LevelName::Unspecified => settings::log_options::Level::Unspecified,
            LevelName::Debug => settings::log_options::Level::Debug,
            LevelName::Info => settings::log_options::Level::Info,
            LevelName::Warn => settings::log_options::Level::Warn,
            LevelName::Error => settings::log_options::Level::Error,
            LevelName::Fatal => settings::log_options::Level::Fatal,
        };
        value as i32
    });
    settings::LogOptions { format, level }
}

fn project_listener(
    index: usize,
    section: ListenerSection,
) -> std::result::Result<settings::Listener, figment::Error> {
    let protocol_options = match (section.http, section.grpc) {
        (Some(_), Some(_)) => {
            return Err(figment::Error::from(format!(
                "listeners[{}]: a listener declares exactly one of `http` or `grpc`",
                index
            )))
        }
        (Some(http), None) => Some(settings::listener::ProtocolOptions::Http(
            settings::HttpListenerOptions {
                read_timeout: http.read_timeout.map(duration_to_wire),
                write_timeout: http.write_timeout.map(duration_to_wire),
                idle_timeout: http.idle_timeout.map(duration_to_wire),
                drain_timeout: http.drain_timeout.map(duration_to_wire),
            },
        )),
        (None, Some(grpc)) => Some(settings::listener::ProtocolOptions::Grpc(
            settings::GrpcListenerOptions {
                max_connection_idle: grpc.max_connection_idle.map(duration_to_wire),
                max_connection_age: grpc.max_connection_age.map(duration_to_wire),
                max_concurrent_streams: grpc.max_concurrent_streams,
            },
        )),
        (None, None) => None,
    };

    Ok(settings::Listener {
        id: section.id,
        address: section.address,
        protocol_options,
    })
}

fn project_endpoint(
    index: usize,
    section: EndpointSection,
) -> std::result::Result<settings::Endpoint, figment::Error> {
    // Canonical single id first, then any legacy list entries; the
    // validator rejects the multi-listener form.
    let mut listener_ids = Vec::new();
    if let Some(id) = section.listener_id {
        listener_ids.push(id);
    }
    listener_ids.extend(section.listener_ids);

    let routes = section
        .routes
        .into_iter()
        .enumerate()
        .map(|(route_index, r)| project_route(index, route_index, r))
        .collect::<std::result::Result<_, _>>()?;

    Ok(settings::Endpoint {
        id: section.id,
        listener_ids,
        routes,
    })
}

fn project_route(
    endpoint_index: usize,
    route_index: usize,
    section: RouteSection,
) -> std::result::Result<settings::Route, figment::Error> {
    let at = || format!("endpoints[{}].routes[{}]", endpoint_index, route_index);

    if section.mcp_resource.is_some() {
        return Err(figment::Error::from(format!(
            "{}: mcp_resource conditions are not yet supported",
            at()
        )));
    }

    let conditions =
        usize::from(section.http_path.is_some()) + usize::from(section.grpc_service.is_some());
    if conditions > 1 {
        return Err(figment::Error::from(format!(
            "{}: a route declares at most one condition",
            at()
        )));
    }
    if section.http_method.is_some() && section.http_path.is_none() {
        return Err(figment::Error::from(format!(
            "{}: http_method requires http_path",
            at()
        )));
    }

    let rule = if let Some(path) = section.http_path {
        Some(settings::route::Rule::Http(settings::HttpRule {
            path: Some(path),
            method: section.http_method,
        }))
    } else {
        section.grpc_service.map(|service| {
            settings::route::Rule::Grpc(settings::GrpcRule {
                service: Some(service),
            })
        })
    };

    Ok(settings::Route {
        app_id: section.app_id,
        static_data: section.static_data.as_ref().map(json_to_struct),
        rule,
    })
}

fn project_app(
    index: usize,
    section: AppSection,
) -> std::result::Result<settings::AppDefinition, figment::Error> {
    let variants = usize::from(section.echo.is_some())
        + usize::from(section.script.is_some())
        + usize::from(section.mcp.is_some())
        + usize::from(section.composite_script.is_some());
    if variants > 1 {
        return Err(figment::Error::from(format!(
            "apps[{}]: an app declares exactly one config variant",
            index
        )));
    }

    let config = if let Some(echo) = section.echo {
        Some(settings::app_definition::Config::Echo(settings::EchoApp {
            response: echo.response,
        }))
    } else if let Some(script) = section.script {
        Some(settings::app_definition::Config::Script(project_script(
            index, script,
        )?))
    } else if let Some(mcp) = section.mcp {
        Some(settings::app_definition::Config::Mcp(project_mcp(
            index, mcp,
        )?))
    } else {
        section.composite_script.map(|composite| {
            settings::app_definition::Config::CompositeScript(settings::CompositeScriptApp {
                script_app_ids: composite.script_app_ids,
                static_data: composite.static_data.as_ref().map(json_to_struct),
            })
        })
    };

    Ok(settings::AppDefinition {
        id: section.id,
        config,
    })
}

fn project_script(
    index: usize,
    section: ScriptSection,
) -> std::result::Result<settings::ScriptApp, figment::Error> {
    let evaluators = usize::from(section.risor.is_some())
        + usize::from(section.starlark.is_some())
        + usize::from(section.extism.is_some());
    if evaluators > 1 {
        return Err(figment::Error::from(format!(
            "apps[{}].script: a script declares at most one evaluator",
            index
        )));
    }

    let evaluator = if let Some(risor) = section.risor {
        Some(settings::script_app::Evaluator::Risor(
            settings::RisorEvaluator {
                code: risor.code,
                timeout: risor.timeout.map(duration_to_wire),
            },
        ))
    } else if let Some(starlark) = section.starlark {
        Some(settings::script_app::Evaluator::Starlark(
            settings::StarlarkEvaluator {
                code: starlark.code,
                timeout: starlark.timeout.map(duration_to_wire),
            },
        ))
    } else {
        section.extism.map(|extism| {
            settings::script_app::Evaluator::Extism(settings::ExtismEvaluator {
                code: extism.code,
                entrypoint: extism.entrypoint,
            })
        })
    };

    Ok(settings::ScriptApp {
        static_data: section.static_data.as_ref().map(json_to_struct),
        timeout: section.timeout.map(duration_to_wire),
        evaluator,
    })
}

fn project_mcp(
    index: usize,
    section: McpSection,
) -> std::result::Result<settings::McpApp, figment::Error> {
    let transport = match (section.streamable_http, section.sse) {
        (Some(_), Some(_)) => {
            return Err(figment::Error::from(format!(
                "apps[{}].mcp: an mcp server declares at most one transport",
                index
            )))
        }
        (Some(t), None) => Some(settings::mcp_app::Transport::StreamableHttp(
            settings::McpStreamableHttpTransport { path: t.path },
        )),
        (None, Some(t)) => Some(settings::mcp_app::Transport::Sse(
            settings::McpSseTransport { path: t.path },
        )),
        (None, None) => None,
    };

    let tools = section
        .tools
        .into_iter()
        .map(|tool| {
            if tool.script.is_some() && tool.builtin.is_some() {
                return Err(figment::Error::from(format!(
                    "apps[{}].mcp.tools: a tool declares at most one handler",
                    index
                )));
            }
            let handler = if let Some(script) = tool.script {
                Some(settings::mcp_tool::Handler::Script(project_script(
                    index, script,
                )?))
            } else {
                tool.builtin.map(|id| {
                    settings::mcp_tool::Handler::Builtin(settings::BuiltinToolHandler {
                        id: Some(id),
                    })
                })
            };
            Ok(settings::McpTool {
                name: tool.name,
                description: tool.description,
                handler,
            })
        })
        .collect::<std::result::Result<_, figment::Error>>()?;

    Ok(settings::McpApp {
        server_name: section.server_name,
        server_version: section.server_version,
        tools,
        resources: section
            .resources
            .into_iter()
            .map(|r| settings::McpResource {
                name: r.name,
                uri: r.uri,
                mime_type: r.mime_type,
            })
            .collect(),
        prompts: section
            .prompts
            .into_iter()
            .map(|p| settings::McpPrompt {
                name: p.name,
                description: p.description,
            })
            .collect(),
        middlewares: section.middlewares,
        transport,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::wire::from_wire;
    use crate::config::{LogFormat, LogLevel};

    const HAPPY_PATH: &str = r#"
version = "v1"

[logging]
format = "json"
level = "info"

[[listeners]]
id = "main"
address = ":8080"

[listeners.http]
read_timeout = "30s"
drain_timeout = "5m"

[[endpoints]]
id = "e1"
listener_id = "main"

[[endpoints.routes]]
app_id = "a1"
http_path = "/echo"

[[apps]]
id = "a1"

[apps.echo]
response = "hi"
"#;

    #[test]
    fn test_happy_path_loads_and_validates() {
        let doc = load_str(HAPPY_PATH).expect("loads");
        let config = from_wire(&doc).expect("converts");
        config.validate().expect("valid");

        assert_eq!(config.listeners[0].id, "main");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, LogLevel::Info);
        let http = config.listeners[0].http_options().unwrap();
        assert_eq!(http.read_timeout, Duration::from_secs(30));
        assert_eq!(http.drain_timeout, Duration::from_secs(300));
        // Unset durations defer to the runtime default (zero).
        assert_eq!(http.write_timeout, Duration::ZERO);
    }

    #[test]
    fn test_unknown_top_level_key_fails() {
        let err = load_str("version = \"v1\"\nwat = 1\n").unwrap_err();
        assert!(err.to_string().contains("wat"));
    }

    #[test]
    fn test_unknown_nested_key_fails() {
        let toml = r#"
[[listeners]]
id = "main"
address = ":8080"
bogus = true
"#;
        let err = load_str(toml).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_bad_duration_grammar_fails() {
        let toml = r#"
[[listeners]]
id = "main"
address = ":8080"

[listeners.http]
read_timeout = "fast"
"#;
        assert!(load_str(toml).is_err());
    }

    #[test]
    fn test_listener_with_both_protocols_fails() {
        let toml = r#"
[[listeners]]
id = "main"
address = ":8080"

[listeners.http]

[listeners.grpc]
"#;
        let err = load_str(toml).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_route_with_two_conditions_fails() {
        let toml = r#"
[[endpoints]]
id = "e1"
listener_id = "main"

[[endpoints.routes]]
app_id = "a1"
http_path = "/x"
grpc_service = "svc"
"#;
        let err = load_str(toml).unwrap_err();
        assert!(err.to_string().contains("at most one condition"));
    }

    #[test]
    fn test_mcp_resource_condition_rejected() {
        let toml = r#"
[[endpoints]]
id = "e1"
listener_id = "main"

[[endpoints.routes]]
app_id = "a1"
mcp_resource = "r"
"#;
        let err = load_str(toml).unwrap_err();
        assert!(err.to_string().contains("not yet supported"));
    }

    #[test]
    fn test_http_method_requires_path() {
        let toml = r#"
[[endpoints]]
id = "e1"
listener_id = "main"

[[endpoints.routes]]
app_id = "a1"
http_method = "GET"
"#;
        let err = load_str(toml).unwrap_err();
        assert!(err.to_string().contains("http_method requires http_path"));
    }

    #[test]
    fn test_legacy_listener_ids_list_accepted() {
        let toml = r#"
[[endpoints]]
id = "e1"
listener_ids = ["main", "backup"]
"#;
        let doc = load_str(toml).expect("loads");
        assert_eq!(doc.endpoints[0].listener_ids, vec!["main", "backup"]);
    }

    #[test]
    fn test_static_data_table_parses() {
        let toml = r#"
[[endpoints]]
id = "e1"
listener_id = "main"

[[endpoints.routes]]
app_id = "a1"
http_path = "/x"

[endpoints.routes.static_data]
tenant = "one"
weight = 2.5
enabled = true
"#;
        let doc = load_str(toml).expect("loads");
        let data = doc.endpoints[0].routes[0].static_data.as_ref().unwrap();
        assert_eq!(data.fields.len(), 3);
    }

    #[test]
    fn test_script_app_with_risor_evaluator() {
        let toml = r#"
[[apps]]
id = "s1"

[apps.script]
timeout = "10s"

[apps.script.risor]
code = "x := 1"
"#;
        let doc = load_str(toml).expect("loads");
        let config = from_wire(&doc).expect("converts");
        let app = config.find_app("s1").unwrap();
        assert_eq!(
            app.evaluator_kind(),
            Some(crate::config::EvaluatorKind::Risor)
        );
    }

    #[test]
    fn test_mcp_app_with_tools_loads() {
        let toml = r#"
[[apps]]
id = "tools"

[apps.mcp]
server_name = "tools"
server_version = "1.0.0"
middlewares = ["auth"]

[apps.mcp.streamable_http]
path = "/mcp"

[[apps.mcp.tools]]
name = "lookup"
builtin = "builtin:echo"

[[apps.mcp.tools]]
name = "transform"

[apps.mcp.tools.script.risor]
code = "x := input"

[[apps.mcp.resources]]
name = "readme"
uri = "file:///README"
"#;
        let doc = load_str(toml).expect("loads");
        let config = from_wire(&doc).expect("converts");
        config.validate().expect("valid");

        let app = config.find_app("tools").unwrap();
        let crate::config::AppConfig::Mcp(mcp) = &app.config else {
            panic!("expected mcp app");
        };
        assert_eq!(mcp.tools.len(), 2);
        assert_eq!(mcp.resources[0].uri, "file:///README");
        assert_eq!(mcp.compiled().unwrap().tool_names, vec!["lookup", "transform"]);
    }

    #[test]
    fn test_composite_app_references_load() {
        let toml = r#"
[[apps]]
id = "s1"

[apps.script.risor]
code = "x := 1"

[[apps]]
id = "pipeline"

[apps.composite_script]
script_app_ids = ["s1"]
"#;
        let doc = load_str(toml).expect("loads");
        let config = from_wire(&doc).expect("converts");
        config.validate().expect("valid");
    }

    #[test]
    fn test_app_with_two_variants_fails() {
        let toml = r#"
[[apps]]
id = "a"

[apps.echo]
response = "hi"

[apps.script.risor]
code = "x := 1"
"#;
        let err = load_str(toml).unwrap_err();
        assert!(err.to_string().contains("exactly one config variant"));
    }

    #[test]
    fn test_load_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(HAPPY_PATH.as_bytes()).expect("write");
        let doc = load_file(file.path()).expect("loads");
        assert_eq!(doc.version(), "v1");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_file("/nonexistent/firelynx.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
