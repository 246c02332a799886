//! App model: addressable units of compute
//!
//! Four variants: echo (fixed response), script (embedded evaluator),
//! MCP (embedded tool server), and composite (a sequence of script
//! apps). Script and MCP configs carry a compile step invoked from
//! validation; the compiled artifact is cached on the config so the
//! runtime consumes it without reparsing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use thiserror::Error;

use super::StaticData;

/// Registered built-in app ids that routes may reference without a
/// matching app definition.
pub mod builtin {
    /// Built-in echo app: replies with the request body.
    pub const ECHO: &str = "builtin:echo";

    /// Every registered built-in app id.
    pub fn ids() -> &'static [&'static str] {
        &[ECHO]
    }

    /// Whether `id` names a registered built-in app.
    pub fn is_builtin(id: &str) -> bool {
        ids().contains(&id)
    }
}

/// An addressable unit of compute.
#[derive(Debug, Clone)]
pub struct App {
    pub id: String,
    pub config: AppConfig,
}

impl App {
    /// The evaluator kind, when this is a script app.
    pub fn evaluator_kind(&self) -> Option<EvaluatorKind> {
        match &self.config {
            AppConfig::Script(s) => Some(s.evaluator.kind()),
            _ => None,
        }
    }
}

/// App configuration variant. The variant is the app's type; there is
/// no separate discriminator.
#[derive(Debug, Clone)]
pub enum AppConfig {
    Echo(EchoApp),
    Script(ScriptApp),
    Mcp(McpApp),
    CompositeScript(CompositeScriptApp),
}

impl AppConfig {
    /// Stable variant name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Echo(_) => "echo",
            Self::Script(_) => "script",
            Self::Mcp(_) => "mcp",
            Self::CompositeScript(_) => "composite_script",
        }
    }

    /// The variant's static data slot, when it has one.
    pub fn static_data(&self) -> Option<&StaticData> {
        match self {
            Self::Script(s) => s.static_data.as_ref(),
            Self::CompositeScript(c) => c.static_data.as_ref(),
            Self::Echo(_) | Self::Mcp(_) => None,
        }
    }

    /// Replace the static data slot, for variants that carry one.
    /// Route expansion uses this to install merged data on clones.
    pub(crate) fn set_static_data(&mut self, data: StaticData) {
        match self {
            Self::Script(s) => s.static_data = Some(data),
            Self::CompositeScript(c) => c.static_data = Some(data),
            Self::Echo(_) | Self::Mcp(_) => {}
        }
    }

    /// Compile the variant's embedded sources and register its
    /// schemas. Idempotent: repeated calls reuse the cached artifact.
    pub fn compile(&self) -> Result<(), CompileError> {
        match self {
            Self::Script(s) => s.compile().map(|_| ()),
            Self::Mcp(m) => m.compile().map(|_| ()),
            Self::Echo(_) | Self::CompositeScript(_) => Ok(()),
        }
    }
}

/// Echo app: replies with a fixed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoApp {
    pub response: String,
}

/// Script app: an embedded evaluator plus optional static data and an
/// overall execution timeout.
#[derive(Debug, Clone)]
pub struct ScriptApp {
    pub evaluator: Evaluator,
    pub static_data: Option<StaticData>,
    pub timeout: Option<Duration>,

    compiled: OnceCell<Arc<CompiledScript>>,
}

impl ScriptApp {
    pub fn new(
        evaluator: Evaluator,
        static_data: Option<StaticData>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            evaluator,
            static_data,
            timeout,
            compiled: OnceCell::new(),
        }
    }

    /// Compile the evaluator source, caching the artifact.
    pub fn compile(&self) -> Result<&Arc<CompiledScript>, CompileError> {
        self.compiled
            .get_or_try_init(|| self.evaluator.compile().map(Arc::new))
    }

    /// The compiled artifact, present once validation has run.
    pub fn compiled(&self) -> Option<&Arc<CompiledScript>> {
        self.compiled.get()
    }
}

/// Script evaluator variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluator {
    Risor(RisorEvaluator),
    Starlark(StarlarkEvaluator),
    Extism(ExtismEvaluator),
}

impl Evaluator {
    pub fn kind(&self) -> EvaluatorKind {
        match self {
            Self::Risor(_) => EvaluatorKind::Risor,
            Self::Starlark(_) => EvaluatorKind::Starlark,
            Self::Extism(_) => EvaluatorKind::Extism,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::Risor(e) => &e.code,
            Self::Starlark(e) => &e.code,
            Self::Extism(e) => &e.code,
        }
    }

    fn compile(&self) -> Result<CompiledScript, CompileError> {
        let source = self.source();
        if source.trim().is_empty() {
            return Err(CompileError::EmptySource {
                evaluator: self.kind(),
            });
        }
        if let Self::Extism(e) = self {
            if e.entrypoint.is_empty() {
                return Err(CompileError::MissingEntrypoint);
            }
        }
        Ok(CompiledScript {
            kind: self.kind(),
            source_hash: blake3::hash(source.as_bytes()),
            source_len: source.len(),
        })
    }
}

/// Script evaluator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluatorKind {
    Risor,
    Starlark,
    Extism,
}

impl std::fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Risor => write!(f, "risor"),
            Self::Starlark => write!(f, "starlark"),
            Self::Extism => write!(f, "extism"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RisorEvaluator {
    pub code: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarlarkEvaluator {
    pub code: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtismEvaluator {
    /// Base64-encoded WASM module.
    pub code: String,
    pub entrypoint: String,
}

/// Parsed-and-cached script artifact. The content hash gives compiled
/// artifacts a stable identity across repeated validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    pub kind: EvaluatorKind,
    pub source_hash: blake3::Hash,
    pub source_len: usize,
}

/// Embedded MCP tool server definition.
#[derive(Debug, Clone)]
pub struct McpApp {
    pub server_name: String,
    pub server_version: String,
    pub transport: Option<McpTransport>,
    pub tools: Vec<McpTool>,
    pub resources: Vec<McpResource>,
    pub prompts: Vec<McpPrompt>,
    pub middlewares: Vec<String>,

    compiled: OnceCell<Arc<CompiledMcpServer>>,
}

impl McpApp {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_name: String,
        server_version: String,
        transport: Option<McpTransport>,
        tools: Vec<McpTool>,
        resources: Vec<McpResource>,
        prompts: Vec<McpPrompt>,
        middlewares: Vec<String>,
    ) -> Self {
        Self {
            server_name,
            server_version,
            transport,
            tools,
            resources,
            prompts,
            middlewares,
            compiled: OnceCell::new(),
        }
    }

    /// Compile the server definition: check the transport, register
    /// tool/resource/prompt names, and compile tool scripts. Cached.
    pub fn compile(&self) -> Result<&Arc<CompiledMcpServer>, CompileError> {
        self.compiled.get_or_try_init(|| {
            let path = match &self.transport {
                Some(t) => {
                    let path = t.path();
                    if path.is_empty() {
                        return Err(CompileError::EmptyTransportPath);
                    }
                    if !path.starts_with('/') {
                        return Err(CompileError::RelativeTransportPath {
                            path: path.to_string(),
                        });
                    }
                    path.to_string()
                }
                None => return Err(CompileError::MissingTransport),
            };

            let mut tool_names = Vec::with_capacity(self.tools.len());
            let mut seen = HashSet::new();
            for tool in &self.tools {
                if tool.name.is_empty() {
                    return Err(CompileError::UnnamedTool);
                }
                if !seen.insert(tool.name.as_str()) {
                    return Err(CompileError::DuplicateToolName {
                        name: tool.name.clone(),
                    });
                }
                match &tool.handler {
                    McpToolHandler::Script(script) => {
                        script.compile()?;
                    }
                    McpToolHandler::Builtin(id) => {
                        if id.is_empty() {
                            return Err(CompileError::EmptyBuiltinHandler {
                                tool: tool.name.clone(),
                            });
                        }
                    }
                }
                tool_names.push(tool.name.clone());
            }

            for resource in &self.resources {
                if resource.name.is_empty() || resource.uri.is_empty() {
                    return Err(CompileError::InvalidResource {
                        name: resource.name.clone(),
                    });
                }
            }
            for prompt in &self.prompts {
                if prompt.name.is_empty() {
                    return Err(CompileError::UnnamedPrompt);
                }
            }
            for middleware in &self.middlewares {
                if middleware.is_empty() {
                    return Err(CompileError::EmptyMiddlewareRef);
                }
            }

            Ok(Arc::new(CompiledMcpServer { path, tool_names }))
        })
    }

    /// The compiled artifact, present once validation has run.
    pub fn compiled(&self) -> Option<&Arc<CompiledMcpServer>> {
        self.compiled.get()
    }
}

/// Transport the embedded MCP server is exposed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpTransport {
    StreamableHttp { path: String },
    Sse { path: String },
}

impl McpTransport {
    pub fn path(&self) -> &str {
        match self {
            Self::StreamableHttp { path } | Self::Sse { path } => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    pub handler: McpToolHandler,
}

#[derive(Debug, Clone)]
pub enum McpToolHandler {
    Script(ScriptApp),
    Builtin(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpResource {
    pub name: String,
    pub uri: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpPrompt {
    pub name: String,
    pub description: String,
}

/// Registered-and-checked MCP server artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMcpServer {
    pub path: String,
    pub tool_names: Vec<String>,
}

/// Composition of script apps evaluated in sequence.
#[derive(Debug, Clone)]
pub struct CompositeScriptApp {
    pub script_app_ids: Vec<String>,
    pub static_data: Option<StaticData>,
}

/// Compilation failure for a script or MCP app config. Surfaces as a
/// regular validation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("{evaluator} source is empty")]
    EmptySource { evaluator: EvaluatorKind },

    #[error("extism evaluator has no entrypoint")]
    MissingEntrypoint,

    #[error("mcp server has no transport")]
    MissingTransport,

    #[error("mcp transport path is empty")]
    EmptyTransportPath,

    #[error("mcp transport path {path:?} must start with '/'")]
    RelativeTransportPath { path: String },

    #[error("mcp tool has no name")]
    UnnamedTool,

    #[error("duplicate mcp tool name {name:?}")]
    DuplicateToolName { name: String },

    #[error("mcp tool {tool:?} has an empty builtin handler id")]
    EmptyBuiltinHandler { tool: String },

    #[error("mcp resource {name:?} needs both a name and a uri")]
    InvalidResource { name: String },

    #[error("mcp prompt has no name")]
    UnnamedPrompt,

    #[error("mcp middleware reference is empty")]
    EmptyMiddlewareRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risor_script(code: &str) -> ScriptApp {
        ScriptApp::new(
            Evaluator::Risor(RisorEvaluator {
                code: code.to_string(),
                timeout: None,
            }),
            None,
            None,
        )
    }

    #[test]
    fn test_script_compile_caches_artifact() {
        let script = risor_script("print(\"hi\")");
        let first = script.compile().expect("compiles").clone();
        let second = script.compile().expect("compiles").clone();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind, EvaluatorKind::Risor);
    }

    #[test]
    fn test_script_compile_is_deterministic() {
        let a = risor_script("x := 1");
        let b = risor_script("x := 1");
        assert_eq!(
            a.compile().expect("compiles").source_hash,
            b.compile().expect("compiles").source_hash
        );
    }

    #[test]
    fn test_empty_script_source_fails() {
        let script = risor_script("   ");
        assert_eq!(
            script.compile().unwrap_err(),
            CompileError::EmptySource {
                evaluator: EvaluatorKind::Risor
            }
        );
    }

    #[test]
    fn test_extism_requires_entrypoint() {
        let script = ScriptApp::new(
            Evaluator::Extism(ExtismEvaluator {
                code: "AGFzbQ==".to_string(),
                entrypoint: String::new(),
            }),
            None,
            None,
        );
        assert_eq!(script.compile().unwrap_err(), CompileError::MissingEntrypoint);
    }

    fn mcp_app(tools: Vec<McpTool>) -> McpApp {
        McpApp::new(
            "tools".to_string(),
            "1.0.0".to_string(),
            Some(McpTransport::StreamableHttp {
                path: "/mcp".to_string(),
            }),
            tools,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_mcp_compile_registers_tool_names() {
        let app = mcp_app(vec![McpTool {
            name: "lookup".to_string(),
            description: String::new(),
            handler: McpToolHandler::Builtin("builtin:echo".to_string()),
        }]);
        let compiled = app.compile().expect("compiles");
        assert_eq!(compiled.tool_names, vec!["lookup".to_string()]);
        assert_eq!(compiled.path, "/mcp");
    }

    #[test]
    fn test_mcp_duplicate_tool_names_rejected() {
        let tool = McpTool {
            name: "lookup".to_string(),
            description: String::new(),
            handler: McpToolHandler::Builtin("builtin:echo".to_string()),
        };
        let app = mcp_app(vec![tool.clone(), tool]);
        assert_eq!(
            app.compile().unwrap_err(),
            CompileError::DuplicateToolName {
                name: "lookup".to_string()
            }
        );
    }

    #[test]
    fn test_mcp_requires_transport() {
        let mut app = mcp_app(Vec::new());
        app.transport = None;
        assert_eq!(app.compile().unwrap_err(), CompileError::MissingTransport);
    }

    #[test]
    fn test_builtin_registry() {
        assert!(builtin::is_builtin(builtin::ECHO));
        assert!(!builtin::is_builtin("a1"));
    }
}
