//! MCP server exposing the digest as tools over stdio

use chrono::Utc;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::{expand_path, ConfigSource, Settings, SettingsLayer};
use crate::digest::{build_report, DigestOptions};

// --- Tool parameter structs ---

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct UpdatesParams {
    /// Path to a repos.yaml (default: ./repos.yaml or ~/.config/git-digest/repos.yaml)
    config_path: Option<String>,
    /// Only show commits and tags new since the last run, and record this run
    #[serde(default)]
    changes_only: bool,
    /// Condense the report with a local Ollama model
    #[serde(default)]
    use_ai_summary: bool,
    /// Ollama model for the summary (default: from config or OLLAMA_MODEL)
    ollama_model: Option<String>,
    /// Report title (default: from config or GIT_DIGEST_DEFAULT_TITLE)
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct ListParams {
    /// Path to a repos.yaml (default: the usual search locations)
    config_path: Option<String>,
}

// --- MCP Server ---

/// MCP server over the same configuration as the CLI
#[derive(Clone)]
pub struct DigestServer {
    source: ConfigSource,
    overrides: SettingsLayer,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DigestServer {
    pub fn new(source: ConfigSource, overrides: SettingsLayer) -> Self {
        Self {
            source,
            overrides,
            tool_router: Self::tool_router(),
        }
    }

    /// Settings for one call; `config_path` replaces any configured source
    fn settings(&self, config_path: Option<String>, request: &SettingsLayer) -> anyhow::Result<Settings> {
        let mut source = self.source.clone();
        if let Some(path) = config_path.filter(|p| !p.trim().is_empty()) {
            source.config = Some(expand_path(path));
            source.repo_lists.clear();
        }
        source.load(&[&self.overrides, request])
    }

    /// Fetch every configured repo and return the digest report
    #[tool(
        description = "Fetch the latest commits and tags from the configured git repos and return a plain-text report, optionally condensed by a local Ollama model"
    )]
    async fn get_git_updates(
        &self,
        Parameters(params): Parameters<UpdatesParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = SettingsLayer {
            title: params.title,
            ollama_model: params.ollama_model,
            ..Default::default()
        };
        let settings = match self.settings(params.config_path, &request) {
            Ok(settings) => settings,
            Err(e) => return Ok(config_error(e)),
        };

        let options = DigestOptions {
            changes_only: params.changes_only,
            ai_summary: params.use_ai_summary,
        };
        let report = build_report(settings, options, Utc::now())
            .await
            .map_err(to_mcp_err)?;

        Ok(CallToolResult::success(vec![Content::text(report.into_text())]))
    }

    /// URLs of the configured repositories, one per line
    #[tool(description = "List the repository URLs tracked by the git-digest config")]
    async fn list_tracked_repos(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        let settings = match self.settings(params.config_path, &SettingsLayer::default()) {
            Ok(settings) => settings,
            Err(e) => return Ok(config_error(e)),
        };

        let urls: Vec<&str> = settings.repos.iter().map(|r| r.url.as_str()).collect();
        Ok(CallToolResult::success(vec![Content::text(urls.join("\n"))]))
    }
}

#[tool_handler]
impl ServerHandler for DigestServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "git-digest: fetch the latest git updates from configured repos and summarize them".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// A bad or missing config is reported to the client as tool output
fn config_error(e: anyhow::Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("Error: {:#}", e))])
}

fn to_mcp_err(e: anyhow::Error) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

/// Start the MCP server on stdio transport.
pub async fn serve(source: ConfigSource, overrides: SettingsLayer) -> anyhow::Result<()> {
    let server = DigestServer::new(source, overrides);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
