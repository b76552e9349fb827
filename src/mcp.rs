use std::sync::{Arc, Mutex};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    engine::{Engine, EngineOptions},
    error,
    matcher::Completion,
    resolver::{AttachmentLookup, ID_NOT_FOUND},
};

const DEFAULT_MATCH_LIMIT: usize = 50;

#[derive(Clone)]
pub struct ZotindexMcpServer {
    engine: Arc<Mutex<Engine>>,
    tool_router: ToolRouter<Self>,
}

impl ZotindexMcpServer {
    fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            tool_router: Self::tool_router(),
        }
    }

    fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut Engine) -> T,
    ) -> Result<T, rmcp::ErrorData> {
        let mut engine = self.engine.lock().map_err(|_| {
            rmcp::ErrorData::internal_error("engine lock poisoned", None)
        })?;
        Ok(f(&mut engine))
    }
}

#[tool_router(router = tool_router)]
impl ZotindexMcpServer {
    /// Complete a partial citation key, author or title.
    #[tool(
        name = "zotindex_match",
        description = "Complete a partial citation key, first author or title. Results are ranked: key prefix, first author's initial, title prefix, then key, author and title substrings. Pass the document path to honour its collection filter."
    )]
    pub async fn zotindex_match(
        &self,
        params: Parameters<MatchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let document = params.document.unwrap_or_default();
        let limit = params.limit.unwrap_or(DEFAULT_MATCH_LIMIT);

        let mut results = self.with_engine(|engine| {
            engine.matches(&params.pattern, &document)
        })?;
        let total = results.len();
        results.truncate(limit);

        let summary = format_match_summary(&results, total, &params.pattern);
        tool_result(
            summary,
            MatchResponse {
                pattern: params.pattern,
                document,
                total,
                results,
            },
        )
    }

    /// List the file attachments of a reference.
    #[tool(
        name = "zotindex_attachments",
        description = "List the file attachments of a reference as stableKey:path entries. Accepts a stable key or a citation key."
    )]
    pub async fn zotindex_attachments(
        &self,
        params: Parameters<KeyParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let key = params.0.key;
        let lookup = self.with_engine(|engine| engine.attachments(&key))?;
        let summary = match &lookup {
            AttachmentLookup::Found(paths) => paths.join("\n"),
            miss => miss.to_string(),
        };
        tool_result(summary, lookup)
    }

    /// Full record of a reference.
    #[tool(
        name = "zotindex_record",
        description = "Return every field, creator, attachment and collection of a reference. Accepts a stable key or a citation key."
    )]
    pub async fn zotindex_record(
        &self,
        params: Parameters<KeyParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let key = params.0.key;
        let Some(details) = self.with_engine(|engine| engine.record(&key))?
        else {
            return Ok(not_found(&key));
        };
        let r = &details.reference;
        let summary = format!(
            "{} ({}) {} [{}]",
            r.citation(),
            r.year,
            r.title,
            r.author_summary
        );
        tool_result(summary, details)
    }

    /// Citation string for an internal item id.
    #[tool(
        name = "zotindex_cite",
        description = "Return the @stableKey#citationKey citation for an internal Zotero item id."
    )]
    pub async fn zotindex_cite(
        &self,
        params: Parameters<CiteParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let item_id = params.0.item_id;
        let citation =
            self.with_engine(|engine| engine.citation(item_id))?;
        let text = citation.as_deref().unwrap_or(ID_NOT_FOUND).to_string();
        tool_result(
            text.clone(),
            json!({ "itemId": item_id, "citation": citation, "text": text }),
        )
    }

    /// Export PDF annotations as markdown.
    #[tool(
        name = "zotindex_annotations",
        description = "Export the PDF highlights and comments of a reference as markdown with inline citations. pageOffset is added to numeric page labels."
    )]
    pub async fn zotindex_annotations(
        &self,
        params: Parameters<AnnotationsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let offset = params.page_offset.unwrap_or(0);
        let lines = self
            .with_engine(|engine| engine.annotations(&params.key, offset))?
            .map_err(|e| mcp_error("failed to read annotations", e))?;
        let Some(lines) = lines else {
            return Ok(not_found(&params.key));
        };
        tool_result(
            lines.join("\n"),
            json!({ "key": params.key, "lines": lines }),
        )
    }

    /// Export notes as markdown.
    #[tool(
        name = "zotindex_notes",
        description = "Export the notes of a reference as markdown, with embedded citations rewritten to [@stableKey#citationKey] form."
    )]
    pub async fn zotindex_notes(
        &self,
        params: Parameters<KeyParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let key = params.0.key;
        let markdown = self
            .with_engine(|engine| engine.notes(&key))?
            .map_err(|e| mcp_error("failed to render notes", e))?;
        let Some(markdown) = markdown else {
            return Ok(not_found(&key));
        };
        tool_result(
            markdown.clone(),
            json!({ "key": key, "markdown": markdown }),
        )
    }

    /// Restrict a document's completion to named collections.
    #[tool(
        name = "zotindex_set_collections",
        description = "Restrict completion from a document to the named Zotero collections. An empty list searches the whole library again."
    )]
    pub async fn zotindex_set_collections(
        &self,
        params: Parameters<SetCollectionsParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let outcome = self.with_engine(|engine| {
            engine.set_collections(&params.document, &params.collections)
        })?;
        match outcome {
            Ok(assigned) => {
                let summary = if assigned.is_empty() {
                    format!("{} searches the whole library", params.document)
                } else {
                    format!(
                        "{} restricted to: {}",
                        params.document,
                        assigned.join(", ")
                    )
                };
                tool_result(
                    summary,
                    json!({
                        "document": params.document,
                        "collections": assigned,
                    }),
                )
            }
            Err(error::Error::NotFound { kind, name }) => Ok(error_result(
                format!("{kind} not found: {name}"),
            )),
            Err(e) => Err(mcp_error("failed to set collections", e)),
        }
    }

    /// Diagnostic information.
    #[tool(
        name = "zotindex_info",
        description = "Show store paths, data directory, reference and collection counts, and per-document collection filters."
    )]
    pub async fn zotindex_info(
        &self,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let info = self.with_engine(|engine| engine.info())?;
        let summary = format!(
            "{} references, {} collections, {} filtered documents ({})",
            info.references,
            info.collections,
            info.documents.len(),
            info.zotero_db.display()
        );
        tool_result(summary, info)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ZotindexMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("zotindex", env!("CARGO_PKG_VERSION"))
                    .with_title("zotindex MCP"),
            )
            .with_instructions(
                "Use zotindex_match to find citation keys, then zotindex_record, zotindex_notes or zotindex_annotations with the key.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchParams {
    /// Partial citation key, author last name or title.
    pub pattern: String,
    /// Document whose collection filter applies (default: none).
    pub document: Option<String>,
    /// Maximum number of results (default: 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyParams {
    /// Stable key or citation key.
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiteParams {
    /// Internal Zotero item id.
    pub item_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationsParams {
    /// Stable key or citation key.
    pub key: String,
    /// Added to every numeric page label (default: 0).
    pub page_offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetCollectionsParams {
    /// Document identifier, usually its path.
    pub document: String,
    /// Collection names; empty to clear.
    pub collections: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchResponse {
    pattern: String,
    document: String,
    total: usize,
    results: Vec<Completion>,
}

fn format_match_summary(
    results: &[Completion],
    total: usize,
    pattern: &str,
) -> String {
    if results.is_empty() {
        return format!("No references match \"{pattern}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if total == 1 { "" } else { "s" };
    lines.push(format!("Found {total} reference{suffix} for \"{pattern}\":"));
    for c in results {
        lines.push(format!(
            "{} {} {}",
            c.citation_key, c.author_summary, c.label
        ));
    }
    lines.join("\n")
}

fn tool_result(
    summary: String,
    structured: impl Serialize,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let structured = serde_json::to_value(structured)
        .map_err(|e| mcp_error("failed to serialize result", e))?;
    let mut result = CallToolResult::success(vec![Content::text(summary)]);
    result.structured_content = Some(structured);
    Ok(result)
}

fn error_result(message: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message)])
}

fn not_found(key: &str) -> CallToolResult {
    error_result(format!("reference not found: {key}"))
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(options: &EngineOptions) -> error::Result<()> {
    let server = ZotindexMcpServer::new(Engine::open(options)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Server(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Server(format!("MCP initialization failed: {e}"))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Server(format!("MCP session ended: {e}"))
        })?;
        Ok(())
    })
}
