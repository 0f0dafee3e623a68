//! `rumur-lsp`: a minimal Language Server Protocol shim over the
//! `rumur` front end. Each document edit re-runs the lexer/parser/type
//! checker and republishes the resulting diagnostics; there is no
//! incremental reparse, matching the "recompute from scratch on every
//! change" approach the teacher's own Seq LSP server takes for its
//! includes/word cache.

use std::collections::HashMap;
use std::env;
use std::sync::RwLock;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::info;

struct RumurLanguageServer {
    client: Client,
    documents: RwLock<HashMap<String, String>>,
}

impl RumurLanguageServer {
    fn new(client: Client) -> Self {
        Self {
            client,
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn update_document(&self, uri: &str, text: String) {
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(uri.to_string(), text);
        }
    }

    fn forget_document(&self, uri: &str) {
        if let Ok(mut docs) = self.documents.write() {
            docs.remove(uri);
        }
    }

    /// Runs the front end up to type checking and turns the first
    /// diagnostic (if any) into an LSP diagnostic. Rumur's compiler
    /// stops at the first error (§7), so there is never more than one
    /// to report per document.
    fn check_document(&self, text: &str) -> Vec<Diagnostic> {
        match rumur::compile_source(text, 0, false, None) {
            Ok(_) => Vec::new(),
            Err(diag) => {
                let range = match diag.loc() {
                    Some(loc) => Range {
                        start: Position {
                            line: loc.start_line.saturating_sub(1),
                            character: loc.start_col.saturating_sub(1),
                        },
                        end: Position {
                            line: loc.end_line.saturating_sub(1),
                            character: loc.end_col,
                        },
                    },
                    None => Range::default(),
                };
                vec![Diagnostic {
                    range,
                    severity: Some(DiagnosticSeverity::ERROR),
                    source: Some("rumur".to_string()),
                    message: diag.to_string(),
                    ..Default::default()
                }]
            }
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for RumurLanguageServer {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        info!("rumur-lsp initializing");
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "rumur-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("rumur-lsp initialized");
        self.client
            .log_message(MessageType::INFO, "rumur-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("rumur-lsp shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;
        info!("document opened: {}", uri);
        self.update_document(uri.as_str(), text.clone());
        let diagnostics = self.check_document(&text);
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(change) = params.content_changes.into_iter().next() {
            let text = change.text;
            self.update_document(uri.as_str(), text.clone());
            let diagnostics = self.check_document(&text);
            self.client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        info!("document closed: {}", uri);
        self.forget_document(uri.as_str());
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let docs = match self.documents.read() {
            Ok(docs) => docs,
            Err(_) => return Ok(None),
        };
        let Some(text) = docs.get(uri.as_str()) else {
            return Ok(None);
        };
        let total_bits = rumur::compile_source(text, 0, false, None)
            .ok()
            .map(|compiled| compiled.total_state_bits());
        Ok(total_bits.map(|bits| Hover {
            contents: HoverContents::Scalar(MarkedString::String(format!(
                "state width: {bits} bits"
            ))),
            range: None,
        }))
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("rumur-lsp {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rumur_lsp=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("starting rumur-lsp");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(RumurLanguageServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
