//! LSP server main loop with request/notification dispatch.
//!
//! Uses `lsp-server` (synchronous, crossbeam-based) for the transport.
//! Every request is answered from the cached parse of the document, so no
//! async runtime is needed.

use lsp_server::{Connection, Message, Notification, RequestId, Response};
use lsp_types::notification::{
    DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument,
    Notification as _, PublishDiagnostics,
};
use lsp_types::request::{Completion, HoverRequest};
use lsp_types::{
    CompletionOptions, CompletionResponse, HoverProviderCapability, InitializeParams,
    PublishDiagnosticsParams, ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, Uri,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use wxml_core::BuiltinSchema;

use crate::completion;
use crate::config::Settings;
use crate::diagnostics;
use crate::document::DocumentState;
use crate::error::ServiceError;
use crate::hover;
use crate::line_index::LineIndex;

pub const TRIGGER_CHARACTERS: &[&str] = &["<", "\"", "&", "/", " "];

/// Run the LSP server over stdio until shutdown.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (connection, io_threads) = Connection::stdio();
    serve(&connection)?;
    // The writer thread exits once every sender is gone.
    drop(connection);
    io_threads.join()?;
    Ok(())
}

/// Serve one client over `connection`: initialize handshake, then the
/// message loop until shutdown.
pub fn serve(connection: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    // ── Initialize handshake ──────────────────────────────────────────
    let init_json = serde_json::to_value(build_capabilities())?;
    let init_params: InitializeParams = serde_json::from_value(connection.initialize(init_json)?)?;

    let mut state = ServerState::new(&init_params);
    info!(
        snippets = state.snippet_support,
        "wxml language server initialized"
    );

    // ── Main loop ─────────────────────────────────────────────────────
    for msg in &connection.receiver {
        match msg {
            Message::Request(req) => {
                if connection.handle_shutdown(&req)? {
                    info!("shutdown requested");
                    break;
                }
                handle_request(connection, &state, req)?;
            }
            Message::Notification(not) => {
                handle_notification(connection, &mut state, not)?;
            }
            Message::Response(_) => {
                // Ignore responses (we don't send requests to the client)
            }
        }
    }
    Ok(())
}

struct ServerState {
    documents: DocumentState,
    settings: Settings,
    /// The client accepts snippet completion items.
    snippet_support: bool,
    schema: &'static BuiltinSchema,
}

impl ServerState {
    fn new(params: &InitializeParams) -> Self {
        let snippet_support = params
            .capabilities
            .text_document
            .as_ref()
            .and_then(|t| t.completion.as_ref())
            .and_then(|c| c.completion_item.as_ref())
            .and_then(|i| i.snippet_support)
            .unwrap_or(false);
        let settings = match &params.initialization_options {
            Some(options) => Settings::from_value(options).unwrap_or_else(|err| {
                warn!(%err, "ignoring initializationOptions");
                Settings::default()
            }),
            None => Settings::default(),
        };
        ServerState {
            documents: DocumentState::new(),
            settings,
            snippet_support,
            schema: BuiltinSchema::shared(),
        }
    }
}

fn build_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                ..Default::default()
            },
        )),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(TRIGGER_CHARACTERS.iter().map(|c| c.to_string()).collect()),
            resolve_provider: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn handle_request(
    connection: &Connection,
    state: &ServerState,
    req: lsp_server::Request,
) -> Result<(), Box<dyn std::error::Error>> {
    use lsp_types::request::Request as _;

    debug!(method = %req.method, id = %req.id, "request");
    if req.method == Completion::METHOD {
        let params: lsp_types::CompletionParams = serde_json::from_value(req.params)?;
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let result = match state.documents.get(uri.as_str()) {
            Some(doc) => LineIndex::new(&doc.content).offset(position).map(|offset| {
                let config = state.settings.completion(state.snippet_support);
                let list = completion::compute_completions(
                    &doc.content,
                    &doc.parsed,
                    offset,
                    state.schema,
                    &config,
                );
                Some(CompletionResponse::List(list))
            }),
            None => Ok(None),
        };
        respond(connection, req.id, result)?;
    } else if req.method == HoverRequest::METHOD {
        let params: lsp_types::HoverParams = serde_json::from_value(req.params)?;
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let result = match state.documents.get(uri.as_str()) {
            Some(doc) => LineIndex::new(&doc.content).offset(position).map(|offset| {
                hover::compute_hover(
                    &doc.content,
                    &doc.parsed,
                    offset,
                    state.schema,
                    state.settings.docs_dir.as_deref(),
                )
            }),
            None => Ok(None),
        };
        respond(connection, req.id, result)?;
    } else {
        // Unknown request -- method not found
        let resp = Response::new_err(
            req.id,
            lsp_server::ErrorCode::MethodNotFound as i32,
            format!("method not found: {}", req.method),
        );
        connection.sender.send(Message::Response(resp))?;
    }
    Ok(())
}

/// Answer a request, turning a [`ServiceError`] into an `InvalidParams`
/// error response.
fn respond<T: Serialize>(
    connection: &Connection,
    id: RequestId,
    result: Result<T, ServiceError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let resp = match result {
        Ok(value) => Response::new_ok(id, serde_json::to_value(value)?),
        Err(err) => {
            warn!(%err, "request failed");
            Response::new_err(id, lsp_server::ErrorCode::InvalidParams as i32, err.to_string())
        }
    };
    connection.sender.send(Message::Response(resp))?;
    Ok(())
}

fn handle_notification(
    connection: &Connection,
    state: &mut ServerState,
    not: Notification,
) -> Result<(), Box<dyn std::error::Error>> {
    match not.method.as_str() {
        m if m == DidOpenTextDocument::METHOD => {
            let params: lsp_types::DidOpenTextDocumentParams = serde_json::from_value(not.params)?;
            let uri = params.text_document.uri;
            debug!(uri = uri.as_str(), "opened");
            state
                .documents
                .open(uri.as_str(), params.text_document.version, params.text_document.text);
            publish_document_diagnostics(connection, state, uri)?;
        }
        m if m == DidChangeTextDocument::METHOD => {
            let params: lsp_types::DidChangeTextDocumentParams =
                serde_json::from_value(not.params)?;
            let uri = params.text_document.uri;
            // FULL sync: last content change has the entire document
            if let Some(change) = params.content_changes.into_iter().last() {
                if state
                    .documents
                    .change(uri.as_str(), params.text_document.version, change.text)
                    .is_some()
                {
                    publish_document_diagnostics(connection, state, uri)?;
                }
            }
        }
        m if m == DidCloseTextDocument::METHOD => {
            let params: lsp_types::DidCloseTextDocumentParams = serde_json::from_value(not.params)?;
            debug!(uri = params.text_document.uri.as_str(), "closed");
            state.documents.close(params.text_document.uri.as_str());
            // Clear diagnostics for closed file
            publish_diagnostics(connection, params.text_document.uri, Vec::new())?;
        }
        m if m == DidChangeConfiguration::METHOD => {
            let params: lsp_types::DidChangeConfigurationParams =
                serde_json::from_value(not.params)?;
            match Settings::from_value(&params.settings) {
                Ok(settings) => {
                    info!(?settings, "configuration changed");
                    state.settings = settings;
                }
                Err(err) => warn!(%err, "ignoring configuration change"),
            }
        }
        _ => {
            // Unknown notification -- ignore
        }
    }
    Ok(())
}

fn publish_document_diagnostics(
    connection: &Connection,
    state: &ServerState,
    uri: Uri,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(doc) = state.documents.get(uri.as_str()) else {
        return Ok(());
    };
    let diags = diagnostics::compute_diagnostics(
        &doc.content,
        &doc.parsed,
        state.schema,
        doc.path.as_deref(),
    );
    debug!(uri = uri.as_str(), count = diags.len(), "diagnostics");
    publish_diagnostics(connection, uri, diags)
}

/// Send `textDocument/publishDiagnostics` notification to the client.
fn publish_diagnostics(
    connection: &Connection,
    uri: Uri,
    diagnostics: Vec<lsp_types::Diagnostic>,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = PublishDiagnosticsParams {
        uri,
        diagnostics,
        version: None,
    };
    let not = Notification::new(PublishDiagnostics::METHOD.to_string(), params);
    connection.sender.send(Message::Notification(not))?;
    Ok(())
}
