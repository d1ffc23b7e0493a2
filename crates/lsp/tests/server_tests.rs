//! End-to-end protocol tests against an in-memory connection.

use std::thread;
use std::time::Duration;

use lsp_server::{Connection, Message, Notification, Request, RequestId, Response};
use serde_json::{json, Value};

const URI: &str = "file:///project/pages/index/index.wxml";

struct Client {
    conn: Connection,
    server: Option<thread::JoinHandle<()>>,
    next_id: i32,
}

impl Client {
    fn start(init_options: Value) -> Self {
        let (server, conn) = Connection::memory();
        let handle = thread::spawn(move || {
            wxml_lsp::server::serve(&server).expect("server loop");
        });
        let mut client = Client {
            conn,
            server: Some(handle),
            next_id: 0,
        };
        let init = client.request(
            "initialize",
            json!({
                "processId": null,
                "capabilities": {
                    "textDocument": { "completion": { "completionItem": { "snippetSupport": true } } }
                },
                "initializationOptions": init_options,
            }),
        );
        let caps = &init.result.expect("initialize result")["capabilities"];
        assert_eq!(caps["hoverProvider"], json!(true));
        assert_eq!(caps["completionProvider"]["triggerCharacters"], json!(["<", "\"", "&", "/", " "]));
        client.notify("initialized", json!({}));
        client
    }

    fn send(&self, msg: Message) {
        self.conn.sender.send(msg).expect("server is listening");
    }

    fn recv(&self) -> Message {
        self.conn
            .receiver
            .recv_timeout(Duration::from_secs(10))
            .expect("message from server")
    }

    fn notify(&self, method: &str, params: Value) {
        self.send(Message::Notification(Notification::new(method.to_owned(), params)));
    }

    /// Send a request and wait for its response, skipping notifications.
    fn request(&mut self, method: &str, params: Value) -> Response {
        self.next_id += 1;
        let id = RequestId::from(self.next_id);
        self.send(Message::Request(Request::new(id.clone(), method.to_owned(), params)));
        loop {
            match self.recv() {
                Message::Response(resp) if resp.id == id => return resp,
                _ => continue,
            }
        }
    }

    /// Wait for the next `publishDiagnostics` and return its messages.
    fn diagnostics(&self) -> Vec<String> {
        loop {
            if let Message::Notification(not) = self.recv() {
                if not.method == "textDocument/publishDiagnostics" {
                    assert_eq!(not.params["uri"], URI);
                    return not.params["diagnostics"]
                        .as_array()
                        .expect("diagnostics array")
                        .iter()
                        .map(|d| d["message"].as_str().unwrap_or_default().to_owned())
                        .collect();
                }
            }
        }
    }

    fn open(&self, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({ "textDocument": { "uri": URI, "languageId": "wxml", "version": 1, "text": text } }),
        );
    }

    fn change(&self, version: i32, text: &str) {
        self.notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": URI, "version": version },
                "contentChanges": [{ "text": text }],
            }),
        );
    }

    fn at(line: u32, character: u32) -> Value {
        json!({ "textDocument": { "uri": URI }, "position": { "line": line, "character": character } })
    }

    fn shutdown(mut self) {
        let resp = self.request("shutdown", Value::Null);
        assert!(resp.error.is_none());
        self.notify("exit", Value::Null);
        if let Some(handle) = self.server.take() {
            handle.join().expect("server thread exits cleanly");
        }
    }
}

fn completion_item<'a>(result: &'a Value, label: &str) -> &'a Value {
    result["items"]
        .as_array()
        .expect("completion list")
        .iter()
        .find(|i| i["label"] == label)
        .unwrap_or_else(|| panic!("no completion item {label}"))
}

#[test]
fn diagnostics_follow_the_document() {
    let client = Client::start(Value::Null);
    client.open("<view abc=\"1\">");
    assert_eq!(
        client.diagnostics(),
        vec!["Parse error: Close tag not found for <view>", "Unknown attribute \"abc\""]
    );
    client.change(2, "<view></view>");
    assert!(client.diagnostics().is_empty());
    client.notify("textDocument/didClose", json!({ "textDocument": { "uri": URI } }));
    assert!(client.diagnostics().is_empty());
    client.shutdown();
}

#[test]
fn completion_and_hover() {
    let mut client = Client::start(Value::Null);
    client.open("<text ");
    client.diagnostics();

    let resp = client.request("textDocument/completion", Client::at(0, 6));
    let result = resp.result.expect("completion result");
    let space = completion_item(&result, "space");
    // Snippet support comes from the client capabilities.
    assert_eq!(space["insertTextFormat"], 2);
    assert_eq!(space["textEdit"]["newText"], "space=\"$1\"");

    let resp = client.request("textDocument/hover", Client::at(0, 2));
    let result = resp.result.expect("hover result");
    assert!(result["contents"]["value"].as_str().unwrap().contains("text"));
    assert_eq!(result["range"]["start"], json!({ "line": 0, "character": 1 }));

    client.shutdown();
}

#[test]
fn settings_override_client_capabilities() {
    let mut client = Client::start(json!({ "wxml": { "complete": { "useSnippet": false } } }));
    client.open("<text ");
    client.diagnostics();

    let resp = client.request("textDocument/completion", Client::at(0, 6));
    let result = resp.result.expect("completion result");
    assert_eq!(completion_item(&result, "space")["textEdit"]["newText"], "space");

    client.notify(
        "workspace/didChangeConfiguration",
        json!({ "settings": { "wxml": { "complete": { "useSnippet": true, "completeEvent": false } } } }),
    );
    let resp = client.request("textDocument/completion", Client::at(0, 6));
    let result = resp.result.expect("completion result");
    assert_eq!(completion_item(&result, "space")["textEdit"]["newText"], "space=\"$1\"");
    assert!(result["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| !i["label"].as_str().unwrap().starts_with("bind:")));

    client.shutdown();
}

#[test]
fn bad_requests_get_error_responses() {
    let mut client = Client::start(Value::Null);
    client.open("<view></view>");
    client.diagnostics();

    let resp = client.request("textDocument/completion", Client::at(5, 0));
    let error = resp.error.expect("out of range position");
    assert_eq!(error.code, lsp_server::ErrorCode::InvalidParams as i32);

    let resp = client.request("textDocument/definition", Client::at(0, 1));
    let error = resp.error.expect("unsupported method");
    assert_eq!(error.code, lsp_server::ErrorCode::MethodNotFound as i32);

    // Documents the client never opened have no results.
    let resp = client.request(
        "textDocument/hover",
        json!({ "textDocument": { "uri": "file:///elsewhere.wxml" }, "position": { "line": 0, "character": 0 } }),
    );
    assert_eq!(resp.result, Some(Value::Null));

    client.shutdown();
}
