use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use clap::{Parser, Subcommand, ValueEnum};
use lsp_types::{Diagnostic, DiagnosticSeverity};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wxml_core::{BuiltinSchema, Document, NodeRef, Scanner};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// WXML language server and checker.
#[derive(Parser)]
#[command(name = "wxml", version, about = "WXML language server and checker")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Language Server Protocol server over stdio
    Lsp {
        /// Accepted for editor compatibility; stdio is the only transport
        #[arg(long)]
        stdio: bool,
    },

    /// Report diagnostics for .wxml files
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the element tree and parse errors of a .wxml file
    Parse {
        /// Path to the .wxml file, `-` for stdin
        file: PathBuf,
    },

    /// Print the token stream of a .wxml file
    Tokens {
        /// Path to the .wxml file, `-` for stdin
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.debug, cli.log_file.as_deref()) {
        report_error(
            &format!("cannot open log file: {}", e),
            cli.output,
            cli.quiet,
        );
        process::exit(1);
    }

    match cli.command {
        Commands::Lsp { stdio: _ } => {
            info!(version = env!("CARGO_PKG_VERSION"), "starting language server");
            if let Err(e) = wxml_lsp::run() {
                eprintln!("LSP server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Check { files } => cmd_check(&files, cli.output, cli.quiet),
        Commands::Parse { file } => cmd_parse(&file, cli.output, cli.quiet),
        Commands::Tokens { file } => cmd_tokens(&file, cli.output, cli.quiet),
    }
}

/// Install the tracing subscriber. Stdout carries JSON-RPC in `lsp` mode,
/// so logs only ever go to stderr or the log file.
fn init_logging(debug: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = if debug {
        EnvFilter::new("wxml=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wxml=info"))
    };
    let registry = tracing_subscriber::registry().with(filter);
    match log_file {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            registry
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .init();
        }
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

fn read_source(file: &Path, output: OutputFormat, quiet: bool) -> String {
    let result = if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).map(|_| text)
    } else {
        std::fs::read_to_string(file)
    };
    match result {
        Ok(text) => text,
        Err(e) => {
            report_error(
                &format!("error reading '{}': {}", file.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

// ── check ─────────────────────────────────────────────────────────────

fn cmd_check(files: &[PathBuf], output: OutputFormat, quiet: bool) {
    let schema = BuiltinSchema::shared();
    let mut reports = Vec::new();
    let mut errors = 0;
    let mut warnings = 0;

    for file in files {
        let text = read_source(file, output, quiet);
        let doc = wxml_core::parse(&text);
        let diags = wxml_lsp::diagnostics::compute_diagnostics(&text, &doc, schema, Some(file.as_path()));
        debug!(file = %file.display(), count = diags.len(), "checked");
        for d in &diags {
            if d.severity == Some(DiagnosticSeverity::ERROR) {
                errors += 1;
            } else {
                warnings += 1;
            }
        }
        reports.push((file, diags));
    }

    match output {
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = reports
                .iter()
                .map(|(file, diags)| {
                    serde_json::json!({
                        "file": file.display().to_string(),
                        "diagnostics": diags.iter().map(diagnostic_json).collect::<Vec<_>>(),
                    })
                })
                .collect();
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for (file, diags) in &reports {
                for d in diags {
                    println!(
                        "{}:{}:{}: {}: {}",
                        file.display(),
                        d.range.start.line + 1,
                        d.range.start.character + 1,
                        severity_name(d.severity),
                        d.message
                    );
                }
            }
            if !quiet {
                println!(
                    "{} file(s) checked: {} error(s), {} warning(s)",
                    files.len(),
                    errors,
                    warnings
                );
            }
        }
    }

    if errors > 0 {
        process::exit(1);
    }
}

fn severity_name(severity: Option<DiagnosticSeverity>) -> &'static str {
    match severity {
        Some(DiagnosticSeverity::WARNING) => "warning",
        Some(DiagnosticSeverity::INFORMATION) => "info",
        Some(DiagnosticSeverity::HINT) => "hint",
        _ => "error",
    }
}

fn diagnostic_json(d: &Diagnostic) -> serde_json::Value {
    serde_json::json!({
        "severity": severity_name(d.severity),
        "message":  d.message,
        "start": { "line": d.range.start.line, "character": d.range.start.character },
        "end":   { "line": d.range.end.line, "character": d.range.end.character },
    })
}

// ── parse ─────────────────────────────────────────────────────────────

fn cmd_parse(file: &Path, output: OutputFormat, quiet: bool) {
    let text = read_source(file, output, quiet);
    let doc = wxml_core::parse(&text);
    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&doc.to_json_value())
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => print_tree(&doc),
    }
}

fn print_tree(doc: &Document) {
    fn walk(node: NodeRef<'_>, depth: usize) {
        let indent = "  ".repeat(depth);
        let tag = node.tag.as_deref().unwrap_or("?");
        let open = if node.closed { "" } else { " (unclosed)" };
        println!("{}<{}> {}..{}{}", indent, tag, node.start, node.end, open);
        for attr in &node.attributes {
            match &attr.value {
                Some(value) => println!("{}  @{}={:?}", indent, attr.name, value),
                None => println!("{}  @{}", indent, attr.name),
            }
        }
        for text in &node.text_contents {
            println!("{}  {:?}", indent, text);
        }
        for child in node.children() {
            walk(child, depth + 1);
        }
    }

    for root in doc.roots() {
        walk(root, 0);
    }
    for err in doc.errors() {
        println!("error: {}", err);
    }
}

// ── tokens ────────────────────────────────────────────────────────────

fn cmd_tokens(file: &Path, output: OutputFormat, quiet: bool) {
    let text = read_source(file, output, quiet);
    let tokens: Vec<_> = Scanner::new(&text)
        .map(|token| (token, &text[token.offset..token.end()]))
        .collect();

    match output {
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = tokens
                .iter()
                .map(|(token, text)| {
                    let mut v = serde_json::to_value(token).unwrap_or_default();
                    v["text"] = serde_json::Value::from(*text);
                    v
                })
                .collect();
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for (token, text) in &tokens {
                let kind = format!("{:?}", token.kind);
                match token.error {
                    Some(err) => println!("{:>5} {:<18} {:?} ! {}", token.offset, kind, text, err),
                    None => println!("{:>5} {:<18} {:?}", token.offset, kind, text),
                }
            }
        }
    }
}

fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
