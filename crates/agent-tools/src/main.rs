//! Send one chat request under a role, then optionally run the tool calls in
//! the reply and judge whether the task is finished.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Plain request under the "default" role
//! agent-tools --user "Summarize the Rust 2024 edition changes"
//!
//! # Role file, role selection, and piped input
//! cat notes.md | agent-tools --roles roles.json --role editor --stdin
//!
//! # Let the model call api_call / file_operation in ./work
//! agent-tools --user "Fetch https://httpbin.org/json and save it to data.json" \
//!   --execute-tools --workdir ./work
//!
//! # Print a task status and suggested follow-up (Gemini verdicts if GEMINI_API_KEY is set)
//! agent-tools --user "Explain lifetimes" --analyze --gemini
//! ```

use agent_tools::analysis::{
    Exchange, FollowupGenerator, GeminiConfig, GeminiTaskAnalyzer, TaskAnalyzer,
    default_analyzer, default_generator,
};
use agent_tools::llm::{ChatRequest, LlmService, OpenRouterClient, default_roles, load_roles};
use agent_tools::parser::{DefaultResponseParser, ResponseParser};
use agent_tools::tools::{ApiCallTool, FileOperationTool, ToolManager};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Send a chat request under a role and act on the reply.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "agent-tools")]
struct Cli {
    // ── Message content ────────────────────────────────────────
    /// User message to send
    #[arg(long)]
    user: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    // ── Roles and model ────────────────────────────────────────
    /// JSON role file (role name -> {system_prompt, model?, temperature?, max_tokens?})
    #[arg(long)]
    roles: Option<PathBuf>,

    /// Role to use for the request
    #[arg(long)]
    role: Option<String>,

    /// Model for roles that do not name one
    #[arg(long)]
    model: Option<String>,

    // ── Tools ──────────────────────────────────────────────────
    /// Execute tool calls found in the reply
    #[arg(long)]
    execute_tools: bool,

    /// Working directory for the file_operation tool
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Run parsed tool calls concurrently instead of one after another
    #[arg(long)]
    parallel_tools: bool,

    /// Per-tool timeout in seconds
    #[arg(long, default_value_t = 60)]
    tool_timeout: u64,

    // ── Analysis ───────────────────────────────────────────────
    /// Print the task status and a suggested follow-up
    #[arg(long)]
    analyze: bool,

    /// Use the Gemini analyzer instead of the rule-based one
    #[arg(long, requires = "analyze")]
    gemini: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run(cli: &Cli) -> Result<(), String> {
    let user_content = build_user_content(cli)?;
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;

    let manager = ToolManager::new()
        .with_sequential(!cli.parallel_tools)
        .with_default_timeout(Some(Duration::from_secs(cli.tool_timeout)))
        .with_if(
            cli.execute_tools,
            "api_call",
            ApiCallTool::new(reqwest::Client::new()),
        )
        .with_if(
            cli.execute_tools,
            "file_operation",
            FileOperationTool::new(&cli.workdir),
        );

    let mut roles = match &cli.roles {
        Some(path) => load_roles(path)?,
        None => default_roles(),
    };
    if !manager.is_empty() {
        let instructions = manager.tool_instructions();
        for role in roles.values_mut() {
            role.system_prompt = format!("{}\n\n{instructions}", role.system_prompt);
        }
    }

    let mut client = OpenRouterClient::new(api_key)?;
    if let Some(model) = &cli.model {
        client = client.with_default_model(model);
    }
    let mut service = LlmService::new(client, roles);
    if let Some(role) = &cli.role {
        service.set_current_role(role)?;
    }

    let reply = service
        .process_chat_request(&ChatRequest::from_user(user_content.clone()))
        .await?;
    println!("{}", reply.raw_response);

    if cli.execute_tools {
        let parsed = DefaultResponseParser.parse(&reply.raw_response);
        if let Some(calls) = parsed.tool_calls.filter(|c| !c.is_empty()) {
            let results = manager.execute_calls(&calls).await;
            println!();
            for (call, result) in calls.iter().zip(results) {
                println!("[tool] {}: {}", call.tool_name, result.to_json_string());
            }
        }
    }

    if cli.analyze {
        let analyzer: Box<dyn TaskAnalyzer> = if cli.gemini {
            Box::new(GeminiTaskAnalyzer::new(GeminiConfig::default())?)
        } else {
            Box::new(default_analyzer())
        };
        let history = vec![Exchange::new(user_content, reply.raw_response.clone())];
        let status = analyzer.analyze(&history, &reply.raw_response).await;
        println!("\nStatus: {status}");
        if let Some(next) = default_generator()
            .generate(status, &history, &reply.raw_response)
            .await
        {
            println!("Follow-up: {next}");
        }
    }

    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_user_content(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.user, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --user, --stdin, or both".to_string()),
    }
}
