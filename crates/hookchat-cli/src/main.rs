use clap::{ArgAction, Parser, Subcommand};
use hookchat_client::{
    ChatClient, ChatConfig, ChatReply, FileSessionStore, Logger, MemorySessionStore, RetryEvent,
    RetryEventSink, SessionStore, retry_event_channel,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_SESSION_FILE: &str = ".hookchat/session.json";

#[derive(Parser, Debug)]
#[command(name = "hookchat")]
#[command(about = "Terminal host for a webhook-backed chat assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one message and print the reply.
    Send(SendArgs),
    /// Read messages from stdin until EOF or `/quit`.
    Chat(ChatArgs),
    /// Inspect or reset the stored session id.
    Session(SessionArgs),
}

#[derive(clap::Args, Debug)]
struct ClientArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    webhook_url: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    max_retries: Option<u32>,
    #[arg(long)]
    retry_delay_ms: Option<u64>,
    #[arg(long)]
    message_field: Option<String>,
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long = "no-log-file", action = ArgAction::SetTrue)]
    no_log_file: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
    #[arg(long)]
    session: Option<String>,
    #[arg(long, default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,
    #[arg(long = "no-events", action = ArgAction::SetTrue)]
    no_events: bool,
}

#[derive(clap::Args, Debug)]
struct SendArgs {
    message: String,
    #[command(flatten)]
    client: ClientArgs,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ChatArgs {
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(clap::Args, Debug)]
struct SessionArgs {
    #[arg(long, default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    reset: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Send(args) => send_command(args).await,
        Commands::Chat(args) => chat_command(args).await,
        Commands::Session(args) => Ok(session_command(args)),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn send_command(args: SendArgs) -> Result<ExitCode, String> {
    let config = load_config(&args.client)?;
    let session = session_store(&args.client);
    let session_id = session.get_or_create();

    let (client, event_task) = build_client(&config, !args.client.no_events)?;
    let reply = client.send(&args.message, &session_id).await;
    drop(client);
    if let Some(task) = event_task {
        task.await.map_err(|error| error.to_string())?;
    }

    if args.json {
        let json = serde_json::to_string_pretty(&reply).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        print_reply(&reply, config.verbose);
    }
    Ok(exit_code_for_reply(&reply))
}

async fn chat_command(args: ChatArgs) -> Result<ExitCode, String> {
    let config = load_config(&args.client)?;
    let session = session_store(&args.client);
    let mut session_id = session.get_or_create();
    let (client, event_task) = build_client(&config, !args.client.no_events)?;

    let interactive = std::io::stdin().is_terminal();
    if interactive {
        println!("session: {session_id} (type /reset, /session or /quit)");
    }

    let mut failures = 0usize;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/session" => println!("session: {session_id}"),
            "/reset" => {
                session_id = session.reset();
                println!("session: {session_id}");
            }
            message => {
                let reply = client.send(message, &session_id).await;
                if !reply.is_success() {
                    failures += 1;
                }
                print_reply(&reply, config.verbose);
            }
        }
    }

    drop(client);
    if let Some(task) = event_task {
        task.await.map_err(|error| error.to_string())?;
    }
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn session_command(args: SessionArgs) -> ExitCode {
    let store = FileSessionStore::new(&args.session_file);
    let id = if args.reset {
        store.reset()
    } else {
        store.get_or_create()
    };
    println!("{id}");
    ExitCode::SUCCESS
}

fn load_config(args: &ClientArgs) -> Result<ChatConfig, String> {
    let mut config = match args.config.as_deref() {
        Some(path) => ChatConfig::from_path(path).map_err(|e| e.to_string())?,
        None => ChatConfig::default(),
    };
    config
        .apply_env(|key| std::env::var(key).ok())
        .map_err(|e| e.to_string())?;

    if let Some(url) = args.webhook_url.as_ref() {
        config.webhook_url = url.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(delay_ms) = args.retry_delay_ms {
        config.retry_delay_ms = delay_ms;
    }
    if let Some(field) = args.message_field.as_ref() {
        config.message_field = field.clone();
    }
    if let Some(dir) = args.log_dir.as_ref() {
        config.logging.log_directory = dir.clone();
    }
    if args.no_log_file {
        config.logging.enabled = false;
    }
    if args.verbose {
        config.verbose = true;
    }

    config.validate().map_err(|e| e.to_string())?;
    tracing::debug!(
        webhook_url = %config.webhook_url,
        timeout_ms = config.request_timeout_ms,
        max_retries = config.max_retries,
        "configuration loaded"
    );
    Ok(config)
}

fn session_store(args: &ClientArgs) -> Box<dyn SessionStore> {
    match args.session.as_ref() {
        Some(id) => Box::new(MemorySessionStore::with_id(id.clone())),
        None => Box::new(FileSessionStore::new(&args.session_file)),
    }
}

fn build_client(
    config: &ChatConfig,
    stream_events: bool,
) -> Result<(ChatClient, Option<tokio::task::JoinHandle<()>>), String> {
    let logger = Logger::new(config.logging.clone());
    let client = ChatClient::from_config(config, logger).map_err(|e| e.to_string())?;
    if !stream_events {
        return Ok((client, None));
    }

    let (tx, mut rx) = retry_event_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });
    Ok((client.with_events(RetryEventSink::with_sender(tx)), Some(task)))
}

fn print_event(event: &RetryEvent) {
    if let RetryEvent::Retrying {
        next_attempt,
        delay_ms,
        notice,
        ..
    } = event
    {
        eprintln!("{notice} (attempt {next_attempt} in {delay_ms} ms)");
    }
}

fn print_reply(reply: &ChatReply, verbose: bool) {
    match (&reply.display, reply.outcome.error()) {
        (Some(display), _) => {
            println!("{}", display.text);
            if let Some(image) = display.image.as_deref() {
                println!("image: {image}");
            }
        }
        (None, Some(error)) => {
            eprintln!("{}", error.message);
            if verbose {
                if let Some(detail) = error.developer_message.as_deref() {
                    eprintln!("[{}] {detail}", error.kind);
                }
            }
        }
        (None, None) => println!("{}", reply.user_message()),
    }

    if verbose {
        if let Some(diagnostics) = reply.outcome.diagnostics.as_ref() {
            eprintln!(
                "attempts: {} elapsed_ms: {}",
                diagnostics.attempts, diagnostics.elapsed_ms
            );
            for line in &diagnostics.logs {
                eprintln!("  {line}");
            }
        }
    }
}

fn exit_code_for_reply(reply: &ChatReply) -> ExitCode {
    if reply.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
