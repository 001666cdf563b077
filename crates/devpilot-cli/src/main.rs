//! DevPilot terminal chat.

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use devpilot_chat::{ChatSettings, Orchestrator};
use devpilot_core::{Functionality, Locale, Message};
use devpilot_llm::{
    build_provider, mask_sensitive, Credentials, ProviderConfig, ProviderKind, StaticCredentials,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod repl;
mod terminal;

use terminal::{code_reference, TerminalBridge, TerminalHost};

const DEFAULT_LOG_FILTER: &str = "devpilot_llm=info,devpilot_chat=info,devpilot_cli=info";

#[derive(Parser)]
#[command(name = "devpilot")]
#[command(about = "Chat with DevPilot from the terminal")]
#[command(version)]
struct Cli {
    /// Backend: za, openai or azure
    #[arg(long, env = "DEVPILOT_PROVIDER", default_value = "za")]
    provider: String,

    /// Chat completions endpoint (required for azure)
    #[arg(long, env = "DEVPILOT_ENDPOINT")]
    endpoint: Option<String>,

    /// API key for openai and azure
    #[arg(long, env = "DEVPILOT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name sent to openai
    #[arg(long, env = "DEVPILOT_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    /// Login token for the DevPilot backend
    #[arg(long, env = "DEVPILOT_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// User id for the DevPilot backend
    #[arg(long, env = "DEVPILOT_USER_ID", default_value = "")]
    user_id: String,

    /// Auth type tag (e.g. wx)
    #[arg(long, env = "DEVPILOT_AUTH_TYPE", default_value = "")]
    auth_type: String,

    /// Answer language: en or cn
    #[arg(long, env = "DEVPILOT_LOCALE", default_value = "en")]
    locale: String,

    /// Name shown on your messages
    #[arg(long, env = "DEVPILOT_USERNAME", default_value = "User")]
    username: String,

    /// Repository id for @repo questions
    #[arg(long, env = "DEVPILOT_REPO")]
    repo: Option<String>,

    /// HTTPS proxy
    #[arg(long, env = "DEVPILOT_PROXY")]
    proxy: Option<String>,

    /// Send request bodies gzip+base64 encoded
    #[arg(long, env = "DEVPILOT_ENCODE_BODY")]
    encode_body: bool,

    /// Wait for complete answers instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Run a code action on a file
    Run {
        /// Action: explain, fix, comment, test, performance, review,
        /// comment_method, generate_commit
        action: String,

        /// Source file
        file: PathBuf,

        /// Language id, detected from the extension when omitted
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Suggest a commit message for the staged changes
    Commit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let kind: ProviderKind = cli.provider.parse()?;
    let locale: Locale = cli.locale.parse()?;

    let config = ProviderConfig {
        endpoint: cli.endpoint.clone(),
        api_key: cli.api_key.clone(),
        model: cli.model.clone(),
        proxy: cli.proxy.clone(),
        stream: !cli.no_stream,
        encode_body: cli.encode_body,
        ..ProviderConfig::for_kind(kind)
    };
    let credentials = Arc::new(StaticCredentials::new(Credentials {
        token: cli.token.clone(),
        user_id: cli.user_id.clone(),
        auth_type: cli.auth_type.clone(),
        locale,
    }));

    info!(
        provider = %kind,
        model = %config.model,
        stream = config.stream,
        token = %mask_sensitive(&cli.token),
        "Starting DevPilot chat"
    );

    let provider = build_provider(&config, credentials)?;
    let settings = ChatSettings {
        locale,
        username: cli.username.clone(),
        repo_name: cli.repo.clone(),
    };
    let orchestrator = Orchestrator::new(
        provider,
        Arc::new(TerminalBridge::default()),
        Arc::new(TerminalHost),
        settings,
    );

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => repl::run(orchestrator).await?,
        Commands::Ask { question } => {
            orchestrator
                .append_user_message(Message::user(question.join(" ")), None)
                .await?;
        }
        Commands::Run {
            action,
            file,
            language,
        } => {
            let functionality: Functionality = action.parse()?;
            let source = std::fs::read_to_string(&file)?;
            let code_ref = code_reference(&file, language, source);
            orchestrator
                .start_functionality(functionality, Some(code_ref))
                .await?;
        }
        Commands::Commit => {
            let diff = repl::staged_diff().await?;
            let message = orchestrator
                .generate_commit_message(&diff, CancellationToken::new())
                .await?;
            if let Some(message) = message {
                println!("{}", message);
            }
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(file))
                .with_env_filter(filter)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
    Ok(())
}
