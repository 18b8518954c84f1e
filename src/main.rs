use std::process::ExitCode;

use chatsync::session::resolve_author;
use chatsync::{ConversationId, ErrorCode, HttpMessageApi, MessageSync, SyncConfig, SyncError};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatsync", about = "Load a chat conversation and optionally send a message")]
struct Cli {
    /// Conversation to open.
    conversation: String,

    /// Message text to send after loading.
    text: Vec<String>,

    /// Discard cached state before loading.
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "chatsync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), SyncError> {
    let config = SyncConfig::from_env()?;
    let api = HttpMessageApi::from_config(&config)?;
    let sync = MessageSync::new(api);
    let conversation = ConversationId::new(cli.conversation);

    sync.open(&conversation, cli.reset).await?;
    tracing::info!(%conversation, messages = sync.snapshot(&conversation).len(), "conversation loaded");

    let text = cli.text.join(" ");
    if !text.trim().is_empty() {
        let author = resolve_author(config.user_id, config.guest_user_id);
        let (pending, request) = sync.begin_send(&conversation, author, &text)?;
        if let Err(e) = sync.finish_send(&pending, &request).await {
            sync.discard(&conversation, &pending.temp_ids());
            return Err(e);
        }
    }

    for message in sync.snapshot(&conversation).iter() {
        println!("{}\t{}\t{}", message.id, message.author_role, message.text);
    }
    Ok(())
}
