use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use grokit::{ChatRequest, Client, ClientConfig, Credentials};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grokit", about = "Talk to Grok from the command line")]
struct Cli {
    /// Value of the x.com `auth_token` cookie
    #[arg(long, env = "X_AUTH_TOKEN", hide_env_values = true, global = true)]
    auth_token: Option<String>,

    /// Value of the x.com `ct0` cookie
    #[arg(long, env = "X_CSRF_TOKEN", hide_env_values = true, global = true)]
    csrf_token: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a message and print the full reply
    Chat(ChatArgs),
    /// Send a message and print the reply as it arrives
    Stream(ChatArgs),
    /// Generate an image and save it to a file
    Image {
        prompt: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate an image and print its URL
    ImageUrl { prompt: String },
    /// Create a conversation and print its id
    NewConversation,
}

#[derive(Args)]
struct ChatArgs {
    message: String,
    #[arg(long)]
    conversation_id: Option<String>,
    #[arg(long, default_value = "")]
    system_prompt: String,
    /// grok-2, grok-2-mini, or any other model option id
    #[arg(long, default_value = "grok-2-mini")]
    model: String,
}

impl ChatArgs {
    fn into_request(self) -> ChatRequest {
        let mut request = ChatRequest::new(self.message)
            .system_prompt_name(self.system_prompt)
            .model(self.model);
        if let Some(id) = self.conversation_id {
            request = request.conversation_id(id);
        }
        request
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("hint: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> grokit::Result<ExitCode> {
    let credentials = Credentials::new(
        cli.auth_token.unwrap_or_default(),
        cli.csrf_token.unwrap_or_default(),
    );
    let client = Client::new(ClientConfig::new(credentials))?;

    match cli.command {
        Command::Chat(args) => {
            let reply = client.generate(args.into_request()).await?;
            println!("{}", reply);
        }
        Command::Stream(args) => {
            let mut tokens = client.stream(args.into_request()).await?;
            let mut stdout = std::io::stdout().lock();
            while let Some(token) = tokens.next().await {
                if let Err(e) = write_token(&mut stdout, &token?) {
                    eprintln!("error: failed to write to stdout: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
            if let Err(e) = writeln!(stdout) {
                eprintln!("error: failed to write to stdout: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Image { prompt, output } => {
            let bytes = client.image(&prompt).await?;
            if let Err(e) = tokio::fs::write(&output, &bytes).await {
                eprintln!("error: failed to write {}: {}", output.display(), e);
                return Ok(ExitCode::FAILURE);
            }
            println!("saved {} bytes to {}", bytes.len(), output.display());
        }
        Command::ImageUrl { prompt } => {
            println!("{}", client.image_url(&prompt).await?);
        }
        Command::NewConversation => {
            let id = client
                .create_conversation()
                .await?
                .ok_or(grokit::Error::ConversationCreation)?;
            println!("{}", id);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn write_token(out: &mut impl Write, token: &str) -> std::io::Result<()> {
    out.write_all(token.as_bytes())?;
    out.flush()
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("grokit=debug,warn"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("grokit=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct UnflushableBuffer(Vec<u8>);

    impl Write for UnflushableBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn write_token_appends_tokens() {
        let mut out = Vec::new();
        write_token(&mut out, "Hel").unwrap();
        write_token(&mut out, "lo").unwrap();
        assert_eq!(out, b"Hello");
    }

    #[test]
    fn write_token_reports_write_failure() {
        let err = write_token(&mut ClosedPipe, "token").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn write_token_reports_flush_failure() {
        let mut out = UnflushableBuffer(Vec::new());
        let err = write_token(&mut out, "token").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(out.0, b"token");
    }
}
