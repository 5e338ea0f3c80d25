//! FreeWay Study terminal client
//!
//! Chat with the study assistant, browse the document library, and upload
//! materials from the command line.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;

use freeway_core::chat::{ChatEvent, MessageRole, TurnController};
use freeway_core::service::{AuthService, AuthSession, Credentials, LibraryService, UploadService};
use freeway_core::{ApiConfig, HttpCompletionTransport};

#[derive(Parser)]
#[command(name = "freeway", version, about = "FreeWay Study terminal client")]
struct Cli {
    /// Backend base URL (overrides FREEWAY_API_BASE and the built-in default)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with Neha, the study assistant
    Chat,
    /// List library files
    Library {
        /// Only show files for this course (e.g. bca, mba)
        #[arg(long)]
        course: Option<String>,
    },
    /// Log in and print the session token
    Login { email: String, password: String },
    /// Create an account and print the session token
    Signup { email: String, password: String },
    /// Upload a study material tagged with its course
    Upload {
        file: PathBuf,
        #[arg(long)]
        course: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = match cli.api_base {
        Some(base) => ApiConfig::new(base),
        None => ApiConfig::from_env(),
    };
    log::debug!("Using backend {}", config.base_url);

    match cli.command {
        Commands::Chat => run_chat(config).await,
        Commands::Library { course } => run_library(config, course.as_deref()).await,
        Commands::Login { email, password } => {
            let session = login(&config, &email, &password).await?;
            print_session(&session);
            Ok(())
        }
        Commands::Signup { email, password } => {
            let session = AuthService::new(config)
                .signup(&Credentials::new(email, password))
                .await
                .context("signup failed")?;
            print_session(&session);
            Ok(())
        }
        Commands::Upload {
            file,
            course,
            email,
            password,
        } => {
            let session = login(&config, &email, &password).await?;
            let stored = UploadService::new(config)
                .upload(&session, &file, &course)
                .await
                .context("upload failed")?;
            println!("Uploaded \"{}\" (course {})", stored.name, course);
            Ok(())
        }
    }
}

async fn login(config: &ApiConfig, email: &str, password: &str) -> anyhow::Result<AuthSession> {
    AuthService::new(config.clone())
        .login(&Credentials::new(email, password))
        .await
        .context("login failed")
}

fn print_session(session: &AuthSession) {
    println!("Logged in as {}", session.user.email);
    println!("Token: {}", session.token);
}

async fn run_library(config: ApiConfig, course: Option<&str>) -> anyhow::Result<()> {
    let library = LibraryService::new(config);
    let files = library
        .list_course(course)
        .await
        .context("failed to list library files")?;

    if files.is_empty() {
        println!("No files available for this course.");
        return Ok(());
    }
    for file in &files {
        let course = file.course.as_deref().unwrap_or("-");
        println!("{:<40} {:<8} {}", file.title(), course, library.download_url(file));
    }
    Ok(())
}

async fn run_chat(config: ApiConfig) -> anyhow::Result<()> {
    let transport = Arc::new(HttpCompletionTransport::new(config));
    let mut controller = TurnController::new(transport);
    let events = controller.subscribe();
    let cancel = controller.cancel_handle();

    // Ctrl-C cancels the in-flight turn instead of killing the REPL.
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(print_events(events));

    println!("Ask Neha about your study. Empty line or EOF quits; Ctrl-C stops an answer.");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("you> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }
        controller.submit(&line).await?;
    }

    drop(controller);
    printer.await?;
    Ok(())
}

/// Print chat events as they stream: only the not-yet-printed suffix of the
/// trailing assistant message, so each token appears exactly once.
async fn print_events(mut events: tokio::sync::mpsc::UnboundedReceiver<ChatEvent>) {
    let mut printed = 0usize;
    let mut answering = false;

    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::Snapshot(snapshot) => {
                let Some(last) = snapshot.conversation.last() else {
                    continue;
                };
                if last.role != MessageRole::Assistant {
                    continue;
                }
                if snapshot.busy {
                    if !answering {
                        answering = true;
                        printed = 0;
                        let _ = prompt("neha> ");
                    }
                    if last.content.len() > printed {
                        let _ = prompt(&last.content[printed..]);
                        printed = last.content.len();
                    }
                } else if answering {
                    answering = false;
                    println!();
                }
            }
            ChatEvent::TurnFailed { reason } => {
                eprintln!();
                eprintln!("[answer interrupted: {reason}]");
            }
        }
    }
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}
