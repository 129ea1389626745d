use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use flowchat::{
    analytics, AnalyticsReport, Config, FailurePolicy, Message, Recorder, Role, SendOutcome,
    SessionController, WavFileBackend,
};

#[derive(Parser)]
#[command(name = "flowchat", about = "Chat and analytics client for a webhook workflow backend")]
struct Cli {
    /// Config file (without extension), e.g. config/flowchat
    #[arg(long, default_value = "config/flowchat")]
    config: String,

    /// Log send failures instead of appending an inline error message,
    /// leaving resolution to the update poller
    #[arg(long)]
    defer_failures: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one text message and print the reply
    Send { message: String },

    /// Record a WAV file through the capture adapter and send it
    SendAudio { file: PathBuf },

    /// Interactive chat session with background update polling
    Chat,

    /// Fetch the analytics snapshot and print the derived report
    Analytics,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let policy = if cli.defer_failures {
        FailurePolicy::DeferToPolling
    } else {
        FailurePolicy::Inline
    };

    match cli.command {
        Command::Send { message } => {
            let controller = SessionController::new(cfg.chat, policy);
            info!("Sending as user {}", controller.user_id());
            let outcome = controller.send(&message).await;
            print_outcome(&outcome);
        }

        Command::SendAudio { file } => {
            let controller = SessionController::new(cfg.chat, policy);
            let mut recorder = Recorder::new(cfg.audio);

            recorder.start(Box::new(WavFileBackend::new(file))).await?;
            let payload = recorder.stop().await?;
            info!(
                "Captured {:.1}s of audio as {}",
                payload.duration_secs,
                payload.file_name()
            );

            let outcome = controller.send_audio(payload).await;
            print_outcome(&outcome);
        }

        Command::Chat => {
            let controller = SessionController::new(cfg.chat, policy);
            let poller = controller.spawn_poller();
            run_chat_loop(&controller).await?;
            controller.shutdown();
            let _ = poller.await;
        }

        Command::Analytics => {
            let http = reqwest::Client::new();
            let snapshot = analytics::fetch_snapshot(&http, &cfg.analytics.endpoint).await?;
            let report = AnalyticsReport::derive(&snapshot);
            print_report(&report, &snapshot);
        }
    }

    Ok(())
}

/// Read lines from stdin, dispatching each as a message. Sends run in the
/// background so `/cancel` stays reachable while a request is in flight;
/// replies (direct and polled) are flushed at every prompt, so a bare Enter
/// shows anything that arrived in the meantime. `/quit` exits.
async fn run_chat_loop(controller: &SessionController) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    println!("flowchat ({})", controller.user_id());
    println!("Type a message, /cancel to abort a pending request, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0usize;

    loop {
        let conversation = controller.conversation().await;
        for message in &conversation[printed..] {
            print_message(message);
        }
        printed = conversation.len();

        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "/quit" => break,
            "/cancel" => controller.cancel().await,
            "" => {}
            text => {
                let sender = controller.clone();
                let text = text.to_string();
                tokio::spawn(async move {
                    match sender.send(&text).await {
                        SendOutcome::Busy => {
                            println!("(still waiting for the previous reply)");
                        }
                        SendOutcome::Failed(err) => {
                            println!("(send failed: {err})");
                        }
                        _ => {}
                    }
                });
            }
        }
    }

    Ok(())
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "bot",
    };
    println!("[{who}] {}", message.content);
}

fn print_outcome(outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Replied(message) => println!("{}", message.content),
        SendOutcome::Duplicate => println!("(duplicate reply suppressed)"),
        SendOutcome::EmptyReply => println!("(empty reply)"),
        SendOutcome::Cancelled => println!("(cancelled)"),
        SendOutcome::Busy => println!("(a request is already in flight)"),
        SendOutcome::Failed(err) => println!("(send failed: {err})"),
    }
}

fn print_report(report: &AnalyticsReport, snapshot: &flowchat::AnalyticsSnapshot) {
    println!("Total messages: {}", report.total_messages);

    match &report.peak_hour {
        Some(peak) => println!("Peak hour:      {} ({} messages)", peak.hour, peak.count),
        None => println!("Peak hour:      n/a"),
    }

    println!();
    println!("Messages per hour:");
    for entry in &snapshot.messages_per_hour {
        println!("  {:>5}  {}", entry.hour, entry.count);
    }

    println!();
    println!("Tool usage:");
    for tool in &report.tool_totals {
        println!("  {:<20} {}", tool.tool, tool.count);
    }
}
