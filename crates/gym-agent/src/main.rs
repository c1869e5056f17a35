//! Chat with the assistant in the terminal.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use gym_agent::build_from_config;
use gym_agent::config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Stdin};
use tokio::select;
use tokio::time::sleep;
use uuid::Uuid;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    let agent = match build_from_config(&config) {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    // One thread per process, so the assistant remembers the whole session.
    let thread_id = Uuid::new_v4().to_string();
    info!("chatting on thread {thread_id}");

    let mut stdin = BufReader::new(io::stdin());
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("bye") {
            println!("{}👋 Dhanyabad hajur!", BAR_CHAR.bright_cyan());
            break;
        }
        if line.is_empty() {
            continue;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");

        let mut turn = pin!(agent.run_turn(&thread_id, line));
        let result = loop {
            progress_bar.inc(1);
            select! {
                result = &mut turn => break result,
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };

        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();

        match result {
            Ok(conversation) => {
                let answer = conversation.last_assistant_text().unwrap_or_default();
                println!("{}🤖 {}", BAR_CHAR.bright_cyan(), answer.bright_white());
            }
            Err(err) => {
                error!("turn failed: {err}");
                println!(
                    "{}⚠️  {}",
                    BAR_CHAR.bright_red(),
                    err.to_string().bright_white()
                );
            }
        }
        println!();
    }
}

async fn read_line(stdin: &mut BufReader<Stdin>) -> Option<String> {
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
