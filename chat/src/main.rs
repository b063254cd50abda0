mod client;

use anyhow::Result;
use client::{AskResponse, ChatClient, StoredFile};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const GREETING: &str = "Hello! I'm your company knowledge assistant. You can upload PDF documents and ask questions about them.";

const HELP: &str = "Commands:
  /upload <path>   upload a PDF, text or markdown file
  /docs            list uploaded documents
  /help            show this message
  /quit, /exit     leave
Anything else is sent as a question.";

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Upload(&'a str),
    Documents,
    Help,
    Quit,
    Ask(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        match line.split_once(char::is_whitespace) {
            Some(("/upload", path)) => Command::Upload(path.trim()),
            None if line == "/upload" => Command::Upload(""),
            _ => match line {
                "/docs" => Command::Documents,
                "/help" => Command::Help,
                "/quit" | "/exit" => Command::Quit,
                _ => Command::Ask(line),
            },
        }
    }
}

fn render_answer(response: &AskResponse) -> String {
    if response.status != "success" {
        return format!(
            "Error: {}",
            response.error.as_deref().unwrap_or("Unknown error")
        );
    }

    let mut out = response.answer.clone();
    if let Some(sources) = response.sources.as_ref().filter(|s| !s.is_empty()) {
        out.push_str("\n\nSources:");
        for source in sources {
            out.push_str("\n  - ");
            out.push_str(&source.source);
            if let Some(page) = source.page {
                out.push_str(&format!(" (page {})", page + 1));
            }
        }
    }
    out
}

fn render_documents(documents: &[StoredFile]) -> String {
    if documents.is_empty() {
        return "No documents uploaded yet.".to_string();
    }
    let mut out = String::from("Documents:");
    for doc in documents {
        out.push_str(&format!("\n  - {} ({})", doc.filename, doc.id));
    }
    out
}

async fn handle(client: &ChatClient, command: Command<'_>) -> Option<String> {
    let reply = match command {
        Command::Empty => return Some(String::new()),
        Command::Quit => return None,
        Command::Help => HELP.to_string(),
        Command::Upload("") => "Usage: /upload <path>".to_string(),
        Command::Upload(path) => {
            let path = Path::new(path);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            match client.upload(path).await {
                Ok(uploaded) => {
                    log::info!(
                        "{}: id={} path={}",
                        uploaded.message,
                        uploaded.file_id,
                        uploaded.file_path.as_deref().unwrap_or("-")
                    );
                    format!(
                        "File '{}' uploaded successfully! You can now ask questions about its contents.",
                        name
                    )
                }
                Err(e) => {
                    log::warn!("Upload of {} failed: {:#}", path.display(), e);
                    format!("Error uploading file '{}': {:#}", name, e)
                }
            }
        }
        Command::Documents => match client.documents().await {
            Ok(documents) => render_documents(&documents),
            Err(e) => format!("Sorry, an error occurred: {:#}", e),
        },
        Command::Ask(question) => match client.ask(question).await {
            Ok(response) => render_answer(&response),
            Err(e) => {
                log::warn!("Question failed: {:#}", e);
                format!("Sorry, an error occurred: {:#}", e)
            }
        },
    };
    Some(reply)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let backend_url =
        std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let client = ChatClient::new(backend_url);
    log::info!("Using backend {}", client.base_url());

    println!("{}", GREETING);
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match handle(&client, Command::parse(&line)).await {
            Some(reply) if reply.is_empty() => {}
            Some(reply) => println!("{}\n", reply),
            None => break,
        }
    }

    Ok(())
}
