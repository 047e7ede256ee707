use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{Dispatcher, ItemAction, TaskStore, TaskView, DEFAULT_SERVER_URL};
use shared::domain::{Filter, TaskId};
use tokio::io::{AsyncBufReadExt, BufReader};

mod backend;
mod view;

use backend::BackendProcess;
use view::ConsoleView;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the todos backend.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server_url: String,
    /// Server binary to spawn before connecting; omit when a backend is
    /// already running.
    #[arg(long)]
    backend: Option<PathBuf>,
    /// Readiness poll attempts (one per second) before giving up.
    #[arg(long, default_value_t = 30)]
    startup_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut backend = match &args.backend {
        Some(path) => Some(BackendProcess::spawn(path)?),
        None => None,
    };
    backend::wait_until_ready(&args.server_url, args.startup_attempts).await?;

    let view = Arc::new(ConsoleView);
    let store = TaskStore::new(args.server_url.clone(), view.clone());
    let dispatcher = Dispatcher::new(Some(store.clone()))?;

    store.load().await?;
    println!("Due dates start at {}.", Dispatcher::current_date());
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        match run_command(line.trim(), &dispatcher, &store, view.as_ref()).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => eprintln!("error: {error:#}"),
        }
        prompt();
    }

    if let Some(backend) = backend.as_mut() {
        backend.shutdown().await?;
    }
    Ok(())
}

async fn run_command(
    line: &str,
    dispatcher: &Dispatcher,
    store: &Arc<TaskStore>,
    view: &ConsoleView,
) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(true);
    };

    match command {
        "quit" | "exit" => return Ok(false),
        "help" => print_help(),
        "list" => view.render_visible(&store.visible_tasks().await),
        "reload" => store.load().await?,
        "filter" => {
            let name = parts
                .next()
                .ok_or_else(|| anyhow!("usage: filter <all|active|completed>"))?;
            dispatcher.change_filter(name.parse::<Filter>()?).await;
            println!("  filter: {}", store.filter().await);
        }
        "add" => {
            let due_date = parts
                .next()
                .ok_or_else(|| anyhow!("usage: add <due-date> <text>"))?;
            let text = parts.collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return Err(anyhow!("usage: add <due-date> <text>"));
            }
            dispatcher.submit(&text, due_date).await?;
        }
        "toggle" => {
            let id = parse_id(parts.next())?;
            dispatcher
                .dispatch_item_action(id, &[ItemAction::Toggle])
                .await?;
        }
        "edit" => {
            let id = parse_id(parts.next())?;
            dispatcher
                .dispatch_item_action(id, &[ItemAction::Edit])
                .await?;
        }
        "del" => {
            let id = parse_id(parts.next())?;
            dispatcher
                .dispatch_item_action(id, &[ItemAction::Delete])
                .await?;
        }
        other => return Err(anyhow!("unknown command '{other}'; try 'help'")),
    }

    Ok(true)
}

fn prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn parse_id(raw: Option<&str>) -> Result<TaskId> {
    let raw = raw.ok_or_else(|| anyhow!("expected a task id"))?;
    let id = raw.parse().context("task id must be an integer")?;
    Ok(TaskId(id))
}

fn print_help() {
    println!("commands:");
    println!("  add <due-date> <text>   add a task, or update the one being edited");
    println!("  toggle <id>             flip completion");
    println!("  edit <id>               enter/leave edit mode for a task");
    println!("  del <id>                delete a task");
    println!("  filter <all|active|completed>");
    println!("  list                    show the current view");
    println!("  reload                  refetch from the backend");
    println!("  quit");
}
