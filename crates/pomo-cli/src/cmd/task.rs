use crate::backend::{runtime, Backend};
use crate::output::{print_json, print_table};
use clap::Subcommand;
use pomo_core::task::summarize;
use pomo_core::Listing;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Add a task
    Add {
        #[arg(required = true)]
        description: Vec<String>,
    },
    /// List your tasks in creation order
    List,
    /// Mark a task completed
    Done { id: String },
    /// Mark a task not completed
    Undo { id: String },
    /// Delete all completed tasks
    Clear,
}

pub fn run(backend: Backend, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    runtime()?.block_on(async move {
        match subcmd {
            TaskSubcommand::Add { description } => add(&backend, &description.join(" "), json).await,
            TaskSubcommand::List => list(&backend, json).await,
            TaskSubcommand::Done { id } => set(&backend, &id, true, json).await,
            TaskSubcommand::Undo { id } => set(&backend, &id, false, json).await,
            TaskSubcommand::Clear => clear(&backend, json).await,
        }
    })
}

async fn add(backend: &Backend, description: &str, json: bool) -> anyhow::Result<()> {
    let task = backend.add_task(description).await?;
    if json {
        print_json(&task)?;
    } else {
        println!("Added task [{}]: {}", task.id, task.description);
    }
    Ok(())
}

async fn list(backend: &Backend, json: bool) -> anyhow::Result<()> {
    let tasks = backend.list_tasks().await?;
    if json {
        return print_json(&Listing::from(tasks));
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let summary = summarize(&tasks);
    let rows = tasks
        .into_iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                if t.is_completed { "x" } else { " " }.to_string(),
                t.description,
            ]
        })
        .collect();
    print_table(&["ID", "DONE", "DESCRIPTION"], rows);
    println!("\n{summary}");
    Ok(())
}

async fn set(backend: &Backend, id: &str, done: bool, json: bool) -> anyhow::Result<()> {
    let task = backend.set_task_completion(id, done).await?;
    if json {
        print_json(&task)?;
    } else if done {
        println!("Completed task [{}]: {}", task.id, task.description);
    } else {
        println!("Reopened task [{}]: {}", task.id, task.description);
    }
    Ok(())
}

async fn clear(backend: &Backend, json: bool) -> anyhow::Result<()> {
    let deleted = backend.delete_completed_tasks().await?;
    if json {
        print_json(&serde_json::json!({ "deleted": deleted }))?;
    } else {
        println!("Deleted {deleted} completed task(s)");
    }
    Ok(())
}
