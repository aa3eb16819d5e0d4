use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use pomo_core::identity::UserRegistry;
use pomo_core::{paths, PomoError};
use std::path::Path;

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Register a user and print their bearer token (shown once)
    Add { email: String },
    /// List registered users
    List,
    /// Issue a new token for a user, invalidating the old one
    Rotate { email: String },
}

pub fn run(root: &Path, subcmd: UserSubcommand, json: bool) -> anyhow::Result<()> {
    if !paths::is_initialized(root) {
        return Err(PomoError::NotInitialized.into());
    }
    match subcmd {
        UserSubcommand::Add { email } => add(root, &email, json),
        UserSubcommand::List => list(root, json),
        UserSubcommand::Rotate { email } => rotate(root, &email, json),
    }
}

fn add(root: &Path, email: &str, json: bool) -> anyhow::Result<()> {
    let mut registry = UserRegistry::load(root).context("failed to load users.yaml")?;
    let (user, token) = registry.register(email)?;
    registry.save(root).context("failed to save users.yaml")?;

    if json {
        print_json(&serde_json::json!({
            "id": user.id,
            "email": user.email,
            "token": token,
        }))?;
    } else {
        println!("Registered {} ({})", user.email, user.id);
        println!("Token (shown once): {token}");
        println!("\nexport POMO_TOKEN={token}");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = UserRegistry::load(root).context("failed to load users.yaml")?;

    if json {
        let users: Vec<_> = registry
            .users
            .iter()
            .map(|u| {
                serde_json::json!({
                    "id": u.id,
                    "email": u.email,
                    "createdAt": u.created_at,
                })
            })
            .collect();
        return print_json(&users);
    }

    if registry.users.is_empty() {
        println!("No users. Add one with: pomo user add <email>");
        return Ok(());
    }
    let rows = registry
        .users
        .iter()
        .map(|u| {
            vec![
                u.email.clone(),
                u.id.to_string(),
                u.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["EMAIL", "ID", "CREATED"], rows);
    Ok(())
}

fn rotate(root: &Path, email: &str, json: bool) -> anyhow::Result<()> {
    let mut registry = UserRegistry::load(root).context("failed to load users.yaml")?;
    let token = registry.rotate_token(email)?;
    registry.save(root).context("failed to save users.yaml")?;

    if json {
        print_json(&serde_json::json!({ "email": email, "token": token }))?;
    } else {
        println!("New token for {email} (shown once): {token}");
    }
    Ok(())
}
