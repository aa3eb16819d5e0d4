use anyhow::Context;
use pomo_core::config::Config;
use pomo_core::identity::UserRegistry;
use pomo_core::{paths, Store};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing pomo in: {}", root.display());

    let dir = paths::pomo_dir(root);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    if paths::users_path(root).exists() {
        println!("  exists:  {}", paths::USERS_FILE);
    } else {
        UserRegistry::default()
            .save(root)
            .context("failed to write users.yaml")?;
        println!("  created: {}", paths::USERS_FILE);
    }

    let existed = paths::db_path(root).exists();
    Store::open(&paths::db_path(root)).context("failed to create the data file")?;
    println!(
        "  {} {}",
        if existed { "exists: " } else { "created:" },
        paths::DB_FILE
    );

    println!("\nNext: pomo user add <email>");
    Ok(())
}
