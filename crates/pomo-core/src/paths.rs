use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const POMO_DIR: &str = ".pomo";
pub const CONFIG_FILE: &str = ".pomo/config.yaml";
pub const USERS_FILE: &str = ".pomo/users.yaml";
pub const DB_FILE: &str = ".pomo/pomo.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn pomo_dir(root: &Path) -> PathBuf {
    root.join(POMO_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn users_path(root: &Path) -> PathBuf {
    root.join(USERS_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

pub fn is_initialized(root: &Path) -> bool {
    config_path(root).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_pomo_dir() {
        let root = Path::new("/tmp/proj");
        assert_eq!(config_path(root), PathBuf::from("/tmp/proj/.pomo/config.yaml"));
        assert_eq!(users_path(root), PathBuf::from("/tmp/proj/.pomo/users.yaml"));
        assert_eq!(db_path(root), PathBuf::from("/tmp/proj/.pomo/pomo.redb"));
        assert!(db_path(root).starts_with(pomo_dir(root)));
    }
}
