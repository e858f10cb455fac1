use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "keystone.yaml";

pub fn keystone_root(home: &Path) -> PathBuf {
    home.join(".keystone")
}

/// `<home>/.keystone/keystone.yaml`
pub fn config_path(home: &Path) -> PathBuf {
    keystone_root(home).join(CONFIG_FILE)
}
