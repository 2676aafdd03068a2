//! Shared test utilities for tether-cli integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Get a Command for the tether binary.
///
/// # Panics
///
/// Panics if the tether binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn tether_cmd() -> Command {
    Command::cargo_bin("tether").expect("tether binary should exist")
}

const CONFIG: &str = r#"
storage:
  backend: file
  path: data
directory: entities.yaml
connections:
  see_also:
    from_kind: item
    from_subtypes: article
    to_kind: item
    to_subtypes: [article]
  related_people:
    from_kind: item
    from_subtypes: article
    to_kind: principal
    to_subtypes: principal
"#;

const ENTITIES: &str = r#"
item_types:
  article: { name: Articles, singular_name: Article }
items:
  - { id: 1, item_type: article, title: Rust ownership }
  - { id: 2, item_type: article, title: Borrowing explained }
  - { id: 3, item_type: article, title: Rust lifetimes }
principals:
  - { id: 7, login: ann, display_name: Ann Berg }
"#;

/// Write a config, data directory and entity snapshot into `dir`.
///
/// Returns the config path to pass via `--config`.
pub fn write_fixture(dir: &Path) -> PathBuf {
    fs::create_dir_all(dir.join("data")).expect("create data dir");
    fs::write(dir.join("entities.yaml"), ENTITIES).expect("write entities");
    let config = dir.join("config.yaml");
    fs::write(&config, CONFIG).expect("write config");
    config
}

/// A tether command bound to the fixture config, with colors off.
pub fn fixture_cmd(config: &Path) -> Command {
    let mut cmd = tether_cmd();
    cmd.env_remove("TETHER_VERBOSE")
        .env_remove("TETHER_QUIET")
        .env_remove("TETHER_COLOR")
        .arg("--config")
        .arg(config)
        .args(["--color", "never"]);
    cmd
}
