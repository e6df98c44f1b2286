//! Store inspection and maintenance commands.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use memo_cache::{validate_key, DirStore, Store};
use serde::Serialize;

use crate::{Cli, Command};

#[derive(Debug, Serialize)]
struct RecordRow {
    key: String,
    version: Option<String>,
    file: String,
}

/// Opens the cache directory named by `--dir`, or by `memo.toml`.
pub fn open_store(cli: &Cli) -> Result<DirStore, Box<dyn Error>> {
    let location = match &cli.dir {
        Some(dir) => dir.clone(),
        None => {
            let project = cli.config.clone().unwrap_or_else(|| PathBuf::from("."));
            memo_config::load_config(&project)?.cache.dir
        }
    };
    let mut store = DirStore::open(&location)?;
    if let Some(ext) = &cli.ext {
        store = store.with_extension(ext);
    }
    tracing::debug!(dir = %store.dir().display(), "opened cache directory");
    Ok(store)
}

/// Runs `command` against `store`, writing results to `out`.
pub fn run(
    command: &Command,
    store: &dyn Store,
    out: &mut dyn Write,
) -> Result<i32, Box<dyn Error>> {
    match command {
        Command::List { json } => {
            let rows: Vec<RecordRow> = store
                .keys()?
                .into_iter()
                .map(|key| RecordRow {
                    version: store.read_version(&key),
                    file: store.full_key_name(&key),
                    key,
                })
                .collect();
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
            } else {
                for row in &rows {
                    let version = row.version.as_deref().unwrap_or("<unreadable>");
                    writeln!(out, "{}\t{}", row.key, version)?;
                }
            }
            Ok(0)
        }
        Command::Version { key } => {
            validate_key(key)?;
            match store.read_version(key) {
                Some(version) => {
                    writeln!(out, "{version}")?;
                    Ok(0)
                }
                None => Err(format!("no readable record '{key}'").into()),
            }
        }
        Command::Delete { key } => {
            validate_key(key)?;
            if !store.exists(key) {
                tracing::warn!(key = %key, "no record to delete");
                return Ok(1);
            }
            store.delete(key)?;
            writeln!(out, "deleted {}", store.full_key_name(key))?;
            Ok(0)
        }
        Command::Clear => {
            let removed = store.clear()?;
            tracing::info!(removed, "cleared cache directory");
            writeln!(out, "removed {removed} records")?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn populated() -> (tempfile::TempDir, DirStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        store.write("f_aaa", b"one", "1.0").unwrap();
        store.write("g_bbb", b"two", "2 { app::f: 1.0 }").unwrap();
        (dir, store)
    }

    fn run_to_string(command: Command, store: &DirStore) -> (i32, String) {
        let mut out = Vec::new();
        let code = run(&command, store, &mut out).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn list_as_table() {
        let (_dir, store) = populated();
        let (code, text) = run_to_string(Command::List { json: false }, &store);
        assert_eq!(code, 0);
        assert_eq!(text, "f_aaa\t1.0\ng_bbb\t2 { app::f: 1.0 }\n");
    }

    #[test]
    fn list_as_json() {
        let (_dir, store) = populated();
        let (_, text) = run_to_string(Command::List { json: true }, &store);
        let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["key"], "f_aaa");
        assert_eq!(rows[0]["version"], "1.0");
        assert!(rows[1]["file"].as_str().unwrap().ends_with("g_bbb.memo"));
    }

    #[test]
    fn version_of_record() {
        let (_dir, store) = populated();
        let (_, text) = run_to_string(
            Command::Version {
                key: "g_bbb".into(),
            },
            &store,
        );
        assert_eq!(text.trim_end(), "2 { app::f: 1.0 }");
        let mut out = Vec::new();
        let err = run(
            &Command::Version {
                key: "missing".into(),
            },
            &store,
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn delete_and_clear() {
        let (_dir, store) = populated();
        let (code, _) = run_to_string(
            Command::Delete {
                key: "f_aaa".into(),
            },
            &store,
        );
        assert_eq!(code, 0);
        assert!(!store.exists("f_aaa"));
        let (code, _) = run_to_string(
            Command::Delete {
                key: "f_aaa".into(),
            },
            &store,
        );
        assert_eq!(code, 1);
        let (_, text) = run_to_string(Command::Clear, &store);
        assert_eq!(text, "removed 1 records\n");
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn keys_escaping_the_directory_are_refused() {
        let root = tempfile::tempdir().unwrap();
        let store = DirStore::new(&root.path().join("cache"));
        store.write("f_aaa", b"one", "1.0").unwrap();
        let outside = root.path().join("precious.memo");
        std::fs::write(&outside, b"keep me").unwrap();

        for command in [
            Command::Delete {
                key: "../precious".into(),
            },
            Command::Version {
                key: "../precious".into(),
            },
        ] {
            let mut out = Vec::new();
            let err = run(&command, &store, &mut out).unwrap_err();
            assert!(err.to_string().contains("../precious"));
            assert!(out.is_empty());
        }
        assert!(outside.is_file());
        assert!(store.exists("f_aaa"));
    }

    #[test]
    fn store_from_config_file() {
        let project = tempfile::tempdir().unwrap();
        let cache_dir = project.path().join("cache");
        std::fs::write(
            project.path().join(memo_config::CONFIG_FILE_NAME),
            format!("[cache]\ndir = \"{}\"\n", cache_dir.display()),
        )
        .unwrap();
        let cli = Cli::parse_from([
            "memo",
            "--config",
            project.path().to_str().unwrap(),
            "--ext",
            "bin",
            "list",
        ]);
        let store = open_store(&cli).unwrap();
        assert_eq!(store.dir(), cache_dir.as_path());
        store.write("k", b"x", "1").unwrap();
        assert!(cache_dir.join("k.bin").is_file());
    }

    #[test]
    fn dir_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().display().to_string();
        let cli = Cli::parse_from(["memo", "--dir", location.as_str(), "clear"]);
        let store = open_store(&cli).unwrap();
        assert_eq!(store.dir(), dir.path());
    }
}
