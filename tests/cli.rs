use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

use pngseal::chunk::{self, Chunk, ChunkType};
use pngseal::config::{
    ENV_CONFIG_PATH, ENV_KEY_DIR, ENV_PRIVATE_KEY, ENV_PUBLIC_KEY, PRIVATE_KEY_FILE_NAME,
    PUBLIC_KEY_FILE_NAME,
};
use pngseal::text_chunk::{self, TextRecord};

fn write_png(dir: &Path, records: &[TextRecord]) -> Result<PathBuf> {
    let mut chunks = vec![Chunk::new(
        ChunkType::IHDR,
        vec![0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0],
    )];
    chunks.extend(records.iter().map(text_chunk::build));
    chunks.push(Chunk::new(ChunkType::IEND, Vec::new()));

    let path = dir.join("image.png");
    fs::write(&path, chunk::serialize(&chunks)?)?;
    Ok(path)
}

/// Run the binary with key files pointed at `key_dir`
fn pngseal(key_dir: &Path, args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_pngseal"))
        .args(args)
        .env(ENV_KEY_DIR, key_dir)
        .env_remove(ENV_PUBLIC_KEY)
        .env_remove(ENV_PRIVATE_KEY)
        .env_remove(ENV_CONFIG_PATH)
        .output()?)
}

fn no_keys_created(key_dir: &Path) -> bool {
    !key_dir.join(PUBLIC_KEY_FILE_NAME).exists() && !key_dir.join(PRIVATE_KEY_FILE_NAME).exists()
}

#[test]
fn read_only_commands_do_not_create_keys() -> Result<()> {
    let tmp = TempDir::new()?;
    let key_dir = tmp.path().join("keys");
    fs::create_dir(&key_dir)?;
    let image = write_png(tmp.path(), &[TextRecord::new("Comment", "hello there")?])?;
    let image = image.to_str().unwrap();

    let out = pngseal(&key_dir, &["list", image])?;
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("hello there"));

    let out = pngseal(&key_dir, &["info", "--json", image])?;
    assert!(out.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(summary["text_records"], 1);

    let out = pngseal(&key_dir, &["show", image, "0"])?;
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("hello there"));

    assert!(no_keys_created(&key_dir));
    Ok(())
}

#[test]
fn show_encrypted_without_keys_fails() -> Result<()> {
    let tmp = TempDir::new()?;
    let key_dir = tmp.path().join("keys");
    fs::create_dir(&key_dir)?;
    let image = write_png(tmp.path(), &[TextRecord::new("Secret", "ENC:AAAA:BBBB")?])?;

    let out = pngseal(&key_dir, &["show", image.to_str().unwrap(), "0"])?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("keys init"));
    assert!(no_keys_created(&key_dir));
    Ok(())
}
