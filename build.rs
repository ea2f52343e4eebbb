//! Build script for genrefy.
//!
//! Copies `.env.example` from the crate root into the local data directory so
//! a configuration template sits next to where genrefy looks for `.env`:
//! - Linux: `~/.local/share/genrefy/.env.example`
//! - macOS: `~/Library/Application Support/genrefy/.env.example`
//! - Windows: `%LOCALAPPDATA%/genrefy/.env.example`
//!
//! A missing template only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let template = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("genrefy");

    if !template.is_file() {
        println!(
            "cargo:warning=.env.example not found at {}",
            template.display()
        );
        return Ok(());
    }

    fs::create_dir_all(&out_dir)?;
    fs::copy(&template, out_dir.join(".env.example"))?;
    Ok(())
}
