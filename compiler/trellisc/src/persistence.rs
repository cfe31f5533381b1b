//! Write generated sources to disk without touching files whose contents didn't change.
//!
//! `cargo` looks at modification times when fingerprinting source files: rewriting an
//! identical file would trigger a rebuild of the whole crate.
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexSet;
use sha2::Digest;

pub struct SourceWriter {
    mode: WriterMode,
}

enum WriterMode {
    Update,
    /// Nothing is written to disk: outdated files are only recorded.
    CheckOnly { outdated: IndexSet<PathBuf> },
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{} generated file(s) are not up to date: {}", .outdated.len(), list(.outdated))]
#[diagnostic(
    code(trellisc::outdated),
    help("Run `trellisc codegen` (or `trellisc generate`) without `--check` to regenerate them.")
)]
pub struct OutdatedFiles {
    pub outdated: Vec<PathBuf>,
}

fn list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("`{}`", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SourceWriter {
    pub fn update_mode() -> Self {
        Self {
            mode: WriterMode::Update,
        }
    }

    pub fn check_mode() -> Self {
        Self {
            mode: WriterMode::CheckOnly {
                outdated: IndexSet::new(),
            },
        }
    }

    #[tracing::instrument(skip_all, level = tracing::Level::DEBUG, fields(path = %path.display()))]
    /// Write `contents` to `path`, unless the file already holds exactly those bytes.
    ///
    /// In check mode, the file is recorded as outdated instead of being written.
    pub fn persist_if_changed(&mut self, path: &Path, contents: &[u8]) -> Result<(), anyhow::Error> {
        // A file we can't read is treated as changed.
        let has_changed = has_changed(path, contents).unwrap_or(true);
        if !has_changed {
            tracing::debug!("Unchanged, skipping");
            return Ok(());
        }
        match &mut self.mode {
            WriterMode::CheckOnly { outdated } => {
                outdated.insert(path.to_path_buf());
            }
            WriterMode::Update => {
                if let Some(parent) = path.parent() {
                    fs_err::create_dir_all(parent)?;
                }
                let mut file = fs_err::OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .create(true)
                    .open(path)?;
                file.write_all(contents)
                    .with_context(|| format!("Failed to write `{}`", path.display()))?;
            }
        }
        Ok(())
    }

    /// Fails, listing them, if any file was found to be outdated in check mode.
    pub fn verify(&self) -> Result<(), OutdatedFiles> {
        let WriterMode::CheckOnly { outdated } = &self.mode else {
            return Ok(());
        };
        if outdated.is_empty() {
            return Ok(());
        }
        Err(OutdatedFiles {
            outdated: outdated.iter().cloned().collect(),
        })
    }
}

/// Returns `true` if the file contents differ from `contents`.
///
/// It returns an error if the file can't be read, e.g. because it doesn't exist.
fn has_changed(path: &Path, contents: &[u8]) -> Result<bool, anyhow::Error> {
    let file = fs_err::File::open(path)?;
    // Cheaper check first.
    if file.metadata()?.len() != contents.len() as u64 {
        return Ok(true);
    }
    Ok(file_checksum(file)? != buffer_checksum(contents))
}

fn file_checksum(file: fs_err::File) -> std::io::Result<String> {
    let mut hasher = sha2::Sha256::new();
    let mut reader = std::io::BufReader::new(file);
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn buffer_checksum(buffer: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(buffer);
    format!("{:x}", hasher.finalize())
}
