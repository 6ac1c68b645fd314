//! Commit hook seam for durably recording accepted blocks
//!
//! The ledger core keeps its chain in memory. A `CommitHook` is called with
//! every block before it is appended; if the hook fails the block is dropped
//! and nothing in the core changes.

use crate::blockchain::Block;
use crate::error::ChainError;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Called with each block before it becomes the chain tip.
pub trait CommitHook: Send + Sync {
    fn on_commit(&self, block: &Block) -> Result<(), ChainError>;
}

/// Keeps committed blocks in memory. Useful for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    blocks: Mutex<Vec<Block>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> Result<Vec<Block>, ChainError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::IoError("Mutex poisoned".to_string()))?;
        Ok(blocks.clone())
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommitHook for InMemoryJournal {
    fn on_commit(&self, block: &Block) -> Result<(), ChainError> {
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::IoError("Mutex poisoned".to_string()))?;
        blocks.push(block.clone());
        Ok(())
    }
}

/// Appends each committed block as one JSON line and syncs the file.
pub struct FileJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                ChainError::IoError(format!("Failed to open journal {}: {}", path.display(), e))
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every block in the journal, in commit order.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Block>, ChainError> {
        let file = File::open(path.as_ref())?;
        let mut blocks = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            blocks.push(serde_json::from_str(&line)?);
        }
        Ok(blocks)
    }
}

impl CommitHook for FileJournal {
    fn on_commit(&self, block: &Block) -> Result<(), ChainError> {
        let mut line = serde_json::to_string(block)?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| ChainError::IoError("Mutex poisoned".to_string()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}
