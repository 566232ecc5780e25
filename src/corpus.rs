//! Facilities for discovering input files and loading text corpora.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{BpeError, Result};

/// Discovers files rooted at the provided input paths according to the ingest configuration.
///
/// Directories are traversed recursively by default; set [`IngestConfig::recursive`] to `false`
/// to limit discovery to the first level.  Symlink traversal is controlled through
/// [`IngestConfig::follow_symlinks`].  Paths discovered inside a directory are sorted so that
/// document order, and therefore training output, does not depend on filesystem order.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(BpeError::Config(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .symlink_metadata()
            .map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            let mut discovered = Vec::new();
            if cfg.recursive {
                let walker = WalkDir::new(path)
                    .follow_links(cfg.follow_symlinks)
                    .sort_by_file_name();
                for entry in walker {
                    let entry = entry.map_err(|err| BpeError::Internal(err.to_string()))?;
                    if entry.file_type().is_file() {
                        discovered.push(entry.path().to_path_buf());
                    }
                }
            } else {
                for entry in
                    fs::read_dir(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?
                {
                    let entry = entry.map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
                    let entry_path = entry.path();
                    if entry_path.is_file() {
                        discovered.push(entry_path);
                    }
                }
                discovered.sort();
            }
            files.extend(discovered);
        } else if metadata.is_file() || (cfg.follow_symlinks && path.is_file()) {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(BpeError::Config(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}

/// Loads every discovered file in full, one document per file, preserving discovery order.
///
/// Files are never read partially: a document boundary always coincides with a file boundary,
/// so no UTF-8 sequence or pre-tokenized segment is ever cut in half.
pub fn load_documents<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<Vec<u8>>> {
    let file_paths = collect_paths(inputs, cfg)?;
    let mut documents = Vec::with_capacity(file_paths.len());
    for file_path in file_paths {
        let buffer =
            fs::read(&file_path).map_err(|err| BpeError::io(err, Some(file_path.clone())))?;
        documents.push(buffer);
    }
    Ok(documents)
}

/// Validates raw documents as UTF-8 text.
///
/// Fails with [`BpeError::Encoding`] naming the first offending document.
pub fn decode_documents(documents: &[Vec<u8>]) -> Result<Vec<&str>> {
    documents
        .iter()
        .enumerate()
        .map(|(idx, doc)| std::str::from_utf8(doc).map_err(|err| BpeError::encoding(idx, err)))
        .collect()
}
