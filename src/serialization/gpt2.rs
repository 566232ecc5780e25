//! GPT-2 style `vocab.json` / `merges.txt` pair.
//!
//! Token strings use the byte-level alphabet from [`crate::bytes`], except special tokens which
//! are written verbatim. Merge lines hold the two parts separated by a single space; neither part
//! can contain a space once rendered.
//!
//! Special tokens are recognised on load by position: every id is either a byte, a special token,
//! or a merge result, so ids `256..len - merges` are the special tokens.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::bytes::string_to_bytes;
use crate::error::{BpeError, Result};
use crate::model::{BpeModel, Pair, TokenId};
use crate::vocab::BASE_VOCAB_SIZE;

/// File name of the vocabulary map.
pub const VOCAB_FILE: &str = "vocab.json";
/// File name of the ordered merge list.
pub const MERGES_FILE: &str = "merges.txt";
const MERGES_HEADER: &str = "#version: 0.2";

/// Serialises the vocabulary as a JSON object in id order.
struct VocabMap<'a>(&'a BpeModel);

impl Serialize for VocabMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.vocab_size()))?;
        for idx in 0..self.0.vocab_size() {
            map.serialize_entry(&self.0.token_string(idx), &idx)?;
        }
        map.end()
    }
}

/// Writes `vocab.json` and `merges.txt` for `model` into `dir`, creating it if needed.
pub fn save_vocab_and_merges<P: AsRef<Path>>(model: &BpeModel, dir: P) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|err| BpeError::io(err, Some(dir.to_path_buf())))?;

    let vocab_path = dir.join(VOCAB_FILE);
    let vocab = serde_json::to_string(&VocabMap(model))?;
    fs::write(&vocab_path, vocab).map_err(|err| BpeError::io(err, Some(vocab_path.clone())))?;

    let mut merges = String::with_capacity(16 * model.merges().len() + MERGES_HEADER.len() + 1);
    merges.push_str(MERGES_HEADER);
    merges.push('\n');
    for &(left, right) in model.merges() {
        merges.push_str(&model.token_string(left as usize));
        merges.push(' ');
        merges.push_str(&model.token_string(right as usize));
        merges.push('\n');
    }
    let merges_path = dir.join(MERGES_FILE);
    fs::write(&merges_path, merges).map_err(|err| BpeError::io(err, Some(merges_path.clone())))
}

/// Vocabulary and merge table read back from a GPT-2 style directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gpt2Files {
    /// Bytes of every id, indexed by id.
    pub tokens: Vec<Vec<u8>>,
    /// Merge table in application order.
    pub merges: Vec<Pair>,
}

/// Reads `vocab.json` and `merges.txt` from `dir`.
///
/// Special tokens are read back verbatim; every other entry is decoded from the byte-level
/// alphabet.
pub fn load_vocab_and_merges<P: AsRef<Path>>(dir: P) -> Result<Gpt2Files> {
    let dir = dir.as_ref();
    let vocab_path = dir.join(VOCAB_FILE);
    let raw = fs::read_to_string(&vocab_path)
        .map_err(|err| BpeError::io(err, Some(vocab_path.clone())))?;
    let entries: FxHashMap<String, TokenId> = serde_json::from_str(&raw)?;

    let merges_path = dir.join(MERGES_FILE);
    let raw = fs::read_to_string(&merges_path)
        .map_err(|err| BpeError::io(err, Some(merges_path.clone())))?;
    let mut merges = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.starts_with("#version") || line.is_empty() {
            continue;
        }
        let (left, right) = line.split_once(' ').ok_or_else(|| {
            BpeError::Serialization(format!(
                "{MERGES_FILE}:{}: expected two space separated tokens",
                line_no + 1
            ))
        })?;
        let lookup = |part: &str| {
            entries.get(part).copied().ok_or_else(|| {
                BpeError::Serialization(format!(
                    "{MERGES_FILE}:{}: unknown token {part:?}",
                    line_no + 1
                ))
            })
        };
        merges.push((lookup(left)?, lookup(right)?));
    }

    let seed_len = entries
        .len()
        .checked_sub(merges.len())
        .filter(|&seed| seed >= BASE_VOCAB_SIZE)
        .ok_or_else(|| {
            BpeError::Serialization(format!(
                "{} vocabulary entries cannot hold 256 bytes plus {} merges",
                entries.len(),
                merges.len()
            ))
        })?;

    let mut slots: Vec<Option<Vec<u8>>> = vec![None; entries.len()];
    for (text, &id) in &entries {
        let idx = id as usize;
        let slot = slots.get_mut(idx).ok_or_else(|| {
            BpeError::Serialization(format!(
                "{VOCAB_FILE}: id {id} for {text:?} is outside 0..{}",
                entries.len()
            ))
        })?;
        if slot.is_some() {
            return Err(BpeError::Serialization(format!(
                "{VOCAB_FILE}: id {id} assigned twice"
            )));
        }
        let bytes = if (BASE_VOCAB_SIZE..seed_len).contains(&idx) {
            text.as_bytes().to_vec()
        } else {
            string_to_bytes(text).ok_or_else(|| {
                BpeError::Serialization(format!(
                    "{VOCAB_FILE}: {text:?} is not in the byte-level alphabet"
                ))
            })?
        };
        *slot = Some(bytes);
    }
    // With as many distinct ids as slots, every slot is filled.
    let tokens: Vec<Vec<u8>> = slots.into_iter().flatten().collect();

    Ok(Gpt2Files { tokens, merges })
}
