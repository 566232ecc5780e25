//! Hugging Face compatible serialisation helpers built on top of `tokenizers`.

use std::fs;
use std::path::Path;

use serde_json::{self, json, Value};
use tokenizers::Tokenizer;

use crate::error::{BpeError, Result};
use crate::model::BpeModel;
use crate::vocab::BASE_VOCAB_SIZE;

/// Serialises the trained tokenizer to a JSON string compatible with Hugging Face.
pub fn tokenizer_json(model: &BpeModel, pretty: bool) -> Result<String> {
    let tokenizer = model.build_tokenizer()?;
    let raw = tokenizer
        .to_string(false)
        .map_err(|err| BpeError::Tokenizers(err.to_string()))?;
    let mut value: Value = serde_json::from_str(&raw)?;

    if !value.is_object() {
        return Err(BpeError::Tokenizers(
            "expected tokenizer JSON to be an object".into(),
        ));
    }

    // Special tokens keep the ids they hold in the trained vocabulary, right after the bytes.
    let added_tokens = model
        .special_tokens()
        .iter()
        .enumerate()
        .map(|(offset, token)| {
            json!({
                "id": (BASE_VOCAB_SIZE + offset) as u32,
                "content": token,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true
            })
        })
        .collect();
    value["added_tokens"] = Value::Array(added_tokens);

    let json = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(json)
}

/// Persists the trained tokenizer as `tokenizer.json` compatible with Hugging Face tooling.
pub fn save_huggingface_tokenizer<P: AsRef<Path>>(
    model: &BpeModel,
    path: P,
    pretty: bool,
) -> Result<()> {
    let json = tokenizer_json(model, pretty)?;
    fs::write(path.as_ref(), json)
        .map_err(|err| BpeError::io(err, Some(path.as_ref().to_path_buf())))
}

/// Loads a tokenizer.json file via the Hugging Face `tokenizers` crate.
pub fn load_tokenizer<P: AsRef<Path>>(path: P) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|err| BpeError::Tokenizers(err.to_string()))
}
