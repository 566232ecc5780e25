//! Helpers for (de)serialising trained models in Hugging Face and GPT-2 layouts.

pub mod gpt2;
pub mod huggingface;

pub use gpt2::{load_vocab_and_merges, save_vocab_and_merges, Gpt2Files};
pub use huggingface::{load_tokenizer, save_huggingface_tokenizer, tokenizer_json};
