//! GPT-2 style pre-tokenization of decoded text into independent segments.
//!
//! Segments are the boundaries merges never cross. The splitting rule is the GPT-2 pattern, so
//! artifacts trained here line up with tokenizers that use the same byte-level regex.

use std::borrow::Cow;

use fancy_regex::Regex;

use crate::error::{BpeError, Result};

/// GPT-2 splitting rule: contractions, letter runs, number runs, symbol runs, trailing
/// whitespace, any other whitespace.
pub const GPT2_PATTERN: &str =
    r"'(?:[sdmt]|ll|ve|re)| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

const CONTRACTIONS: [&str; 7] = ["'s", "'d", "'m", "'t", "'ll", "'ve", "'re"];

/// Class of a pre-tokenized segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// One of `'s 'd 'm 't 'll 've 're`.
    Contraction,
    /// Letters, optionally preceded by a single space.
    Letters,
    /// Numeric characters, optionally preceded by a single space.
    Numbers,
    /// Neither whitespace nor letters/numbers, optionally preceded by a single space.
    Symbols,
    /// Whitespace not followed by a non-whitespace character.
    TrailingWhitespace,
    /// Any other whitespace run.
    Whitespace,
    /// A configured special token cut out verbatim.
    Special,
}

/// A slice of the input text together with its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreToken<'a> {
    /// Text covered by the segment.
    pub text: &'a str,
    /// Class assigned by the splitting rule.
    pub kind: SegmentKind,
}

/// Compiled pre-tokenizer with optional special-token isolation.
#[derive(Debug, Clone)]
pub struct PreTokenizer {
    pattern: Regex,
    specials: Option<Regex>,
}

impl PreTokenizer {
    /// Builds a pre-tokenizer that splits with [`GPT2_PATTERN`] only.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(GPT2_PATTERN)?,
            specials: None,
        })
    }

    /// Builds a pre-tokenizer that first cuts `special_tokens` out as atomic segments.
    ///
    /// When two tokens start at the same position the longer one wins.
    pub fn with_special_tokens<S: AsRef<str>>(special_tokens: &[S]) -> Result<Self> {
        let mut tokens: Vec<&str> = special_tokens
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !t.is_empty())
            .collect();
        let mut tokenizer = Self::new()?;
        if tokens.is_empty() {
            return Ok(tokenizer);
        }
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = tokens
            .iter()
            .map(|t| fancy_regex::escape(t))
            .collect::<Vec<Cow<'_, str>>>()
            .join("|");
        tokenizer.specials = Some(Regex::new(&alternation)?);
        Ok(tokenizer)
    }

    /// Splits `text` into segments covering it entirely, in order.
    pub fn split<'a>(&self, text: &'a str) -> Result<Vec<PreToken<'a>>> {
        let mut out = Vec::new();
        let Some(specials) = &self.specials else {
            self.split_plain(text, &mut out)?;
            return Ok(out);
        };
        let mut cursor = 0usize;
        for found in specials.find_iter(text) {
            let found = found.map_err(|err| BpeError::Pattern(err.to_string()))?;
            self.split_plain(&text[cursor..found.start()], &mut out)?;
            out.push(PreToken {
                text: found.as_str(),
                kind: SegmentKind::Special,
            });
            cursor = found.end();
        }
        self.split_plain(&text[cursor..], &mut out)?;
        Ok(out)
    }

    fn split_plain<'a>(&self, text: &'a str, out: &mut Vec<PreToken<'a>>) -> Result<()> {
        for found in self.pattern.find_iter(text) {
            let found = found.map_err(|err| BpeError::Pattern(err.to_string()))?;
            if found.as_str().is_empty() {
                continue;
            }
            let followed_by = text[found.end()..].chars().next();
            out.push(PreToken {
                text: found.as_str(),
                kind: classify(found.as_str(), followed_by),
            });
        }
        Ok(())
    }
}

fn classify(segment: &str, followed_by: Option<char>) -> SegmentKind {
    if CONTRACTIONS.contains(&segment) {
        return SegmentKind::Contraction;
    }
    if segment.chars().all(char::is_whitespace) {
        return match followed_by {
            Some(next) if !next.is_whitespace() => SegmentKind::Whitespace,
            _ => SegmentKind::TrailingWhitespace,
        };
    }
    let body = segment.strip_prefix(' ').unwrap_or(segment);
    match body.chars().next() {
        Some(ch) if ch.is_alphabetic() => SegmentKind::Letters,
        Some(ch) if ch.is_numeric() => SegmentKind::Numbers,
        _ => SegmentKind::Symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(tokens: &[PreToken<'a>]) -> Vec<&'a str> {
        tokens.iter().map(|t| t.text).collect()
    }

    #[test]
    fn splits_words_numbers_symbols_and_contractions() {
        let pre = PreTokenizer::new().unwrap();
        let tokens = pre.split("I'll pay 42 dollars!! ok").unwrap();
        assert_eq!(
            texts(&tokens),
            vec!["I", "'ll", " pay", " 42", " dollars", "!!", " ok"]
        );
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Letters,
                SegmentKind::Contraction,
                SegmentKind::Letters,
                SegmentKind::Numbers,
                SegmentKind::Letters,
                SegmentKind::Symbols,
                SegmentKind::Letters,
            ]
        );
    }

    #[test]
    fn whitespace_runs_leave_one_space_for_the_next_word() {
        let pre = PreTokenizer::new().unwrap();
        let tokens = pre.split("a   b\n").unwrap();
        assert_eq!(texts(&tokens), vec!["a", "  ", " b", "\n"]);
        assert_eq!(tokens[1].kind, SegmentKind::TrailingWhitespace);
        assert_eq!(tokens[3].kind, SegmentKind::TrailingWhitespace);

        let tokens = pre.split("a\nb").unwrap();
        assert_eq!(texts(&tokens), vec!["a", "\n", "b"]);
        assert_eq!(tokens[1].kind, SegmentKind::Whitespace);
    }

    #[test]
    fn segments_cover_the_input_exactly() {
        let pre = PreTokenizer::new().unwrap();
        let text = "héllo  wörld\t\t123 ¿qué?  \n\n 'tis";
        let joined: String = texts(&pre.split(text).unwrap()).concat();
        assert_eq!(joined, text);
    }

    #[test]
    fn special_tokens_are_cut_out_whole() {
        let pre =
            PreTokenizer::with_special_tokens(&["<|endoftext|>", "<|endoftext|><|endoftext|>"])
                .unwrap();
        let tokens = pre
            .split("hi<|endoftext|><|endoftext|> there<|endoftext|>")
            .unwrap();
        assert_eq!(
            texts(&tokens),
            vec![
                "hi",
                "<|endoftext|><|endoftext|>",
                " there",
                "<|endoftext|>"
            ]
        );
        assert_eq!(tokens[1].kind, SegmentKind::Special);
        assert_eq!(tokens[3].kind, SegmentKind::Special);
    }

    #[test]
    fn without_isolation_special_tokens_are_split_by_the_pattern() {
        let pre = PreTokenizer::new().unwrap();
        let tokens = pre.split("a<|endoftext|>").unwrap();
        assert_eq!(texts(&tokens), vec!["a", "<|", "endoftext", "|>"]);
    }
}
