//! 触发短语匹配
//!
//! 输入与短语先归一化：转小写、按非字母数字切词（标点不影响匹配）。打分规则：
//! - 整句完全相同：1.0
//! - 短语作为连续整词出现：WORD_MATCH，位于句首再加 START_BONUS
//! - 短语词加屈折后缀构成输入词（research → researching，draw → draws）：STEM_MATCH，同样有句首加成
//! - 按短语覆盖输入的比例追加少量分数，最高仍严格低于 1.0
//! - 空输入、全停用词输入、无匹配：0

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const EXACT_MATCH: f64 = 1.0;
const WORD_MATCH: f64 = 0.8;
const STEM_MATCH: f64 = 0.6;
const START_BONUS: f64 = 0.1;
const COVERAGE_WEIGHT: f64 = 0.05;
/// 词干匹配要求短语词至少这么长，避免 "a" 命中 "about"
const MIN_STEM_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "to", "of", "in", "on", "at", "for", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "it", "its", "this", "that", "these",
    "those", "i", "me", "my", "you", "your", "we", "our", "he", "she", "they", "them", "please",
    "can", "could", "would", "will", "should", "do", "does", "did", "so", "just", "some", "any",
];

/// 匹配得分，范围 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct MatchResult {
    pub score: f64,
}

impl MatchResult {
    pub const NONE: MatchResult = MatchResult { score: 0.0 };

    pub fn is_match(&self) -> bool {
        self.score > 0.0
    }
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex"))
}

/// 小写并切词，丢弃标点
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_regex()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordMatch {
    Exact,
    Stem,
}

/// 词干匹配允许的屈折后缀；"drawer" / "exporter" 这类派生词不算
const INFLECTION_SUFFIXES: &[&str] = &["s", "es", "d", "ed", "ing"];

/// suffix 是否为允许的屈折后缀（空串视为整词）
pub fn is_inflection_suffix(suffix: &str) -> bool {
    suffix.is_empty() || INFLECTION_SUFFIXES.contains(&suffix)
}

fn match_word(input: &str, phrase: &str) -> Option<WordMatch> {
    if input == phrase {
        return Some(WordMatch::Exact);
    }
    if phrase.chars().count() < MIN_STEM_LEN {
        return None;
    }
    match input.strip_prefix(phrase) {
        Some(suffix) if is_inflection_suffix(suffix) => Some(WordMatch::Stem),
        _ => None,
    }
}

/// 对 input 与单个触发短语打分
pub fn is_phrase_match(input: &str, phrase: &str) -> MatchResult {
    let input_tokens = tokenize(input);
    let phrase_tokens = tokenize(phrase);

    if input_tokens.is_empty() || phrase_tokens.is_empty() {
        return MatchResult::NONE;
    }
    if input_tokens.iter().all(|t| is_stopword(t)) {
        return MatchResult::NONE;
    }
    if input_tokens == phrase_tokens {
        return MatchResult { score: EXACT_MATCH };
    }
    if phrase_tokens.len() > input_tokens.len() {
        return MatchResult::NONE;
    }

    let coverage = phrase_tokens.len() as f64 / input_tokens.len() as f64;
    let mut best = 0.0f64;

    for start in 0..=(input_tokens.len() - phrase_tokens.len()) {
        let window = &input_tokens[start..start + phrase_tokens.len()];
        let mut kind = WordMatch::Exact;
        let mut matched = true;
        for (word, want) in window.iter().zip(&phrase_tokens) {
            match match_word(word, want) {
                Some(WordMatch::Exact) => {}
                Some(WordMatch::Stem) => kind = WordMatch::Stem,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if !matched {
            continue;
        }

        let base = match kind {
            WordMatch::Exact => WORD_MATCH,
            WordMatch::Stem => STEM_MATCH,
        };
        let bonus = if start == 0 { START_BONUS } else { 0.0 };
        best = best.max(base + bonus + COVERAGE_WEIGHT * coverage);
    }

    MatchResult {
        score: best.clamp(0.0, EXACT_MATCH),
    }
}
