//! 意图路由：把用户自由文本映射到注册表中的工具
//!
//! 每个工具按触发短语顺序取第一个得分为正的短语（越具体的短语越靠前）；
//! 跨工具取得分最高者，同分按注册顺序；低于 min_score 的匹配被忽略。

use std::sync::Arc;

use serde::Serialize;

use super::matcher::{is_inflection_suffix, is_phrase_match};
use super::registry::{ToolDefinition, ToolRegistry};

/// 默认最低置信度
pub const DEFAULT_MIN_MATCH_SCORE: f64 = 0.5;

/// 路由结果
#[derive(Debug, Clone)]
pub struct ToolMatch {
    pub tool: Arc<ToolDefinition>,
    pub phrase: String,
    pub score: f64,
}

/// ToolMatch 的可序列化摘要（日志 / CLI 输出用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMatchSummary {
    pub tool: String,
    pub phrase: String,
    pub score: f64,
}

impl ToolMatch {
    pub fn summary(&self) -> ToolMatchSummary {
        ToolMatchSummary {
            tool: self.tool.name().to_string(),
            phrase: self.phrase.clone(),
            score: self.score,
        }
    }

    /// 去掉句首的触发短语（含词干匹配时的屈折后缀），剩余部分作为工具输入
    ///
    /// 句首不是该短语、短语后紧跟非屈折的字母（如 "drawer"）、或去掉后为空时，保留原文。
    pub fn strip_trigger<'a>(&self, input: &'a str) -> &'a str {
        let trimmed = input.trim_start();
        let n = self.phrase.len();
        let Some(head) = trimmed.get(..n) else {
            return input.trim();
        };
        if !head.eq_ignore_ascii_case(&self.phrase) {
            return input.trim();
        }

        let after = &trimmed[n..];
        let word_end = after
            .find(|c: char| !c.is_alphanumeric())
            .unwrap_or(after.len());
        if !is_inflection_suffix(&after[..word_end].to_lowercase()) {
            return input.trim();
        }

        let rest = after[word_end..]
            .trim_start_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .trim_end();
        if rest.is_empty() {
            input.trim()
        } else {
            rest
        }
    }
}

pub struct IntentRouter {
    registry: Arc<ToolRegistry>,
    min_score: f64,
}

impl IntentRouter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            min_score: DEFAULT_MIN_MATCH_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }

    /// 单个工具对输入的匹配：触发短语按顺序取第一个正分
    pub fn match_tool(tool: &Arc<ToolDefinition>, input: &str) -> Option<ToolMatch> {
        tool.trigger_phrases().iter().find_map(|phrase| {
            let m = is_phrase_match(input, phrase);
            m.is_match().then(|| ToolMatch {
                tool: Arc::clone(tool),
                phrase: phrase.clone(),
                score: m.score,
            })
        })
    }

    /// 所有达到阈值的匹配，按得分降序（同分保持注册顺序）
    pub fn rank(&self, input: &str) -> Vec<ToolMatch> {
        let mut matches: Vec<ToolMatch> = self
            .registry
            .values()
            .filter_map(|tool| Self::match_tool(tool, input))
            .filter(|m| m.score >= self.min_score)
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }

    /// 最佳匹配
    pub fn resolve(&self, input: &str) -> Option<ToolMatch> {
        let best = self.rank(input).into_iter().next();
        match &best {
            Some(m) => tracing::debug!(tool = %m.tool.name(), phrase = %m.phrase, score = m.score, "intent resolved"),
            None => tracing::debug!("no tool matched input"),
        }
        best
    }
}
