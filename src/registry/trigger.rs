//! Trigger pattern matching of free text against pipelines

use crate::registry::PipelineRegistry;
use regex::RegexBuilder;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// A pipeline whose trigger matched some input
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMatch {
    pub pipeline_id: String,
    pub score: f64,
}

/// Score `input` against a case-insensitive trigger pattern
///
/// The score rewards matches that cover more of the input and more of the
/// pattern: `matched / input_len + 0.5 * matched / pattern_len`, lengths in
/// characters. Returns `None` for no match, an empty match, empty input or
/// an invalid pattern.
pub fn score_trigger(pattern: &str, input: &str) -> Option<f64> {
    if input.is_empty() || pattern.is_empty() {
        return None;
    }

    let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex,
        Err(e) => {
            warn!("Ignoring invalid trigger pattern '{}': {}", pattern, e);
            return None;
        }
    };

    let matched = regex.find(input)?.as_str().chars().count();
    if matched == 0 {
        return None;
    }

    let input_len = input.chars().count() as f64;
    let pattern_len = pattern.chars().count() as f64;
    let matched = matched as f64;

    Some(matched / input_len + 0.5 * (matched / pattern_len))
}

impl PipelineRegistry {
    /// Best matching pipeline for free text, if any trigger matches
    pub fn match_pipeline(&self, input: &str) -> Option<TriggerMatch> {
        self.match_all_pipelines(input).into_iter().next()
    }

    /// Every matching pipeline, best score first
    ///
    /// Ties keep pipeline id order.
    pub fn match_all_pipelines(&self, input: &str) -> Vec<TriggerMatch> {
        let mut matches: Vec<TriggerMatch> = self
            .list()
            .iter()
            .filter_map(|definition| {
                let pattern = definition.trigger.as_deref()?;
                let score = score_trigger(pattern, input)?;
                Some(TriggerMatch {
                    pipeline_id: definition.id.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        debug!("Trigger matching found {} candidate(s)", matches.len());
        matches
    }
}
