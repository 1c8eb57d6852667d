//! Batch request and response documents plus caller-side helpers that turn
//! raw logits into predictions.

use crate::decryptor::ScoreVector;
use crate::error::{PipelineError, Result};
use crate::weights::Emotion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Characters of the input kept in a summary snippet.
pub const SNIPPET_CHARS: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchInput {
    pub inputs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemResult {
    Scores { scores: Vec<f64> },
    Error { error: ErrorBody },
}

impl From<&Result<ScoreVector>> for ItemResult {
    fn from(result: &Result<ScoreVector>) -> Self {
        match result {
            Ok(scores) => ItemResult::Scores { scores: scores.clone() },
            Err(err) => ItemResult::Error {
                error: ErrorBody {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                },
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    /// True iff every item succeeded.
    pub success: bool,
    pub results: Vec<ItemResult>,
}

impl BatchOutput {
    pub fn new(results: &[Result<ScoreVector>]) -> Self {
        Self {
            success: results.iter().all(|r| r.is_ok()),
            results: results.iter().map(ItemResult::from).collect(),
        }
    }
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max: f64 = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Index of the largest score; the first one on ties. None if empty or NaN.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    if scores.iter().any(|x| x.is_nan()) {
        return None;
    }
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, x)| match best {
            Some((_, b)) if b >= *x => best,
            _ => Some((i, *x)),
        })
        .map(|(i, _)| i)
}

pub fn predicted_emotion(scores: &[f64]) -> Option<Emotion> {
    argmax(scores).and_then(Emotion::from_index)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemSummary {
    pub text_snippet: String,
    pub emotions: BTreeMap<Emotion, f64>,
    pub dominant_emotion: Emotion,
}

/// Aggregate view of a batch of predictions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmotionSummary {
    pub overall_emotion: Emotion,
    pub emotion_counts: BTreeMap<Emotion, usize>,
    pub emotion_scores: BTreeMap<Emotion, f64>,
    pub items: Vec<ItemSummary>,
}

impl EmotionSummary {
    /// Failed items are skipped. Scores are softmax probabilities averaged
    /// over the successful items.
    pub fn new(texts: &[String], results: &[Result<ScoreVector>]) -> Result<Self> {
        if texts.len() != results.len() {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} texts for {} results",
                texts.len(),
                results.len()
            )));
        }
        let mut emotion_counts: BTreeMap<Emotion, usize> = Emotion::ALL.iter().map(|e| (*e, 0)).collect();
        let mut sums: BTreeMap<Emotion, f64> = Emotion::ALL.iter().map(|e| (*e, 0.0)).collect();
        let mut items: Vec<ItemSummary> = Vec::new();

        for (text, scores) in texts.iter().zip(results.iter()) {
            let Ok(scores) = scores else {
                continue;
            };
            let Some(dominant_emotion) = predicted_emotion(scores) else {
                continue;
            };
            let emotions: BTreeMap<Emotion, f64> = softmax(scores)
                .into_iter()
                .enumerate()
                .filter_map(|(i, p)| Emotion::from_index(i).map(|e| (e, p)))
                .collect();
            emotions.iter().for_each(|(e, p)| {
                *sums.entry(*e).or_insert(0.0) += p;
            });
            *emotion_counts.entry(dominant_emotion).or_insert(0) += 1;
            items.push(ItemSummary {
                text_snippet: snippet(text),
                emotions,
                dominant_emotion,
            });
        }

        let n: f64 = items.len().max(1) as f64;
        let emotion_scores: BTreeMap<Emotion, f64> = sums.into_iter().map(|(e, s)| (e, s / n)).collect();

        let overall_emotion: Emotion = Emotion::ALL
            .iter()
            .copied()
            .fold((Emotion::Neutral, 0usize), |(best, count), e| {
                let c: usize = emotion_counts[&e];
                if c > count { (e, c) } else { (best, count) }
            })
            .0;

        Ok(Self {
            overall_emotion,
            emotion_counts,
            emotion_scores,
            items,
        })
    }
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_output_document() {
        let results: Vec<Result<ScoreVector>> = vec![
            Ok(vec![1.0, 2.0]),
            Err(PipelineError::DimensionMismatch { expected: 4, got: 3 }),
        ];
        let output: BatchOutput = BatchOutput::new(&results);
        assert!(!output.success);
        let json: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(json["results"][0]["scores"][1], 2.0);
        assert_eq!(json["results"][1]["error"]["kind"], "dimension_mismatch");

        let parsed: BatchOutput = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, output);
        assert!(BatchOutput::new(&[]).success);
    }

    #[test]
    fn softmax_and_argmax() {
        let p: Vec<f64> = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-12 && (p[1] - 0.5).abs() < 1e-12);
        assert_eq!(argmax(&[0.1, 3.0, 3.0, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f64::NAN, 1.0]), None);
        assert_eq!(predicted_emotion(&[0.0, 0.0, 5.0]), Some(Emotion::Anger));
    }

    #[test]
    fn summary_counts_dominant_emotions() {
        let texts: Vec<String> = vec!["a".repeat(150), "sad".to_string(), "broken".to_string()];
        let joy: ScoreVector = vec![5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let results: Vec<Result<ScoreVector>> = vec![
            Ok(joy.clone()),
            Ok(joy),
            Err(PipelineError::Embedding("no tokens".to_string())),
        ];
        let summary: EmotionSummary = EmotionSummary::new(&texts, &results).unwrap();
        assert_eq!(summary.overall_emotion, Emotion::Joy);
        assert_eq!(summary.emotion_counts[&Emotion::Joy], 2);
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.items[0].text_snippet.len(), 103);
        assert!(summary.items[0].text_snippet.ends_with("..."));
        assert_eq!(summary.items[1].text_snippet, "sad");

        let empty: EmotionSummary = EmotionSummary::new(&[], &[]).unwrap();
        assert_eq!(empty.overall_emotion, Emotion::Neutral);
        assert_eq!(empty.emotion_counts[&Emotion::Fear], 0);
    }
}
