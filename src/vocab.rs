//! The model's answer label table: an ordered index -> string mapping fixed
//! at load time, plus the argmax decoding of a score vector into a label.

use crate::error::{Error, Result};
use anyhow::{anyhow, bail};
use std::collections::HashMap;
use std::path::Path;

/// An ordered mapping from label index to answer string, shared read-only by
/// every request for the process lifetime. Indices are contiguous from 0 and
/// every index the model can emit has a label; both are checked at load time.
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    /// Build the vocabulary from an `id2label` map as exported next to the
    /// model weights (`{"0": "yes", "1": "no", ...}`).
    pub fn from_id2label(map: HashMap<String, String>) -> anyhow::Result<Self> {
        if map.is_empty() {
            bail!("label table is empty");
        }

        let mut labels = vec![None; map.len()];
        for (key, label) in map {
            let idx: usize = key
                .parse()
                .map_err(|_| anyhow!("non-numeric label index {key:?}"))?;
            if idx >= labels.len() {
                bail!(
                    "label index {idx} breaks contiguity (table has {} entries)",
                    labels.len()
                );
            }
            if label.is_empty() {
                bail!("label index {idx} maps to an empty string");
            }
            labels[idx] = Some(label);
        }

        // A HashMap can't hold duplicate keys, so after the bounds check the
        // only remaining violation is a gap.
        let labels = labels
            .into_iter()
            .enumerate()
            .map(|(idx, l)| l.ok_or_else(|| anyhow!("label index {idx} is missing")))
            .collect::<anyhow::Result<Vec<String>>>()?;

        Ok(LabelVocabulary { labels })
    }

    /// Load `labels.json` from the model directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let map: HashMap<String, String> = serde_json::from_str(&raw)?;
        Self::from_id2label(map)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Select the highest-scoring index (ties broken by lowest index) and
    /// look up its label. An index outside the table, including the
    /// empty-score case, is an internal fault.
    pub fn decode(&self, scores: &[f32]) -> Result<&str> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &score) in scores.iter().enumerate() {
            // NaN never compares greater, so it must not displace the
            // running best either.
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }

        let (idx, _) = best.ok_or_else(|| {
            if scores.is_empty() {
                Error::LabelLookup("empty score vector".into())
            } else {
                Error::LabelLookup("score vector holds no comparable entries".into())
            }
        })?;
        self.label(idx).ok_or_else(|| {
            Error::LabelLookup(format!(
                "index {idx} out of range for vocabulary of {}",
                self.len()
            ))
        })
    }
}
