//! Column classification and category normalization.
//!
//! Both questions are answered either by a language model or, when the model service does not
//! pass the liveness probe, by fixed rules (keyword matching for columns, identity for
//! categories). The choice is made once per run and held in `Assist`.

mod heuristic;
mod parsing;
mod prompts;

use crate::api::Llm;
use crate::error::Res;
use crate::model::{CategoryMapping, ColumnMapping};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Which strategy answered the questions in a run.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistMode {
    #[default]
    Heuristic,
    Model,
}

serde_plain::derive_display_from_serialize!(AssistMode);

/// The strategy selected for one run.
#[derive(Clone)]
pub(crate) enum Assist {
    Heuristic,
    Model(Arc<dyn Llm>),
}

impl Assist {
    /// Sends the liveness probe to `llm`. A reply that is the probe token selects model mode; any
    /// other reply or any error selects heuristic mode.
    pub(crate) async fn select(llm: Arc<dyn Llm>) -> Self {
        match llm.complete(&prompts::probe()).await {
            Ok(reply) if parsing::is_ready(&reply) => {
                info!("Using model '{}' for columns and categories", llm.name());
                Assist::Model(llm)
            }
            Ok(reply) => {
                warn!("Model probe got an unexpected reply, using keyword heuristics: {reply:?}");
                Assist::Heuristic
            }
            Err(e) => {
                warn!("Model service is unavailable, using keyword heuristics: {e:#}");
                Assist::Heuristic
            }
        }
    }

    pub(crate) fn mode(&self) -> AssistMode {
        match self {
            Assist::Heuristic => AssistMode::Heuristic,
            Assist::Model(_) => AssistMode::Model,
        }
    }

    /// Finds the category and amount columns in `headers`. A model reply that is not the expected
    /// JSON is an error; indices outside the header row are dropped.
    pub(crate) async fn classify<S: AsRef<str> + Sync>(&self, headers: &[S]) -> Res<ColumnMapping> {
        let llm = match self {
            Assist::Heuristic => return Ok(heuristic::classify(headers)),
            Assist::Model(llm) => llm,
        };
        let reply = llm
            .complete(&prompts::classify(headers))
            .await
            .context("Unable to ask the model to classify columns")?;
        trace!("Classification reply: {reply}");
        let mapping = parsing::parse_classification(&reply)?;
        let bounded = mapping.bounded(headers.len());
        if bounded != mapping {
            warn!(
                "The model named a column outside the {} headers: {mapping:?}",
                headers.len()
            );
        }
        Ok(bounded)
    }

    /// Maps every category in `categories` to a canonical name. Without a model, or with no
    /// categories, this is the identity mapping.
    pub(crate) async fn normalize(&self, categories: &BTreeSet<String>) -> Res<CategoryMapping> {
        let llm = match self {
            Assist::Model(llm) if !categories.is_empty() => llm,
            _ => return Ok(CategoryMapping::identity(categories)),
        };
        let reply = llm
            .complete(&prompts::normalize(categories))
            .await
            .context("Unable to ask the model to normalize categories")?;
        trace!("Normalization reply: {reply}");
        let suggestions = parsing::parse_normalization(&reply)?;
        let ignored = suggestions
            .keys()
            .filter(|k| !categories.contains(*k))
            .count();
        if ignored > 0 {
            debug!("Ignoring {ignored} categories the model added");
        }
        Ok(CategoryMapping::with_suggestions(categories, &suggestions))
    }
}

impl std::fmt::Debug for Assist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assist::Heuristic => f.write_str("Heuristic"),
            Assist::Model(llm) => write!(f, "Model({})", llm.name()),
        }
    }
}
