//! An in-memory `Llm` that answers from a script, or not at all.

use crate::api::Llm;
use crate::error::Res;
use anyhow::bail;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A stand-in language model. Replies are handed out in order; when the script runs out, the
/// fallback reply (if any) is used, otherwise the call fails as if the service were down.
#[derive(Debug, Default)]
pub(crate) struct TestLlm {
    replies: Mutex<VecDeque<Res<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl TestLlm {
    /// A model that is never reachable.
    pub(crate) fn offline() -> Self {
        Self::default()
    }

    /// A model that gives `replies` in order, then fails.
    #[cfg(test)]
    pub(crate) fn scripted<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// A model that answers every prompt with `reply`.
    #[cfg(test)]
    pub(crate) fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Queues a failing reply after the ones already scripted.
    #[cfg(test)]
    pub(crate) fn then_fail(self) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(anyhow::anyhow!("Simulated model service outage")));
        self
    }

    /// Every prompt received so far.
    #[cfg(test)]
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl Llm for TestLlm {
    fn name(&self) -> &str {
        "test"
    }

    async fn complete(&self, prompt: &str) -> Res<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => bail!("The test model service is offline"),
        }
    }
}
