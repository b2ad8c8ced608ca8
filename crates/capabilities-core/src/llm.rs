//! LLM capability: two sub-capabilities, `SingleTurn` and `Conversational`.
//!
//! The conversation engine requires `Conversational`. Providers that only
//! expose a single-turn completion API implement `SingleTurn` and get
//! wrapped in [`SingleTurnAdapter`], which folds turn history into one
//! prompt rather than duplicating that logic at every call site.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{CapabilityError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Characters that mark the end of a sentence for streaming segmentation.
    pub sentence_terminators: Option<Vec<char>>,
}

/// A lazy, finite sequence of token fragments.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// One-shot completion: no notion of conversational turn history.
#[async_trait]
pub trait SingleTurn: Send + Sync {
    async fn generate_single(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;
}

/// Multi-turn chat completion, with and without streaming.
#[async_trait]
pub trait Conversational: Send + Sync {
    async fn generate(&self, history: &[Turn], options: &GenerateOptions) -> Result<String>;

    async fn generate_stream(&self, history: &[Turn], options: &GenerateOptions) -> Result<TokenStream>;
}

/// Wraps a [`SingleTurn`] provider as [`Conversational`] by flattening
/// history into one prompt (system turn first, then `role: content` lines).
pub struct SingleTurnAdapter<T> {
    inner: T,
}

impl<T: SingleTurn> SingleTurnAdapter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    fn flatten(history: &[Turn]) -> String {
        history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl<T: SingleTurn + Send + Sync> Conversational for SingleTurnAdapter<T> {
    async fn generate(&self, history: &[Turn], options: &GenerateOptions) -> Result<String> {
        let prompt = Self::flatten(history);
        self.inner.generate_single(&prompt, options).await
    }

    async fn generate_stream(&self, history: &[Turn], options: &GenerateOptions) -> Result<TokenStream> {
        let text = self.generate(history, options).await?;
        Ok(stream::iter(vec![Ok(text)]).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl SingleTurn for Echo {
        async fn generate_single(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
            Ok(format!("echo: {prompt}"))
        }
    }

    #[tokio::test]
    async fn adapter_flattens_history_into_a_prompt() {
        let adapter = SingleTurnAdapter::new(Echo);
        let history = vec![Turn::system("be terse"), Turn::user("hi")];
        let out = adapter.generate(&history, &GenerateOptions::default()).await.unwrap();
        assert!(out.contains("system: be terse"));
        assert!(out.contains("user: hi"));
    }

    #[tokio::test]
    async fn adapter_stream_yields_single_chunk() {
        let adapter = SingleTurnAdapter::new(Echo);
        let history = vec![Turn::user("hi")];
        let mut stream = adapter.generate_stream(&history, &GenerateOptions::default()).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(first.starts_with("echo:"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn capability_error_is_constructible() {
        let _ = CapabilityError::Transient("retry me".into());
    }
}
