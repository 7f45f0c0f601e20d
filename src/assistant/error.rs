use crate::errors::StoreError;
use crate::llm::LlmError;

/// Underlying failure of an assistant operation
#[derive(Debug, thiserror::Error)]
pub enum AssistantCause {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("cannot serialize prompt data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AssistantCause {
    pub fn kind(&self) -> &'static str {
        match self {
            AssistantCause::Store(_) => "store",
            AssistantCause::Llm(e) => e.kind(),
            AssistantCause::Serialize(_) => "serialize",
        }
    }
}

/// An assistant operation failure, labelled with the operation that failed
#[derive(Debug, thiserror::Error)]
#[error("{context}: {cause}")]
pub struct AssistantError {
    pub context: String,
    #[source]
    pub cause: AssistantCause,
}

impl AssistantError {
    pub fn new(context: impl Into<String>, cause: impl Into<AssistantCause>) -> Self {
        AssistantError {
            context: context.into(),
            cause: cause.into(),
        }
    }
}
