use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// The core's error taxonomy. `TokenLimitExceeded` and `StreamProducer`
/// propagate to callers; `SummarizationFailure` propagates only from paths
/// that operate over a caller-held message list rather than the store
/// itself; `Serialization` is contained at every call site in this crate;
/// `InvalidConfig` covers configuration loading and validation failures,
/// kept distinct from `SummarizationFailure` since the two have unrelated
/// causes and callers may want to match on them separately.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("token limit exceeded: {current} tokens over limit {limit} for model {model}")]
    TokenLimitExceeded {
        current: usize,
        limit: usize,
        model: String,
    },

    #[error("model producer failed: {0}")]
    StreamProducer(String),

    #[error("summarization failed: {0}")]
    SummarizationFailure(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Boundary placeholder only. SSE transport is out of this crate's
    /// scope; nothing in this crate constructs this variant.
    #[error("SSE transport error: {0}")]
    SseTransportError(String),
}
