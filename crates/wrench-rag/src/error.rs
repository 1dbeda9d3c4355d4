use wrench_provider::FailoverError;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("embedding failed: {0}")]
    Embedding(#[source] FailoverError),

    #[error("knowledge search failed: {0}")]
    Search(#[source] FailoverError),
}

impl RetrievalError {
    /// The underlying chain failure, if any.
    pub fn failover(&self) -> Option<&FailoverError> {
        match self {
            RetrievalError::EmptyQuery => None,
            RetrievalError::Embedding(e) | RetrievalError::Search(e) => Some(e),
        }
    }
}
