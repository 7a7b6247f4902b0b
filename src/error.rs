pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by a failing producer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key length disagrees with the arity the cache was built with.
    #[error("key has {actual} elements but the cache arity is {expected}")]
    ArityMismatch { expected: usize, actual: usize },
    /// The producer failed. Nothing was stored for the key.
    #[error("producer failed: {0}")]
    ComputeFailure(#[source] BoxError),
}

impl Error {
    /// Downcast the producer error of a `ComputeFailure`.
    pub fn compute_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Error::ComputeFailure(source) => source.downcast_ref::<E>(),
            Error::ArityMismatch { .. } => None,
        }
    }
}

#[test]
fn error_is_send_and_sync() {
    fn assert_send_and_sync<T: Send + Sync>() {}
    assert_send_and_sync::<Error>();
}
