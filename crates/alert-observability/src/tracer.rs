//! Per-stage span instrumentation.

use async_trait::async_trait;
use std::future::Future;

/// Implemented by each stage service so that every call into it is wrapped in a span
/// carrying the stage's name and whatever attributes it chooses to attach. Kept as a
/// capability trait rather than a generic middleware chain, per the §9 redesign flag:
/// cross-cutting concerns attach per stage, not via a wrapped pipeline.
#[async_trait]
pub trait Traceable {
    async fn execute_traced<F, T>(&self, operation: &str, f: F) -> T
    where
        F: Future<Output = T> + Send,
        T: Send;
}

/// Wraps `$body` in an `info_span!` named `$name`, with optional `key = value` fields.
#[macro_export]
macro_rules! traced_span {
    ($name:expr, $body:expr) => {{
        use tracing::Instrument;
        let span = tracing::info_span!($name);
        async move { $body }.instrument(span).await
    }};
    ($name:expr, $($key:ident = $value:expr),+ , $body:expr) => {{
        use tracing::Instrument;
        let span = tracing::info_span!($name, $($key = $value),+);
        async move { $body }.instrument(span).await
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Instrument;

    struct Stage;

    #[async_trait]
    impl Traceable for Stage {
        async fn execute_traced<F, T>(&self, operation: &str, f: F) -> T
        where
            F: Future<Output = T> + Send,
            T: Send,
        {
            let span = tracing::info_span!("stage.execute", operation = operation);
            f.instrument(span).await
        }
    }

    #[tokio::test]
    async fn execute_traced_runs_the_future() {
        let stage = Stage;
        let result = stage.execute_traced("classify", async { 7 }).await;
        assert_eq!(result, 7);
    }

    #[tokio::test]
    async fn traced_span_macro_runs_the_body() {
        let result = traced_span!("test_span", fingerprint = "abc", 100);
        assert_eq!(result, 100);
    }
}
