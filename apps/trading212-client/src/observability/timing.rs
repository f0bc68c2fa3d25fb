//! Elapsed-time instrumentation for units of work.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

fn record_outcome(operation: &str, elapsed: Duration, error: Option<&dyn fmt::Display>) {
    let duration_seconds = elapsed.as_secs_f64();
    match error {
        None => tracing::info!(
            operation,
            duration_seconds,
            "{operation} completed successfully"
        ),
        Some(error) => tracing::error!(
            operation,
            duration_seconds,
            error = %error,
            "{operation} failed"
        ),
    }
}

/// Await `future`, logging its wall-clock duration and outcome.
///
/// The result is returned unchanged; a failure is logged and then propagated.
pub async fn timed<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let started = Instant::now();
    let result = future.await;
    record_outcome(
        operation,
        started.elapsed(),
        result.as_ref().err().map(|e| e as &dyn fmt::Display),
    );
    result
}

/// Synchronous counterpart of [`timed`].
pub fn timed_blocking<T, E>(operation: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: fmt::Display,
{
    let started = Instant::now();
    let result = f();
    record_outcome(
        operation,
        started.elapsed(),
        result.as_ref().err().map(|e| e as &dyn fmt::Display),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Failure(&'static str);

    impl fmt::Display for Failure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    #[test]
    fn timed_returns_success_value() {
        let result: Result<u32, Failure> = tokio_test::block_on(timed("sum", async { Ok(42) }));
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn timed_propagates_original_error() {
        let result: Result<u32, Failure> =
            tokio_test::block_on(timed("sum", async { Err(Failure("broken")) }));
        assert_eq!(result, Err(Failure("broken")));
    }

    #[test]
    fn timed_blocking_passes_through() {
        assert_eq!(timed_blocking("noop", || Ok::<_, Failure>("done")), Ok("done"));
        assert_eq!(
            timed_blocking("noop", || Err::<(), _>(Failure("nope"))),
            Err(Failure("nope"))
        );
    }
}
