use act_zero::ActorError;
use std::fmt;
use tracing::error;
use tracing_error::SpanTrace;

/// Error returned from actor methods. Carries the span trace of the place it
/// was created at, so the actor's error handler can log where it came from.
#[derive(Debug, thiserror::Error)]
pub struct Error {
    source: ErrorKind,
    span_trace: SpanTrace,
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Stops the actor.
    #[error(transparent)]
    Fatal(anyhow::Error),
    /// Logged, the actor keeps running.
    #[error(transparent)]
    NonFatal(#[from] anyhow::Error),
}

impl Error {
    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        Self {
            source: ErrorKind::Fatal(error.into()),
            span_trace: SpanTrace::capture(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(&self.source, ErrorKind::Fatal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, fmt)
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(source: E) -> Self {
        Self {
            source: ErrorKind::from(source),
            span_trace: SpanTrace::capture(),
        }
    }
}

/// Logs an actor error and returns whether the actor should stop.
pub fn handle_error(error: ActorError) -> bool {
    let (error, stop_actor, span_trace) = match error.downcast_ref::<Error>() {
        Some(e) => (
            format!("{:?}", e.source),
            e.is_fatal(),
            Some(&e.span_trace),
        ),
        None => (format!("{:?}", error), false, None),
    };

    error!(
        %stop_actor,
        "ActorError: {} SpanTrace: {}",
        error,
        span_trace
            .map(|st| format!("{}", st))
            .unwrap_or_else(|| String::from("None"))
    );

    stop_actor
}
