use std::borrow::Cow;

/// Errors returned by bus construction, registration and shutdown.
///
/// Failures of individual handler invocations never surface here; they are delivered to the
/// bus's [`ErrorHandler`](crate::ErrorHandler).
#[herald_derive::herald_error]
pub enum EventBusError {
    /// One or more declared handlers were rejected during `register`.
    /// The remaining handlers of the same owner were registered.
    #[error("Invalid handler{}: {message}", format_context(.context))]
    InvalidHandler { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Queue capacity and worker count must be greater than zero.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The worker runtime of the asynchronous dispatcher could not be built.
    #[error("Dispatch runtime failure{}: {source}", format_context(.context))]
    Runtime { source: herald_runtime::RuntimeError, context: Option<Cow<'static, str>> },

    /// Queued invocations were still pending when the shutdown grace period ran out.
    #[error("Shutdown grace exceeded{}: {message}", format_context(.context))]
    GraceExceeded { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
