use std::borrow::Cow;

/// Errors raised while building a Tokio runtime.
#[herald_derive::herald_error]
pub enum RuntimeError {
    /// The OS refused to create the runtime or its worker threads.
    #[error("Runtime I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}
