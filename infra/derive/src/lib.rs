#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the herald crates: [`macro@herald_error`] for error enums and
//! [`macro@main`] for bootstrapping a Tokio runtime profile.
//!
//! Consumers normally reach them through re-exports: `herald_runtime::main` for the entry
//! point, and `herald_derive::herald_error` in library crates.
//!
//! The examples below are `ignore`d because a proc-macro crate cannot use its own macros.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro to bootstrap a Tokio runtime profile around an `async fn main`.
///
/// The function is rewritten into a plain `fn main` that builds the runtime through
/// `herald_runtime::build_runtime_with_config` and blocks on the original body.
///
/// # Arguments
///
/// * `high_performance` - Larger stacks and a longer keep-alive.
/// * `memory_efficient` - Half the worker threads and smaller stacks.
/// * `default` - Worker threads detected from `TOKIO_WORKER_THREADS` or the hardware.
///
/// # Examples
///
/// ```rust,ignore
/// #[herald_runtime::main(memory_efficient)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro for library error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` unless present.
/// * **Context Support**: Generates a companion `<Name>Ext` trait adding `.context()` to
///   results carrying this error or one of its source errors.
/// * **Source Conversions**: Implements `From<Source>` for every variant with a `source`
///   field (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: Implements `From<&'static str>` and `From<String>` when an
///   `Internal` variant exists.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants only.
/// 2. A `context` field must have the type `Option<Cow<'static, str>>`.
/// 3. Every variant with a source field must also have a `context` field.
///
/// A module-private `format_context` helper is generated for use in `#[error]` strings, so
/// declare one error enum per module.
///
/// # Example
///
/// ```rust,ignore
/// use herald_derive::herald_error;
/// use std::borrow::Cow;
///
/// #[herald_error]
/// pub enum StoreError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn load(path: &str) -> Result<String, StoreError> {
///     std::fs::read_to_string(path).context("Reading the snapshot")
/// }
/// ```
#[proc_macro_attribute]
pub fn herald_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
