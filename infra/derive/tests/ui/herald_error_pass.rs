use herald_derive::herald_error;
use std::borrow::Cow;

#[herald_error]
pub enum StoreError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read_missing() -> Result<String, StoreError> {
    std::fs::read_to_string("/definitely/not/here").context("Reading the snapshot")
}

fn main() {
    let err = read_missing().unwrap_err();
    assert!(err.to_string().starts_with("IO error (Reading the snapshot): "));

    let err: Result<(), StoreError> = Err(StoreError::from("boom"));
    let err = err.context("Flushing").unwrap_err();
    assert_eq!(err.to_string(), "Internal error (Flushing): boom");

    let plain = StoreError::from(std::io::Error::other("disk"));
    assert_eq!(plain.to_string(), "IO error: disk");
}
