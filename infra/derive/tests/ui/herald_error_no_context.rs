use herald_derive::herald_error;

#[herald_error]
pub enum StoreError {
    #[error("IO error: {source}")]
    Io {
        source: std::io::Error,
    },
}

fn main() {}
