use herald_derive::herald_error;

#[herald_error]
pub enum StoreError {
    #[error("Internal error: {message}")]
    Internal { message: String, context: String },
}

fn main() {}
