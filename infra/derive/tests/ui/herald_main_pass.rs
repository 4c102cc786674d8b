#[herald_derive::main(memory_efficient, worker_threads = 2)]
async fn main() -> Result<(), herald_runtime::RuntimeError> {
    let answer = async { 42 }.await;
    assert_eq!(answer, 42);
    Ok(())
}
