#[tokio::main]
async fn main() {
    if let Err(e) = carebell::run().await {
        tracing::error!(error = %e, "Carebell stopped with an error");
        eprintln!("carebell: {e}");
        std::process::exit(1);
    }
}
