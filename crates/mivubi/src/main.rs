use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = lib_mivubi::init().await {
        error!("❌ Fatal error: {e}");
        std::process::exit(1);
    }
}
