//! Event Subscriber Service
//!
//! Binary entry point.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    subscriber::run().await
}
