#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatter_server::run().await
}
