#[tokio::main]
async fn main() -> anyhow::Result<()> {
    truthlens_lib::run().await
}
