use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    portal_auth::app::run().await?;
    Ok(())
}
