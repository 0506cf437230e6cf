use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam for swapping the HTTP transport used to download sources.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
