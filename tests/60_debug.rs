mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn cleanup_needs_the_debug_secret() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.post(server.url("/api/debug/cleanup-tables")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(server.url("/api/debug/cleanup-tables?secret=guess"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn cleanup_is_post_only() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/debug/cleanup-tables")).await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}
