mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn cron_requires_the_shared_secret() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/cron/check-transfer-deadlines")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/api/cron/next-deadline"))
        .bearer_auth("wrong-secret")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn next_deadline_falls_back_when_the_database_is_down() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .get(server.url(&format!("/api/cron/next-deadline?token={}", common::CRON_SECRET)))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["recommendedCheckInterval"], 15);
    assert!(body["nextDeadline"].is_null());
    Ok(())
}

#[tokio::test]
async fn failed_sweep_still_answers_200() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .post(server.url("/api/cron/check-transfer-deadlines"))
        .bearer_auth(common::CRON_SECRET)
        .header("x-external-cron", "plesk")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["triggered_by"], "external_plesk");
    assert!(body["cron_log_id"].is_null());
    assert_eq!(body["stats"]["processed"], 0);
    Ok(())
}
