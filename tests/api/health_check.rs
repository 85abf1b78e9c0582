use reqwest::StatusCode;

use crate::helpers::spawn_app;

#[tokio::test]
async fn health_check_reports_up() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(&format!("{}/actuator/health", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "status": "UP" }));
}

#[tokio::test]
async fn unknown_routes_return_404() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(&format!("{}/no/such/route", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
