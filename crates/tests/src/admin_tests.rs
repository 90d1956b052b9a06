use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn admin_lists_users() {
    let app = TestApp::spawn().await;
    let admin = app
        .register_user("boss@test.com", "Boss", "Password123!")
        .await;
    app.make_admin(&admin).await;
    app.register_user("worker@test.com", "Worker", "Password123!")
        .await;

    let resp = app
        .auth_get("/api/admin/users", &admin.access_token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 2);
    let emails: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert!(emails.contains(&"boss@test.com"));
    assert!(emails.contains(&"worker@test.com"));
}

#[tokio::test]
async fn admin_routes_are_forbidden_for_regular_users() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("normie@test.com", "Normie", "Password123!")
        .await;

    for path in ["/api/admin/users", "/api/admin/payments"] {
        let resp = app
            .auth_get(path, &user.access_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 403, "path {path} should be gated");
    }
}

#[tokio::test]
async fn admin_gets_user_detail_with_history() {
    let app = TestApp::spawn().await;
    let admin = app
        .register_user("detail-admin@test.com", "Admin", "Password123!")
        .await;
    app.make_admin(&admin).await;
    let user = app
        .register_user("detail-user@test.com", "Detail User", "Password123!")
        .await;

    // Give the user one saved transcript.
    let resp = app
        .auth_post("/api/history", &user.access_token)
        .json(&serde_json::json!({
            "text": "hello from the detail test",
            "type": "live",
            "language": "en-US",
            "confidence": 0.9,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_get(
            &format!("/api/admin/users/{}", user.id),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["user"]["email"], "detail-user@test.com");
    assert_eq!(json["history"].as_array().unwrap().len(), 1);
    assert_eq!(json["history"][0]["text"], "hello from the detail test");
}

#[tokio::test]
async fn admin_lists_all_payments() {
    let app = TestApp::spawn().await;
    let admin = app
        .register_user("pay-admin@test.com", "Admin", "Password123!")
        .await;
    app.make_admin(&admin).await;
    let user = app
        .register_user("pay-user@test.com", "Pay User", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01712345678",
            "transaction_id": "TXN-ADMIN-LIST",
            "amount": 500,
            "credits": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_get("/api/admin/payments", &admin.access_token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["user_email"], "pay-user@test.com");
    assert_eq!(json["items"][0]["transaction_id"], "TXN-ADMIN-LIST");
    assert_eq!(json["items"][0]["status"], "pending");
}
