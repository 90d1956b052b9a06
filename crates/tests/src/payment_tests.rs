use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn submit_creates_a_pending_payment() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("payer@test.com", "Payer", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01712345678",
            "transaction_id": "TXN-0001",
            "amount": 500,
            "credits": 100,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "pending");
    assert!(json["payment_id"].is_string());

    // Submission alone grants nothing.
    assert_eq!(app.balance_of(&user.access_token).await, 999);
}

#[tokio::test]
async fn invalid_phone_number_is_rejected() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("badphone@test.com", "Bad Phone", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01212345678",
            "transaction_id": "TXN-0002",
            "amount": 500,
            "credits": 100,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_transaction_id_is_rejected() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("duppay@test.com", "Dup Pay", "Password123!")
        .await;

    let body = serde_json::json!({
        "phone_number": "01712345678",
        "transaction_id": "TXN-DUP",
        "amount": 500,
        "credits": 100,
    });

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn approval_credits_the_user_through_the_ledger() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("approved@test.com", "Approved", "Password123!")
        .await;
    let admin = app
        .register_user("admin1@test.com", "Admin", "Password123!")
        .await;
    app.make_admin(&admin).await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01812345678",
            "transaction_id": "TXN-APPROVE",
            "amount": 1000,
            "credits": 200,
        }))
        .send()
        .await
        .unwrap();
    let payment: Value = resp.json().await.unwrap();
    let payment_id = payment["payment_id"].as_str().unwrap();

    let resp = app
        .auth_patch(
            &format!("/api/admin/payments/{}", payment_id),
            &admin.access_token,
        )
        .json(&serde_json::json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    assert_eq!(app.balance_of(&user.access_token).await, 999 + 200);

    // The grant shows up as a purchase transaction linked to the payment.
    let resp = app
        .auth_get("/api/credits/transactions", &user.access_token)
        .send()
        .await
        .unwrap();
    let transactions: Value = resp.json().await.unwrap();
    let purchase = transactions["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["type"] == "purchase")
        .expect("purchase transaction missing");
    assert_eq!(purchase["amount"], 200);
    assert_eq!(purchase["payment_id"], payment_id);
}

#[tokio::test]
async fn rejection_grants_nothing() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("rejected@test.com", "Rejected", "Password123!")
        .await;
    let admin = app
        .register_user("admin2@test.com", "Admin", "Password123!")
        .await;
    app.make_admin(&admin).await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01912345678",
            "transaction_id": "TXN-REJECT",
            "amount": 1000,
            "credits": 200,
        }))
        .send()
        .await
        .unwrap();
    let payment: Value = resp.json().await.unwrap();
    let payment_id = payment["payment_id"].as_str().unwrap();

    let resp = app
        .auth_patch(
            &format!("/api/admin/payments/{}", payment_id),
            &admin.access_token,
        )
        .json(&serde_json::json!({ "status": "rejected" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    assert_eq!(app.balance_of(&user.access_token).await, 999);
}

#[tokio::test]
async fn a_payment_is_reviewed_at_most_once() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("once@test.com", "Once", "Password123!")
        .await;
    let admin = app
        .register_user("admin3@test.com", "Admin", "Password123!")
        .await;
    app.make_admin(&admin).await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01712345679",
            "transaction_id": "TXN-ONCE",
            "amount": 1000,
            "credits": 200,
        }))
        .send()
        .await
        .unwrap();
    let payment: Value = resp.json().await.unwrap();
    let payment_id = payment["payment_id"].as_str().unwrap();

    let resp = app
        .auth_patch(
            &format!("/api/admin/payments/{}", payment_id),
            &admin.access_token,
        )
        .json(&serde_json::json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Second review of the same payment is refused and grants nothing.
    let resp = app
        .auth_patch(
            &format!("/api/admin/payments/{}", payment_id),
            &admin.access_token,
        )
        .json(&serde_json::json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    assert_eq!(app.balance_of(&user.access_token).await, 999 + 200);
}

#[tokio::test]
async fn non_admin_cannot_review_payments() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("plain@test.com", "Plain", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/payments", &user.access_token)
        .json(&serde_json::json!({
            "phone_number": "01712345670",
            "transaction_id": "TXN-PLAIN",
            "amount": 500,
            "credits": 100,
        }))
        .send()
        .await
        .unwrap();
    let payment: Value = resp.json().await.unwrap();
    let payment_id = payment["payment_id"].as_str().unwrap();

    let resp = app
        .auth_patch(
            &format!("/api/admin/payments/{}", payment_id),
            &user.access_token,
        )
        .json(&serde_json::json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn list_own_payments_newest_first() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("lister@test.com", "Lister", "Password123!")
        .await;

    for (i, txn) in ["TXN-L1", "TXN-L2"].iter().enumerate() {
        let resp = app
            .auth_post("/api/payments", &user.access_token)
            .json(&serde_json::json!({
                "phone_number": "01712345678",
                "transaction_id": txn,
                "amount": 100 * (i as i64 + 1),
                "credits": 10,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    let resp = app
        .auth_get("/api/payments", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let payments = json.as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0]["transaction_id"], "TXN-L2");
    assert_eq!(payments[1]["transaction_id"], "TXN-L1");
}
