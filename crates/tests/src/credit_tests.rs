use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn decrement_reduces_the_balance() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("spend@test.com", "Spender", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/credits/adjust", &user.access_token)
        .json(&serde_json::json!({ "amount": -10 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["credits"], 989);
    assert_eq!(app.balance_of(&user.access_token).await, 989);
}

#[tokio::test]
async fn overdraw_clamps_at_zero_and_never_goes_negative() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("clamp@test.com", "Clamp", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/credits/adjust", &user.access_token)
        .json(&serde_json::json!({ "amount": -2000 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["credits"], 0);
    assert_eq!(app.balance_of(&user.access_token).await, 0);
}

#[tokio::test]
async fn transaction_amounts_always_sum_to_the_balance() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("sum@test.com", "Sum", "Password123!")
        .await;

    // Mixed sequence including an overdraw that clamps.
    for (amount, kind) in [
        (-100, "usage"),
        (50, "purchase"),
        (-2000, "usage"),
        (25, "bonus"),
        (-5, "usage"),
    ] {
        let resp = app
            .auth_post("/api/credits/adjust", &user.access_token)
            .json(&serde_json::json!({ "amount": amount, "type": kind }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        // Invariant: the balance is never negative, after any adjustment.
        let json: Value = resp.json().await.unwrap();
        assert!(json["credits"].as_i64().unwrap() >= 0);
    }

    let resp = app
        .auth_get("/api/credits/transactions?per_page=100", &user.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();

    let sum: i64 = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["amount"].as_i64().unwrap())
        .sum();

    assert_eq!(sum, app.balance_of(&user.access_token).await);
}

#[tokio::test]
async fn clamped_noop_decrement_writes_no_transaction() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("noop@test.com", "Noop", "Password123!")
        .await;

    app.set_balance(&user.access_token, 0).await;

    let count_before = transaction_count(&app, &user.access_token).await;

    let resp = app
        .auth_post("/api/credits/adjust", &user.access_token)
        .json(&serde_json::json!({ "amount": -5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["credits"], 0);

    // No balance change, no audit record.
    assert_eq!(
        transaction_count(&app, &user.access_token).await,
        count_before
    );
}

#[tokio::test]
async fn zero_amount_is_rejected() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("zero@test.com", "Zero", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/credits/adjust", &user.access_token)
        .json(&serde_json::json!({ "amount": 0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn adjust_requires_authentication() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/credits/adjust"))
        .json(&serde_json::json!({ "amount": -1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn concurrent_decrements_at_balance_one_apply_exactly_once() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("race@test.com", "Race", "Password123!")
        .await;

    app.set_balance(&user.access_token, 1).await;
    let count_before = transaction_count(&app, &user.access_token).await;

    // Two "devices" charging the same last credit at the same time.
    let first = app
        .auth_post("/api/credits/adjust", &user.access_token)
        .json(&serde_json::json!({ "amount": -1 }))
        .send();
    let second = app
        .auth_post("/api/credits/adjust", &user.access_token)
        .json(&serde_json::json!({ "amount": -1 }))
        .send();

    let (first, second) = tokio::join!(first, second);
    let first: Value = first.unwrap().json().await.unwrap();
    let second: Value = second.unwrap().json().await.unwrap();

    // The store serializes them: one debit lands, the loser observes the
    // floor. Neither response ever reports a negative balance.
    assert_eq!(first["credits"], 0);
    assert_eq!(second["credits"], 0);
    assert_eq!(app.balance_of(&user.access_token).await, 0);

    // Exactly one usage record for the single applied decrement.
    assert_eq!(
        transaction_count(&app, &user.access_token).await,
        count_before + 1
    );
}

#[tokio::test]
async fn balance_stays_non_negative_over_a_pseudo_random_delta_sequence() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("fuzz@test.com", "Fuzz", "Password123!")
        .await;

    // Deterministic LCG so the sequence is reproducible across runs.
    let mut seed: u64 = 0x5eed_cafe;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        // Deltas in [-400, 199]: biased towards decrements so the clamp
        // actually gets hit along the way.
        (seed >> 33) as i64 % 600 - 400
    };

    for _ in 0..30 {
        let amount = match next() {
            0 => 1,
            n => n,
        };
        let kind = if amount < 0 { "usage" } else { "bonus" };

        let resp = app
            .auth_post("/api/credits/adjust", &user.access_token)
            .json(&serde_json::json!({ "amount": amount, "type": kind }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        let json: Value = resp.json().await.unwrap();
        let credits = json["credits"].as_i64().unwrap();
        assert!(credits >= 0, "balance went negative: {credits}");
    }

    // The audit trail still reproduces the final balance exactly.
    let resp = app
        .auth_get("/api/credits/transactions?per_page=100", &user.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    let sum: i64 = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["amount"].as_i64().unwrap())
        .sum();
    assert_eq!(sum, app.balance_of(&user.access_token).await);
}

async fn transaction_count(app: &TestApp, token: &str) -> u64 {
    let resp = app
        .auth_get("/api/credits/transactions?per_page=100", token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    json["total"].as_u64().unwrap()
}
