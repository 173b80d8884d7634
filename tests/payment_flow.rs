// Checkout, entitlement and profile routes over HTTP.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{App, http::StatusCode, test};
use chrono::{Duration, Utc};
use sea_orm::{EntityTrait, PaginatorTrait, TransactionTrait};
use serde_json::json;

use common::*;
use lexhub_backend::config::StorageErrorPolicy;
use lexhub_backend::entities::{UserRole, payment_entity as payments, user_entity as users};
use lexhub_backend::external::{IntentStatus, ProviderIntent};

fn intent_request(amount: i64, plan: &str, user_type: Option<&str>) -> serde_json::Value {
    json!({
        "amount": amount,
        "plan_id": plan,
        "user_type": user_type,
        "email": "asha@example.com",
        "full_name": "Asha Menon"
    })
}

fn intent_owned_by(id: &str, user_id: i64, status: IntentStatus, raw: &str) -> ProviderIntent {
    ProviderIntent {
        id: id.to_string(),
        client_secret: None,
        amount: 199,
        currency: "usd".to_string(),
        status,
        raw_status: raw.to_string(),
        metadata: HashMap::from([("user_id".to_string(), user_id.to_string())]),
        last_error: (status == IntentStatus::Failed).then(|| "Your card has insufficient funds.".to_string()),
    }
}

#[actix_web::test]
async fn price_mismatch_is_rejected_before_provider_call() {
    let db = setup_db().await;
    insert_user(&db, "auth0|asha", "asha@example.com", UserRole::User, None).await;
    let provider = Arc::new(FakeProvider::default());
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), provider.clone(), StorageErrorPolicy::Deny)),
    )
    .await;
    let token = bearer("auth0|asha", "asha@example.com");

    for body in [
        intent_request(100, "monthly", None),
        intent_request(199, "monthly", Some("advocate")),
        intent_request(199, "lifetime", None),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/v1/payments/intent")
            .insert_header(("Authorization", token.clone()))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }
    assert_eq!(provider.create_calls(), 0);
}

#[actix_web::test]
async fn intent_creation_stamps_metadata_and_writes_nothing() {
    let db = setup_db().await;
    let user = insert_user(&db, "auth0|asha", "asha@example.com", UserRole::User, None).await;
    let provider = Arc::new(FakeProvider::default());
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), provider.clone(), StorageErrorPolicy::Deny)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/payments/intent")
        .insert_header(("Authorization", bearer("auth0|asha", "asha@example.com")))
        .set_json(intent_request(2499, "half_yearly", Some("advocate")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["client_secret"], "pi_fake_1_secret");
    assert_eq!(json["data"]["payment_intent_id"], "pi_fake_1");
    assert_eq!(json["data"]["plan_id"], "half_yearly");

    let created = provider.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].amount, 2499);
    assert_eq!(created[0].metadata.user_id, user.id);
    drop(created);

    assert_eq!(payments::Entity::find().count(&db).await.unwrap(), 0);
    let u = users::Entity::find_by_id(user.id).one(&db).await.unwrap().unwrap();
    assert!(!u.is_premium);
}

#[actix_web::test]
async fn intent_creation_gives_up_on_stalled_storage() {
    let db = setup_db().await;
    insert_user(&db, "auth0|asha", "asha@example.com", UserRole::User, None).await;
    let provider = Arc::new(FakeProvider::default());
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), provider.clone(), StorageErrorPolicy::Deny)),
    )
    .await;

    // single-connection pool: the user lookup cannot get a connection
    let held = db.begin().await.unwrap();
    let req = test::TestRequest::post()
        .uri("/api/v1/payments/intent")
        .insert_header(("Authorization", bearer("auth0|asha", "asha@example.com")))
        .set_json(intent_request(199, "monthly", None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["error"]["code"], "SERVICE_UNAVAILABLE");
    held.rollback().await.unwrap();

    assert_eq!(provider.create_calls(), 0);
}

#[actix_web::test]
async fn confirm_reports_provider_status_without_granting() {
    let db = setup_db().await;
    let user = insert_user(&db, "auth0|asha", "asha@example.com", UserRole::User, None).await;
    let other = insert_user(&db, "auth0|ravi", "ravi@example.com", UserRole::User, None).await;
    let provider = Arc::new(FakeProvider::default());
    provider.put_intent(intent_owned_by("pi_ok", user.id, IntentStatus::Succeeded, "succeeded"));
    provider.put_intent(intent_owned_by("pi_declined", user.id, IntentStatus::Failed, "requires_payment_method"));
    provider.put_intent(intent_owned_by("pi_other", other.id, IntentStatus::Succeeded, "succeeded"));
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), provider, StorageErrorPolicy::Deny)),
    )
    .await;
    let token = bearer("auth0|asha", "asha@example.com");

    let confirm = |id: &str| {
        test::TestRequest::post()
            .uri("/api/v1/payments/confirm")
            .insert_header(("Authorization", token.clone()))
            .set_json(json!({ "payment_intent_id": id }))
            .to_request()
    };

    let resp = test::call_service(&app, confirm("pi_ok")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["next_step"], "complete_profile");

    let resp = test::call_service(&app, confirm("pi_declined")).await;
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["next_step"], "retry");
    assert_eq!(json["data"]["message"], "Your card has insufficient funds.");

    let resp = test::call_service(&app, confirm("pi_other")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, confirm("pi_missing")).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let u = users::Entity::find_by_id(user.id).one(&db).await.unwrap().unwrap();
    assert!(!u.is_premium);
}

#[actix_web::test]
async fn entitlement_reflects_expiry_and_admin_override() {
    let db = setup_db().await;
    insert_user(&db, "auth0|active", "active@example.com", UserRole::User, Some(Utc::now() + Duration::days(3))).await;
    insert_user(&db, "auth0|lapsed", "lapsed@example.com", UserRole::User, Some(Utc::now() - Duration::seconds(1))).await;
    insert_user(&db, "auth0|admin", "admin@example.com", UserRole::Admin, None).await;
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), Arc::new(FakeProvider::default()), StorageErrorPolicy::Deny)),
    )
    .await;

    let check = |ext: &str, email: &str| {
        test::TestRequest::get()
            .uri("/api/v1/entitlement")
            .insert_header(("Authorization", bearer(ext, email)))
            .to_request()
    };

    let json: serde_json::Value =
        test::read_body_json(test::call_service(&app, check("auth0|active", "active@example.com")).await).await;
    assert_eq!(json["data"]["premium"], true);
    assert_eq!(json["data"]["reason"], "active_premium");

    let json: serde_json::Value =
        test::read_body_json(test::call_service(&app, check("auth0|lapsed", "lapsed@example.com")).await).await;
    assert_eq!(json["data"]["premium"], false);
    assert_eq!(json["data"]["reason"], "expired");

    let json: serde_json::Value =
        test::read_body_json(test::call_service(&app, check("auth0|admin", "admin@example.com")).await).await;
    assert_eq!(json["data"]["premium"], true);
    assert_eq!(json["data"]["reason"], "admin");
}

#[actix_web::test]
async fn gated_route_returns_upsell_view_for_non_premium() {
    let db = setup_db().await;
    insert_user(&db, "auth0|asha", "asha@example.com", UserRole::User, None).await;
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), Arc::new(FakeProvider::default()), StorageErrorPolicy::Deny)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/premium/access")
        .insert_header(("Authorization", bearer("auth0|asha", "asha@example.com")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["access"], "gated");
    assert_eq!(json["data"]["plans"].as_array().unwrap().len(), 8);
}

#[actix_web::test]
async fn public_and_protected_routes() {
    let db = setup_db().await;
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), Arc::new(FakeProvider::default()), StorageErrorPolicy::Deny)),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/plans").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp =
        test::call_service(&app, test::TestRequest::get().uri("/api/v1/payments/config").to_request()).await;
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["publishable_key"], "pk_test_123");

    let err = test::try_call_service(&app, test::TestRequest::get().uri("/api/v1/entitlement").to_request())
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn callback_then_profile_completion() {
    let db = setup_db().await;
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), Arc::new(FakeProvider::default()), StorageErrorPolicy::Deny)),
    )
    .await;
    let token = bearer("auth0|meera", "Meera@Example.com");

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/callback")
            .insert_header(("Authorization", token.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    assert_eq!(users::Entity::find().count(&db).await.unwrap(), 1);

    let complete = |body: serde_json::Value| {
        test::TestRequest::post()
            .uri("/api/v1/profile/complete")
            .insert_header(("Authorization", token.clone()))
            .set_json(body)
            .to_request()
    };

    let resp = test::call_service(
        &app,
        complete(json!({ "role": "admin", "display_name": "Meera" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        complete(json!({ "role": "advocate", "display_name": "Meera" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        complete(json!({
            "role": "advocate",
            "display_name": "Meera Nair",
            "city": "Kochi",
            "bar_registration_number": "KER/1234/2019"
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["next_step"], "checkout");
    assert_eq!(json["data"]["user"]["role"], "advocate");
    assert_eq!(json["data"]["user"]["is_premium"], false);
}

#[cfg(not(feature = "payment-bypass"))]
#[actix_web::test]
async fn bypass_token_is_rejected_without_the_feature() {
    let db = setup_db().await;
    let app = test::init_service(
        App::new()
            .wrap(auth_middleware())
            .configure(routes(db.clone(), Arc::new(FakeProvider::default()), StorageErrorPolicy::Deny)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/profile/complete")
        .insert_header(("Authorization", bearer("auth0|qa", "qa@example.com")))
        .set_json(json!({
            "role": "user",
            "display_name": "QA Runner",
            "payment_bypass_token": "skip"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let premium = users::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .iter()
        .any(|u| u.is_premium);
    assert!(!premium);
}
