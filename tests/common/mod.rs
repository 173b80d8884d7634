// Shared fixtures for the HTTP-level tests: in-memory SQLite through the real
// migrator, a recording fake payment provider, and signed identity tokens.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix_web::web;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

use lexhub_backend::config::{AuthConfig, StorageErrorPolicy, StripeConfig};
use lexhub_backend::database::run_migrations;
use lexhub_backend::entities::{UserRole, user_entity as users};
use lexhub_backend::error::{AppError, AppResult};
use lexhub_backend::external::{IntentStatus, NewPaymentIntent, PaymentProvider, ProviderIntent};
use lexhub_backend::handlers;
use lexhub_backend::middlewares::AuthMiddleware;
use lexhub_backend::services::{
    EntitlementService, PaymentEventService, PaymentService, UserService,
};
use lexhub_backend::utils::{Claims, JwtService, WebhookVerifier};

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const STORAGE_TIMEOUT_SECS: u64 = 2;

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        domain: "lexhub.test".to_string(),
        client_id: "client-test".to_string(),
        client_secret: "identity-secret".to_string(),
    }
}

pub fn stripe_config() -> StripeConfig {
    StripeConfig {
        secret_key: "sk_test_unused".to_string(),
        publishable_key: "pk_test_123".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        currency: "usd".to_string(),
        webhook_tolerance_secs: 300,
    }
}

pub fn verifier() -> WebhookVerifier {
    WebhookVerifier::new(WEBHOOK_SECRET, 300)
}

pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}

pub async fn insert_user(
    db: &DatabaseConnection,
    external_id: &str,
    email: &str,
    role: UserRole,
    premium_until: Option<DateTime<Utc>>,
) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        external_id: Set(external_id.to_string()),
        email: Set(email.to_string()),
        display_name: Set(email.split('@').next().unwrap().to_string()),
        role: Set(role),
        is_premium: Set(premium_until.is_some()),
        premium_expires_at: Set(premium_until),
        profile_completed: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn bearer(external_id: &str, email: &str) -> String {
    let auth = auth_config();
    let now = Utc::now();
    let claims = Claims {
        sub: external_id.to_string(),
        email: Some(email.to_string()),
        name: None,
        iss: JwtService::issuer_for(&auth.domain),
        aud: auth.client_id.clone(),
        exp: (now + Duration::minutes(10)).timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.client_secret.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

/// Records every create call and answers retrieves from a canned intent.
#[derive(Default)]
pub struct FakeProvider {
    pub created: Mutex<Vec<NewPaymentIntent>>,
    pub intents: Mutex<HashMap<String, ProviderIntent>>,
}

impl FakeProvider {
    pub fn create_calls(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn put_intent(&self, intent: ProviderIntent) {
        self.intents.lock().unwrap().insert(intent.id.clone(), intent);
    }
}

#[async_trait::async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_intent(&self, request: NewPaymentIntent) -> AppResult<ProviderIntent> {
        let mut created = self.created.lock().unwrap();
        let id = format!("pi_fake_{}", created.len() + 1);
        let intent = ProviderIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            amount: request.amount,
            currency: request.currency.clone(),
            status: IntentStatus::Pending,
            raw_status: "requires_payment_method".to_string(),
            metadata: request.metadata.to_map(),
            last_error: None,
        };
        created.push(request);
        Ok(intent)
    }

    async fn retrieve_intent(&self, payment_intent_id: &str) -> AppResult<ProviderIntent> {
        self.intents
            .lock()
            .unwrap()
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| AppError::ExternalApiError("No such payment_intent".to_string()))
    }
}

pub fn signed_event(
    event_type: &str,
    tx_id: &str,
    amount: i64,
    metadata: serde_json::Value,
) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({
        "id": format!("evt_{tx_id}_{event_type}"),
        "type": event_type,
        "data": {
            "object": {
                "id": tx_id,
                "object": "payment_intent",
                "amount": amount,
                "currency": "usd",
                "metadata": metadata,
                "last_payment_error": if event_type == "payment_intent.payment_failed" {
                    serde_json::json!({ "message": "Your card was declined." })
                } else {
                    serde_json::Value::Null
                }
            }
        }
    }))
    .unwrap();
    let header = verifier().header_for(&body, Utc::now().timestamp()).unwrap();
    (body, header)
}

pub fn auth_middleware() -> AuthMiddleware {
    AuthMiddleware::new(JwtService::new(&auth_config()))
}

/// The production route layout, wired to the given pool and provider.
/// Wrap the app with `auth_middleware()` as `main` does.
pub fn routes(
    db: DatabaseConnection,
    provider: Arc<FakeProvider>,
    policy: StorageErrorPolicy,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let user_service = UserService::new(db.clone(), STORAGE_TIMEOUT_SECS);
        let payment_service = PaymentService::new(
            db.clone(),
            provider,
            user_service.clone(),
            &stripe_config(),
        );
        let event_service = PaymentEventService::new(db.clone(), STORAGE_TIMEOUT_SECS);
        let entitlement_service = EntitlementService::new(db, STORAGE_TIMEOUT_SECS, policy, "usd");

        cfg.app_data(handlers::json_config())
            .app_data(web::Data::new(user_service))
            .app_data(web::Data::new(payment_service))
            .app_data(web::Data::new(event_service))
            .app_data(web::Data::new(entitlement_service))
            .app_data(web::Data::new(verifier()))
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::profile_config)
                    .configure(handlers::payment_config)
                    .configure(handlers::entitlement_config),
            );
    }
}
