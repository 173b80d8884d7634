use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{PaymentStatus, UserRole};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::auth_callback,
        handlers::profile::complete_profile,
        handlers::profile::get_profile,
        handlers::profile::update_profile,
        handlers::payment::create_payment_intent,
        handlers::payment::confirm_payment,
        handlers::payment::get_payment_config,
        handlers::payment::list_payments,
        handlers::payment::list_plans,
        handlers::entitlement::get_entitlement,
        handlers::entitlement::premium_access,
    ),
    components(
        schemas(
            UserRole,
            UserResponse,
            CompleteProfileRequest,
            CompleteProfileResponse,
            UpdateProfileRequest,
            PremiumPlan,
            UserType,
            PlanPrice,
            PaymentStatus,
            CreatePaymentIntentRequest,
            CreatePaymentIntentResponse,
            ConfirmPaymentRequest,
            ConfirmPaymentResponse,
            NextStep,
            PaymentConfigResponse,
            PaymentRecordResponse,
            Entitlement,
            EntitlementReason,
            PremiumAccessResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Identity provider callback"),
        (name = "profile", description = "Profile completion and editing"),
        (name = "payment", description = "Premium checkout and payment history"),
        (name = "entitlement", description = "Premium entitlement gate"),
    ),
    info(
        title = "LexHub Backend API",
        version = "1.0.0",
        description = "LexHub premium membership REST API documentation",
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
