use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use lexhub_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{PaymentProvider, StripeService},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::{JwtService, WebhookVerifier},
};

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{context}: {e}");
    std::io::Error::other(format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载并校验配置
    let config =
        Config::from_toml().map_err(|e| startup_error("Failed to load configuration", e))?;

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .map_err(|e| startup_error("Failed to create database connection pool", e))?;

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run database migrations", e))?;

    let jwt_service = JwtService::new(&config.auth);
    let webhook_verifier = WebhookVerifier::new(
        config.stripe.webhook_secret.clone(),
        config.stripe.webhook_tolerance_secs,
    );

    // 创建外部服务
    let provider: Arc<dyn PaymentProvider> = Arc::new(StripeService::new(&config.stripe));

    // 创建服务
    let user_service = UserService::new(pool.clone(), config.database.query_timeout_secs);
    #[cfg(feature = "payment-bypass")]
    let user_service = {
        log::warn!("Built with the payment-bypass feature: do not deploy this binary to production");
        user_service.with_bypass(bypass::PaymentBypass::new(config.bypass.token.clone()))
    };
    let payment_service = PaymentService::new(
        pool.clone(),
        provider,
        user_service.clone(),
        &config.stripe,
    );
    let payment_event_service =
        PaymentEventService::new(pool.clone(), config.database.query_timeout_secs);
    let entitlement_service = EntitlementService::new(
        pool.clone(),
        config.database.query_timeout_secs,
        config.entitlement.on_storage_error,
        config.stripe.currency.to_ascii_lowercase(),
    );

    // 启动后台任务
    tasks::spawn_all(entitlement_service.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let allowed_origins = config.server.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors(&allowed_origins))
            .wrap(Logger::default())
            .app_data(handlers::json_config())
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(payment_service.clone()))
            .app_data(web::Data::new(payment_event_service.clone()))
            .app_data(web::Data::new(entitlement_service.clone()))
            .app_data(web::Data::new(webhook_verifier.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::profile_config)
                    .configure(handlers::payment_config)
                    .configure(handlers::entitlement_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
