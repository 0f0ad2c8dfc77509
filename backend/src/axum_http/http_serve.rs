use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        subscriptions::{CheckoutRedirects, StripeGateway, SubscriptionUseCase},
        user_data::UserDataUseCase,
    },
};
use anyhow::Result;
use axum::{Router, routing::get};
use crates::{
    domain::repositories::{identity::IdentityRepository, user_data::UserDataRepository},
    infra::supabase::{
        SupabaseConfig, auth::SupabaseAuthClient, retry::RetryPolicy,
        user_data::UserDataSupabase,
    },
    payments::stripe_client::{StripeClient, StripeConfig},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>) -> Result<()> {
    let supabase_config = SupabaseConfig {
        project_url: config.supabase.project_url.clone(),
        service_key: config.supabase.service_key.clone(),
        http_timeout_secs: config.supabase.http_timeout_secs,
        retry: RetryPolicy {
            max_retries: config.supabase.max_retries,
            backoff_base_ms: config.supabase.backoff_base_ms,
            backoff_max_ms: config.supabase.backoff_max_ms,
        },
    };
    let user_data_repo = Arc::new(UserDataSupabase::new(&supabase_config)?);
    let identity_repo = Arc::new(SupabaseAuthClient::new(&supabase_config)?);
    info!("Supabase clients have been built");

    let stripe_client = Arc::new(StripeClient::new(StripeConfig {
        secret_key: config.stripe.secret_key.clone(),
        webhook_secret: config.stripe.webhook_secret.clone(),
        webhook_tolerance_secs: config.stripe.webhook_tolerance_secs,
        http_timeout_secs: config.stripe.http_timeout_secs,
    })?);

    let user_data_usecase = Arc::new(UserDataUseCase::new(
        Arc::clone(&user_data_repo),
        identity_repo,
    ));
    let subscription_usecase = Arc::new(SubscriptionUseCase::new(
        user_data_repo,
        stripe_client,
        CheckoutRedirects {
            success_url: config.stripe.success_url.clone(),
            cancel_url: config.stripe.cancel_url.clone(),
        },
    ));

    let app = api_router(user_data_usecase, subscription_usecase)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.api_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.api_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(stage = %config.stage, "Server is running on port {}", config.api_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// CORS is set per route group; the webhook must stay without it.
pub fn api_router<U, I, S>(
    user_data_usecase: Arc<UserDataUseCase<U, I>>,
    subscription_usecase: Arc<SubscriptionUseCase<U, S>>,
) -> Router
where
    U: UserDataRepository + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/user", routers::user_data::routes(user_data_usecase))
        .nest(
            "/api/checkout",
            routers::subscriptions::checkout_routes(Arc::clone(&subscription_usecase)),
        )
        .nest(
            "/api/webhook",
            routers::subscriptions::webhook_routes(subscription_usecase),
        )
        .route("/api/health-check", get(default_routers::health_check))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
