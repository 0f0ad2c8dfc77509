use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    routing::post,
};
use crates::domain::{
    repositories::user_data::UserDataRepository,
    value_objects::subscriptions::{
        CreateCheckoutRequest, CreateCheckoutResponse, WebhookReceipt,
    },
};
use tracing::warn;

use super::browser_cors;
use crate::{
    axum_http::{default_routers, error_responses::AppError},
    usecases::subscriptions::{StripeGateway, SubscriptionUseCase},
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn checkout_routes<U, S>(usecase: Arc<SubscriptionUseCase<U, S>>) -> Router
where
    U: UserDataRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            post(create_checkout::<U, S>).fallback(default_routers::method_not_allowed),
        )
        .layer(browser_cors([Method::POST, Method::OPTIONS]))
        .with_state(usecase)
}

/// Called by Stripe only, so no CORS.
pub fn webhook_routes<U, S>(usecase: Arc<SubscriptionUseCase<U, S>>) -> Router
where
    U: UserDataRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            post(stripe_webhook::<U, S>).fallback(default_routers::method_not_allowed),
        )
        .with_state(usecase)
}

pub async fn create_checkout<U, S>(
    State(usecase): State<Arc<SubscriptionUseCase<U, S>>>,
    body: Bytes,
) -> Result<Json<CreateCheckoutResponse>, AppError>
where
    U: UserDataRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let request: CreateCheckoutRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!(error = %err, "subscriptions router: invalid checkout body");
        AppError::BadRequest("Invalid request body".to_string())
    })?;

    let url = usecase.create_checkout_session(request).await?;
    Ok(Json(CreateCheckoutResponse { url }))
}

pub async fn stripe_webhook<U, S>(
    State(usecase): State<Arc<SubscriptionUseCase<U, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReceipt>, AppError>
where
    U: UserDataRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    // Signature verification needs the body exactly as sent.
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    usecase.handle_stripe_webhook(&body, signature).await?;
    Ok(Json(WebhookReceipt { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::subscriptions::{CheckoutRedirects, MockStripeGateway};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use crates::{
        domain::repositories::user_data::MockUserDataRepository,
        payments::stripe_client::{StripeEvent, StripeEventData},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn usecase(
        stripe: MockStripeGateway,
    ) -> Arc<SubscriptionUseCase<MockUserDataRepository, MockStripeGateway>> {
        Arc::new(SubscriptionUseCase::new(
            Arc::new(MockUserDataRepository::new()),
            Arc::new(stripe),
            CheckoutRedirects {
                success_url: "https://mystoryrealm.com?success=true".to_string(),
                cancel_url: "https://mystoryrealm.com?canceled=true".to_string(),
            },
        ))
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn checkout_returns_the_session_url() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_checkout_session()
            .times(1)
            .returning(|_| Ok("https://checkout.stripe.com/c/pay/cs_test".to_string()));

        let body = json!({
            "priceId": "price_123",
            "userId": "user-1",
            "userEmail": "reader@example.com"
        });
        let response = checkout_routes(usecase(stripe))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "url": "https://checkout.stripe.com/c/pay/cs_test" })
        );
    }

    #[tokio::test]
    async fn checkout_with_missing_fields_is_a_bad_request() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_checkout_session().never();

        let response = checkout_routes(usecase(stripe))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from(json!({ "priceId": "price_123" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Missing required fields" })
        );
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let response = webhook_routes(usecase(stripe))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Invalid signature" })
        );
    }

    #[tokio::test]
    async fn webhook_passes_the_raw_body_and_acknowledges() {
        let raw = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(move |payload, signature| payload == raw.as_bytes() && signature == "t=1,v1=ab")
            .times(1)
            .returning(|_, _| {
                Ok(StripeEvent {
                    id: Some("evt_1".to_string()),
                    type_: "invoice.paid".to_string(),
                    created: None,
                    livemode: None,
                    data: StripeEventData { object: json!({}) },
                })
            });

        let response = webhook_routes(usecase(stripe))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=ab")
                    .body(Body::from(raw))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "received": true }));
    }

    #[tokio::test]
    async fn webhook_has_no_cors_headers() {
        let response = webhook_routes(usecase(MockStripeGateway::new()))
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
