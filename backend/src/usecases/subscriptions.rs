use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::{
        repositories::user_data::UserDataRepository,
        value_objects::{
            subscription_mirror::SubscriptionMirrorEffect, subscriptions::CreateCheckoutRequest,
        },
    },
    payments::stripe_client::{CheckoutSessionRequest, StripeApiError, StripeClient, StripeEvent},
};
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> AnyResult<String> {
        self.create_checkout_session(request).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Invalid {0}")]
    InvalidRedirect(&'static str),
    #[error("{0}")]
    CheckoutRejected(String),
    #[error("Failed to create checkout session")]
    CheckoutFailed(#[source] anyhow::Error),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Webhook handler failed")]
    WebhookFailed(#[source] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::MissingFields
            | SubscriptionError::InvalidRedirect(_)
            | SubscriptionError::CheckoutRejected(_)
            | SubscriptionError::InvalidSignature => StatusCode::BAD_REQUEST,
            SubscriptionError::CheckoutFailed(_) | SubscriptionError::WebhookFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

/// Where Stripe sends the browser back when the caller does not say.
#[derive(Debug, Clone)]
pub struct CheckoutRedirects {
    pub success_url: String,
    pub cancel_url: String,
}

pub struct SubscriptionUseCase<U, Stripe>
where
    U: UserDataRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    user_data_repo: Arc<U>,
    stripe_client: Arc<Stripe>,
    redirects: CheckoutRedirects,
}

impl<U, Stripe> SubscriptionUseCase<U, Stripe>
where
    U: UserDataRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(user_data_repo: Arc<U>, stripe_client: Arc<Stripe>, redirects: CheckoutRedirects) -> Self {
        Self {
            user_data_repo,
            stripe_client,
            redirects,
        }
    }

    pub async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<String> {
        let session_request = self.checkout_session_request(request)?;
        let user_id = session_request.user_id.clone();
        info!(%user_id, price_id = %session_request.price_id, "subscriptions: creating checkout session");

        match self
            .stripe_client
            .create_checkout_session(&session_request)
            .await
        {
            Ok(url) => {
                info!(%user_id, "subscriptions: checkout session created");
                Ok(url)
            }
            Err(err) => {
                if let Some(api_error) = err.downcast_ref::<StripeApiError>() {
                    warn!(
                        %user_id,
                        status = api_error.status,
                        "subscriptions: stripe rejected checkout session"
                    );
                    let message = api_error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Stripe rejected the checkout request".to_string());
                    return Err(SubscriptionError::CheckoutRejected(message));
                }

                error!(%user_id, stripe_error = ?err, "subscriptions: failed to create checkout session");
                Err(SubscriptionError::CheckoutFailed(err))
            }
        }
    }

    fn checkout_session_request(
        &self,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<CheckoutSessionRequest> {
        let (Some(price_id), Some(user_id), Some(user_email)) = (
            non_blank(request.price_id),
            non_blank(request.user_id),
            non_blank(request.user_email),
        ) else {
            warn!("subscriptions: checkout request is missing required fields");
            return Err(SubscriptionError::MissingFields);
        };

        let success_url = redirect_or(request.success_url, &self.redirects.success_url, "successUrl")?;
        let cancel_url = redirect_or(request.cancel_url, &self.redirects.cancel_url, "cancelUrl")?;

        Ok(CheckoutSessionRequest {
            price_id,
            user_id,
            user_email,
            success_url,
            cancel_url,
        })
    }

    /// Verifies a Stripe delivery and mirrors its effect onto `user_data.is_premium`.
    /// Events that do not concern a known user are acknowledged without a write.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<()> {
        let Some(signature) = signature.filter(|value| !value.trim().is_empty()) else {
            warn!("subscriptions: webhook without stripe-signature header");
            return Err(SubscriptionError::InvalidSignature);
        };

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "subscriptions: webhook signature verification failed");
                SubscriptionError::InvalidSignature
            })?;

        let event_id = event.id.clone().unwrap_or_default();
        info!(%event_id, event_type = %event.type_, "subscriptions: stripe event received");

        let effect = SubscriptionMirrorEffect::from_event(&event.type_, &event.data.object);
        let Some(patch) = effect.patch() else {
            if let SubscriptionMirrorEffect::Ignore { reason } = effect {
                info!(%event_id, event_type = %event.type_, reason, "subscriptions: event ignored");
            }
            return Ok(());
        };

        let user_id = match &effect {
            SubscriptionMirrorEffect::ActivateUser { user_id, .. } => user_id.clone(),
            SubscriptionMirrorEffect::SetPremiumForCustomer { customer_id, .. } => {
                let record = self
                    .user_data_repo
                    .find_by_stripe_customer_id(customer_id)
                    .await
                    .map_err(|err| {
                        error!(%event_id, %customer_id, db_error = ?err, "subscriptions: customer lookup failed");
                        SubscriptionError::WebhookFailed(err)
                    })?;

                match record {
                    Some(record) => record.user_id,
                    None => {
                        info!(%event_id, %customer_id, "subscriptions: no user for stripe customer");
                        return Ok(());
                    }
                }
            }
            SubscriptionMirrorEffect::Ignore { .. } => return Ok(()),
        };

        self.user_data_repo
            .patch_by_user_id(&user_id, &patch)
            .await
            .map_err(|err| {
                error!(%event_id, %user_id, db_error = ?err, "subscriptions: failed to mirror subscription status");
                SubscriptionError::WebhookFailed(err)
            })?;

        info!(
            %event_id,
            %user_id,
            is_premium = patch.is_premium.unwrap_or_default(),
            "subscriptions: premium status mirrored"
        );
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn redirect_or(value: Option<String>, default: &str, field: &'static str) -> UseCaseResult<String> {
    let Some(value) = non_blank(value) else {
        return Ok(default.to_string());
    };

    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        _ => {
            warn!(field, "subscriptions: invalid redirect url");
            Err(SubscriptionError::InvalidRedirect(field))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crates::{
        domain::{
            entities::user_data::UserDataEntity, repositories::user_data::MockUserDataRepository,
        },
        payments::stripe_client::StripeEventData,
    };
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn redirects() -> CheckoutRedirects {
        CheckoutRedirects {
            success_url: "https://mystoryrealm.com?success=true".to_string(),
            cancel_url: "https://mystoryrealm.com?canceled=true".to_string(),
        }
    }

    fn usecase(
        repo: MockUserDataRepository,
        stripe: MockStripeGateway,
    ) -> SubscriptionUseCase<MockUserDataRepository, MockStripeGateway> {
        SubscriptionUseCase::new(Arc::new(repo), Arc::new(stripe), redirects())
    }

    fn checkout_request() -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            price_id: Some("price_123".to_string()),
            user_id: Some("user-1".to_string()),
            user_email: Some("reader@example.com".to_string()),
            ..CreateCheckoutRequest::default()
        }
    }

    fn event(type_: &str, object: Value) -> StripeEvent {
        StripeEvent {
            id: Some("evt_1".to_string()),
            type_: type_.to_string(),
            created: None,
            livemode: Some(false),
            data: StripeEventData { object },
        }
    }

    fn stripe_delivering(event: StripeEvent) -> MockStripeGateway {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .times(1)
            .returning(move |_, _| Ok(event.clone()));
        stripe
    }

    fn customer_record() -> UserDataEntity {
        UserDataEntity {
            stripe_customer_id: Some("cus_1".to_string()),
            ..UserDataEntity::new("user-1", NaiveDate::from_ymd_opt(2024, 5, 2).unwrap())
        }
    }

    #[tokio::test]
    async fn checkout_uses_default_redirects() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_checkout_session()
            .withf(|request| {
                request.price_id == "price_123"
                    && request.user_id == "user-1"
                    && request.success_url == "https://mystoryrealm.com?success=true"
                    && request.cancel_url == "https://mystoryrealm.com?canceled=true"
            })
            .times(1)
            .returning(|_| Ok("https://checkout.stripe.com/c/pay/cs_test".to_string()));

        let url = usecase(MockUserDataRepository::new(), stripe)
            .create_checkout_session(checkout_request())
            .await
            .unwrap();

        assert_eq!(url, "https://checkout.stripe.com/c/pay/cs_test");
    }

    #[tokio::test]
    async fn checkout_keeps_caller_redirects() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_checkout_session()
            .withf(|request| request.success_url == "https://example.com/thanks")
            .times(1)
            .returning(|_| Ok("https://checkout.stripe.com/c/pay/cs_test".to_string()));

        let request = CreateCheckoutRequest {
            success_url: Some("https://example.com/thanks".to_string()),
            ..checkout_request()
        };

        assert!(
            usecase(MockUserDataRepository::new(), stripe)
                .create_checkout_session(request)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn checkout_without_required_fields_never_calls_stripe() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_checkout_session().never();
        let usecase = usecase(MockUserDataRepository::new(), stripe);

        let request = CreateCheckoutRequest {
            user_email: Some("   ".to_string()),
            ..checkout_request()
        };
        let err = usecase.create_checkout_session(request).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingFields));
        assert_eq!(err.to_string(), "Missing required fields");

        let request = CreateCheckoutRequest {
            cancel_url: Some("javascript:alert(1)".to_string()),
            ..checkout_request()
        };
        let err = usecase.create_checkout_session(request).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidRedirect("cancelUrl")));
    }

    #[tokio::test]
    async fn stripe_rejection_surfaces_its_message() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_checkout_session().returning(|_| {
            Err(StripeApiError {
                context: "create checkout session",
                status: 400,
                request_id: Some("req_1".to_string()),
                message: Some("No such price: 'price_123'".to_string()),
            }
            .into())
        });

        let err = usecase(MockUserDataRepository::new(), stripe)
            .create_checkout_session(checkout_request())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No such price: 'price_123'");
    }

    #[tokio::test]
    async fn stripe_transport_failure_is_internal() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_checkout_session()
            .returning(|_| Err(anyhow!("connection refused")));

        let err = usecase(MockUserDataRepository::new(), stripe)
            .create_checkout_session(checkout_request())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to create checkout session");
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let err = usecase(MockUserDataRepository::new(), stripe)
            .handle_stripe_webhook(b"{}", None)
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidSignature));
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_writes_nothing() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow!("no signature matches the payload")));
        let mut repo = MockUserDataRepository::new();
        repo.expect_patch_by_user_id().never();

        let err = usecase(repo, stripe)
            .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid signature");
    }

    #[tokio::test]
    async fn completed_checkout_upgrades_the_referenced_user() {
        let stripe = stripe_delivering(event(
            "checkout.session.completed",
            json!({"client_reference_id": "user-1", "customer": "cus_1", "subscription": "sub_1"}),
        ));
        let mut repo = MockUserDataRepository::new();
        repo.expect_patch_by_user_id()
            .withf(|user_id, patch| {
                user_id == "user-1"
                    && patch.is_premium == Some(true)
                    && patch.stripe_customer_id.as_deref() == Some("cus_1")
                    && patch.stripe_subscription_id.as_deref() == Some("sub_1")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        usecase(repo, stripe)
            .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleted_subscription_downgrades_the_customer() {
        let stripe = stripe_delivering(event(
            "customer.subscription.deleted",
            json!({"customer": "cus_1", "status": "canceled"}),
        ));
        let mut repo = MockUserDataRepository::new();
        repo.expect_find_by_stripe_customer_id()
            .withf(|customer_id| customer_id == "cus_1")
            .times(1)
            .returning(|_| Ok(Some(customer_record())));
        repo.expect_patch_by_user_id()
            .withf(|user_id, patch| user_id == "user-1" && patch.is_premium == Some(false))
            .times(1)
            .returning(|_, _| Ok(()));

        usecase(repo, stripe)
            .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn updated_subscription_mirrors_active_status() {
        let stripe = stripe_delivering(event(
            "customer.subscription.updated",
            json!({"customer": "cus_1", "status": "active"}),
        ));
        let mut repo = MockUserDataRepository::new();
        repo.expect_find_by_stripe_customer_id()
            .returning(|_| Ok(Some(customer_record())));
        repo.expect_patch_by_user_id()
            .withf(|_, patch| patch.is_premium == Some(true))
            .times(1)
            .returning(|_, _| Ok(()));

        usecase(repo, stripe)
            .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_customer_is_acknowledged_without_a_write() {
        let stripe = stripe_delivering(event(
            "customer.subscription.updated",
            json!({"customer": "cus_unknown", "status": "past_due"}),
        ));
        let mut repo = MockUserDataRepository::new();
        repo.expect_find_by_stripe_customer_id()
            .returning(|_| Ok(None));
        repo.expect_patch_by_user_id().never();

        assert!(
            usecase(repo, stripe)
                .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unhandled_event_type_is_acknowledged() {
        let stripe = stripe_delivering(event("invoice.paid", json!({"customer": "cus_1"})));
        let mut repo = MockUserDataRepository::new();
        repo.expect_find_by_stripe_customer_id().never();
        repo.expect_patch_by_user_id().never();

        assert!(
            usecase(repo, stripe)
                .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn store_failure_fails_the_delivery() {
        let stripe = stripe_delivering(event(
            "customer.subscription.deleted",
            json!({"customer": "cus_1"}),
        ));
        let mut repo = MockUserDataRepository::new();
        repo.expect_find_by_stripe_customer_id()
            .returning(|_| Err(anyhow!("supabase unavailable")));

        let err = usecase(repo, stripe)
            .handle_stripe_webhook(b"{}", Some("t=1,v1=00"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Webhook handler failed");
    }
}
