use serde_json::Value;

use crate::domain::value_objects::{
    enums::subscription_statuses::SubscriptionStatus, user_data_patch::UserDataPatch,
};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const CUSTOMER_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";

/// What a Stripe event means for the `is_premium` flag of a `user_data` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionMirrorEffect {
    /// Checkout finished; the row is addressed by our own user id.
    ActivateUser {
        user_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    /// Subscription changed; the row has to be looked up by Stripe customer id.
    SetPremiumForCustomer {
        customer_id: String,
        is_premium: bool,
    },
    Ignore {
        reason: &'static str,
    },
}

impl SubscriptionMirrorEffect {
    pub fn from_event(event_type: &str, object: &Value) -> Self {
        match event_type {
            CHECKOUT_SESSION_COMPLETED => {
                let user_id = non_empty_str(object, "client_reference_id").or_else(|| {
                    object
                        .get("metadata")
                        .and_then(|metadata| non_empty_str(metadata, "user_id"))
                });

                match user_id {
                    Some(user_id) => Self::ActivateUser {
                        user_id,
                        customer_id: non_empty_str(object, "customer"),
                        subscription_id: non_empty_str(object, "subscription"),
                    },
                    None => Self::Ignore {
                        reason: "checkout session has no user reference",
                    },
                }
            }
            CUSTOMER_SUBSCRIPTION_DELETED => match non_empty_str(object, "customer") {
                Some(customer_id) => Self::SetPremiumForCustomer {
                    customer_id,
                    is_premium: false,
                },
                None => Self::Ignore {
                    reason: "subscription has no customer reference",
                },
            },
            CUSTOMER_SUBSCRIPTION_UPDATED => match non_empty_str(object, "customer") {
                Some(customer_id) => {
                    let status = object
                        .get("status")
                        .and_then(Value::as_str)
                        .map(SubscriptionStatus::from_str)
                        .unwrap_or(SubscriptionStatus::Unknown);
                    Self::SetPremiumForCustomer {
                        customer_id,
                        is_premium: status.grants_premium(),
                    }
                }
                None => Self::Ignore {
                    reason: "subscription has no customer reference",
                },
            },
            _ => Self::Ignore {
                reason: "unhandled event type",
            },
        }
    }

    pub fn patch(&self) -> Option<UserDataPatch> {
        match self {
            Self::ActivateUser {
                customer_id,
                subscription_id,
                ..
            } => Some(UserDataPatch {
                is_premium: Some(true),
                stripe_customer_id: customer_id.clone(),
                stripe_subscription_id: subscription_id.clone(),
                ..UserDataPatch::default()
            }),
            Self::SetPremiumForCustomer { is_premium, .. } => {
                Some(UserDataPatch::premium(*is_premium))
            }
            Self::Ignore { .. } => None,
        }
    }
}

fn non_empty_str(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
