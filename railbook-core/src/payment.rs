use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Pending,
    Settled,
    Denied,
    Expired,
}

/// A redirect-based checkout session at the payment provider, referenced
/// weakly by the booking it pays for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Provider-unique order reference, echoed back in notifications.
    pub order_ref: String,
    pub amount: i64,
    pub redirect_url: String,
    pub outcome: PaymentOutcome,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session with the provider and return the redirect
    /// URL the buyer completes payment on.
    async fn create_session(
        &self,
        booking_id: Uuid,
        order_ref: &str,
        amount: i64,
    ) -> Result<PaymentSession, GatewayError>;
}
