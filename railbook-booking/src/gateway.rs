use async_trait::async_trait;
use chrono::Utc;
use railbook_core::{GatewayError, PaymentGateway, PaymentOutcome, PaymentSession};
use serde::Deserialize;
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// Redirect-based checkout adapter in the Snap style: the buyer is sent
/// to a hosted payment page and the provider calls back asynchronously.
pub struct RedirectGateway {
    redirect_base: String,
}

impl RedirectGateway {
    pub fn new(redirect_base: impl Into<String>) -> Self {
        Self {
            redirect_base: redirect_base.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RedirectGateway {
    async fn create_session(
        &self,
        booking_id: Uuid,
        order_ref: &str,
        amount: i64,
    ) -> Result<PaymentSession, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::Rejected(
                "gross amount must be positive".to_string(),
            ));
        }

        Ok(PaymentSession {
            id: Uuid::new_v4(),
            booking_id,
            order_ref: order_ref.to_string(),
            amount,
            redirect_url: format!(
                "{}/pay/{}",
                self.redirect_base.trim_end_matches('/'),
                order_ref
            ),
            outcome: PaymentOutcome::Pending,
            created_at: Utc::now(),
        })
    }
}

/// Signature the provider attaches to every notification:
/// `SHA512(order_ref + status_code + gross_amount + server_key)`, hex.
pub fn notification_signature(
    order_ref: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_ref.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fields the provider sends as either strings or numbers, depending on
/// the notification path.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrNumber {
    String(String),
    Number(f64),
}

impl StringOrNumber {
    fn as_plain(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => format!("{:.0}", n),
        }
    }
}

/// An asynchronous settlement notification from the provider.
#[derive(Debug, Deserialize)]
pub struct SettlementNotice {
    pub order_id: String,
    #[serde(default)]
    pub status_code: Option<StringOrNumber>,
    #[serde(default)]
    pub gross_amount: Option<StringOrNumber>,
    pub signature_key: String,
    pub transaction_status: String,
}

impl SettlementNotice {
    pub fn verify(&self, server_key: &str) -> bool {
        let status_code = self.status_code.as_ref().map(|v| v.as_plain()).unwrap_or_default();
        let gross_amount = self
            .gross_amount
            .as_ref()
            .map(|v| v.as_plain())
            .unwrap_or_default();
        let expected =
            notification_signature(&self.order_id, &status_code, &gross_amount, server_key);
        expected == self.signature_key
    }

    /// Map the provider's transaction status onto a session outcome.
    /// Unknown statuses return `None` and are acknowledged without action.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match self.transaction_status.as_str() {
            "settlement" | "capture" => Some(PaymentOutcome::Settled),
            "deny" | "cancel" | "failed" => Some(PaymentOutcome::Denied),
            "expire" => Some(PaymentOutcome::Expired),
            "pending" => Some(PaymentOutcome::Pending),
            _ => None,
        }
    }
}
