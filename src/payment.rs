// Payment capability awaited by the booking session before the booking call

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Payment declined: {0}")]
    Declined(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: f64,
    pub guest_email: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: f64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn charge(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentError>;
}

// Default processing time of the simulated provider
pub const DEFAULT_PAYMENT_DELAY_MS: u64 = 3000;

/// Stand-in provider: waits a fixed delay, then approves any positive amount.
#[derive(Debug, Clone)]
pub struct SimulatedPaymentGateway {
    delay: Duration,
}

impl SimulatedPaymentGateway {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedPaymentGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_PAYMENT_DELAY_MS))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        if request.amount.is_nan() || request.amount <= 0.0 {
            return Err(PaymentError::Declined(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        sleep(self.delay).await;

        let receipt = PaymentReceipt {
            transaction_id: format!("txn_{:016x}", rand::random::<u64>()),
            amount: request.amount,
        };
        tracing::debug!(
            transaction_id = %receipt.transaction_id,
            amount = receipt.amount,
            idempotency_key = %request.idempotency_key,
            "simulated payment approved"
        );
        Ok(receipt)
    }
}
