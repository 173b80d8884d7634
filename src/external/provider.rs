use crate::error::AppResult;
use crate::models::IntentMetadata;
use async_trait::async_trait;
use std::collections::HashMap;

/// Provider-side lifecycle of a checkout attempt, as far as this service cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    /// Waiting on the customer or still processing.
    Pending,
    Succeeded,
    /// Declined or canceled; the customer has to try again.
    Failed,
}

#[derive(Debug, Clone)]
pub struct ProviderIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    /// Provider's own status string, passed through to the client.
    pub raw_status: String,
    pub metadata: HashMap<String, String>,
    /// Decline reason from the provider, safe to show to the customer.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub metadata: IntentMetadata,
    pub description: String,
    pub receipt_email: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_intent(&self, request: NewPaymentIntent) -> AppResult<ProviderIntent>;

    async fn retrieve_intent(&self, payment_intent_id: &str) -> AppResult<ProviderIntent>;
}
