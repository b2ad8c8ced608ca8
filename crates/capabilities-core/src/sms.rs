//! SMS gateway capability, used by the outbound dialer's retry/fallback policy.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, message: SmsMessage) -> Result<SmsResult>;
}
