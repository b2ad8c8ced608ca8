//! Audit log capability: fire-and-forget compliance recording. `record`
//! must never propagate an error to its caller — logging the audit trail
//! can never be allowed to abort a call attempt.

use std::collections::HashMap;

use async_trait::async_trait;

/// One audit record. `details` carries free-form, already-redacted fields
/// (e.g. a masked phone number) rather than raw PII.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: HashMap<String, String>,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an entry. Implementations must swallow their own errors
    /// (log and return) rather than bubbling them up.
    async fn record(&self, entry: AuditEntry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingAudit(Arc<AtomicUsize>);

    #[async_trait]
    impl AuditLog for CountingAudit {
        async fn record(&self, _entry: AuditEntry) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn record_is_fire_and_forget() {
        let count = Arc::new(AtomicUsize::new(0));
        let log = CountingAudit(count.clone());
        log.record(AuditEntry {
            actor_id: "dialer".into(),
            action: "CALL_ATTEMPTED".into(),
            resource_type: "patient".into(),
            resource_id: "123".into(),
            details: HashMap::new(),
        })
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
