//! Consent capability: a predicate-only check the outbound dialer consults
//! before every call attempt. The core never stores consent itself.

use async_trait::async_trait;

use crate::error::Result;

/// The kind of contact consent is being checked for. Kept as an open string
/// newtype rather than a closed enum: consent categories are defined by the
/// deployment's compliance policy, not by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsentKind(pub String);

impl ConsentKind {
    pub fn phone_contact() -> Self {
        Self("phone_contact".to_string())
    }

    pub fn sms_contact() -> Self {
        Self("sms_contact".to_string())
    }
}

impl From<&str> for ConsentKind {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn has_consent(&self, subject_id: &str, kind: &ConsentKind) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysGrant;

    #[async_trait]
    impl ConsentStore for AlwaysGrant {
        async fn has_consent(&self, _subject_id: &str, _kind: &ConsentKind) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn phone_contact_kind_is_stable() {
        assert_eq!(ConsentKind::phone_contact(), ConsentKind::from("phone_contact"));
        let store = AlwaysGrant;
        assert!(store.has_consent("patient-1", &ConsentKind::phone_contact()).await.unwrap());
    }
}
