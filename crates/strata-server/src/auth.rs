use async_trait::async_trait;
use axum::http::StatusCode;

use strata_types::StreamId;

/// Outcome of a permission check.
///
/// A denied permit carries the status the HTTP surface must answer with,
/// so the policy decides between 401 and 403 (or anything else), not the
/// handler.
#[derive(Clone, Debug)]
pub struct Permit {
    pub allowed: bool,
    pub status: StatusCode,
    pub reason: String,
}

impl Permit {
    pub fn granted() -> Self {
        Self {
            allowed: true,
            status: StatusCode::OK,
            reason: String::new(),
        }
    }

    pub fn denied(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            status,
            reason: reason.into(),
        }
    }
}

/// Per-stream access policy seam.
///
/// Every route resolves a permit before touching the store and
/// short-circuits with the permit's status when denied.
#[async_trait]
pub trait StreamPermissions: Send + Sync {
    async fn can_read(&self, stream: &StreamId) -> Permit;
    async fn can_write(&self, stream: &StreamId) -> Permit;
}

/// Policy that grants everything. The default for single-tenant deploys.
pub struct AllowAll;

#[async_trait]
impl StreamPermissions for AllowAll {
    async fn can_read(&self, _stream: &StreamId) -> Permit {
        Permit::granted()
    }

    async fn can_write(&self, _stream: &StreamId) -> Permit {
        Permit::granted()
    }
}

/// Policy that denies everything with 401. Exercises the short-circuit
/// path in tests.
pub struct DenyAll;

#[async_trait]
impl StreamPermissions for DenyAll {
    async fn can_read(&self, stream: &StreamId) -> Permit {
        Permit::denied(
            StatusCode::UNAUTHORIZED,
            format!("read denied on stream {stream}"),
        )
    }

    async fn can_write(&self, stream: &StreamId) -> Permit {
        Permit::denied(
            StatusCode::UNAUTHORIZED,
            format!("write denied on stream {stream}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_grants_both_directions() {
        let policy = AllowAll;
        let stream = StreamId::parse("s1").unwrap();
        assert!(policy.can_read(&stream).await.allowed);
        assert!(policy.can_write(&stream).await.allowed);
    }

    #[tokio::test]
    async fn deny_all_carries_status_and_reason() {
        let policy = DenyAll;
        let stream = StreamId::parse("s1").unwrap();
        let permit = policy.can_write(&stream).await;
        assert!(!permit.allowed);
        assert_eq!(permit.status, StatusCode::UNAUTHORIZED);
        assert!(permit.reason.contains("s1"));
    }
}
