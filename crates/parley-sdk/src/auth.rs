//! Anonymous sign-in.

use crate::error::AuthError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use ulid::Ulid;

/// Issues anonymous user ids.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    async fn sign_in_anonymously(&self) -> Result<String, AuthError>;
}

/// In-process provider issuing `anon-<ulid>` ids.
#[derive(Default)]
pub struct MemoryAuth {
    unavailable: AtomicBool,
    sign_ins: AtomicUsize,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every sign-in fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn sign_ins(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in_anonymously(&self) -> Result<String, AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable("auth backend unreachable".to_string()));
        }
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        Ok(format!("anon-{}", Ulid::new()))
    }
}
