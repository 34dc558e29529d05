use swapforge_core::error::ForgeError;
use swapforge_core::types::UserId;

/// Resolves a bearer token to the caller's identity, or rejects it.
///
/// JWT issuance, password/login flows, and session storage all stay out of
/// scope for this core; this trait is the seam the RPC facade calls into to
/// get an authenticated `UserId` before touching task or billing state.
pub trait Identity: Send + Sync {
    fn resolve(&self, token: &str) -> Result<UserId, ForgeError>;
}
