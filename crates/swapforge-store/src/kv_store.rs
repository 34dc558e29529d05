use swapforge_core::error::ForgeError;

/// Ephemeral keyed state: verification codes, refresh tokens, the task
/// queue's FIFO list and processing set, and any other auxiliary state
/// that does not need the durability guarantees of the relational store.
///
/// A production deployment can back this with Redis; the sled-backed
/// `ForgeDb` in this core implements it directly so the whole service
/// runs against one storage engine.
pub trait KvStore: Send + Sync {
    /// Set `key` to `value`, expiring at `now + ttl_secs` (0 = no expiry).
    fn put_with_ttl(&self, key: &str, value: &[u8], ttl_secs: i64, now: i64) -> Result<(), ForgeError>;

    /// Read `key`, treating an expired entry as absent (and lazily deleting it).
    fn get(&self, key: &str, now: i64) -> Result<Option<Vec<u8>>, ForgeError>;

    fn delete(&self, key: &str) -> Result<(), ForgeError>;

    /// Append to the tail of the named FIFO list.
    fn list_push(&self, list: &str, value: &[u8]) -> Result<(), ForgeError>;

    /// Remove and return the head of the named FIFO list.
    fn list_pop_front(&self, list: &str) -> Result<Option<Vec<u8>>, ForgeError>;

    fn list_len(&self, list: &str) -> Result<u64, ForgeError>;

    fn set_add(&self, set: &str, member: &[u8]) -> Result<(), ForgeError>;

    fn set_remove(&self, set: &str, member: &[u8]) -> Result<(), ForgeError>;

    fn set_contains(&self, set: &str, member: &[u8]) -> Result<bool, ForgeError>;

    fn set_len(&self, set: &str) -> Result<u64, ForgeError>;

    /// All members of the named set, each paired with the timestamp it was
    /// added at — used by the queue janitor to find stale processing entries.
    fn set_members_with_timestamps(&self, set: &str) -> Result<Vec<(Vec<u8>, i64)>, ForgeError>;
}
