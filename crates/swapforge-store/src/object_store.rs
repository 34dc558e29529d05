use swapforge_core::error::ForgeError;

/// Resolves a content-addressed file handle to a byte stream and back.
/// Backed by sled in this core; a production deployment can swap in
/// object storage (S3, GCS) behind the same trait.
pub trait ObjectStore: Send + Sync {
    fn put_object(&self, file_id: &str, bytes: &[u8]) -> Result<(), ForgeError>;
    fn get_object(&self, file_id: &str) -> Result<Option<Vec<u8>>, ForgeError>;
    fn object_exists(&self, file_id: &str) -> bool;

    /// URL path a client can retrieve this object through. The core owns
    /// only the mapping, not the HTTP serving of it.
    fn object_url(&self, file_id: &str) -> String {
        format!("/objects/{file_id}")
    }
}
