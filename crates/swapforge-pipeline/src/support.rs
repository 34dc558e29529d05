//! Shared plumbing every pipeline uses: materializing an object-store
//! handle to a local file the engine adapter can upload, storing a
//! downloaded/generated artifact back into the object store, and
//! generating the 256x256 thumbnail every successful result carries.

use std::path::{Path, PathBuf};

use swapforge_core::constants::THUMBNAIL_SIZE;
use swapforge_core::error::ForgeError;
use swapforge_core::types::{FileHandle, TaskId};
use swapforge_store::ObjectStore;

/// Reads `file_id` out of the object store and writes it to a file under
/// `work_dir`, named so concurrent tasks never collide.
pub fn materialize(
    object_store: &dyn ObjectStore,
    work_dir: &Path,
    task_id: &TaskId,
    label: &str,
    file_id: &FileHandle,
) -> Result<PathBuf, ForgeError> {
    let bytes = object_store
        .get_object(file_id)?
        .ok_or_else(|| ForgeError::InvalidSourceImage(file_id.clone()))?;
    let path = work_dir.join(format!("{task_id}_{label}"));
    std::fs::write(&path, &bytes).map_err(|e| ForgeError::ImageLoadFailed(e.to_string()))?;
    Ok(path)
}

/// Downloads `url` to a temp path via the engine client, then stores the
/// bytes under `file_id` in the object store.
pub async fn download_and_store(
    engine: &swapforge_engine::EngineClient,
    object_store: &dyn ObjectStore,
    work_dir: &Path,
    url: &str,
    file_id: &FileHandle,
) -> Result<Vec<u8>, ForgeError> {
    let tmp_path = work_dir.join(format!("dl_{file_id}"));
    engine.download_image(url, &tmp_path).await?;
    let bytes = std::fs::read(&tmp_path).map_err(|e| ForgeError::ResultSaveFailed(e.to_string()))?;
    object_store.put_object(file_id, &bytes)?;
    Ok(bytes)
}

/// Decodes `bytes` as an image, produces a `THUMBNAIL_SIZE` x
/// `THUMBNAIL_SIZE` thumbnail (aspect-preserving, per `image::thumbnail`),
/// and stores it under `thumbnail_id`. Returns the source image's
/// dimensions for the result metadata.
pub fn make_and_store_thumbnail(
    object_store: &dyn ObjectStore,
    bytes: &[u8],
    thumbnail_id: &FileHandle,
) -> Result<(u32, u32), ForgeError> {
    let img = image::load_from_memory(bytes).map_err(|e| ForgeError::ImageLoadFailed(e.to_string()))?;
    let (width, height) = (img.width(), img.height());

    let thumbnail = img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
    let mut buf = std::io::Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut buf, image::ImageOutputFormat::Jpeg(85))
        .map_err(|e| ForgeError::ResultSaveFailed(e.to_string()))?;
    object_store.put_object(thumbnail_id, buf.get_ref())?;

    Ok((width, height))
}
