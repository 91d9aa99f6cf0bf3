use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{CatalogError, ImageId, ProductId, Result};
use crate::files::StoredFile;
use crate::transaction::Session;

/// Content types accepted for product images, with the extension used in
/// generated paths.
pub const SUPPORTED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Image metadata. Ownership is implied by the owning product's image list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    /// Location of the bytes in the file store
    pub path: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// An image file as received from the caller.
#[derive(Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Infer the content type from the file name's extension.
    pub fn from_file_name(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).ok_or_else(|| {
            CatalogError::validation(format!("'{}' is not a supported image file", file_name))
        })?;
        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn validate(&self) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(CatalogError::validation(format!(
                "image '{}' is empty",
                self.file_name
            )));
        }
        if self.extension().is_none() {
            return Err(CatalogError::validation(format!(
                "image '{}' has unsupported content type '{}'",
                self.file_name, self.content_type
            )));
        }
        Ok(())
    }

    pub fn extension(&self) -> Option<&'static str> {
        let content_type = self.content_type.trim().to_lowercase();
        SUPPORTED_IMAGE_TYPES
            .iter()
            .find(|(mime, _)| *mime == content_type)
            .map(|(_, ext)| *ext)
    }

    pub(crate) fn into_stored_file(self, path: String) -> StoredFile {
        StoredFile::new(path, self.content_type, self.bytes)
    }
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_lowercase();
    let extension = if extension == "jpeg" { "jpg".to_string() } else { extension };
    SUPPORTED_IMAGE_TYPES
        .iter()
        .find(|(_, ext)| *ext == extension)
        .map(|(mime, _)| *mime)
}

/// Image record CRUD inside a caller-owned session. Never touches the file
/// store and never commits.
#[derive(Debug, Clone)]
pub struct ImageRecordManager {
    path_prefix: String,
}

impl ImageRecordManager {
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn image_path(&self, owner: ProductId, image_id: ImageId, extension: &str) -> String {
        format!("{}/{}/{}.{}", self.path_prefix, owner, image_id, extension)
    }

    /// Stage a new image record for `owner`. The upload must already be validated.
    pub fn create_image(
        &self,
        upload: &ImageUpload,
        owner: ProductId,
        session: &mut Session,
    ) -> Result<ProductImage> {
        let extension = upload.extension().ok_or_else(|| {
            CatalogError::validation(format!(
                "image '{}' has unsupported content type '{}'",
                upload.file_name, upload.content_type
            ))
        })?;

        let id = ImageId::new();
        let image = ProductImage {
            id,
            path: self.image_path(owner, id, extension),
            content_type: upload.content_type.trim().to_lowercase(),
            size_bytes: upload.bytes.len() as u64,
            created_at: Utc::now(),
        };

        session.save(image.clone())?;
        debug!(txn = %session.id(), image = %id, path = %image.path, "image record staged");
        Ok(image)
    }

    /// Stage removal of an image record and hand back its file path.
    pub async fn delete_image(&self, image_id: ImageId, session: &mut Session) -> Result<String> {
        let image = session
            .find::<ProductImage>(image_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("image {} not found", image_id)))?;

        session.delete_one(&image)?;
        debug!(txn = %session.id(), image = %image_id, "image record removal staged");
        Ok(image.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentStore;
    use std::sync::Arc;

    #[test]
    fn upload_validation() {
        assert!(ImageUpload::new("a.png", "image/png", vec![1]).validate().is_ok());
        assert!(ImageUpload::new("a.png", "IMAGE/PNG", vec![1]).validate().is_ok());
        assert!(ImageUpload::new("a.png", "image/png", Vec::new()).validate().is_err());
        assert!(ImageUpload::new("a.pdf", "application/pdf", vec![1]).validate().is_err());
    }

    #[test]
    fn content_type_from_file_name() {
        let upload = ImageUpload::from_file_name("photo.JPEG", vec![1]).unwrap();
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.extension(), Some("jpg"));
        assert!(ImageUpload::from_file_name("notes.txt", vec![1]).is_err());
        assert!(ImageUpload::from_file_name("no_extension", vec![1]).is_err());
    }

    #[test]
    fn path_layout() {
        let manager = ImageRecordManager::new("/media/images/");
        let owner = ProductId::new();
        let image = ImageId::new();
        assert_eq!(
            manager.image_path(owner, image, "png"),
            format!("media/images/{}/{}.png", owner, image)
        );
    }

    #[tokio::test]
    async fn create_and_delete_inside_one_session() {
        let store = Arc::new(DocumentStore::new());
        let manager = ImageRecordManager::new("images");
        let owner = ProductId::new();
        let upload = ImageUpload::new("a.webp", "image/webp", vec![1, 2]);

        let mut session = store.begin().unwrap();
        let image = manager.create_image(&upload, owner, &mut session).unwrap();
        assert!(image.path.ends_with(".webp"));
        assert_eq!(image.size_bytes, 2);

        // Visible to the session before commit, invisible to the store.
        assert!(session.find::<ProductImage>(image.id).await.unwrap().is_some());
        assert!(store.find_by_id::<ProductImage>(image.id).await.unwrap().is_none());

        let path = manager.delete_image(image.id, &mut session).await.unwrap();
        assert_eq!(path, image.path);
        session.commit().await.unwrap();
        session.end();

        assert!(store.find_by_id::<ProductImage>(image.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_unknown_image_is_not_found() {
        let store = Arc::new(DocumentStore::new());
        let manager = ImageRecordManager::new("images");
        let mut session = store.begin().unwrap();

        let result = manager.delete_image(ImageId::new(), &mut session).await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }
}
