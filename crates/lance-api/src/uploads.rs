use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use base64::{Engine, engine::general_purpose::STANDARD};
use lance_db::storage::{extract_object_path, is_safe_object_path};
use lance_db::{DbError, ObjectStore};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Body limit on upload routes: the image plus multipart framing, so an
/// oversized image is seen and refused with a proper message.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// The `file` part of a multipart upload, plus the text fields next to it.
#[derive(Debug)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    pub fields: Vec<(String, String)>,
}

impl ImageUpload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn too_large() -> ApiError {
    ApiError::bad_request("Arquivo muito grande (máx 5MB)")
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        debug!("Bad multipart body: {}", e);
        ApiError::bad_request(format!("Formulário inválido: {}", e.body_text()))
    }
}

/// Read a multipart form and validate its `file` part as an image of at most
/// [`MAX_IMAGE_BYTES`].
pub async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, ApiError> {
    let mut file = None;
    let mut fields = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            file = Some((filename, content_type, bytes));
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            fields.push((name, text));
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| ApiError::bad_request("Arquivo 'file' é obrigatório"))?;
    if filename.is_empty() {
        return Err(ApiError::bad_request("Arquivo inválido"));
    }
    if !content_type.starts_with("image/") {
        return Err(ApiError::bad_request("Apenas imagens são permitidas"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(too_large());
    }

    Ok(ImageUpload {
        bytes: bytes.to_vec(),
        filename,
        content_type,
        fields,
    })
}

/// Extension of the original file name (with the dot), if it has a usable one.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 8
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => "",
    }
}

/// First 8 hex digits of the SHA-256 of the content.
pub fn short_hash(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    digest[..8].to_string()
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `{user}/{ts}{ext}` in the profile photo bucket.
pub fn profile_photo_path(user_id: &str, filename: &str, ts: i64) -> String {
    let ext = file_extension(filename).unwrap_or_else(|| ".jpg".into());
    format!("{user_id}/{ts}{ext}")
}

/// `{user}/anuncio_{id}/{ts}_{hash8}{ext}`, or `{user}/temp/...` before the
/// listing exists.
pub fn anuncio_image_path(
    user_id: &str,
    anuncio_id: Option<i64>,
    upload: &ImageUpload,
    ts: i64,
) -> String {
    let ext = file_extension(&upload.filename).unwrap_or_else(|| {
        if upload.content_type.contains("jpeg") {
            ".jpg".into()
        } else {
            ".png".into()
        }
    });
    let hash = short_hash(&upload.bytes);
    match anuncio_id {
        Some(id) => format!("{user_id}/anuncio_{id}/{ts}_{hash}{ext}"),
        None => format!("{user_id}/temp/{ts}_{hash}{ext}"),
    }
}

/// Upload with one bucket-ensure-and-retry when the first attempt fails,
/// returning the public URL.
pub async fn store_object(
    storage: &dyn ObjectStore,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, DbError> {
    if let Err(e) = storage.ensure_bucket(bucket).await {
        warn!("Could not ensure bucket {}: {}", bucket, e);
    }

    if let Err(e) = storage.upload(bucket, path, bytes.clone(), content_type).await {
        debug!("Upload to {}/{} failed, retrying: {}", bucket, path, e);
        storage.ensure_bucket(bucket).await?;
        storage.upload(bucket, path, bytes, content_type).await?;
    }

    Ok(storage.public_url(bucket, path))
}

/// Object path of `url` in `bucket` when it sits under the user's own
/// `{user_id}/` prefix. Anything else is not theirs to delete.
pub fn owned_object_path(url: &str, bucket: &str, user_id: &str) -> Option<String> {
    let path = extract_object_path(url, bucket)?;
    let owned = path
        .strip_prefix(user_id)
        .is_some_and(|rest| rest.starts_with('/'));
    (owned && is_safe_object_path(&path)).then_some(path)
}

/// Publish a `data:<mime>;base64,<payload>` URL and return its public URL.
pub async fn upload_data_url(
    storage: &dyn ObjectStore,
    bucket: &str,
    user_id: &str,
    data_url: &str,
) -> Result<String, DbError> {
    let (header, payload) = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| DbError::Rejected("malformed data URL".into()))?;
    let mime = header.split(';').next().filter(|m| !m.is_empty()).unwrap_or("application/octet-stream");

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| DbError::Rejected(format!("invalid base64 payload: {e}")))?;

    let path = format!(
        "{}/{}_{}{}",
        user_id,
        unix_now(),
        short_hash(&bytes),
        extension_for_mime(mime)
    );
    store_object(storage, bucket, &path, bytes, mime).await
}
