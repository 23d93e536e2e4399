use async_trait::async_trait;

use crate::error::DbError;

/// Public object buckets (profile photos, listing images, portfolio).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if missing and make sure it is public.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), DbError>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DbError>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), DbError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Recover the object path from a public URL of `bucket`, e.g.
/// `https://x.supabase.co/storage/v1/object/public/profile-photos/u1/17.jpg?t=1`
/// gives `u1/17.jpg`. URLs that point elsewhere give `None`.
pub fn extract_object_path(url: &str, bucket: &str) -> Option<String> {
    let marker = format!("/object/public/{bucket}/");
    let start = url.find(&marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    (!path.is_empty()).then(|| path.to_string())
}

/// Object paths are built by the server from ids and timestamps; anything
/// that could escape the bucket is refused.
pub fn is_safe_object_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_path_and_drops_query_string() {
        let url = "https://abc.supabase.co/storage/v1/object/public/profile-photos/u1/1700000000.jpg?t=3#x";
        assert_eq!(
            extract_object_path(url, "profile-photos").as_deref(),
            Some("u1/1700000000.jpg")
        );
    }

    #[test]
    fn other_bucket_or_foreign_url_gives_none() {
        let url = "https://abc.supabase.co/storage/v1/object/public/img-anuncios/u1/a.png";
        assert_eq!(extract_object_path(url, "profile-photos"), None);
        assert_eq!(extract_object_path("https://cdn.example.com/me.png", "profile-photos"), None);
        assert_eq!(
            extract_object_path("http://h/storage/v1/object/public/profile-photos/", "profile-photos"),
            None
        );
    }

    #[test]
    fn unsafe_paths_are_refused() {
        assert!(is_safe_object_path("u1/anuncio_3/17_ab12cd34.png"));
        assert!(!is_safe_object_path("../etc/passwd"));
        assert!(!is_safe_object_path("/abs"));
        assert!(!is_safe_object_path("u1//x"));
        assert!(!is_safe_object_path("u1\\x"));
    }
}
