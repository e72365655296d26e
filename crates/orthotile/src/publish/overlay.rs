//! Vector overlays published next to a site's tiles.
//!
//! One object per site and category, always overwritten. No diffing and
//! no history; the CDN serves whatever was uploaded last.

use super::replace::Publisher;
use super::store::RemoteStoreError;

pub const OVERLAY_CONTENT_TYPE: &str = "application/vnd.google-earth.kml+xml";

impl Publisher {
    /// Uploads `bytes` as the `category` overlay of `site` and returns its
    /// public URL.
    pub async fn publish_overlay(
        &self,
        site: &str,
        category: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteStoreError> {
        let key = self.layout.overlay_key(site, category);
        let size = bytes.len();
        self.store
            .put_bytes(&key, bytes, OVERLAY_CONTENT_TYPE)
            .await?;
        tracing::info!(site, category, size, "Overlay published");
        Ok(self.layout.overlay_url(site, category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{ObjectStoreRemote, RemoteLayout, RemoteStore};
    use object_store::memory::InMemory;
    use object_store::ObjectStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_publish_overlay_overwrites() {
        let remote = Arc::new(ObjectStoreRemote::new(Arc::new(InMemory::new())));
        let layout = RemoteLayout {
            prefix: "tiles".to_string(),
            cdn_domain: "cdn.example.com".to_string(),
            origin_includes_prefix: false,
        };
        let publisher = Publisher::new(remote.clone(), layout, 4);

        let url = publisher
            .publish_overlay("koth", "boundaries", b"<kml>v1</kml>".to_vec())
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/tiles/koth/boundaries.kml");

        publisher
            .publish_overlay("koth", "boundaries", b"<kml>v2</kml>".to_vec())
            .await
            .unwrap();

        assert_eq!(
            remote.list_keys("tiles/koth").await.unwrap(),
            vec!["tiles/koth/boundaries.kml"]
        );
        let stored = remote
            .inner()
            .get(&object_store::path::Path::from("tiles/koth/boundaries.kml"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"<kml>v2</kml>");
    }
}
