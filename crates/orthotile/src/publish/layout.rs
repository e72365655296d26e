use crate::config::Config;

/// Key and URL naming at the destination.
///
/// Tiles live at `<prefix>/<site>/<z>/<x>/<y>.png`, overlays at
/// `<prefix>/<site>/<category>.kml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    pub prefix: String,
    pub cdn_domain: String,
    pub origin_includes_prefix: bool,
}

pub const OVERLAY_EXTENSION: &str = "kml";

impl RemoteLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.storage.prefix.trim_matches('/').to_string(),
            cdn_domain: config
                .cdn
                .domain
                .trim_start_matches("https://")
                .trim_end_matches('/')
                .to_string(),
            origin_includes_prefix: config.cdn.origin_includes_prefix,
        }
    }

    fn join(&self, rest: &str) -> String {
        if self.prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.prefix, rest)
        }
    }

    /// Store prefix holding one site's tiles.
    pub fn site_prefix(&self, site: &str) -> String {
        self.join(site)
    }

    pub fn overlay_key(&self, site: &str, category: &str) -> String {
        self.join(&format!("{}/{}.{}", site, category, OVERLAY_EXTENSION))
    }

    /// Path below the CDN root for a site-relative key.
    fn public_path(&self, site_relative: &str) -> String {
        if self.origin_includes_prefix {
            site_relative.to_string()
        } else {
            self.join(site_relative)
        }
    }

    /// XYZ URL template handed to map clients.
    pub fn tile_url_template(&self, site: &str) -> String {
        format!(
            "https://{}/{}",
            self.cdn_domain,
            self.public_path(&format!("{}/{{z}}/{{x}}/{{y}}.png", site))
        )
    }

    pub fn overlay_url(&self, site: &str, category: &str) -> String {
        format!(
            "https://{}/{}",
            self.cdn_domain,
            self.public_path(&format!("{}/{}.{}", site, category, OVERLAY_EXTENSION))
        )
    }
}
