use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

pub const CONFIG_VERSION: &str = "1.0";

/// Highest zoom level the tiling tool is allowed to render.
pub const MAX_ZOOM: u8 = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_work_directory")]
    pub work_directory: String,
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,
    #[serde(default = "default_overlay_categories")]
    pub overlay_categories: Vec<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cdn: CdnConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            work_directory: default_work_directory(),
            sites: default_sites(),
            overlay_categories: default_overlay_categories(),
            storage: StorageConfig::default(),
            cdn: CdnConfig::default(),
            tools: ToolsConfig::default(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_work_directory() -> String {
    "/tmp/tile-processing".to_string()
}

fn default_sites() -> Vec<String> {
    [
        "binduli-north",
        "gudai-darri",
        "gruyere",
        "saraji",
        "peak-downs",
        "goonyella",
        "koth",
        "caval-ridge",
        "blackwater",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_overlay_categories() -> Vec<String> {
    ["boundaries", "infrastructure", "nfz-daily", "nfz-permanent"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_upload_concurrency() -> usize {
    16
}

/// Destination object store.
///
/// `localPath` takes precedence over `bucket` and publishes into a
/// directory instead of S3, which is what local runs and demos use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: SecretSource,
    #[serde(default)]
    pub secret_access_key: SecretSource,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: default_prefix(),
            region: default_region(),
            local_path: None,
            endpoint: None,
            access_key_id: SecretSource::default(),
            secret_access_key: SecretSource::default(),
        }
    }
}

fn default_prefix() -> String {
    "tiles".to_string()
}

fn default_region() -> String {
    "ap-southeast-2".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnConfig {
    #[serde(default)]
    pub domain: String,
    /// When true the CDN origin path already maps to `<prefix>`, so public
    /// URLs start at the site segment.
    #[serde(default = "default_true")]
    pub origin_includes_prefix: bool,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            origin_includes_prefix: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default = "default_tiling_executable")]
    pub tiling_executable: String,
    #[serde(default = "default_calc_executable")]
    pub calc_executable: String,
    #[serde(default = "default_info_executable")]
    pub info_executable: String,
    #[serde(default = "default_warp_executable")]
    pub warp_executable: String,
    #[serde(default = "default_zoom_min")]
    pub zoom_min: u8,
    #[serde(default = "default_zoom_max")]
    pub zoom_max: u8,
    #[serde(default = "default_processes")]
    pub processes: usize,
    #[serde(default = "default_tiling_timeout")]
    pub tiling_timeout_secs: u64,
    #[serde(default = "default_calc_timeout")]
    pub calc_timeout_secs: u64,
    #[serde(default = "default_align_timeout")]
    pub align_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tiling_executable: default_tiling_executable(),
            calc_executable: default_calc_executable(),
            info_executable: default_info_executable(),
            warp_executable: default_warp_executable(),
            zoom_min: default_zoom_min(),
            zoom_max: default_zoom_max(),
            processes: default_processes(),
            tiling_timeout_secs: default_tiling_timeout(),
            calc_timeout_secs: default_calc_timeout(),
            align_timeout_secs: default_align_timeout(),
        }
    }
}

fn default_tiling_executable() -> String {
    "gdal2tiles.py".to_string()
}

fn default_calc_executable() -> String {
    "gdal_calc.py".to_string()
}

fn default_info_executable() -> String {
    "gdalinfo".to_string()
}

fn default_warp_executable() -> String {
    "gdalwarp".to_string()
}

fn default_zoom_min() -> u8 {
    14
}

fn default_zoom_max() -> u8 {
    21
}

// gdal2tiles forks one python process per worker; past 8 the disk is the limit.
fn default_processes() -> usize {
    num_cpus::get().clamp(1, 8)
}

fn default_tiling_timeout() -> u64 {
    3600
}

fn default_calc_timeout() -> u64 {
    1800
}

fn default_align_timeout() -> u64 {
    900
}
