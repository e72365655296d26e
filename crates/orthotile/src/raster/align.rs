//! Resamples a secondary raster onto a reference raster's pixel grid.
//!
//! Blending multiplies rasters pixel by pixel, so the hillshade has to
//! cover exactly the same extent with exactly the same width and height as
//! the orthoimage. The aligner reads the reference grid with the metadata
//! tool, warps the secondary into it, and then checks the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::Instrument;

use crate::sanitize::redact_path;
use crate::tools::{ToolInvocation, ToolRunner};

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("Could not read reference raster: {reason}")]
    ReferenceUnreadable { reason: String },

    #[error("Reference raster has no usable geotransform")]
    MissingGeoTransform,

    #[error("Hillshade resample produced no output: {reason}")]
    NoOutput { reason: String },

    #[error(
        "Aligned hillshade is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        expected_width: u64,
        expected_height: u64,
        actual_width: u64,
        actual_height: u64,
    },
}

/// Affine transform in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub column_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_coefficients(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            column_rotation: c[4],
            pixel_height: c[5],
        }
    }

    /// North-up with a non-zero pixel size. Rotated grids can't be
    /// expressed as a `-te`/`-ts` target and are rejected.
    pub fn is_usable(&self) -> bool {
        let coefficients = [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.column_rotation,
            self.pixel_height,
        ];
        coefficients.iter().all(|c| c.is_finite())
            && self.pixel_width != 0.0
            && self.pixel_height != 0.0
            && self.row_rotation == 0.0
            && self.column_rotation == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// The parts of a raster's metadata the aligner needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: u64,
    pub height: u64,
    pub geo_transform: Option<GeoTransform>,
    pub projection_wkt: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoDocument {
    size: [u64; 2],
    #[serde(default)]
    geo_transform: Option<[f64; 6]>,
    #[serde(default)]
    coordinate_system: Option<CoordinateSystem>,
}

#[derive(Deserialize)]
struct CoordinateSystem {
    #[serde(default)]
    wkt: String,
}

impl RasterInfo {
    /// Parses the output of `gdalinfo -json`.
    pub fn from_info_json(json: &str) -> Result<Self, serde_json::Error> {
        let doc: InfoDocument = serde_json::from_str(json)?;
        Ok(Self {
            width: doc.size[0],
            height: doc.size[1],
            geo_transform: doc.geo_transform.map(GeoTransform::from_coefficients),
            projection_wkt: doc
                .coordinate_system
                .map(|cs| cs.wkt)
                .filter(|wkt| !wkt.trim().is_empty()),
        })
    }

    /// Bounding box of the raster, or `None` without a geotransform.
    ///
    /// Pixel height is negative for north-up images, so the corners are
    /// ordered explicitly.
    pub fn extent(&self) -> Option<Extent> {
        let gt = self.geo_transform?;
        let far_x = gt.origin_x + self.width as f64 * gt.pixel_width;
        let far_y = gt.origin_y + self.height as f64 * gt.pixel_height;
        Some(Extent {
            min_x: gt.origin_x.min(far_x),
            max_x: gt.origin_x.max(far_x),
            min_y: gt.origin_y.min(far_y),
            max_y: gt.origin_y.max(far_y),
        })
    }
}

pub struct GridAligner {
    runner: Arc<dyn ToolRunner>,
    info_executable: String,
    warp_executable: String,
    timeout: Duration,
}

impl GridAligner {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        info_executable: impl Into<String>,
        warp_executable: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            info_executable: info_executable.into(),
            warp_executable: warp_executable.into(),
            timeout,
        }
    }

    /// Reads raster metadata through the metadata tool.
    pub async fn inspect(&self, raster: &Path) -> Result<RasterInfo, String> {
        let invocation = ToolInvocation::new(&self.info_executable)
            .arg("-json")
            .arg(raster);
        let output = self
            .runner
            .run(&invocation, self.timeout)
            .await
            .map_err(|e| e.to_string())?;
        RasterInfo::from_info_json(&output.stdout_text())
            .map_err(|e| format!("unreadable metadata for {}: {}", redact_path(raster), e))
    }

    /// Builds the warp command that lands `secondary` on `reference`'s grid.
    pub fn warp_invocation(
        &self,
        reference: &RasterInfo,
        extent: Extent,
        secondary: &Path,
        output: &Path,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.warp_executable)
            .args(["-overwrite", "-r", "bilinear", "-te"])
            .args([
                extent.min_x.to_string(),
                extent.min_y.to_string(),
                extent.max_x.to_string(),
                extent.max_y.to_string(),
            ])
            .arg("-ts")
            .args([reference.width.to_string(), reference.height.to_string()]);

        if let Some(wkt) = &reference.projection_wkt {
            invocation = invocation.arg("-t_srs").arg(wkt);
        }

        invocation.arg(secondary).arg(output)
    }

    /// Writes `secondary` resampled onto `reference`'s grid to `output`.
    pub async fn align(
        &self,
        reference: &Path,
        secondary: &Path,
        output: &Path,
    ) -> Result<PathBuf, AlignmentError> {
        let span = tracing::info_span!(
            "align",
            reference = %redact_path(reference),
            secondary = %redact_path(secondary),
        );

        async {
            let reference_info = self
                .inspect(reference)
                .await
                .map_err(|reason| AlignmentError::ReferenceUnreadable { reason })?;

            let extent = match reference_info.geo_transform {
                Some(gt) if gt.is_usable() => reference_info.extent(),
                _ => None,
            }
            .ok_or(AlignmentError::MissingGeoTransform)?;

            tracing::debug!(
                width = reference_info.width,
                height = reference_info.height,
                "Resampling hillshade onto reference grid"
            );

            let warp = self.warp_invocation(&reference_info, extent, secondary, output);
            self.runner
                .run(&warp, self.timeout)
                .await
                .map_err(|e| AlignmentError::NoOutput {
                    reason: e.to_string(),
                })?;

            if !tokio::fs::try_exists(output).await.unwrap_or(false) {
                return Err(AlignmentError::NoOutput {
                    reason: format!("{} was not written", redact_path(output)),
                });
            }

            let aligned = self
                .inspect(output)
                .await
                .map_err(|reason| AlignmentError::NoOutput { reason })?;

            if (aligned.width, aligned.height) != (reference_info.width, reference_info.height) {
                return Err(AlignmentError::DimensionMismatch {
                    expected_width: reference_info.width,
                    expected_height: reference_info.height,
                    actual_width: aligned.width,
                    actual_height: aligned.height,
                });
            }

            Ok(output.to_path_buf())
        }
        .instrument(span)
        .await
    }
}
