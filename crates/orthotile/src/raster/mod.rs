//! Raster operations, all delegated to the GDAL command-line tools.

pub mod align;
pub mod blend;
pub mod tiling;

pub use align::{AlignmentError, Extent, GeoTransform, GridAligner, RasterInfo};
pub use blend::{blend_expression, BlendCommand};
pub use tiling::TilingCommand;
