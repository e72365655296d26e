//! Hillshade blend through the raster-algebra tool.
//!
//! Each band of the orthoimage is darkened by the hillshade:
//! `A*(1-o) + A*(B/255)*o`. At `o = 0` the image passes through unchanged,
//! at `o = 1` it is fully multiplied by the normalized hillshade.

use std::path::Path;

use crate::tools::ToolInvocation;

/// Formats a blend coefficient with at most four decimals and no
/// trailing zeros.
fn coefficient(value: f64) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Per-pixel expression for the given opacity, e.g.
/// `A*0.4+A*(B/255)*0.6` for `0.6`.
pub fn blend_expression(opacity: f64) -> String {
    format!(
        "A*{}+A*(B/255)*{}",
        coefficient(1.0 - opacity),
        coefficient(opacity)
    )
}

#[derive(Debug, Clone)]
pub struct BlendCommand {
    pub executable: String,
}

impl BlendCommand {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Builds the invocation. NoData is pinned to 0 so collars stay
    /// transparent after tiling.
    pub fn invocation(
        &self,
        primary: &Path,
        aligned_hillshade: &Path,
        opacity: f64,
        output: &Path,
    ) -> ToolInvocation {
        let mut outfile = std::ffi::OsString::from("--outfile=");
        outfile.push(output);

        ToolInvocation::new(&self.executable)
            .arg("-A")
            .arg(primary)
            .arg("-B")
            .arg(aligned_hillshade)
            .arg("--B_band=1")
            .arg("--allBands=A")
            .arg(format!("--calc={}", blend_expression(opacity)))
            .arg("--type=Byte")
            .arg("--NoDataValue=0")
            .arg("--overwrite")
            .arg(outfile)
    }
}
