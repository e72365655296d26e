use std::path::Path;

use crate::tools::ToolInvocation;

/// XYZ tile generation through `gdal2tiles.py`.
#[derive(Debug, Clone)]
pub struct TilingCommand {
    pub executable: String,
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub processes: usize,
}

impl TilingCommand {
    pub fn zoom_range(&self) -> String {
        format!("{}-{}", self.zoom_min, self.zoom_max)
    }

    /// Web-mercator XYZ layout, no HTML viewer.
    pub fn invocation(&self, source: &Path, tiles_dir: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.executable)
            .args(["-p", "mercator", "-z"])
            .arg(self.zoom_range())
            .args(["--xyz", "-w", "none"])
            .arg(format!("--processes={}", self.processes))
            .arg(source)
            .arg(tiles_dir)
    }
}
