use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::raster::{BlendCommand, TilingCommand};

/// Settings the pipeline needs, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub work_directory: PathBuf,
    pub info_executable: String,
    pub warp_executable: String,
    pub calc_executable: String,
    pub tiling_executable: String,
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub processes: usize,
    pub align_timeout: Duration,
    pub calc_timeout: Duration,
    pub tiling_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        Self {
            work_directory: PathBuf::from(&config.work_directory),
            info_executable: tools.info_executable.clone(),
            warp_executable: tools.warp_executable.clone(),
            calc_executable: tools.calc_executable.clone(),
            tiling_executable: tools.tiling_executable.clone(),
            zoom_min: tools.zoom_min,
            zoom_max: tools.zoom_max,
            processes: tools.processes.max(1),
            align_timeout: Duration::from_secs(tools.align_timeout_secs),
            calc_timeout: Duration::from_secs(tools.calc_timeout_secs),
            tiling_timeout: Duration::from_secs(tools.tiling_timeout_secs),
        }
    }

    pub fn blend_command(&self) -> BlendCommand {
        BlendCommand::new(&self.calc_executable)
    }

    pub fn tiling_command(&self) -> TilingCommand {
        TilingCommand {
            executable: self.tiling_executable.clone(),
            zoom_min: self.zoom_min,
            zoom_max: self.zoom_max,
            processes: self.processes,
        }
    }
}
