//! Scripted raster toolchain.
//!
//! Answers each GDAL tool the way the real one would for a well-formed
//! input, writing the files the pipeline expects to find afterwards.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use orthotile::tools::{ToolError, ToolInvocation, ToolOutput, ToolRunner};

pub const REFERENCE_INFO_JSON: &str = r#"{
    "size": [4000, 3000],
    "coordinateSystem": {"wkt": "PROJCS[\"GDA94 / MGA zone 51\"]"},
    "geoTransform": [400000.0, 0.5, 0.0, 6800000.0, 0.0, -0.5]
}"#;

/// Same grid without a `geoTransform` entry.
pub const UNREFERENCED_INFO_JSON: &str = r#"{
    "size": [4000, 3000],
    "coordinateSystem": {"wkt": ""}
}"#;

/// What the hillshade tools do when they run.
#[derive(Debug, Clone, Default)]
pub enum HillshadeScript {
    #[default]
    Succeed,
    /// The reference raster reports no geotransform.
    NoGeoTransform,
    /// The warp exits zero but writes nothing.
    NoWarpOutput,
    /// The warped raster comes out with these dimensions.
    AlignedSize(u64, u64),
    /// The raster calculator exits non-zero with this stderr.
    BlendFail(&'static str),
}

/// What the tiling tool does when it runs.
#[derive(Debug, Clone)]
pub enum TilingScript {
    /// Writes these tile paths, relative to the output directory.
    Tiles(Vec<&'static str>),
    /// Exits non-zero with this stderr.
    Fail(&'static str),
    /// Runs past its timeout.
    Timeout,
}

pub struct ScriptedRunner {
    tiling: TilingScript,
    hillshade: HillshadeScript,
    /// Held inside every tool call, so pollers can observe each stage.
    delay: Duration,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new(TilingScript::Tiles(vec![
            "14/14650/9750.png",
            "14/14651/9750.png",
            "15/29300/19500.png",
        ]))
    }
}

impl ScriptedRunner {
    pub fn new(tiling: TilingScript) -> Self {
        Self {
            tiling,
            hillshade: HillshadeScript::Succeed,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hillshade(mut self, hillshade: HillshadeScript) -> Self {
        self.hillshade = hillshade;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_to(&self, tool: &str) -> Option<ToolInvocation> {
        self.calls().into_iter().find(|c| c.display_name() == tool)
    }

    fn last_arg(invocation: &ToolInvocation) -> PathBuf {
        PathBuf::from(invocation.args.last().expect("invocation has arguments"))
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"II*\0").unwrap();
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let tool = invocation.display_name();
        match tool.as_str() {
            "gdalinfo" => {
                let target = Self::last_arg(invocation);
                let aligned = target.ends_with("hillshade_aligned.tif");
                let json = match (&self.hillshade, aligned) {
                    (HillshadeScript::NoGeoTransform, _) => UNREFERENCED_INFO_JSON.to_string(),
                    (HillshadeScript::AlignedSize(w, h), true) => format!(
                        r#"{{"size": [{}, {}], "geoTransform": [400000.0, 0.5, 0.0, 6800000.0, 0.0, -0.5]}}"#,
                        w, h
                    ),
                    _ => REFERENCE_INFO_JSON.to_string(),
                };
                Ok(ToolOutput {
                    stdout: json.into_bytes(),
                    stderr: Vec::new(),
                })
            }
            "gdalwarp" => {
                if !matches!(self.hillshade, HillshadeScript::NoWarpOutput) {
                    Self::touch(&Self::last_arg(invocation));
                }
                Ok(ToolOutput::default())
            }
            "gdal_calc.py" => {
                if let HillshadeScript::BlendFail(stderr) = &self.hillshade {
                    return Err(ToolError::Failed {
                        tool,
                        code: 1,
                        stderr: stderr.to_string(),
                    });
                }
                let outfile = invocation
                    .flag_value("--outfile")
                    .expect("calc invocation names an output");
                Self::touch(Path::new(&outfile));
                Ok(ToolOutput::default())
            }
            "gdal2tiles.py" => match &self.tiling {
                TilingScript::Tiles(tiles) => {
                    let out = Self::last_arg(invocation);
                    std::fs::create_dir_all(&out).unwrap();
                    for tile in tiles {
                        Self::touch(&out.join(tile));
                    }
                    Ok(ToolOutput::default())
                }
                TilingScript::Fail(stderr) => Err(ToolError::Failed {
                    tool,
                    code: 1,
                    stderr: stderr.to_string(),
                }),
                TilingScript::Timeout => Err(ToolError::Timeout {
                    tool,
                    seconds: timeout.as_secs(),
                }),
            },
            other => panic!("unexpected tool invocation: {}", other),
        }
    }
}
