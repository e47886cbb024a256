use clap::Parser;
use std::path::PathBuf;

/// Font files tried, in order, when no `--chart-font` is given.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Directory holding config.json and model.safetensors
    #[arg(long, env = "MODEL_PATH", default_value = "model")]
    pub model_path: PathBuf,

    /// JSON file listing the required feature columns
    #[arg(long, env = "COLUMNS_PATH", default_value = "model/columns.json")]
    pub columns_path: PathBuf,

    /// TrueType font used for chart text
    #[arg(long, env = "CHART_FONT")]
    pub chart_font: Option<PathBuf>,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "16")]
    pub max_upload_mb: usize,
}

impl Config {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Font candidates: the explicit one if set, otherwise the well-known locations.
    pub fn font_candidates(&self) -> Vec<PathBuf> {
        match &self.chart_font {
            Some(path) => vec![path.clone()],
            None => FALLBACK_FONTS.iter().map(PathBuf::from).collect(),
        }
    }
}
