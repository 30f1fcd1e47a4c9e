// Configuration for docchat
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pdf_extraction::extraction_router::NATIVE_TEXT_THRESHOLD;

pub const CONFIG_ENV: &str = "DOCCHAT_CONFIG";
pub const MODELS_DIR_ENV: &str = "DOCCHAT_MODELS_DIR";
pub const PDFTOPPM_ENV: &str = "DOCCHAT_PDFTOPPM";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub rasterizer: RasterizerConfig,
    pub ocr: OcrConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Native text must be strictly longer than this many characters to skip OCR
    pub native_text_threshold: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            native_text_threshold: NATIVE_TEXT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RasterizerConfig {
    pub pdftoppm_path: PathBuf,
    pub dpi: u32,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            dpi: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OcrConfig {
    pub models_dir: PathBuf,
    pub detection_model: String,
    pub recognition_model: String,
    pub classifier_model: Option<String>,
    pub dictionary: String,
    pub intra_threads: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            detection_model: "ppocrv4_mobile_det.onnx".to_string(),
            recognition_model: "ppocrv4_mobile_rec.onnx".to_string(),
            classifier_model: Some("ppocr_mobile_cls.onnx".to_string()),
            dictionary: "ppocr_keys_v1.txt".to_string(),
            intra_threads: 4,
        }
    }
}

impl OcrConfig {
    pub fn detection_path(&self) -> PathBuf {
        self.models_dir.join(&self.detection_model)
    }

    pub fn recognition_path(&self) -> PathBuf {
        self.models_dir.join(&self.recognition_model)
    }

    pub fn classifier_path(&self) -> Option<PathBuf> {
        self.classifier_model
            .as_ref()
            .map(|name| self.models_dir.join(name))
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.models_dir.join(&self.dictionary)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "phi3:mini".to_string(),
            system_prompt: "You are a helpful AI assistant. Respond clearly and concisely \
                            based on the user's input and context provided."
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, `DOCCHAT_CONFIG`, or the user config dir.
    /// Falls back to defaults when no file exists. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit) {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join("docchat").join("config.toml"))
            .filter(|path| path.exists())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(MODELS_DIR_ENV) {
            self.ocr.models_dir = dir.into();
        }
        if let Ok(path) = env::var(PDFTOPPM_ENV) {
            self.rasterizer.pdftoppm_path = path.into();
        }
    }
}
