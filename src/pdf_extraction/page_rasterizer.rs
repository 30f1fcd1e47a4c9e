// Page rasterization using pdftoppm (poppler)
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

use crate::config::RasterizerConfig;
use crate::types::{PageImage, RenderError};

const OUTPUT_PREFIX: &str = "page";

/// Converts complete PDF bytes into one RGB image per page, in page order.
pub trait PageRasterizer {
    fn render_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, RenderError>;
}

#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    dpi: u32,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::from_config(&RasterizerConfig::default())
    }
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }

    pub fn from_config(config: &RasterizerConfig) -> Self {
        Self::new(&config.pdftoppm_path, config.dpi)
    }

    /// Whether the pdftoppm binary can be spawned at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary).arg("-v").output().is_ok()
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn render_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, RenderError> {
        // pdftoppm needs the whole document on disk
        let temp_dir = TempDir::new()?;
        let input_path = temp_dir.path().join("input.pdf");
        fs::write(&input_path, pdf_bytes)?;
        let output_prefix = temp_dir.path().join(OUTPUT_PREFIX);

        debug!(binary = %self.binary.display(), dpi = self.dpi, "rendering pages with pdftoppm");
        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&input_path)
            .arg(&output_prefix)
            .output()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => RenderError::BackendUnavailable {
                    binary: self.binary.clone(),
                    source,
                },
                _ => RenderError::Io(source),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Renderer(stderr.trim().to_string()));
        }

        let files = rendered_page_files(temp_dir.path())?;
        if files.is_empty() {
            return Err(RenderError::NoPages);
        }

        let mut pages = Vec::with_capacity(files.len());
        for (index, path) in files.into_iter().enumerate() {
            let number = index + 1;
            let image = image::open(&path)
                .map_err(|source| RenderError::Decode { page: number, source })?
                .to_rgb8();
            pages.push(PageImage::new(number, image));
        }

        debug!(pages = pages.len(), "pages rendered");
        Ok(pages)
    }
}

/// List `page-N.png` outputs sorted by N. pdftoppm zero-pads N depending on page count.
fn rendered_page_files(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let mut numbered = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(number) = page_number_from_file_name(&path) {
            numbered.push((number, path));
        }
    }
    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

fn page_number_from_file_name(path: &Path) -> Option<usize> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let suffix = stem.strip_prefix(OUTPUT_PREFIX)?.strip_prefix('-')?;
    suffix.parse().ok()
}
