//! A4 Image Splitter Library
//!
//! Slices a tall image into A4-proportioned pages and packages them as a
//! PDF or as a ZIP of JPEG/PNG files. Shared between CLI and WASM targets.
//!
//! The [`pager::Pager`] does the slicing; [`document::DocumentAssembler`]
//! and [`archive::ArchiveAssembler`] turn its pages into the final file.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod archive;
pub mod document;
pub mod encode;
pub mod pager;

pub use archive::{ArchiveAssembler, ArchiveContainer, ZipContainer};
pub use document::{DocumentAssembler, DocumentContainer, PdfContainer};
pub use encode::ImageCodec;
pub use pager::{Page, PageGeometry, PageSize, Pager, SourceBitmap, A4_ASPECT_RATIO};

use image::imageops::FilterType;
use std::str::FromStr;
use thiserror::Error;

/// Options for splitting
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Page height divided by page width
    pub aspect_ratio: f64,
    /// Pixels per millimetre used to size PDF pages
    pub px_per_mm: f64,
    /// JPEG quality (1-100, only affects JPEG archives)
    pub quality: u8,
    /// Compress PDF streams (reduces file size)
    pub compress_streams: bool,
    /// Filter used when scaling page slices
    pub resample_filter: FilterType,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: A4_ASPECT_RATIO,
            px_per_mm: document::MM_PX_RATIO,
            quality: 100,
            compress_streams: true,
            resample_filter: FilterType::Lanczos3,
        }
    }
}

impl SplitOptions {
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(SplitError::InvalidOption(
                "quality must be between 1 and 100".to_string(),
            ));
        }
        if !self.px_per_mm.is_finite() || self.px_per_mm <= 0.0 {
            return Err(SplitError::InvalidOption(format!(
                "pixels per millimetre must be positive, got {}",
                self.px_per_mm
            )));
        }
        Ok(())
    }
}

/// Error type for splitting operations
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),
    #[error("Failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Output format {0:?} is not supported. Only pdf, jpeg and png are supported")]
    UnsupportedFormat(String),
    #[error("This environment cannot save binary archives")]
    EnvironmentUnsupported,
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("No input image selected")]
    NoInputSelected,
    #[error("Failed to encode page {page}: {reason}")]
    Encode { page: usize, reason: String },
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SplitError>;

/// Requested output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One multi-page PDF
    Pdf,
    /// A ZIP of page images
    Images(ImageCodec),
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Images(codec) => codec.mime_type(),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SplitError;

    /// Accepts MIME types (`application/pdf`, `image/jpeg`, `image/png`) and
    /// short names (`pdf`, `jpg`, `png`), ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "application/pdf" | "pdf" => Ok(OutputFormat::Pdf),
            other => ImageCodec::from_name(other)
                .map(OutputFormat::Images)
                .ok_or_else(|| SplitError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// A finished file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Result of one generation pass
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(target_arch = "wasm32", derive(serde::Serialize))]
pub struct SplitReport {
    pub file_name: String,
    pub page_count: usize,
    pub size_bytes: usize,
}

/// Where finished files go
pub trait SaveTarget {
    fn save(&mut self, name: &str, data: &[u8]) -> Result<()>;
}

/// Keeps saved files in memory
#[derive(Debug, Default)]
pub struct MemorySaveTarget {
    entries: Vec<OutputEntry>,
}

impl MemorySaveTarget {
    pub fn entries(&self) -> &[OutputEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<OutputEntry> {
        self.entries
    }
}

impl SaveTarget for MemorySaveTarget {
    fn save(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.entries.push(OutputEntry {
            name: name.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }
}

/// Something that turns a source image into one saved file
pub trait Assemble {
    fn generate(&self, source: &SourceBitmap, prefix: &str, save: &mut dyn SaveTarget) -> Result<SplitReport>;
}

/// Assembler chosen for an [`OutputFormat`]
#[derive(Debug, Clone)]
pub enum Assembler {
    Document(DocumentAssembler),
    Archive(ArchiveAssembler),
}

impl Assembler {
    pub fn for_format(format: OutputFormat, options: &SplitOptions) -> Self {
        match format {
            OutputFormat::Pdf => Assembler::Document(DocumentAssembler::new(options.clone())),
            OutputFormat::Images(codec) => Assembler::Archive(ArchiveAssembler::new(codec, options.clone())),
        }
    }

    /// Only archives care whether binary output is available
    pub fn with_binary_output(self, supported: bool) -> Self {
        match self {
            Assembler::Archive(assembler) => Assembler::Archive(assembler.with_binary_output(supported)),
            Assembler::Document(assembler) => Assembler::Document(assembler),
        }
    }
}

impl Assemble for Assembler {
    fn generate(&self, source: &SourceBitmap, prefix: &str, save: &mut dyn SaveTarget) -> Result<SplitReport> {
        match self {
            Assembler::Document(assembler) => assembler.generate(source, prefix, save),
            Assembler::Archive(assembler) => assembler.generate(source, prefix, save),
        }
    }
}

/// Output prefix for an input file name: the name without its last
/// extension. Names without one (or dot-files) are used as they are.
pub fn output_prefix(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

#[derive(Debug, Clone)]
struct SelectedFile {
    name: String,
    bytes: Vec<u8>,
}

/// State of one split request: the options, the chosen file and what the
/// host environment can do with the result.
#[derive(Debug, Clone)]
pub struct SplitSession {
    options: SplitOptions,
    selected: Option<SelectedFile>,
    binary_output: bool,
}

impl SplitSession {
    pub fn new(options: SplitOptions) -> Self {
        Self {
            options,
            selected: None,
            binary_output: true,
        }
    }

    pub fn with_binary_output(mut self, supported: bool) -> Self {
        self.binary_output = supported;
        self
    }

    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    pub fn select_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.selected = Some(SelectedFile {
            name: name.into(),
            bytes,
        });
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    /// Parse `format` and run [`SplitSession::submit_format`]
    pub fn submit(&self, format: &str, save: &mut dyn SaveTarget) -> Result<SplitReport> {
        let selected = self.selected.as_ref().ok_or(SplitError::NoInputSelected)?;
        let format: OutputFormat = format.parse()?;
        self.run(selected, format, save)
    }

    /// Decode the selected file and generate `format` into `save`
    pub fn submit_format(&self, format: OutputFormat, save: &mut dyn SaveTarget) -> Result<SplitReport> {
        let selected = self.selected.as_ref().ok_or(SplitError::NoInputSelected)?;
        self.run(selected, format, save)
    }

    fn run(&self, selected: &SelectedFile, format: OutputFormat, save: &mut dyn SaveTarget) -> Result<SplitReport> {
        self.options.validate()?;

        let source = SourceBitmap::decode(&selected.bytes)?;
        let prefix = output_prefix(&selected.name);
        log::debug!(
            "Decoded {} ({}x{} px), generating {}",
            selected.name,
            source.width(),
            source.height(),
            format
        );

        Assembler::for_format(format, &self.options)
            .with_binary_output(self.binary_output)
            .generate(&source, prefix, save)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Writes saved files into a directory
    #[derive(Debug)]
    pub struct DirectorySaveTarget {
        dir: PathBuf,
        written: Vec<PathBuf>,
    }

    impl DirectorySaveTarget {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self {
                dir: dir.into(),
                written: Vec::new(),
            }
        }

        pub fn written(&self) -> &[PathBuf] {
            &self.written
        }
    }

    impl SaveTarget for DirectorySaveTarget {
        fn save(&mut self, name: &str, data: &[u8]) -> Result<()> {
            fs::create_dir_all(&self.dir)?;
            let path = self.dir.join(name);
            fs::write(&path, data)?;
            self.written.push(path);
            Ok(())
        }
    }

    /// Split the image at `input_path` and write the result into `output_dir`.
    ///
    /// `format` is checked before the input file is touched.
    pub fn split_image_file(
        input_path: &Path,
        output_dir: &Path,
        format: &str,
        options: &SplitOptions,
    ) -> Result<SplitReport> {
        let format: OutputFormat = format.parse()?;

        let bytes = fs::read(input_path)?;
        let name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut session = SplitSession::new(options.clone());
        session.select_file(name, bytes);

        let mut target = DirectorySaveTarget::new(output_dir);
        session.submit_format(format, &mut target)
    }
}
