//! ZIP output: one encoded image per page.

use crate::encode::{encode_page, ImageCodec};
use crate::pager::{Pager, SourceBitmap};
use crate::{Assemble, Result, SaveTarget, SplitError, SplitOptions, SplitReport};
use log::{debug, info, warn};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `<prefix>_a4_part<number>.<extension>`, with `number` starting at 1
pub fn part_file_name(prefix: &str, number: usize, codec: ImageCodec) -> String {
    format!("{}_a4_part{}.{}", prefix, number, codec.extension())
}

/// `<prefix>_a4_split.zip`
pub fn archive_file_name(prefix: &str) -> String {
    format!("{}_a4_split.zip", prefix)
}

/// Archive of named entries being built
pub trait ArchiveContainer {
    /// Whether the finished archive can be handed out as binary data
    fn supports_binary_output(&self) -> bool;

    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()>;

    fn finish(self) -> Result<Vec<u8>>;
}

/// In-memory ZIP archive
pub struct ZipContainer {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    binary_output: bool,
}

impl ZipContainer {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            binary_output: true,
        }
    }

    pub fn with_binary_output(mut self, supported: bool) -> Self {
        self.binary_output = supported;
        self
    }
}

impl Default for ZipContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveContainer for ZipContainer {
    fn supports_binary_output(&self) -> bool {
        self.binary_output
    }

    fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        // Entries are already-compressed images
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer.start_file(name, options)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Builds `<prefix>_a4_split.zip` holding one image per page
#[derive(Debug, Clone)]
pub struct ArchiveAssembler {
    codec: ImageCodec,
    options: SplitOptions,
    binary_output: bool,
}

impl ArchiveAssembler {
    pub fn new(codec: ImageCodec, options: SplitOptions) -> Self {
        Self {
            codec,
            options,
            binary_output: true,
        }
    }

    /// Record whether the host can receive the archive as binary data
    pub fn with_binary_output(mut self, supported: bool) -> Self {
        self.binary_output = supported;
        self
    }

    pub fn codec(&self) -> ImageCodec {
        self.codec
    }

    /// Page `source` at its natural width into `container`, then save the
    /// archive. Nothing is saved if the container cannot produce binary output.
    pub fn generate_with<A, S>(
        &self,
        source: &SourceBitmap,
        prefix: &str,
        mut container: A,
        save: &mut S,
    ) -> Result<SplitReport>
    where
        A: ArchiveContainer,
        S: SaveTarget + ?Sized,
    {
        let mut pager = Pager::with_filter(source, self.options.aspect_ratio, None, self.options.resample_filter)?;
        let page_count = pager.page_count();
        debug!(
            "[Archive] {}x{} px source -> {} {} pages",
            source.width(),
            source.height(),
            page_count,
            self.codec
        );

        while let Some(page) = pager.next_page() {
            let page = page?;
            let data = encode_page(page.image(), self.codec, self.options.quality).map_err(|reason| {
                SplitError::Encode {
                    page: page.number(),
                    reason,
                }
            })?;
            let name = part_file_name(prefix, page.number(), self.codec);
            debug!("[Archive] {} ({} bytes)", name, data.len());
            container.add_entry(&name, &data)?;
        }

        if !container.supports_binary_output() {
            warn!("Sorry, this environment cannot save binary archives");
            return Err(SplitError::EnvironmentUnsupported);
        }

        let bytes = container.finish()?;
        let file_name = archive_file_name(prefix);
        save.save(&file_name, &bytes)?;
        info!("Saved {} ({} pages, {} bytes)", file_name, page_count, bytes.len());

        Ok(SplitReport {
            file_name,
            page_count,
            size_bytes: bytes.len(),
        })
    }
}

impl Assemble for ArchiveAssembler {
    fn generate(&self, source: &SourceBitmap, prefix: &str, save: &mut dyn SaveTarget) -> Result<SplitReport> {
        let container = ZipContainer::new().with_binary_output(self.binary_output);
        self.generate_with(source, prefix, container, save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySaveTarget;
    use image::imageops::FilterType;
    use image::{Rgba, RgbaImage};
    use std::io::Read;
    use zip::ZipArchive;

    fn options() -> SplitOptions {
        SplitOptions {
            resample_filter: FilterType::Nearest,
            ..SplitOptions::default()
        }
    }

    /// 3 pages: 40 px wide pages are 56.57 rows tall
    fn three_page_source() -> SourceBitmap {
        SourceBitmap::from_rgba(RgbaImage::from_fn(40, 150, |_, y| Rgba([(y % 256) as u8, 0, 0, 255])))
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect::<Vec<_>>()
    }

    #[test]
    fn jpeg_entries_use_jpg_extension() {
        let assembler = ArchiveAssembler::new(ImageCodec::Jpeg, options());
        let mut save = MemorySaveTarget::default();
        let report = assembler.generate(&three_page_source(), "photo", &mut save).unwrap();

        assert_eq!(report.page_count, 3);
        assert_eq!(report.file_name, "photo_a4_split.zip");

        let mut names = entry_names(&save.entries()[0].data);
        names.sort();
        assert_eq!(
            names,
            vec!["photo_a4_part1.jpg", "photo_a4_part2.jpg", "photo_a4_part3.jpg"]
        );
    }

    #[test]
    fn png_entries_decode_at_natural_page_size() {
        let assembler = ArchiveAssembler::new(ImageCodec::Png, options());
        let mut save = MemorySaveTarget::default();
        assembler.generate(&three_page_source(), "photo", &mut save).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(save.entries()[0].data.clone())).unwrap();
        for number in 1..=3 {
            let mut entry = archive.by_name(&format!("photo_a4_part{}.png", number)).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            let page = image::load_from_memory(&data).unwrap();
            assert_eq!((page.width(), page.height()), (40, 56));
        }
    }

    #[test]
    fn last_png_page_has_transparent_margin() {
        let assembler = ArchiveAssembler::new(ImageCodec::Png, options());
        let mut save = MemorySaveTarget::default();
        assembler.generate(&three_page_source(), "photo", &mut save).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(save.entries()[0].data.clone())).unwrap();
        let mut entry = archive.by_name("photo_a4_part3.png").unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        let page = image::load_from_memory(&data).unwrap().to_rgba8();
        // rows 113..150 of the source fill the top 37 rows
        assert_eq!(page.get_pixel(0, 0)[3], 255);
        assert_eq!(page.get_pixel(0, 55)[3], 0);
    }

    #[test]
    fn part_names_are_one_based() {
        assert_eq!(part_file_name("scan", 1, ImageCodec::Png), "scan_a4_part1.png");
        assert_eq!(part_file_name("scan", 12, ImageCodec::Jpeg), "scan_a4_part12.jpg");
    }

    #[test]
    fn unsupported_environment_saves_nothing() {
        let assembler = ArchiveAssembler::new(ImageCodec::Png, options()).with_binary_output(false);
        let mut save = MemorySaveTarget::default();
        let err = assembler.generate(&three_page_source(), "photo", &mut save).unwrap_err();

        assert!(matches!(err, SplitError::EnvironmentUnsupported));
        assert!(save.entries().is_empty());
    }

    #[test]
    fn zip_container_round_trips_entries() {
        let mut container = ZipContainer::new();
        container.add_entry("a.png", b"first").unwrap();
        container.add_entry("b.png", b"second").unwrap();
        let bytes = container.finish().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_name("b.png").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "second");
    }
}
