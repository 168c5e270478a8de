use a4_split::file_ops::{split_image_file, DirectorySaveTarget};
use a4_split::*;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use lopdf::Document;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;
use zip::ZipArchive;

fn options() -> SplitOptions {
    SplitOptions {
        resample_filter: FilterType::Nearest,
        ..SplitOptions::default()
    }
}

/// 60x200 px: pages are 84.85 rows tall, so three pages
fn write_test_png(dir: &Path, name: &str) -> std::path::PathBuf {
    let img = RgbaImage::from_fn(60, 200, |x, y| Rgba([(x * 4) as u8, (y % 256) as u8, 128, 255]));
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

#[test]
fn test_split_to_pdf() {
    let dir = TempDir::new().unwrap();
    let input = write_test_png(dir.path(), "poster.png");
    let out = dir.path().join("out");

    let report = split_image_file(&input, &out, "application/pdf", &options()).unwrap();
    assert_eq!(report.file_name, "poster_a4_split.pdf");
    assert_eq!(report.page_count, 3);

    let doc = Document::load(out.join("poster_a4_split.pdf")).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn test_split_to_jpeg_zip() {
    let dir = TempDir::new().unwrap();
    let input = write_test_png(dir.path(), "poster.png");

    let report = split_image_file(&input, dir.path(), "image/jpeg", &options()).unwrap();
    assert_eq!(report.file_name, "poster_a4_split.zip");

    let file = File::open(dir.path().join("poster_a4_split.zip")).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 3);
    for number in 1..=3 {
        let mut entry = archive
            .by_name(&format!("poster_a4_part{}.jpg", number))
            .unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        let page = image::load_from_memory(&data).unwrap();
        assert_eq!((page.width(), page.height()), (60, 84));
    }
}

#[test]
fn test_unsupported_format_checked_before_reading() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.png");

    let err = split_image_file(&missing, dir.path(), "image/gif", &options()).unwrap_err();
    assert!(matches!(err, SplitError::UnsupportedFormat(ref v) if v == "image/gif"));

    let err = split_image_file(&missing, dir.path(), "png", &options()).unwrap_err();
    assert!(matches!(err, SplitError::Io(_)));
}

#[test]
fn test_corrupt_input_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.png");
    std::fs::write(&input, b"definitely not a png").unwrap();
    let out = dir.path().join("out");

    let err = split_image_file(&input, &out, "pdf", &options()).unwrap_err();
    assert!(matches!(err, SplitError::Decode(_)));
    assert!(!out.exists());
}

#[test]
fn test_directory_target_records_written_files() {
    let dir = TempDir::new().unwrap();
    let source = SourceBitmap::from_rgba(RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255])));
    let mut target = DirectorySaveTarget::new(dir.path());

    let assembler = Assembler::for_format(OutputFormat::Images(ImageCodec::Png), &options());
    let report = assembler.generate(&source, "tile", &mut target).unwrap();

    assert_eq!(report.page_count, 1);
    assert_eq!(target.written(), &[dir.path().join("tile_a4_split.zip")]);
    assert_eq!(
        std::fs::metadata(&target.written()[0]).unwrap().len() as usize,
        report.size_bytes
    );
}

#[test]
fn test_pager_pages_match_across_runs() {
    let source = SourceBitmap::from_rgba(RgbaImage::from_fn(25, 130, |x, y| {
        Rgba([x as u8, y as u8, (x ^ y) as u8, 255])
    }));

    let render = || {
        let mut pager = Pager::new(&source, A4_ASPECT_RATIO, Some(PageSize::new(21, 29))).unwrap();
        let mut pages = Vec::new();
        while let Some(page) = pager.next_page() {
            pages.push(page.unwrap().image().clone());
        }
        pages
    };

    let first = render();
    assert_eq!(first.len(), 4);
    assert_eq!(first, render());
}
