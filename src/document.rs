//! PDF output: one page image per A4 sheet.

use crate::encode::LosslessImage;
use crate::pager::{PageSize, Pager, SourceBitmap};
use crate::{Assemble, Result, SaveTarget, SplitError, SplitOptions, SplitReport};
use log::{debug, info};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// A4 portrait width in millimetres
pub const A4_WIDTH_MM: f32 = 210.0;
/// A4 portrait height in millimetres
pub const A4_HEIGHT_MM: f32 = 297.0;
/// Screen pixels per millimetre (96 DPI)
pub const MM_PX_RATIO: f64 = 3.779528;

/// Convert millimetres to PDF points
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 2.83465
}

/// `<prefix>_a4_split.pdf`
pub fn document_file_name(prefix: &str) -> String {
    format!("{}_a4_split.pdf", prefix)
}

/// Multi-page document being built. A fresh container already holds one
/// empty page; images are placed on the most recently added page.
pub trait DocumentContainer {
    /// Physical page size as (width, height) in millimetres
    fn page_size_mm(&self) -> (f32, f32);

    fn add_page(&mut self);

    /// Place an image on the current page, taking ownership of its encoded
    /// samples. Coordinates are millimetres from the top-left corner.
    fn embed_image(
        &mut self,
        image: LosslessImage,
        x_mm: f32,
        y_mm: f32,
        width_mm: f32,
        height_mm: f32,
    ) -> Result<()>;

    /// Serialize the finished document
    fn finish(self) -> Result<Vec<u8>>;
}

#[derive(Debug, Default)]
struct PendingPage {
    xobjects: Vec<(String, ObjectId)>,
    content: String,
}

/// [`DocumentContainer`] writing a PDF with `lopdf`
pub struct PdfContainer {
    doc: Document,
    width_mm: f32,
    height_mm: f32,
    pages: Vec<PendingPage>,
    image_count: usize,
    compress_streams: bool,
}

impl PdfContainer {
    pub fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            doc: Document::with_version("1.5"),
            width_mm,
            height_mm,
            pages: vec![PendingPage::default()],
            image_count: 0,
            compress_streams: true,
        }
    }

    pub fn a4() -> Self {
        Self::new(A4_WIDTH_MM, A4_HEIGHT_MM)
    }

    pub fn with_compression(mut self, compress_streams: bool) -> Self {
        self.compress_streams = compress_streams;
        self
    }

    fn add_image_xobject(&mut self, image: LosslessImage) -> ObjectId {
        let LosslessImage { width, height, rgb, alpha } = image;
        let smask_id = alpha.map(|alpha| {
            let dict = image_dict(width, height, "DeviceGray");
            self.doc.add_object(Stream::new(dict, alpha))
        });

        let mut dict = image_dict(width, height, "DeviceRGB");
        if let Some(smask_id) = smask_id {
            dict.set("SMask", Object::Reference(smask_id));
        }
        self.doc.add_object(Stream::new(dict, rgb))
    }
}

impl Default for PdfContainer {
    fn default() -> Self {
        Self::a4()
    }
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict
}

impl DocumentContainer for PdfContainer {
    fn page_size_mm(&self) -> (f32, f32) {
        (self.width_mm, self.height_mm)
    }

    fn add_page(&mut self) {
        self.pages.push(PendingPage::default());
    }

    fn embed_image(
        &mut self,
        image: LosslessImage,
        x_mm: f32,
        y_mm: f32,
        width_mm: f32,
        height_mm: f32,
    ) -> Result<()> {
        if image.width == 0 || image.height == 0 {
            return Err(SplitError::InvalidGeometry(
                "cannot embed an empty image".to_string(),
            ));
        }

        let xobject_id = self.add_image_xobject(image);
        let name = format!("Im{}", self.image_count);
        self.image_count += 1;

        // PDF user space starts at the bottom-left corner
        let width = mm_to_pt(width_mm);
        let height = mm_to_pt(height_mm);
        let x = mm_to_pt(x_mm);
        let y = mm_to_pt(self.height_mm) - mm_to_pt(y_mm) - height;

        let page = self
            .pages
            .last_mut()
            .ok_or_else(|| SplitError::InvalidGeometry("document has no page".to_string()))?;
        page.content.push_str(&format!(
            "q {:.4} 0 0 {:.4} {:.4} {:.4} cm /{} Do Q\n",
            width, height, x, y, name
        ));
        page.xobjects.push((name, xobject_id));
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let pages_id = self.doc.new_object_id();
        let media_box = Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(mm_to_pt(self.width_mm)),
            Object::Real(mm_to_pt(self.height_mm)),
        ]);

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            let content_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), page.content.into_bytes()));

            let mut xobjects = Dictionary::new();
            for (name, id) in page.xobjects {
                xobjects.set(name.as_bytes(), Object::Reference(id));
            }
            let mut resources = Dictionary::new();
            resources.set("XObject", Object::Dictionary(xobjects));

            let page_id = self.doc.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("MediaBox", media_box.clone()),
                ("Resources", Object::Dictionary(resources)),
                ("Contents", Object::Reference(content_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        self.doc.trailer.set("Root", catalog_id);

        if self.compress_streams {
            self.doc.compress();
        }

        let mut output_bytes = Vec::new();
        self.doc.save_to(&mut output_bytes)?;
        Ok(output_bytes)
    }
}

/// Builds `<prefix>_a4_split.pdf`, one source slice per page
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    options: SplitOptions,
}

impl DocumentAssembler {
    pub fn new(options: SplitOptions) -> Self {
        Self { options }
    }

    /// Pixel size of a `width_mm x height_mm` page, truncated to whole pixels
    pub fn page_size_px(&self, width_mm: f32, height_mm: f32) -> PageSize {
        PageSize::new(
            (width_mm as f64 * self.options.px_per_mm) as u32,
            (height_mm as f64 * self.options.px_per_mm) as u32,
        )
    }

    /// Page `source` into `container`, then save the finished document.
    ///
    /// Pages are embedded losslessly so the unused part of the last page
    /// stays white instead of turning black.
    pub fn generate_with<C, S>(
        &self,
        source: &SourceBitmap,
        prefix: &str,
        mut container: C,
        save: &mut S,
    ) -> Result<SplitReport>
    where
        C: DocumentContainer,
        S: SaveTarget + ?Sized,
    {
        let (width_mm, height_mm) = container.page_size_mm();
        let page_size = self.page_size_px(width_mm, height_mm);

        let mut pager = Pager::with_filter(
            source,
            self.options.aspect_ratio,
            Some(page_size),
            self.options.resample_filter,
        )?;
        let page_count = pager.page_count();
        debug!(
            "[Document] {}x{} px source -> {} pages of {}x{} px",
            source.width(),
            source.height(),
            page_count,
            page_size.width,
            page_size.height
        );

        while let Some(page) = pager.next_page() {
            let page = page?;
            if page.index() > 0 {
                container.add_page();
            }

            let image = LosslessImage::encode(page.image()).map_err(|reason| SplitError::Encode {
                page: page.number(),
                reason,
            })?;
            container.embed_image(image, 0.0, 0.0, width_mm, height_mm)?;
            debug!("[Document] Embedded page {}/{}", page.number(), page_count);
        }

        let bytes = container.finish()?;
        let file_name = document_file_name(prefix);
        save.save(&file_name, &bytes)?;
        info!("Saved {} ({} pages, {} bytes)", file_name, page_count, bytes.len());

        Ok(SplitReport {
            file_name,
            page_count,
            size_bytes: bytes.len(),
        })
    }
}

impl Assemble for DocumentAssembler {
    fn generate(&self, source: &SourceBitmap, prefix: &str, save: &mut dyn SaveTarget) -> Result<SplitReport> {
        let container = PdfContainer::a4().with_compression(self.options.compress_streams);
        self.generate_with(source, prefix, container, save)
    }
}
