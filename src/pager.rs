//! Page geometry and the page cursor.
//!
//! A [`Pager`] slices a tall source bitmap into pages whose height is
//! `width * aspect_ratio`, scales each slice into one reusable draw surface
//! and hands the surface out page by page.

use crate::{Result, SplitError};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::ops::Range;

/// A4 portrait: 297 mm tall for every 210 mm of width
pub const A4_ASPECT_RATIO: f64 = 297.0 / 210.0;

/// Colour of an empty draw surface (fully transparent)
pub const BLANK: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A decoded image, ready to be paged
#[derive(Debug, Clone)]
pub struct SourceBitmap {
    pixels: RgbaImage,
}

impl SourceBitmap {
    /// Decode an encoded image file (PNG, JPEG, WebP) into RGBA pixels
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).map_err(|e| SplitError::Decode(e.to_string()))?;
        Ok(Self::from_rgba(img.to_rgba8()))
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Output page size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Rectangle in source pixel space. `y` and `height` are fractional since a
/// page is `width * aspect_ratio` source pixels tall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Pagination values derived once from the source size and aspect ratio
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub aspect_ratio: f64,
    pub source_width: u32,
    pub source_height: u32,
    /// Source pixels consumed by one page, vertically
    pub height_of_source_page: f64,
    pub page_count: usize,
    pub output_width: u32,
    pub output_height: u32,
}

impl PageGeometry {
    /// Compute the geometry for a `source_width x source_height` bitmap.
    ///
    /// Without an explicit `page_size` the output keeps the source width and
    /// uses the page height truncated to whole pixels, but never less than one.
    pub fn compute(
        source_width: u32,
        source_height: u32,
        aspect_ratio: f64,
        page_size: Option<PageSize>,
    ) -> Result<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(SplitError::InvalidGeometry(format!(
                "source bitmap must have positive dimensions, got {}x{}",
                source_width, source_height
            )));
        }
        if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
            return Err(SplitError::InvalidGeometry(format!(
                "aspect ratio must be a positive number, got {}",
                aspect_ratio
            )));
        }

        let height_of_source_page = source_width as f64 * aspect_ratio;
        let page_count = ((source_height as f64 / height_of_source_page).ceil() as usize).max(1);

        let (output_width, output_height) = match page_size {
            Some(size) => (size.width, size.height),
            None => (source_width, (height_of_source_page as u32).max(1)),
        };
        if output_width == 0 || output_height == 0 {
            return Err(SplitError::InvalidGeometry(format!(
                "output page must have positive dimensions, got {}x{}",
                output_width, output_height
            )));
        }

        Ok(Self {
            aspect_ratio,
            source_width,
            source_height,
            height_of_source_page,
            page_count,
            output_width,
            output_height,
        })
    }

    /// Unclipped source rectangle of page `index`
    pub fn source_rect(&self, index: usize) -> SourceRect {
        SourceRect {
            x: 0.0,
            y: self.height_of_source_page * index as f64,
            width: self.source_width as f64,
            height: self.height_of_source_page,
        }
    }

    /// Whole source rows drawn on page `index`, clipped to the bitmap.
    ///
    /// Consecutive pages share their boundary row index, so the ranges of all
    /// pages tile `0..source_height` exactly.
    ///
    /// Rounding can leave the last range empty: a 7x20 source has pages
    /// `0..10`, `10..20` and `20..20`. That final page still counts and is
    /// emitted blank.
    pub fn source_rows(&self, index: usize) -> Range<u32> {
        self.row_boundary(index)..self.row_boundary(index + 1)
    }

    fn row_boundary(&self, index: usize) -> u32 {
        let y = (self.height_of_source_page * index as f64).round();
        y.min(self.source_height as f64) as u32
    }

    /// True when the source rectangle of page `index` runs past the bottom edge
    pub fn is_clipped(&self, index: usize) -> bool {
        self.height_of_source_page * (index + 1) as f64 > self.source_height as f64
    }
}

/// One rendered page. Borrows the pager's surface, so it has to be dropped
/// before the pager can advance.
#[derive(Debug)]
pub struct Page<'p> {
    index: usize,
    source_rect: SourceRect,
    surface: &'p RgbaImage,
}

impl<'p> Page<'p> {
    /// 0-based page index
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based page number
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn source_rect(&self) -> SourceRect {
        self.source_rect
    }

    pub fn image(&self) -> &'p RgbaImage {
        self.surface
    }
}

/// Lazy page cursor over a single source bitmap.
///
/// Every page is drawn into the same surface. The surface is cleared to
/// [`BLANK`] when the cursor advances past a page (or runs out), so the
/// margin of an under-full last page never shows the previous page.
/// A pager makes one pass; build a new one to page the bitmap again.
pub struct Pager<'a> {
    source: &'a RgbaImage,
    geometry: PageGeometry,
    filter: FilterType,
    surface: RgbaImage,
    next_index: usize,
    surface_dirty: bool,
}

impl<'a> Pager<'a> {
    pub fn new(source: &'a SourceBitmap, aspect_ratio: f64, page_size: Option<PageSize>) -> Result<Self> {
        Self::with_filter(source, aspect_ratio, page_size, FilterType::Lanczos3)
    }

    pub fn with_filter(
        source: &'a SourceBitmap,
        aspect_ratio: f64,
        page_size: Option<PageSize>,
        filter: FilterType,
    ) -> Result<Self> {
        let geometry = PageGeometry::compute(source.width(), source.height(), aspect_ratio, page_size)?;
        let surface = RgbaImage::from_pixel(geometry.output_width, geometry.output_height, BLANK);

        Ok(Self {
            source: source.pixels(),
            geometry,
            filter,
            surface,
            next_index: 0,
            surface_dirty: false,
        })
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn page_count(&self) -> usize {
        self.geometry.page_count
    }

    pub fn has_next(&self) -> bool {
        self.next_index < self.geometry.page_count
    }

    pub fn remaining(&self) -> usize {
        self.geometry.page_count - self.next_index
    }

    /// Render and return the next page, or `None` once all pages were produced.
    ///
    /// A render error ends the sequence.
    pub fn next_page(&mut self) -> Option<Result<Page<'_>>> {
        self.clear_surface();
        if !self.has_next() {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        self.surface_dirty = true;

        if let Err(e) = self.render(index) {
            self.next_index = self.geometry.page_count;
            return Some(Err(e));
        }

        Some(Ok(Page {
            index,
            source_rect: self.geometry.source_rect(index),
            surface: &self.surface,
        }))
    }

    fn clear_surface(&mut self) {
        if self.surface_dirty {
            for pixel in self.surface.pixels_mut() {
                *pixel = BLANK;
            }
            self.surface_dirty = false;
        }
    }

    fn render(&mut self, index: usize) -> Result<()> {
        let geometry = &self.geometry;
        let rows = geometry.source_rows(index);
        if rows.is_empty() {
            return Ok(());
        }

        let slice_height = rows.end - rows.start;
        let dest_height = if geometry.is_clipped(index) {
            let scale_y = geometry.output_height as f64 / geometry.height_of_source_page;
            ((slice_height as f64 * scale_y).round() as u32).clamp(1, geometry.output_height)
        } else {
            geometry.output_height
        };

        let slice = imageops::crop_imm(self.source, 0, rows.start, geometry.source_width, slice_height).to_image();
        let scaled = if slice.dimensions() == (geometry.output_width, dest_height) {
            slice
        } else {
            imageops::resize(&slice, geometry.output_width, dest_height, self.filter)
        };

        if scaled.width() > self.surface.width() || scaled.height() > self.surface.height() {
            return Err(SplitError::Render {
                page: index + 1,
                reason: format!(
                    "scaled slice {}x{} does not fit the {}x{} surface",
                    scaled.width(),
                    scaled.height(),
                    self.surface.width(),
                    self.surface.height()
                ),
            });
        }

        imageops::replace(&mut self.surface, &scaled, 0, 0);
        Ok(())
    }
}
