//! Two-strategy PDF rasterizer.

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, warn};

use super::{PdfExtractor, Rasterizer, Result};
use crate::error::PdfError;
use crate::models::config::PdfConfig;

/// Rasterizes PDFs from their embedded page images.
///
/// The primary strategy takes each page's largest image and resamples it to
/// the page size at the configured DPI. When that fails the secondary
/// strategy scans the whole document for images and upscales them by the
/// fallback zoom. Pages without raster content fail both strategies.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    render_dpi: u32,
    fallback_zoom: f32,
    max_pages: usize,
    max_image_size: u32,
}

impl PdfRasterizer {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            render_dpi: config.render_dpi.max(1),
            fallback_zoom: config.fallback_zoom.max(1.0),
            max_pages: config.max_pages,
            max_image_size: 4096,
        }
    }

    /// Cap the longest side of produced images.
    pub fn with_max_image_size(mut self, max: u32) -> Self {
        self.max_image_size = max.max(1);
        self
    }

    fn page_limit(&self, page_count: u32) -> u32 {
        if self.max_pages == 0 {
            page_count
        } else {
            page_count.min(self.max_pages as u32)
        }
    }

    fn render_pages(&self, pdf: &PdfExtractor) -> Result<Vec<DynamicImage>> {
        let mut pages = Vec::new();
        for page in 1..=self.page_limit(pdf.page_count()) {
            let image = pdf
                .page_images(page)?
                .into_iter()
                .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
                .ok_or_else(|| {
                    PdfError::ImageExtraction(format!("page {} has no raster content", page))
                })?;

            let image = match pdf.page_size_points(page) {
                Some((w_pt, h_pt)) => {
                    let scale = f64::from(self.render_dpi) / 72.0;
                    self.resample(image, f64::from(w_pt) * scale, f64::from(h_pt) * scale)
                }
                None => self.fit(image),
            };

            debug!("Rendered page {} at {}x{}", page, image.width(), image.height());
            pages.push(image);
        }
        Ok(pages)
    }

    fn scan_images(&self, pdf: &PdfExtractor) -> Result<Vec<DynamicImage>> {
        let limit = self.page_limit(pdf.page_count()) as usize;
        let images: Vec<DynamicImage> = pdf
            .all_images()
            .into_iter()
            .take(limit)
            .map(|img| {
                let zoom = f64::from(self.fallback_zoom);
                let (width, height) = (f64::from(img.width()) * zoom, f64::from(img.height()) * zoom);
                self.resample(img, width, height)
            })
            .collect();

        if images.is_empty() {
            return Err(PdfError::ImageExtraction(
                "no images found in document".to_string(),
            ));
        }
        Ok(images)
    }

    /// Output size for a `width` x `height` target, scaled down to keep the
    /// longest side within `max_image_size`. Aspect ratio is preserved.
    fn target_size(&self, width: f64, height: f64) -> (u32, u32) {
        let max = f64::from(self.max_image_size);
        let longest = width.max(height);
        let scale = if longest > max { max / longest } else { 1.0 };
        let clamp = |v: f64| (v * scale).round().clamp(1.0, max) as u32;
        (clamp(width), clamp(height))
    }

    /// Resample to the capped target size in one pass.
    fn resample(&self, image: DynamicImage, width: f64, height: f64) -> DynamicImage {
        let (width, height) = self.target_size(width, height);
        if (width, height) == (image.width(), image.height()) {
            image
        } else {
            image.resize_exact(width, height, FilterType::Triangle)
        }
    }

    fn fit(&self, image: DynamicImage) -> DynamicImage {
        if image.width().max(image.height()) > self.max_image_size {
            image.resize(self.max_image_size, self.max_image_size, FilterType::Triangle)
        } else {
            image
        }
    }
}

impl Default for PdfRasterizer {
    fn default() -> Self {
        Self::new(&PdfConfig::default())
    }
}

impl Rasterizer for PdfRasterizer {
    fn rasterize(&self, data: &[u8]) -> Result<Vec<DynamicImage>> {
        let pdf = PdfExtractor::load(data)?;

        let primary = match self.render_pages(&pdf) {
            Ok(pages) => return Ok(pages),
            Err(e) => e,
        };
        warn!("Primary rasterization failed ({}), scanning document images", primary);

        self.scan_images(&pdf).map_err(|secondary| PdfError::Rasterization {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{Document, Object, Stream, dictionary};

    /// One-page PDF with an optional 8x4 gray image and a 72x36pt MediaBox.
    pub(crate) fn one_page_pdf(with_image: bool) -> Vec<u8> {
        pdf_with_media_box(with_image, 72, 36)
    }

    fn pdf_with_media_box(with_image: bool, width_pt: i64, height_pt: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut resources = dictionary! {};
        if with_image {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 8,
                    "Height" => 4,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                vec![200u8; 32],
            ));
            resources.set("XObject", dictionary! { "Im0" => image_id });
        }
        let resources_id = doc.add_object(resources);
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"q 72 0 0 36 0 0 cm /Im0 Do Q".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_primary_renders_at_dpi() {
        let pages = PdfRasterizer::default().rasterize(&one_page_pdf(true)).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].width(), pages[0].height()), (300, 150));
    }

    #[test]
    fn test_both_strategies_fail_without_images() {
        let err = PdfRasterizer::default()
            .rasterize(&one_page_pdf(false))
            .unwrap_err();
        assert!(matches!(err, PdfError::Rasterization { .. }));
    }

    #[test]
    fn test_image_size_cap() {
        let pages = PdfRasterizer::default()
            .with_max_image_size(100)
            .rasterize(&one_page_pdf(true))
            .unwrap();
        assert_eq!((pages[0].width(), pages[0].height()), (100, 50));
    }

    #[test]
    fn test_oversized_media_box_is_capped_before_resampling() {
        let pages = PdfRasterizer::default()
            .rasterize(&pdf_with_media_box(true, 14400, 7200))
            .unwrap();
        assert_eq!((pages[0].width(), pages[0].height()), (4096, 2048));
    }

    #[test]
    fn test_target_size_keeps_aspect_ratio() {
        let rasterizer = PdfRasterizer::default().with_max_image_size(1000);
        assert_eq!(rasterizer.target_size(60000.0, 30000.0), (1000, 500));
        assert_eq!(rasterizer.target_size(24.0, 12.0), (24, 12));
        assert_eq!(rasterizer.target_size(100000.0, 1.0), (1000, 1));
    }
}
