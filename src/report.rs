//! Paginated PDF report
//!
//! One page per capture: the captured frame, the histogram plot and the RGB means
//! as text. The document lives in memory until `save`, which writes it once.

use crate::errors::ColometryError;
use crate::types::CaptureRecord;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};

/// A4 portrait in PDF points.
pub const PAGE_WIDTH: i64 = 595;
pub const PAGE_HEIGHT: i64 = 842;

/// Placement of an image on the page: x, y (bottom-left), width, height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

pub const CAPTURE_IMAGE_PLACEMENT: Placement = Placement {
    x: 10,
    y: 440,
    width: 80,
    height: 390,
};

pub const HISTOGRAM_PLACEMENT: Placement = Placement {
    x: 100,
    y: 530,
    width: 400,
    height: 300,
};

const HEADER_POSITION: (i64, i64) = (10, 420);
const VALUES_POSITION: (i64, i64) = (10, 405);
const FONT_SIZE: i64 = 12;
const EMBED_JPEG_QUALITY: u8 = 90;

pub struct ReportDocument {
    path: PathBuf,
    doc: Document,
    pages_id: ObjectId,
    regular_font: ObjectId,
    bold_font: ObjectId,
    page_ids: Vec<ObjectId>,
    last_capture_index: Option<u32>,
    finalized: bool,
}

impl std::fmt::Debug for ReportDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportDocument")
            .field("path", &self.path)
            .field("page_count", &self.page_ids.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl ReportDocument {
    /// Start a new document that will be written to `path` on `save`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });

        Self {
            path: path.into(),
            doc,
            pages_id,
            regular_font,
            bold_font,
            page_ids: Vec::new(),
            last_capture_index: None,
            finalized: false,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Add the page for `record`.
    ///
    /// The first call fills the document's first page; each later call starts
    /// a new one. Capture indices must strictly increase.
    pub fn append_page(
        &mut self,
        record: &CaptureRecord,
        image_artifact: &Path,
        histogram_artifact: &Path,
    ) -> Result<(), ColometryError> {
        if self.finalized {
            return Err(ColometryError::DocumentFinalized(format!(
                "cannot append capture {} to saved report {:?}",
                record.capture_index, self.path
            )));
        }
        if let Some(last) = self.last_capture_index {
            if record.capture_index <= last {
                return Err(ColometryError::InvalidArgument(format!(
                    "capture {} appended after capture {}",
                    record.capture_index, last
                )));
            }
        }

        let capture_image = self.embed_image(image_artifact)?;
        let histogram_image = self.embed_image(histogram_artifact)?;

        let header = format!("RGB Values - Capture {}", record.capture_index);
        let values = record.rgb_summary();

        let mut operations = Vec::new();
        operations.extend(draw_image_ops("Im1", CAPTURE_IMAGE_PLACEMENT));
        operations.extend(draw_image_ops("Im2", HISTOGRAM_PLACEMENT));
        operations.extend(draw_text_ops("F2", HEADER_POSITION, &header));
        operations.extend(draw_text_ops("F1", VALUES_POSITION, &values));

        let content = Content { operations };
        let encoded = content.encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let resources_id = self.doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => self.regular_font,
                "F2" => self.bold_font,
            },
            "XObject" => dictionary! {
                "Im1" => capture_image,
                "Im2" => histogram_image,
            },
        });

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });

        self.page_ids.push(page_id);
        self.last_capture_index = Some(record.capture_index);
        log::debug!(
            "Report page {} added for capture {}",
            self.page_ids.len(),
            record.capture_index
        );
        Ok(())
    }

    /// Write the document to its path. Allowed once; a document with no pages
    /// is still written.
    pub fn save(&mut self) -> Result<PathBuf, ColometryError> {
        if self.finalized {
            return Err(ColometryError::DocumentFinalized(format!(
                "report {:?} was already saved",
                self.path
            )));
        }
        self.finalized = true;

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(format!("colometry {}", crate::VERSION)),
        });
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        self.doc
            .save(&self.path)
            .map_err(|e| ColometryError::Pdf(format!("Failed to write {:?}: {}", self.path, e)))?;

        log::info!(
            "Report saved: {:?} ({} pages)",
            self.path,
            self.page_ids.len()
        );
        Ok(self.path.clone())
    }

    /// Decode an artifact and embed it as a JPEG image XObject.
    fn embed_image(&mut self, path: &Path) -> Result<ObjectId, ColometryError> {
        let image = image::open(path)?.to_rgb8();
        let (width, height) = image.dimensions();

        let mut jpeg = Vec::new();
        image.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, EMBED_JPEG_QUALITY))?;

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);

        Ok(self.doc.add_object(stream))
    }
}

fn draw_image_ops(name: &str, placement: Placement) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Integer(placement.width),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(placement.height),
                Object::Integer(placement.x),
                Object::Integer(placement.y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

fn draw_text_ops(font: &str, position: (i64, i64), text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(FONT_SIZE)],
        ),
        Operation::new(
            "Td",
            vec![Object::Integer(position.0), Object::Integer(position.1)],
        ),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RegionOfInterest, HISTOGRAM_BINS};
    use chrono::Local;
    use image::{Rgb, RgbImage};

    fn record(index: u32) -> CaptureRecord {
        CaptureRecord {
            capture_index: index,
            timestamp: Local::now(),
            image_reference: PathBuf::from("frame.jpg"),
            region_of_interest: RegionOfInterest::centered(160, 360),
            per_channel_histogram: [
                vec![0; HISTOGRAM_BINS],
                vec![0; HISTOGRAM_BINS],
                vec![0; HISTOGRAM_BINS],
            ],
            per_channel_mean: [12, 34, 56],
        }
    }

    fn artifacts(dir: &Path) -> (PathBuf, PathBuf) {
        let image_path = dir.join("frame.png");
        let histogram_path = dir.join("histogram.png");
        RgbImage::from_pixel(16, 36, Rgb([200, 10, 10]))
            .save(&image_path)
            .unwrap();
        RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]))
            .save(&histogram_path)
            .unwrap();
        (image_path, histogram_path)
    }

    fn page_strings(doc: &Document, page_id: ObjectId) -> Vec<String> {
        doc.get_and_decode_page_content(page_id)
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pages_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let (image_path, histogram_path) = artifacts(dir.path());
        let pdf_path = dir.path().join("report.pdf");

        let mut report = ReportDocument::open(&pdf_path);
        report.append_page(&record(1), &image_path, &histogram_path).unwrap();
        report.append_page(&record(2), &image_path, &histogram_path).unwrap();
        assert_eq!(report.page_count(), 2);
        report.save().unwrap();

        let doc = Document::load(&pdf_path).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let first = page_strings(&doc, pages[&1]);
        assert_eq!(first, vec!["RGB Values - Capture 1", "R: 12, G: 34, B: 56"]);
        let second = page_strings(&doc, pages[&2]);
        assert_eq!(second[0], "RGB Values - Capture 2");
    }

    #[test]
    fn test_empty_document_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("empty.pdf");

        let mut report = ReportDocument::open(&pdf_path);
        assert_eq!(report.file_path(), pdf_path.as_path());
        assert_eq!(report.save().unwrap(), pdf_path);

        assert!(pdf_path.exists());
        let doc = Document::load(&pdf_path).unwrap();
        assert_eq!(doc.get_pages().len(), 0);
    }

    #[test]
    fn test_append_after_save_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (image_path, histogram_path) = artifacts(dir.path());
        let mut report = ReportDocument::open(dir.path().join("r.pdf"));
        report.save().unwrap();

        let result = report.append_page(&record(1), &image_path, &histogram_path);
        assert!(matches!(result, Err(ColometryError::DocumentFinalized(_))));
        assert!(matches!(report.save(), Err(ColometryError::DocumentFinalized(_))));
    }

    #[test]
    fn test_out_of_order_capture_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (image_path, histogram_path) = artifacts(dir.path());
        let mut report = ReportDocument::open(dir.path().join("r.pdf"));
        report.append_page(&record(2), &image_path, &histogram_path).unwrap();

        let result = report.append_page(&record(2), &image_path, &histogram_path);
        assert!(matches!(result, Err(ColometryError::InvalidArgument(_))));
        assert_eq!(report.page_count(), 1);
    }

    #[test]
    fn test_missing_artifact_fails_without_adding_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = ReportDocument::open(dir.path().join("r.pdf"));
        let missing = dir.path().join("missing.png");

        assert!(report.append_page(&record(1), &missing, &missing).is_err());
        assert_eq!(report.page_count(), 0);
    }
}
