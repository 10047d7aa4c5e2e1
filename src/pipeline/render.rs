//! Rendering sink: [`Document`] → PDF bytes → output file.
//!
//! Every distinct asset becomes one image XObject, referenced by name from
//! each page that shows it, so a card requested forty times is stored once.
//! JPEGs with one or three components go in untouched as `DCTDecode`
//! streams. Everything else (PNG, CMYK JPEG) is decoded to RGB, flattened
//! onto white and left for `compress()` to Flate-encode.
//!
//! Serialising runs on the blocking pool, and the file is written through a
//! temporary sibling that is only renamed into place once complete.

use crate::error::ProxyError;
use crate::output::{AssetFormat, Document, ImageAsset};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream as LoStream};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File name used when the output path is a directory.
pub const DEFAULT_FILE_NAME: &str = "mtg_cards.pdf";

/// Turns a laid-out document into file bytes.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, ProxyError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, ProxyError> {
        if doc.pages.is_empty() {
            return Err(ProxyError::RenderFailed("document has no pages".into()));
        }
        let g = &doc.geometry;
        let mut pdf = LoDocument::with_version("1.5");
        let pages_id = pdf.new_object_id();

        // name → (resource name, object id)
        let mut images: HashMap<String, (String, ObjectId)> = HashMap::new();
        for (i, asset) in doc.distinct_assets().iter().enumerate() {
            let id = pdf.add_object(image_stream(asset)?);
            images.insert(asset.name.clone(), (format!("Im{i}"), id));
        }

        let media_box: Vec<LoObject> = vec![
            0.into(),
            0.into(),
            g.page_width.into(),
            g.page_height.into(),
        ];

        let mut kids = Vec::with_capacity(doc.pages.len());
        for page in &doc.pages {
            let mut content = String::new();
            let mut xobjects = lopdf::Dictionary::new();
            for slot in &page.slots {
                let Some((res_name, id)) = images.get(&slot.asset.name) else {
                    return Err(ProxyError::RenderFailed(format!(
                        "no image object for '{}'",
                        slot.asset.name
                    )));
                };
                content.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    g.cell_width, g.cell_height, slot.x, slot.y, res_name
                ));
                xobjects.set(res_name.as_str(), *id);
            }

            let content_id = pdf.add_object(LoStream::new(dictionary! {}, content.into_bytes()));
            let page_id = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => xobjects,
                },
                "MediaBox" => media_box.clone(),
            });
            kids.push(LoObject::Reference(page_id));
        }

        pdf.objects.insert(
            pages_id,
            LoObject::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => doc.pages.len() as i64,
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);
        pdf.compress();

        let mut buf = Vec::new();
        pdf.save_to(&mut buf)
            .map_err(|e| ProxyError::RenderFailed(format!("PDF serialisation failed: {e}")))?;
        debug!(
            "Rendered {} pages, {} images, {} bytes",
            doc.pages.len(),
            images.len(),
            buf.len()
        );
        Ok(buf)
    }
}

fn image_stream(asset: &ImageAsset) -> Result<LoStream, ProxyError> {
    let passthrough = match (asset.format, asset.components) {
        (AssetFormat::Jpeg, 3) => Some("DeviceRGB"),
        (AssetFormat::Jpeg, 1) => Some("DeviceGray"),
        _ => None,
    };

    if let Some(color_space) = passthrough {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => asset.width as i64,
            "Height" => asset.height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        return Ok(LoStream::new(dict, asset.bytes.clone()).with_compression(false));
    }

    let img = image::load_from_memory(&asset.bytes).map_err(|e| {
        ProxyError::RenderFailed(format!("could not re-decode '{}': {e}", asset.name))
    })?;
    let rgb = flatten_onto_white(img);
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => rgb.width() as i64,
        "Height" => rgb.height() as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    Ok(LoStream::new(dict, rgb.into_raw()))
}

/// Composite any alpha channel over a white background.
fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, p) in rgba.enumerate_pixels() {
        let a = u16::from(p[3]);
        let over = |c: u8| ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, Rgb([over(p[0]), over(p[1]), over(p[2])]));
    }
    out
}

/// Where the document for `output` actually goes.
pub fn resolve_output_path(output: &Path) -> PathBuf {
    if output.is_dir() {
        output.join(DEFAULT_FILE_NAME)
    } else {
        output.to_path_buf()
    }
}

/// Render `doc` and write it atomically; returns the path written.
pub async fn write_document(
    renderer: Arc<dyn DocumentRenderer>,
    doc: Document,
    output: &Path,
) -> Result<PathBuf, ProxyError> {
    let path = resolve_output_path(output);

    let bytes = tokio::task::spawn_blocking(move || renderer.render(&doc))
        .await
        .map_err(|e| ProxyError::Internal(format!("Render task panicked: {e}")))??;

    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
        .await
        .map_err(|e| ProxyError::Internal(format!("Write task panicked: {e}")))??;

    info!("Wrote {}", path.display());
    Ok(path)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ProxyError> {
    let write_err = |source: std::io::Error| ProxyError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Geometry;
    use crate::output::{Page, RenderSlot};
    use crate::pipeline::layout::PageLayout;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encoded(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn jpeg_asset(name: &str) -> Arc<ImageAsset> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 14, Rgb([20, 120, 40])));
        Arc::new(ImageAsset {
            name: name.into(),
            bytes: encoded(img, ImageFormat::Jpeg),
            format: AssetFormat::Jpeg,
            width: 10,
            height: 14,
            components: 3,
        })
    }

    fn png_asset(name: &str) -> Arc<ImageAsset> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(6, 8, Rgba([0, 0, 255, 128])));
        Arc::new(ImageAsset {
            name: name.into(),
            bytes: encoded(img, ImageFormat::Png),
            format: AssetFormat::Png,
            width: 6,
            height: 8,
            components: 4,
        })
    }

    fn image_objects(pdf: &LoDocument) -> usize {
        pdf.objects
            .values()
            .filter(|o| match o {
                LoObject::Stream(s) => {
                    matches!(s.dict.get(b"Subtype"), Ok(LoObject::Name(n)) if n == b"Image")
                }
                _ => false,
            })
            .count()
    }

    #[test]
    fn shared_assets_are_embedded_once() {
        let island = jpeg_asset("Island");
        let forest = png_asset("Forest");
        let mut seq = vec![Arc::clone(&island); 7];
        seq.extend(vec![Arc::clone(&forest); 5]);
        let doc = PageLayout::new(Geometry::default()).layout(&seq);

        let bytes = PdfRenderer::new().render(&doc).unwrap();
        let pdf = LoDocument::load_mem(&bytes).unwrap();

        assert_eq!(pdf.get_pages().len(), 2);
        assert_eq!(image_objects(&pdf), 2);
    }

    #[test]
    fn page_content_draws_every_slot() {
        let island = jpeg_asset("Island");
        let doc = PageLayout::new(Geometry::default()).layout(&vec![island; 4]);
        let bytes = PdfRenderer::new().render(&doc).unwrap();
        let pdf = LoDocument::load_mem(&bytes).unwrap();

        let (_, page_id) = pdf.get_pages().into_iter().next().unwrap();
        let content = String::from_utf8(pdf.get_page_content(page_id).unwrap()).unwrap();
        assert_eq!(content.matches(" Do ").count(), 4);
        assert!(content.contains("180 0 0 252 26 522 cm"), "got: {content}");
    }

    #[test]
    fn empty_document_is_a_render_error() {
        let doc = Document {
            geometry: Geometry::default(),
            pages: Vec::new(),
        };
        assert!(matches!(
            PdfRenderer::new().render(&doc),
            Err(ProxyError::RenderFailed(_))
        ));
    }

    #[test]
    fn alpha_is_flattened_onto_white() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_onto_white(clear).get_pixel(0, 0), &Rgb([255, 255, 255]));
        let solid = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(flatten_onto_white(solid).get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[tokio::test]
    async fn directory_output_uses_default_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let island = jpeg_asset("Island");
        let doc = Document {
            geometry: Geometry::default(),
            pages: vec![Page {
                index: 0,
                slots: vec![RenderSlot {
                    asset: island,
                    page_index: 0,
                    row: 0,
                    column: 0,
                    x: 26.0,
                    y: 522.0,
                }],
            }],
        };

        let written = write_document(Arc::new(PdfRenderer::new()), doc, dir.path())
            .await
            .unwrap();
        assert_eq!(written, dir.path().join(DEFAULT_FILE_NAME));
        let pdf = LoDocument::load(&written).unwrap();
        assert_eq!(pdf.get_pages().len(), 1);

        // Only the finished file remains.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/sheet.pdf");
        let doc = PageLayout::new(Geometry::default()).layout(&[jpeg_asset("Island")]);

        let written = write_document(Arc::new(PdfRenderer), doc, &target).await.unwrap();
        assert_eq!(written, target);
        assert!(target.is_file());
    }
}
