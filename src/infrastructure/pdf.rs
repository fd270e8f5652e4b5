//! PDF export of an archive.
//!
//! Renders paginated A4 documents with `printpdf`, embedding downloaded
//! images, then hands the raw file to Ghostscript for compression when it
//! is installed.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};

use crate::domain::{AppError, Archive, MediaKind, PdfConfig, Result};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const LEFT: f32 = 10.0;
const RIGHT: f32 = 200.0;
const IMAGE_WIDTH: f32 = 150.0;
const IMAGE_DPI: f32 = 300.0;
const PT_TO_MM: f32 = 0.352_778;
const LAYER: &str = "Layer 1";

/// System font directories searched before the configured ones.
const FONT_SEARCH_DIRS: &[&str] = &["/usr/share/fonts/truetype/noto/", "/usr/share/fonts/noto/"];
const FONT_REGULAR: &str = "NotoSans-Regular.ttf";
const FONT_BOLD: &str = "NotoSans-Bold.ttf";
const FONT_ITALIC: &str = "NotoSans-Italic.ttf";

#[derive(Debug, Clone, Copy)]
enum Style {
    Regular,
    Bold,
    Italic,
}

/// Loaded font set. Missing NotoSans styles fall back to Regular.
struct Fonts {
    regular: IndirectFontRef,
    bold: Option<IndirectFontRef>,
    italic: Option<IndirectFontRef>,
    unicode: bool,
}

impl Fonts {
    fn get(&self, style: Style) -> &IndirectFontRef {
        match style {
            Style::Regular => &self.regular,
            Style::Bold => self.bold.as_ref().unwrap_or(&self.regular),
            Style::Italic => self.italic.as_ref().unwrap_or(&self.regular),
        }
    }

    fn load(doc: &PdfDocumentReference, extra_dirs: &[PathBuf]) -> Result<Self> {
        if let Some(dir) = find_font_dir(extra_dirs) {
            let regular = load_font_file(doc, &dir.join(FONT_REGULAR))?;
            let optional = |name: &str| {
                let path = dir.join(name);
                if !path.exists() {
                    return None;
                }
                load_font_file(doc, &path)
                    .map_err(|e| tracing::warn!(font = %path.display(), "Skipping font: {e}"))
                    .ok()
            };
            tracing::info!(dir = %dir.display(), "Using NotoSans fonts");
            return Ok(Self {
                regular,
                bold: optional(FONT_BOLD),
                italic: optional(FONT_ITALIC),
                unicode: true,
            });
        }

        tracing::warn!("NotoSans not found, falling back to Helvetica (non Latin-1 characters replaced)");
        Ok(Self {
            regular: doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(AppError::pdf)?,
            bold: Some(
                doc.add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(AppError::pdf)?,
            ),
            italic: Some(
                doc.add_builtin_font(BuiltinFont::HelveticaOblique)
                    .map_err(AppError::pdf)?,
            ),
            unicode: false,
        })
    }
}

fn find_font_dir(extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    FONT_SEARCH_DIRS
        .iter()
        .map(PathBuf::from)
        .chain(extra_dirs.iter().cloned())
        .chain(std::iter::once(PathBuf::from("./")))
        .find(|dir| dir.join(FONT_REGULAR).exists())
}

fn load_font_file(doc: &PdfDocumentReference, path: &Path) -> Result<IndirectFontRef> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open font {}", path.display()), e))?;
    doc.add_external_font(file).map_err(AppError::pdf)
}

/// Replace characters the built-in fonts cannot encode.
#[must_use]
pub fn to_latin1_lossy(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
        .collect()
}

/// Greedy word wrap to at most `max_chars` columns per line.
///
/// Line breaks in `text` are kept; words longer than a line are split.
#[must_use]
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let options = textwrap::Options::new(max_chars.max(1))
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
        .wrap_algorithm(textwrap::WrapAlgorithm::FirstFit);

    textwrap::wrap(text, options)
        .into_iter()
        .map(std::borrow::Cow::into_owned)
        .collect()
}

fn chars_per_line(font_size: f32) -> usize {
    let avg_char_mm = font_size * 0.5 * PT_TO_MM;
    ((RIGHT - LEFT) / avg_char_mm) as usize
}

/// Cursor over the document being written.
struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str, font_dirs: &[PathBuf]) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        let layer = doc.get_page(page).get_layer(layer);
        let fonts = Fonts::load(&doc, font_dirs)?;

        Ok(Self {
            doc,
            layer,
            fonts,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.new_page();
        }
    }

    fn prepare(&self, text: &str) -> String {
        let text = text.replace('\t', "    ");
        if self.fonts.unicode {
            text
        } else {
            to_latin1_lossy(&text)
        }
    }

    fn line(&mut self, text: &str, style: Style, size: f32, height: f32, centered: bool) {
        self.ensure_space(height);
        let text = self.prepare(text);

        let x = if centered {
            let width = text.chars().count() as f32 * size * 0.5 * PT_TO_MM;
            ((PAGE_WIDTH - width) / 2.0).max(LEFT)
        } else {
            LEFT
        };

        self.y -= height;
        self.layer
            .use_text(text, size, Mm(x), Mm(self.y), self.fonts.get(style));
    }

    fn paragraph(&mut self, text: &str, size: f32, line_height: f32) {
        for line in wrap_text(text, chars_per_line(size)) {
            self.line(&line, Style::Regular, size, line_height, false);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
        if self.y < MARGIN {
            self.new_page();
        }
    }

    fn separator(&mut self) {
        self.ensure_space(1.0);
        let line = Line {
            points: vec![
                (Point::new(Mm(LEFT), Mm(self.y)), false),
                (Point::new(Mm(RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
        };
        self.layer.add_line(line);
    }

    fn image(&mut self, path: &Path) -> Result<()> {
        let buffer = image::open(path).map_err(AppError::pdf)?.to_rgb8();
        let (width_px, height_px) = buffer.dimensions();
        let rgb = image::DynamicImage::ImageRgb8(buffer);

        let px_to_mm = 25.4 / IMAGE_DPI;
        let natural_width = width_px as f32 * px_to_mm;
        let natural_height = height_px as f32 * px_to_mm;
        if natural_width <= 0.0 || natural_height <= 0.0 {
            return Err(AppError::pdf("empty image"));
        }

        let max_height = PAGE_HEIGHT - 2.0 * MARGIN;
        let mut scale = IMAGE_WIDTH / natural_width;
        if natural_height * scale > max_height {
            scale = max_height / natural_height;
        }
        let height = natural_height * scale;

        self.ensure_space(height);
        self.y -= height;

        Image::from_dynamic_image(&rgb).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(LEFT)),
                translate_y: Some(Mm(self.y)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );

        Ok(())
    }

    fn save(self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))?;
        self.doc
            .save(&mut BufWriter::new(file))
            .map_err(AppError::pdf)
    }
}

/// Render `archive` to `output`, compressing with Ghostscript when enabled.
///
/// # Errors
/// Returns error if the document cannot be built or written.
pub fn render_pdf(archive: &Archive, output: &Path, title: &str, config: &PdfConfig) -> Result<()> {
    let raw = output.with_extension("raw.pdf");
    println!(
        "🎨 Rendering raw PDF: {}...",
        raw.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    );

    let mut pdf = PdfWriter::new(title, &config.font_dirs)?;

    pdf.line(title, Style::Bold, 16.0, 10.0, true);
    let generated = format!(
        "Generated on: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    pdf.line(&generated, Style::Italic, 10.0, 10.0, true);
    pdf.gap(10.0);

    for (i, msg) in archive.sorted_by_date_desc().iter().enumerate() {
        let heading = format!(
            "{}. Post from {} ({})",
            i + 1,
            msg.date,
            msg.status().to_uppercase()
        );
        pdf.line(&heading, Style::Bold, 12.0, 10.0, false);
        pdf.paragraph(&msg.content, 10.0, 5.0);
        pdf.gap(2.0);

        for item in &msg.media {
            if item.kind != MediaKind::Image {
                continue;
            }
            let path = Path::new(&item.url);
            if !path.exists() {
                continue;
            }
            match pdf.image(path) {
                Ok(()) => pdf.gap(5.0),
                Err(e) => {
                    tracing::warn!(image = %item.url, "Image not embedded: {e}");
                    pdf.line(&format!("[Image error: {e}]"), Style::Italic, 8.0, 5.0, false);
                }
            }
        }

        pdf.gap(10.0);
        pdf.separator();
        pdf.gap(5.0);
    }

    pdf.save(&raw)?;

    if config.compress {
        compress_pdf(&raw, output)
    } else {
        finalize_uncompressed(&raw, output)
    }
}

/// Compress `input` into `output` with Ghostscript.
///
/// A missing or failing `gs` leaves the uncompressed document at `output`.
///
/// # Errors
/// Returns error if the fallback rename or the cleanup fails.
pub fn compress_pdf(input: &Path, output: &Path) -> Result<()> {
    println!("🗜️  Compressing PDF using Ghostscript...");

    let status = Command::new("gs")
        .args([
            "-sDEVICE=pdfwrite",
            "-dCompatibilityLevel=1.4",
            "-dPDFSETTINGS=/screen",
            "-dNOPAUSE",
            "-dQUIET",
            "-dBATCH",
        ])
        .arg(format!("-sOutputFile={}", output.display()))
        .arg(input)
        .status();

    match status {
        Ok(status) if status.success() => {
            if input != output {
                std::fs::remove_file(input).map_err(|e| {
                    AppError::io(format!("Failed to remove {}", input.display()), e)
                })?;
            }
            Ok(())
        }
        Ok(status) => {
            tracing::warn!(%status, "Ghostscript failed, keeping uncompressed PDF");
            finalize_uncompressed(input, output)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Ghostscript (gs) not found in system. Compression skipped.");
            finalize_uncompressed(input, output)
        }
        Err(e) => {
            tracing::warn!("Could not run Ghostscript: {e}");
            finalize_uncompressed(input, output)
        }
    }
}

fn finalize_uncompressed(raw: &Path, output: &Path) -> Result<()> {
    std::fs::rename(raw, output)
        .map_err(|e| AppError::io(format!("Failed to move {} into place", raw.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, SocialExtension};
    use tempfile::tempdir;

    #[test]
    fn test_to_latin1_lossy() {
        assert_eq!(to_latin1_lossy("zażółć é 🚀"), "za?ó?? é ?");
        assert_eq!(to_latin1_lossy("plain"), "plain");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("ab cdefghij", 4), vec!["ab", "cdef", "ghij"]);
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn test_chars_per_line_shrinks_with_size() {
        assert!(chars_per_line(10.0) > chars_per_line(12.0));
        assert!(chars_per_line(10.0) > 50);
    }

    #[test]
    fn test_render_pdf_without_compression() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("archive.pdf");

        let mut archive = Archive::default();
        archive.upsert(Message::new("1", "2024-01-01", "sent", "Hello\n\nWorld ✓"));
        let mut post = Message::new("2", "2024-02-01", "scheduled", "Second post")
            .with_social(SocialExtension::default());
        post.media.push(crate::domain::MediaItem::image(
            dir.path().join("missing.jpg").to_string_lossy(),
        ));
        archive.upsert(post);

        let config = PdfConfig {
            font_dirs: Vec::new(),
            compress: false,
        };
        render_pdf(&archive, &output, "Test Archive", &config).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!dir.path().join("archive.raw.pdf").exists());
    }

    #[test]
    fn test_finalize_moves_raw_file() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("a.raw.pdf");
        let out = dir.path().join("a.pdf");
        std::fs::write(&raw, b"%PDF-1.3").unwrap();

        finalize_uncompressed(&raw, &out).unwrap();
        assert!(out.exists());
        assert!(!raw.exists());
    }
}
