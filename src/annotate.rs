// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drawing of orientation predictions onto the source image.

use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::results::Results;

/// Environment variable pointing at a TTF/OTF font used for labels.
pub const FONT_ENV: &str = "DOCORI_FONT";

/// Font files probed inside the platform font directory.
const FONT_FILE_NAMES: &[&str] = &["DejaVuSans.ttf", "Arial.ttf", "arial.ttf", "Helvetica.ttc"];

/// Absolute font locations found on common systems.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT: OnceLock<Option<FontVec>> = OnceLock::new();
static MISSING_FONT_WARNING: Once = Once::new();

/// Ultralytics Color Palette
pub const COLORS: [[u8; 3]; 20] = [
    [4, 42, 255],    // #042aff
    [11, 219, 235],  // #0bdbeb
    [243, 243, 243], // #f3f3f3
    [0, 223, 183],   // #00dfb7
    [17, 31, 104],   // #111f68
    [255, 111, 221], // #ff6fdd
    [255, 68, 79],   // #ff444f
    [204, 237, 0],   // #cced00
    [0, 243, 68],    // #00f344
    [189, 0, 255],   // #bd00ff
    [0, 180, 255],   // #00b4ff
    [221, 0, 186],   // #dd00ba
    [0, 255, 255],   // #00ffff
    [38, 192, 0],    // #26c000
    [1, 255, 179],   // #01ffb3
    [125, 36, 255],  // #7d24ff
    [123, 0, 104],   // #7b0068
    [255, 27, 108],  // #ff1b6c
    [252, 109, 47],  // #fc6d2f
    [162, 255, 11],  // #a2ff0b
];

/// Get color for a class ID
#[must_use]
pub const fn get_class_color(class_id: usize) -> Rgb<u8> {
    Rgb(COLORS[class_id % COLORS.len()])
}

/// Black or white, whichever reads better on `background`.
#[must_use]
pub fn text_color(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luminance = 0.299f32.mul_add(
        f32::from(r),
        0.587f32.mul_add(f32::from(g), 0.114 * f32::from(b)),
    );
    if luminance > 150.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

/// Find a usable font file.
///
/// `DOCORI_FONT` wins when it points at an existing file; otherwise the
/// platform font directory and a list of well-known paths are probed.
#[must_use]
pub fn find_font() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(FONT_ENV).map(PathBuf::from)
        && path.is_file()
    {
        return Some(path);
    }

    let from_font_dir = dirs::font_dir().into_iter().flat_map(|dir| {
        FONT_FILE_NAMES
            .iter()
            .map(move |name| dir.join(name))
            .collect::<Vec<_>>()
    });

    from_font_dir
        .chain(SYSTEM_FONT_PATHS.iter().map(PathBuf::from))
        .find(|p| p.is_file())
}

fn read_font(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Font used for labels, loaded once per process.
fn label_font() -> Option<&'static FontVec> {
    FONT.get_or_init(|| find_font().as_deref().and_then(read_font))
        .as_ref()
}

/// Label font height in pixels for an image of the given size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn font_size_for(width: u32, height: u32) -> f32 {
    (width.min(height) as f32 * 0.04).clamp(12.0, 64.0)
}

/// Draw the top-k predictions as a filled label band in the top-left corner.
///
/// The band takes the palette colour of the top-1 class and holds one
/// `"<label> <score>"` line per reported class. Without a font the band is
/// still drawn and a warning is printed once per process.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn annotate_image(image: &DynamicImage, result: &Results) -> DynamicImage {
    let mut img = image.to_rgb8();
    let (width, height) = img.dimensions();

    let lines: Vec<String> = result
        .label_names()
        .iter()
        .zip(result.scores())
        .map(|(label, score)| format!("{label} {score:.2}"))
        .collect();
    let Some(top1) = result.class_ids().first().copied() else {
        return DynamicImage::ImageRgb8(img);
    };

    let px = font_size_for(width, height);
    let scale = PxScale::from(px);
    let pad = (px * 0.3).ceil() as u32;
    let line_height = px.ceil() as u32;
    let font = label_font();

    let text_width = lines
        .iter()
        .map(|line| match font {
            Some(f) => text_size(scale, f, line).0,
            None => (line.chars().count() as f32 * px * 0.6).ceil() as u32,
        })
        .max()
        .unwrap_or(0);

    let band_w = (text_width + 2 * pad).clamp(1, width.max(1));
    let band_h = (line_height * lines.len() as u32 + 2 * pad).clamp(1, height.max(1));
    let band_color = get_class_color(top1);
    draw_filled_rect_mut(&mut img, Rect::at(0, 0).of_size(band_w, band_h), band_color);

    match font {
        Some(f) => {
            let color = text_color(band_color);
            for (i, line) in lines.iter().enumerate() {
                let y = pad + line_height * i as u32;
                draw_text_mut(&mut img, color, pad as i32, y as i32, scale, f, line);
            }
        }
        None => MISSING_FONT_WARNING.call_once(|| {
            crate::warn!(
                "No label font found, set {FONT_ENV} to a .ttf file to draw text on saved images"
            );
        }),
    }

    DynamicImage::ImageRgb8(img)
}
