use image::{Rgb, RgbImage};
use rusttype::{point, Font, Scale};
use std::path::Path;
use tracing::debug;

use crate::FixtureError;

pub const PAGE_WIDTH: u32 = 1700;
pub const PAGE_HEIGHT: u32 = 2200;
pub const MARGIN: u32 = 50;
pub const FONT_SIZE: f32 = 24.0;
pub const WRAP_COLUMNS: usize = 80;
const LINE_SPACING: f32 = 10.0;

/// Tried in order when no font is given.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load `explicit`, or the first usable system font.
pub fn load_font(explicit: Option<&Path>) -> Result<Font<'static>, FixtureError> {
    if let Some(path) = explicit {
        let bytes = std::fs::read(path)?;
        return Font::try_from_vec(bytes).ok_or_else(|| FixtureError::BadFont(path.display().to_string()));
    }
    for path in SYSTEM_FONTS {
        if let Ok(bytes) = std::fs::read(path) {
            if let Some(font) = Font::try_from_vec(bytes) {
                debug!("using system font {path}");
                return Ok(font);
            }
        }
    }
    Err(FixtureError::NoFont)
}

/// Word-wrap each line of `text` to at most `width` characters. Words longer
/// than `width` are split. Blank input lines are kept.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        for word in line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.push(word.drain(..width).collect());
            }
            if word.is_empty() {
                continue;
            }
            let current_len = current.chars().count();
            if current_len > 0 && current_len + 1 + word.len() > width {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }
        out.push(current);
    }
    out
}

/// Render a text file onto a white letter-size page and save it as an image.
/// Lines that do not fit above the bottom margin are dropped.
pub fn text_to_image(input: &Path, output: &Path, font: Option<&Path>) -> Result<(), FixtureError> {
    let text = std::fs::read_to_string(input)?;
    let font = load_font(font)?;
    let page = render_page(&text, &font);
    page.save(output)?;
    debug!("rendered {} -> {}", input.display(), output.display());
    Ok(())
}

pub fn render_page(text: &str, font: &Font<'_>) -> RgbImage {
    let mut page = RgbImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, Rgb([255, 255, 255]));
    let scale = Scale::uniform(FONT_SIZE);
    let v = font.v_metrics(scale);
    let advance = (v.ascent - v.descent).ceil() + LINE_SPACING;
    let bottom = (PAGE_HEIGHT - MARGIN) as f32;

    let mut top = MARGIN as f32;
    for line in wrap_text(text, WRAP_COLUMNS) {
        if top + advance > bottom {
            break;
        }
        draw_line(&mut page, font, scale, &line, MARGIN as f32, top + v.ascent);
        top += advance;
    }
    page
}

fn draw_line(page: &mut RgbImage, font: &Font<'_>, scale: Scale, line: &str, x: f32, baseline: f32) {
    for glyph in font.layout(line, scale, point(x, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else { continue };
        glyph.draw(|gx, gy, coverage| {
            let px = bb.min.x + gx as i32;
            let py = bb.min.y + gy as i32;
            if px < 0 || py < 0 || px >= PAGE_WIDTH as i32 || py >= PAGE_HEIGHT as i32 {
                return;
            }
            let pixel = page.get_pixel_mut(px as u32, py as u32);
            // Darken towards black by glyph coverage.
            let ink = (255.0 * (1.0 - coverage.clamp(0.0, 1.0))) as u8;
            for c in pixel.0.iter_mut() {
                *c = (*c).min(ink);
            }
        });
    }
}
