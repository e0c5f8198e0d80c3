use crate::error::AppError;
use chrono::NaiveDateTime;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::Path;

const COMPRESS_QUALITY: u8 = 50;
const DEFAULT_QUALITY: u8 = 90;
const BRIGHTEN_FACTOR: f32 = 1.2;
const CONTRAST_FACTOR: f32 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Grayscale,
    Sepia,
    Brighten,
    Contrast,
    Compress,
}

impl Effect {
    /// Unknown names fall through to `None`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "grayscale" => Effect::Grayscale,
            "sepia" => Effect::Sepia,
            "brighten" => Effect::Brighten,
            "contrast" => Effect::Contrast,
            "compress" => Effect::Compress,
            _ => Effect::None,
        }
    }
}

/// The effect a user asked for, along with the literal (lowercased) tag that
/// ends up in the output filename. `glitch` applies `Effect::None` but keeps
/// `glitch` as its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectRequest {
    pub effect: Effect,
    pub tag: String,
}

impl EffectRequest {
    pub fn parse(name: Option<&str>) -> Self {
        let tag = name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "none".to_string());
        Self {
            effect: Effect::from_name(&tag),
            tag,
        }
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            quality: if self.tag == "compress" {
                COMPRESS_QUALITY
            } else {
                DEFAULT_QUALITY
            },
            optimize: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub quality: u8,
    /// Strip source metadata (the embedded ICC profile) from the output.
    pub optimize: bool,
}

pub struct SourceImage {
    pub pixels: DynamicImage,
    pub icc_profile: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub filename: String,
    pub effect_tag: String,
    pub quality: u8,
}

pub fn decode(bytes: &[u8]) -> image::ImageResult<SourceImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let icc_profile = decoder.icc_profile().unwrap_or(None);
    let pixels = DynamicImage::from_decoder(decoder)?;
    Ok(SourceImage {
        pixels,
        icc_profile,
    })
}

pub fn apply_effect(img: &DynamicImage, effect: Effect) -> RgbImage {
    let mut rgb = img.to_rgb8();
    match effect {
        Effect::Grayscale => grayscale(&mut rgb),
        Effect::Sepia => sepia(&mut rgb),
        Effect::Brighten => brighten(&mut rgb, BRIGHTEN_FACTOR),
        Effect::Contrast => contrast(&mut rgb, CONTRAST_FACTOR),
        Effect::Compress | Effect::None => {}
    }
    rgb
}

/// ITU-R 601-2 luma with the same fixed-point rounding PIL uses for "L".
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Blend `from` toward `to`; `alpha` > 1 extrapolates. Truncates, then clamps.
fn blend(from: u8, to: u8, alpha: f32) -> u8 {
    let v = from as f32 + alpha * (to as f32 - from as f32);
    if v <= 0.0 {
        0
    } else if v >= 255.0 {
        255
    } else {
        v as u8
    }
}

fn grayscale(img: &mut RgbImage) {
    for px in img.pixels_mut() {
        let l = luma(px[0], px[1], px[2]);
        px.0 = [l, l, l];
    }
}

fn sepia(img: &mut RgbImage) {
    for px in img.pixels_mut() {
        let [r, g, b] = px.0.map(f64::from);
        let tr = (0.393 * r + 0.769 * g + 0.189 * b) as u32;
        let tg = (0.349 * r + 0.686 * g + 0.168 * b) as u32;
        let tb = (0.272 * r + 0.534 * g + 0.131 * b) as u32;
        px.0 = [tr.min(255) as u8, tg.min(255) as u8, tb.min(255) as u8];
    }
}

fn brighten(img: &mut RgbImage, factor: f32) {
    for px in img.pixels_mut() {
        px.0 = px.0.map(|c| blend(0, c, factor));
    }
}

fn contrast(img: &mut RgbImage, factor: f32) {
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return;
    }
    let sum: u64 = img
        .pixels()
        .map(|px| luma(px[0], px[1], px[2]) as u64)
        .sum();
    let mean = (sum as f64 / count as f64 + 0.5) as u8;
    for px in img.pixels_mut() {
        px.0 = px.0.map(|c| blend(mean, c, factor));
    }
}

pub fn encode_jpeg(
    img: &RgbImage,
    options: EncodeOptions,
    icc_profile: Option<Vec<u8>>,
) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, options.quality);
    if !options.optimize {
        if let Some(icc) = icc_profile {
            encoder
                .set_icc_profile(icc)
                .map_err(image::ImageError::Unsupported)?;
        }
    }
    encoder.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)?;
    Ok(buf)
}

/// The input already decoded, so a failed encode is on our side.
fn encode_failure(err: image::ImageError) -> AppError {
    AppError::Internal(format!("Could not encode JPEG: {}", err))
}

/// `{stem}_{tag}_{YYYYMMDDHHMMSS}.jpg`. Two requests in the same second for
/// the same stem and effect produce the same name; the later one overwrites.
pub fn result_filename(stem: &str, tag: &str, now: NaiveDateTime) -> String {
    let safe_tag: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}_{}.jpg", stem, safe_tag, now.format("%Y%m%d%H%M%S"))
}

/// Decode `original`, apply the requested effect and write a JPEG into
/// `result_dir`. Nothing is written if the source cannot be decoded.
pub fn process_image(
    original: &Path,
    result_dir: &Path,
    effect_name: Option<&str>,
    now: NaiveDateTime,
) -> Result<ProcessedImage, AppError> {
    let request = EffectRequest::parse(effect_name);
    let options = request.encode_options();

    let bytes = std::fs::read(original)?;
    let source = decode(&bytes)?;
    let output = apply_effect(&source.pixels, request.effect);
    let encoded = encode_jpeg(&output, options, source.icc_profile).map_err(encode_failure)?;

    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let filename = result_filename(&stem, &request.tag, now);

    std::fs::create_dir_all(result_dir)?;
    std::fs::write(result_dir.join(&filename), &encoded)?;

    tracing::info!(
        effect = %request.tag,
        quality = options.quality,
        bytes = encoded.len(),
        "Processed image saved as {}",
        filename
    );

    Ok(ProcessedImage {
        filename,
        effect_tag: request.tag,
        quality: options.quality,
    })
}
