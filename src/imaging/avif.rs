//! AVIF encoding with 4:2:0 chroma.
//!
//! RGB is converted to full-range BT.601 YCbCr, chroma is averaged over 2x2
//! blocks, and the planes go to rav1e as one still key frame. Alpha, when
//! the image has any, is a second monochrome frame. `avif-serialize` wraps
//! both in the container.

use super::backend::BackendError;
use super::params::Quality;
use avif_serialize::Aviffy;
use avif_serialize::constants::MatrixCoefficients as AvifMatrix;
use image::{DynamicImage, RgbaImage};
use rav1e::prelude::*;

fn encode_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Encode(format!("AVIF encode failed: {e}"))
}

/// Map 1-100 quality onto rav1e's 0-255 quantizer.
///
/// Piecewise so the top of the quality range spreads over more quantizer
/// steps, where the visual difference is largest.
fn quantizer(quality: Quality) -> u8 {
    let q = quality.value() as f32 / 100.0;
    let x = if q >= 0.82 {
        (1.0 - q) * 2.6
    } else if q > 0.25 {
        1.0 - 0.125 - q * 0.5
    } else {
        1.0 - q
    };
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Full-range BT.601 RGB → (Y, Cb, Cr).
fn ycbcr([r, g, b]: [f32; 3]) -> [f32; 3] {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = (b - y) * (0.5 / (1.0 - 0.114)) + 128.0;
    let cr = (r - y) * (0.5 / (1.0 - 0.299)) + 128.0;
    [y, cb, cr]
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Planar 4:2:0 image: full-size luma, half-size chroma (rounded up).
struct Planes420 {
    width: usize,
    height: usize,
    y: Vec<u8>,
    cb: Vec<u8>,
    cr: Vec<u8>,
}

impl Planes420 {
    fn chroma_width(&self) -> usize {
        self.width.div_ceil(2)
    }

    fn from_rgba(img: &RgbaImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
        let mut y = Vec::with_capacity(width * height);
        let mut cb_sum = vec![0f32; cw * ch];
        let mut cr_sum = vec![0f32; cw * ch];
        let mut count = vec![0f32; cw * ch];

        for (px, py, pixel) in img.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            let [luma, cb, cr] = ycbcr([r as f32, g as f32, b as f32]);
            y.push(to_u8(luma));
            let i = (py as usize / 2) * cw + px as usize / 2;
            cb_sum[i] += cb;
            cr_sum[i] += cr;
            count[i] += 1.0;
        }

        let average = |sums: Vec<f32>| {
            sums.iter()
                .zip(&count)
                .map(|(sum, n)| to_u8(sum / n))
                .collect::<Vec<u8>>()
        };
        Planes420 {
            width,
            height,
            y,
            cb: average(cb_sum),
            cr: average(cr_sum),
        }
    }
}

fn encoder_config(
    width: usize,
    height: usize,
    chroma_sampling: ChromaSampling,
    quality: Quality,
    speed: u8,
) -> Config {
    let mut enc = EncoderConfig::with_speed_preset(speed);
    enc.width = width;
    enc.height = height;
    enc.bit_depth = 8;
    enc.chroma_sampling = chroma_sampling;
    enc.chroma_sample_position = ChromaSamplePosition::Unknown;
    enc.pixel_range = PixelRange::Full;
    enc.color_description = Some(ColorDescription {
        color_primaries: ColorPrimaries::BT709,
        transfer_characteristics: TransferCharacteristics::SRGB,
        matrix_coefficients: MatrixCoefficients::BT601,
    });
    enc.still_picture = true;
    enc.quantizer = quantizer(quality) as usize;
    enc.min_quantizer = quantizer(quality);
    Config::new().with_encoder_config(enc)
}

/// Encode one frame and return the key frame's AV1 payload.
fn encode_frame(
    config: Config,
    fill: impl FnOnce(&mut Frame<u8>),
) -> Result<Vec<u8>, BackendError> {
    let mut ctx: Context<u8> = config.new_context().map_err(encode_error)?;
    let mut frame = ctx.new_frame();
    fill(&mut frame);
    ctx.send_frame(frame).map_err(encode_error)?;
    ctx.flush();

    let mut out = Vec::new();
    loop {
        match ctx.receive_packet() {
            Ok(mut packet) => {
                if packet.frame_type == FrameType::KEY {
                    out.append(&mut packet.data);
                }
            }
            Err(EncoderStatus::Encoded | EncoderStatus::LimitReached) => break,
            Err(e) => return Err(encode_error(e)),
        }
    }
    Ok(out)
}

/// Encode `img` as an 8-bit 4:2:0 AVIF still image.
pub(super) fn encode_avif(
    img: &DynamicImage,
    quality: Quality,
    speed: u8,
) -> Result<Vec<u8>, BackendError> {
    let rgba = img.to_rgba8();
    let planes = Planes420::from_rgba(&rgba);
    let (width, height) = (planes.width, planes.height);

    let color_config = encoder_config(width, height, ChromaSampling::Cs420, quality, speed);
    let color = encode_frame(color_config, |frame| {
        frame.planes[0].copy_from_raw_u8(&planes.y, width, 1);
        frame.planes[1].copy_from_raw_u8(&planes.cb, planes.chroma_width(), 1);
        frame.planes[2].copy_from_raw_u8(&planes.cr, planes.chroma_width(), 1);
    })?;

    let alpha = if img.color().has_alpha() {
        let alpha_plane: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let alpha_config = encoder_config(width, height, ChromaSampling::Cs400, quality, speed);
        Some(encode_frame(alpha_config, |frame| {
            frame.planes[0].copy_from_raw_u8(&alpha_plane, width, 1);
        })?)
    } else {
        None
    };

    let avif = Aviffy::new()
        .set_seq_profile(0)
        .set_chroma_subsampling((true, true))
        .set_full_color_range(true)
        .matrix_coefficients(AvifMatrix::Bt601)
        .to_vec(&color, alpha.as_deref(), width as u32, height as u32, 8);
    Ok(avif)
}
