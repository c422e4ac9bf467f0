use anyhow::{anyhow, Result};

use crate::frame::{rgb_len, PixelFormat};

/// Bytes per line of the first plane when rows carry no padding.
pub(crate) fn packed_stride(width: u32, format: PixelFormat) -> usize {
    match format {
        PixelFormat::Rgb24 => width as usize * 3,
        PixelFormat::Nv12 => width as usize,
    }
}

/// Convert a raw capture buffer into packed RGB24.
///
/// `stride` is the device's bytes-per-line for the first plane (for NV12 the
/// chroma plane uses the same stride). Anything past the image payload of each
/// row is dropped.
pub(crate) fn to_rgb24(
    raw: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let row_bytes = packed_stride(width, format);
    if stride < row_bytes {
        return Err(anyhow!(
            "{:?} stride {} is shorter than a {}-pixel row",
            format,
            stride,
            width
        ));
    }
    match format {
        PixelFormat::Rgb24 => {
            let expected = rgb_len(width, height)?;
            let needed = plane_len(stride, row_bytes, height as usize)?;
            if raw.len() < needed {
                return Err(anyhow!(
                    "RGB24 capture too short: expected {} bytes, got {}",
                    needed,
                    raw.len()
                ));
            }
            let mut rgb = Vec::with_capacity(expected);
            for row in raw.chunks(stride).take(height as usize) {
                rgb.extend_from_slice(&row[..row_bytes]);
            }
            Ok(rgb)
        }
        PixelFormat::Nv12 => nv12_to_rgb24(raw, width as usize, height as usize, stride),
    }
}

/// Bytes spanned by `rows` rows, the last one not necessarily padded.
fn plane_len(stride: usize, row_bytes: usize, rows: usize) -> Result<usize> {
    if rows == 0 {
        return Ok(0);
    }
    stride
        .checked_mul(rows - 1)
        .and_then(|v| v.checked_add(row_bytes))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn nv12_to_rgb24(raw: &[u8], width: usize, height: usize, stride: usize) -> Result<Vec<u8>> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(anyhow!("NV12 needs even dimensions, got {}x{}", width, height));
    }
    let chroma_start = stride
        .checked_mul(height)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = chroma_start + plane_len(stride, width, height / 2)?;
    if raw.len() < expected {
        return Err(anyhow!(
            "NV12 capture too short: expected {} bytes, got {}",
            expected,
            raw.len()
        ));
    }

    let (luma, chroma) = raw.split_at(chroma_start);
    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let luma_row = &luma[row * stride..row * stride + width];
        let chroma_row = &chroma[(row / 2) * stride..(row / 2) * stride + width];
        for (col, &y) in luma_row.iter().enumerate() {
            let pair = (col / 2) * 2;
            let u = chroma_row[pair] as f32 - 128.0;
            let v = chroma_row[pair + 1] as f32 - 128.0;
            let y = y as f32;
            rgb.push(saturate(y + 1.402 * v));
            rgb.push(saturate(y - 0.344_136 * u - 0.714_136 * v));
            rgb.push(saturate(y + 1.772 * u));
        }
    }
    Ok(rgb)
}

fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
