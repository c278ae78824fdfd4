//! PNG encoding for RGBA map images.
//!
//! Two color types are produced:
//! - **Indexed (color type 3)** when the image has at most 256 distinct
//!   colors, which is the common case for flat-shaded maps.
//! - **RGBA (color type 6)** otherwise.
//!
//! When a resolution is given, a `pHYs` chunk records it so image viewers
//! and print pipelines size the map correctly.

use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Write;

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Minimum pixels to benefit from parallel palette extraction
const PARALLEL_THRESHOLD: usize = 4096;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const METERS_PER_INCH: f64 = 0.0254;

type Palette = Vec<(u8, u8, u8, u8)>;

/// Encode straight-alpha RGBA pixels, picking indexed or RGBA output.
///
/// `dpi` adds a `pHYs` chunk when set.
pub fn encode_png(pixels: &[u8], width: usize, height: usize, dpi: Option<u32>) -> Result<Vec<u8>, String> {
    check_len(pixels.len(), width * height * 4)?;

    let palette = if width * height >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels)
    } else {
        extract_palette_sequential(pixels)
    };

    match palette {
        Some((palette, indices)) => encode_indexed(width, height, &palette, &indices, dpi),
        None => encode_rgba(pixels, width, height, dpi),
    }
}

fn check_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual != expected {
        return Err(format!(
            "pixel buffer has {} bytes, expected {}",
            actual, expected
        ));
    }
    Ok(())
}

#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

#[inline(always)]
fn unpack_color(packed: u32) -> (u8, u8, u8, u8) {
    (
        packed as u8,
        (packed >> 8) as u8,
        (packed >> 16) as u8,
        (packed >> 24) as u8,
    )
}

fn extract_palette_sequential(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for px in pixels.chunks_exact(4) {
        let packed = pack_color(px[0], px[1], px[2], px[3]);
        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((px[0], px[1], px[2], px[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Collect distinct colors per chunk in parallel, merge, then map pixels
/// to palette indices in a second parallel pass.
fn extract_palette_parallel(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let chunk_pixels = (pixels.len() / 4 / rayon::current_num_threads()).max(256);
    let chunk_size = chunk_pixels * 4;

    let unique: Vec<u32> = pixels
        .par_chunks(chunk_size)
        .flat_map(|chunk| {
            let mut local: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
            for px in chunk.chunks_exact(4) {
                local.insert(pack_color(px[0], px[1], px[2], px[3]), ());
                if local.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            local.into_keys().collect::<Vec<_>>()
        })
        .collect();

    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    for packed in unique {
        if !lookup.contains_key(&packed) {
            if palette.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            lookup.insert(packed, palette.len() as u8);
            palette.push(unpack_color(packed));
        }
    }

    let mut indices = vec![0u8; pixels.len() / 4];
    indices
        .par_chunks_mut(chunk_pixels)
        .zip(pixels.par_chunks(chunk_size))
        .for_each(|(out, px_chunk)| {
            for (idx, px) in out.iter_mut().zip(px_chunk.chunks_exact(4)) {
                *idx = lookup
                    .get(&pack_color(px[0], px[1], px[2], px[3]))
                    .copied()
                    .unwrap_or(0);
            }
        });

    Some((palette, indices))
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// `pHYs` payload: pixels per meter on both axes, unit = meter.
fn phys(dpi: u32) -> Vec<u8> {
    let ppm = (dpi as f64 / METERS_PER_INCH).round() as u32;
    let mut data = Vec::with_capacity(9);
    data.extend_from_slice(&ppm.to_be_bytes());
    data.extend_from_slice(&ppm.to_be_bytes());
    data.push(1);
    data
}

/// Indexed PNG from a palette and one index byte per pixel.
pub fn encode_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
    dpi: Option<u32>,
) -> Result<Vec<u8>, String> {
    check_len(indices.len(), width * height)?;

    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));
    if let Some(dpi) = dpi {
        write_chunk(&mut png, b"pHYs", &phys(dpi));
    }

    let plte: Vec<u8> = palette.iter().flat_map(|&(r, g, b, _)| [r, g, b]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|&(_, _, _, a)| a < 255) {
        let trns: Vec<u8> = palette.iter().map(|&(_, _, _, a)| a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Truecolor-with-alpha PNG.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize, dpi: Option<u32>) -> Result<Vec<u8>, String> {
    check_len(pixels.len(), width * height * 4)?;

    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));
    if let Some(dpi) = dpi {
        write_chunk(&mut png, b"pHYs", &phys(dpi));
    }

    let idat = deflate_scanlines(pixels, width * 4, height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each `row_bytes` scanline with filter type 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_types(png: &[u8]) -> Vec<String> {
        let mut types = Vec::new();
        let mut pos = 8;
        while pos + 8 <= png.len() {
            let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
            types.push(String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string());
            pos += 12 + len;
        }
        types
    }

    #[test]
    fn test_extract_palette_simple() {
        let pixels = [
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 255, 255, // blue
            255, 0, 0, 255, // red again
        ];

        let (palette, indices) = extract_palette_sequential(&pixels).unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_extract_palette_parallel_matches_pixels() {
        let mut pixels = Vec::with_capacity(128 * 128 * 4);
        for y in 0..128u32 {
            for x in 0..128u32 {
                let shade = (((x / 16) + (y / 16)) * 10) as u8;
                pixels.extend_from_slice(&[shade, 200, 255 - shade, 255]);
            }
        }

        let (palette, indices) = extract_palette_parallel(&pixels).unwrap();
        assert_eq!(indices.len(), 128 * 128);
        for (i, px) in pixels.chunks_exact(4).enumerate() {
            assert_eq!(palette[indices[i] as usize], (px[0], px[1], px[2], px[3]));
        }
    }

    #[test]
    fn test_too_many_colors_falls_back_to_rgba() {
        let pixels: Vec<u8> = (0..300u32)
            .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7, 255])
            .collect();
        let png = encode_png(&pixels, 300, 1, None).unwrap();
        // IHDR color type byte
        assert_eq!(png[25], 6);
    }

    #[test]
    fn test_few_colors_is_indexed_with_transparency() {
        let pixels = [255, 0, 0, 255, 0, 0, 0, 0, 255, 0, 0, 255, 0, 0, 0, 0];
        let png = encode_png(&pixels, 2, 2, None).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        assert_eq!(png[25], 3);
        assert_eq!(chunk_types(&png), vec!["IHDR", "PLTE", "tRNS", "IDAT", "IEND"]);
    }

    #[test]
    fn test_phys_chunk_written() {
        let pixels = [10, 20, 30, 255];
        let png = encode_png(&pixels, 1, 1, Some(300)).unwrap();
        assert_eq!(chunk_types(&png), vec!["IHDR", "pHYs", "PLTE", "IDAT", "IEND"]);

        // 300 dpi = 11811 pixels per meter
        let data = &png[33 + 8..33 + 8 + 9];
        assert_eq!(u32::from_be_bytes([data[0], data[1], data[2], data[3]]), 11811);
        assert_eq!(data[8], 1);
    }

    #[test]
    fn test_buffer_length_checked() {
        assert!(encode_png(&[0, 0, 0], 1, 1, None).is_err());
    }
}
