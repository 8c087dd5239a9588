//! xtask pack-image - turn ordinary images into frame files for the card.
//!
//! Output is the raw panel format the firmware streams: 600x448 pixels,
//! row-major, two pixels per byte with the left pixel in the high nibble.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use firmware::{AcepColor, FRAME_BYTES, HEIGHT, WIDTH};
use image::imageops::FilterType;
use image::RgbImage;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Target colour set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    /// The seven ink colours of the ACeP panel (nibbles 0 to 6).
    Acep,
    /// Sixteen grey levels, nibble 0 black to 15 white.
    Grey,
}

/// Entry point called from main.rs
pub fn run(input: &Path, output: &Path, palette: Palette, dither: bool) -> Result<()> {
    if input.is_dir() {
        std::fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
        let sources = scan_images(input)?;
        println!("Packing {} image(s) from {}", sources.len(), input.display());
        for source in sources {
            let target = output.join(source.with_extension("bin").file_name().unwrap_or_default());
            pack_file(&source, &target, palette, dither)?;
        }
        Ok(())
    } else {
        pack_file(input, output, palette, dither)
    }
}

fn pack_file(source: &Path, target: &Path, palette: Palette, dither: bool) -> Result<()> {
    let img = image::open(source).with_context(|| format!("decoding {}", source.display()))?;
    let rgb = img.resize_to_fill(WIDTH, HEIGHT, FilterType::Lanczos3).to_rgb8();
    let packed = pack(&rgb, palette, dither);
    std::fs::write(target, &packed).with_context(|| format!("writing {}", target.display()))?;
    println!("  {} {} -> {}", "✓".green(), source.display(), target.display());
    Ok(())
}

/// Image files directly inside `dir`, sorted by name.
fn scan_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if entry.file_type().is_file() && is_image {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Quantise a `WIDTH`x`HEIGHT` image and pack it into panel bytes.
pub(crate) fn pack(rgb: &RgbImage, palette: Palette, dither: bool) -> Vec<u8> {
    let (w, h) = (WIDTH as usize, HEIGHT as usize);
    // Working copy in floating point so diffused error can exceed 0..=255.
    let mut work: Vec<[f32; 3]> = rgb.pixels().map(|p| p.0.map(f32::from)).collect();
    work.resize(w * h, [255.0; 3]);
    let mut out = vec![0u8; FRAME_BYTES];

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let old = work[i];
            let (nibble, new) = nearest(palette, old);
            let byte = &mut out[i / 2];
            *byte |= if i % 2 == 0 { nibble << 4 } else { nibble };

            if !dither {
                continue;
            }
            let err = [old[0] - new[0], old[1] - new[1], old[2] - new[2]];
            let mut spread = |dx: isize, dy: usize, weight: f32| {
                let nx = x as isize + dx;
                let ny = y + dy;
                if nx < 0 || nx >= w as isize || ny >= h {
                    return;
                }
                let px = &mut work[ny * w + nx as usize];
                for c in 0..3 {
                    px[c] += err[c] * weight;
                }
            };
            spread(1, 0, 7.0 / 16.0);
            spread(-1, 1, 3.0 / 16.0);
            spread(0, 1, 5.0 / 16.0);
            spread(1, 1, 1.0 / 16.0);
        }
    }
    out
}

/// Closest palette entry to `px`, returned as (nibble, its colour).
fn nearest(palette: Palette, px: [f32; 3]) -> (u8, [f32; 3]) {
    match palette {
        Palette::Acep => (0u8..7)
            .filter_map(|n| AcepColor::from_nibble(n).map(|c| (n, c.rgb().map(f32::from))))
            .min_by(|(_, a), (_, b)| distance(px, *a).total_cmp(&distance(px, *b)))
            .unwrap_or((1, [255.0; 3])),
        Palette::Grey => {
            let luma = 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2];
            let level = (luma / 17.0).round().clamp(0.0, 15.0) as u8;
            let v = f32::from(level) * 17.0;
            (level, [v; 3])
        }
    }
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(WIDTH, HEIGHT, Rgb(rgb))
    }

    #[test]
    fn pure_palette_colours_map_to_their_nibble() {
        for n in 0u8..7 {
            let colour = AcepColor::from_nibble(n).unwrap().rgb();
            let packed = pack(&solid(colour), Palette::Acep, true);
            assert_eq!(packed.len(), FRAME_BYTES);
            assert!(packed.iter().all(|&b| b == n * 0x11), "nibble {n}");
        }
    }

    #[test]
    fn left_pixel_lands_in_the_high_nibble() {
        let mut img = solid([255, 255, 255]);
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        let packed = pack(&img, Palette::Grey, false);
        assert_eq!(packed[0], 0x0F);
        assert_eq!(packed[1], 0xFF);
    }

    #[test]
    fn mid_grey_dithers_to_a_mix_of_inks() {
        let packed = pack(&solid([128, 128, 128]), Palette::Acep, true);
        let nibbles: Vec<u8> = packed.iter().flat_map(|b| [b >> 4, b & 0x0F]).collect();
        let black = nibbles.iter().filter(|&&n| n == 0).count();
        let white = nibbles.iter().filter(|&&n| n == 1).count();
        assert!(black > 0 && white > 0);
    }

    #[test]
    fn directory_input_packs_every_image() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(32, 24, Rgb([255, 0, 0])).save(src.path().join("red.png")).unwrap();
        std::fs::write(src.path().join("notes.txt"), "skip me").unwrap();

        run(src.path(), dst.path(), Palette::Acep, false).unwrap();

        let packed = std::fs::read(dst.path().join("red.bin")).unwrap();
        assert_eq!(packed.len(), FRAME_BYTES);
        assert!(!dst.path().join("notes.bin").exists());
    }
}
