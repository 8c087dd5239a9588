//! Streaming photo decode
//!
//! Photos are raw packed frames: two 4-bit samples per byte, high nibble
//! first, rows of `WIDTH / 2` bytes, no header. The file is read in
//! [`CHUNK`]-byte pieces and drawn pixel by pixel through the frame's
//! addressing, so rotation and clipping apply exactly as for any other
//! drawing.

use platform::storage::File;
use platform::{debug, info, warn};

use crate::display::{BackingStore, FrameBuffer, FRAME_BYTES, WIDTH};

/// Bytes read from the card per request.
pub const CHUNK: usize = 1024;

const ROW_BYTES: usize = WIDTH as usize / 2;

/// How a stored 4-bit sample becomes a panel nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum SampleMap {
    /// Sample is the colour code (7-colour panels).
    #[default]
    Direct,
    /// Sample is a 4-bit grey level shown on a 3-bit grey panel.
    Halve,
}

impl SampleMap {
    /// Apply the mapping to one sample.
    pub const fn apply(self, sample: u8) -> u8 {
        match self {
            Self::Direct => sample & 0x0F,
            Self::Halve => (sample & 0x0F) >> 1,
        }
    }
}

/// Decode failure: reading the photo or writing the frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError<FE: core::fmt::Debug, BE: core::fmt::Debug> {
    /// Reading the photo file failed.
    #[error("photo read failed: {0:?}")]
    Read(FE),
    /// The frame's backing store failed.
    #[error("frame write failed: {0:?}")]
    Frame(BE),
}

/// Draw `bytes`, which start at stream offset `offset`, into `frame`.
pub fn draw_packed<B: BackingStore>(
    frame: &mut FrameBuffer<B>,
    offset: usize,
    bytes: &[u8],
    map: SampleMap,
) -> Result<(), B::Error> {
    for (i, &byte) in bytes.iter().enumerate() {
        let o = offset.saturating_add(i);
        let (Ok(y), Ok(x)) = (i32::try_from(o / ROW_BYTES), i32::try_from((o % ROW_BYTES).saturating_mul(2))) else {
            // Beyond any canvas; the remaining bytes are off-canvas too.
            return Ok(());
        };
        frame.set_nibble(x, y, map.apply(byte >> 4))?;
        frame.set_nibble(x.saturating_add(1), y, map.apply(byte))?;
    }
    Ok(())
}

/// Stream `file` into `frame` until end of file.
///
/// Returns the number of bytes drawn. A file shorter than one frame leaves
/// the rest of the frame as it was and is only reported in the log.
pub async fn render_photo<F: File, B: BackingStore>(
    file: &mut F,
    frame: &mut FrameBuffer<B>,
    map: SampleMap,
) -> Result<usize, RenderError<F::Error, B::Error>> {
    let mut chunk = [0u8; CHUNK];
    let mut total = 0usize;
    loop {
        let n = file.read(&mut chunk).await.map_err(RenderError::Read)?;
        if n == 0 {
            break;
        }
        let bytes = chunk.get(..n).unwrap_or(&chunk);
        draw_packed(frame, total, bytes, map).map_err(RenderError::Frame)?;
        total = total.saturating_add(n);
        debug!("Decoded {} bytes", total);
    }
    info!("Read {} bytes", total);
    if total < FRAME_BYTES {
        warn!("Short image: {} bytes missing", FRAME_BYTES.saturating_sub(total));
    }
    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::display::LocalBacking;

    #[test]
    fn second_row_starts_after_row_bytes() {
        let mut bytes = vec![0x11u8; FRAME_BYTES];
        let mut fb = FrameBuffer::new(LocalBacking::new(&mut bytes));
        draw_packed(&mut fb, ROW_BYTES, &[0x34], SampleMap::Direct).unwrap();
        assert_eq!(fb.nibble(0, 1).unwrap(), Some(3));
        assert_eq!(fb.nibble(1, 1).unwrap(), Some(4));
        assert_eq!(fb.nibble(0, 0).unwrap(), Some(1));
    }

    #[test]
    fn halve_maps_grey_levels() {
        assert_eq!(SampleMap::Halve.apply(0xF), 7);
        assert_eq!(SampleMap::Halve.apply(0x1), 0);
        assert_eq!(SampleMap::Direct.apply(0xF6), 6);
    }

    #[test]
    fn bytes_past_the_frame_are_clipped() {
        let mut bytes = vec![0x11u8; FRAME_BYTES];
        let mut fb = FrameBuffer::new(LocalBacking::new(&mut bytes));
        draw_packed(&mut fb, FRAME_BYTES, &[0x00; 4], SampleMap::Direct).unwrap();
        drop(fb);
        assert!(bytes.iter().all(|&b| b == 0x11));
    }
}
