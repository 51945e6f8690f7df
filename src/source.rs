use std::io::Cursor;

use anyhow::Context as _;
use image::{AnimationDecoder, codecs::gif::GifDecoder, codecs::png::PngDecoder};

use crate::{
    error::{DustforgeError, DustforgeResult},
    frame::{DEFAULT_DURATION_TICKS, Frame, delay_ms_to_ticks},
};

/// Declared or sniffed media kind of the input bytes. Only GIF and PNG have
/// dedicated animated paths; everything else decodes as a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Gif,
    Png,
    Other,
}

impl MediaKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            MediaKind::Gif
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            MediaKind::Png
        } else {
            MediaKind::Other
        }
    }
}

/// Decodes raw file bytes into a non-empty ordered frame sequence.
///
/// Animated decode failure falls back to a single-frame decode so a damaged
/// animation still yields usable (if static) output; only total failure is an
/// error.
pub fn decode_frames(bytes: &[u8], kind: MediaKind) -> DustforgeResult<Vec<Frame>> {
    let frames = match kind {
        MediaKind::Gif => match decode_gif(bytes) {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!(
                    "animated gif decode failed ({err}), falling back to first frame only"
                );
                vec![decode_static(bytes)?]
            }
        },
        MediaKind::Png => match decode_png(bytes) {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!("png decode failed ({err}), falling back to generic decode");
                vec![decode_static(bytes)?]
            }
        },
        MediaKind::Other => vec![decode_static(bytes)?],
    };

    if frames.is_empty() {
        return Err(DustforgeError::decode(
            "no frames decoded; try a different file",
        ));
    }
    Ok(frames)
}

fn decode_gif(bytes: &[u8]) -> DustforgeResult<Vec<Frame>> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).context("open gif stream")?;
    collect_animated(decoder)
}

fn decode_png(bytes: &[u8]) -> DustforgeResult<Vec<Frame>> {
    let decoder = PngDecoder::new(Cursor::new(bytes)).context("open png stream")?;
    if decoder.is_apng().context("probe apng")? {
        let apng = decoder.apng().context("open apng stream")?;
        collect_animated(apng)
    } else {
        Ok(vec![decode_static(bytes)?])
    }
}

fn collect_animated<'a>(decoder: impl AnimationDecoder<'a>) -> DustforgeResult<Vec<Frame>> {
    let raw = decoder
        .into_frames()
        .collect_frames()
        .context("decode animation frames")?;

    let frames = raw
        .into_iter()
        .map(|frame| {
            let (num, den) = frame.delay().numer_denom_ms();
            let delay_ms = if den == 0 {
                0.0
            } else {
                f64::from(num) / f64::from(den)
            };
            Frame::new(frame.into_buffer(), delay_ms_to_ticks(delay_ms))
        })
        .collect::<Vec<_>>();

    if frames.is_empty() {
        return Err(DustforgeError::decode("animation contains no frames"));
    }
    Ok(frames)
}

fn decode_static(bytes: &[u8]) -> DustforgeResult<Frame> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| DustforgeError::decode(format!("image decode failed: {e}")))?;
    Ok(Frame::new(img.to_rgba8(), DEFAULT_DURATION_TICKS))
}
