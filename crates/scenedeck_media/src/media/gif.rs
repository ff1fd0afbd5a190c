use std::io::Cursor;
use std::time::Duration;

use gif::{ColorOutput, DecodeOptions, DisposalMethod};
use image::RgbaImage;

use crate::error::DecodeError;
use crate::media::{DecodedImage, MIN_FRAME_DELAY};
use crate::Result;

/// Decode a GIF byte buffer into fully-composited frames.
///
/// The `gif` crate handles LZW decompression and hands us per-frame
/// patches: the dirty rectangle, an RGBA buffer (alpha 0 where the patch
/// is transparent), a disposal method, and a delay in centiseconds. The
/// compositor below turns that patch stream into full-canvas frames.
pub fn decode_gif(bytes: &[u8]) -> Result<DecodedImage> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::RGBA);
    let mut reader = options
        .read_info(Cursor::new(bytes))
        .map_err(|e| DecodeError::gif(0, e))?;

    let width = u32::from(reader.width());
    let height = u32::from(reader.height());

    let mut compositor = Compositor::new(width, height);
    let mut frames = Vec::new();
    let mut durations = Vec::new();

    loop {
        let index = frames.len();
        let frame = match reader.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => return Err(DecodeError::gif(index, e).into()),
        };

        let composited = compositor.apply(index, frame)?;
        frames.push(
            RgbaImage::from_raw(width, height, composited).expect("canvas sized to dimensions"),
        );
        durations.push(delay_to_duration(frame.delay));
    }

    if frames.is_empty() {
        return Err(DecodeError::NoFrames.into());
    }

    Ok(DecodedImage {
        frames,
        durations,
        width,
        height,
    })
}

/// Centiseconds to a clamped hold time.
fn delay_to_duration(delay: u16) -> Duration {
    Duration::from_millis(u64::from(delay) * 10).max(MIN_FRAME_DELAY)
}

/// Accumulates GIF patches into full-canvas frames.
///
/// GIF frames only transmit the changed rectangle, so playback has to
/// remember what was underneath and selectively discard it according to
/// each frame's disposal method. The canvas persists across the whole
/// decode pass; `backup` holds the pre-paint snapshot that disposal mode 3
/// (restore to previous) rolls back to.
struct Compositor {
    width: u32,
    height: u32,
    canvas: Vec<u8>,
    prev_dispose: DisposalMethod,
    backup: Option<Vec<u8>>,
}

impl Compositor {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            canvas: vec![0; width as usize * height as usize * 4],
            prev_dispose: DisposalMethod::Any,
            backup: None,
        }
    }

    /// Paint one patch and return the full composited canvas for the frame.
    fn apply(&mut self, index: usize, frame: &gif::Frame<'_>) -> Result<Vec<u8>> {
        let rect = PatchRect::checked(index, frame, self.width, self.height)?;

        // The previous frame's disposal runs before this frame touches the
        // canvas; frame 0 starts from the cleared canvas.
        if index > 0 {
            self.dispose_previous();
        }

        // Restore-to-previous rolls back to the canvas as it was right
        // before this frame painted, so the snapshot is keyed on this
        // frame's own disposal method.
        if frame.dispose == DisposalMethod::Previous {
            self.backup = Some(self.canvas.clone());
        }

        self.blit(&rect, &frame.buffer);
        self.prev_dispose = frame.dispose;

        Ok(self.canvas.clone())
    }

    fn dispose_previous(&mut self) {
        match self.prev_dispose {
            DisposalMethod::Background => self.canvas.fill(0),
            DisposalMethod::Previous => {
                if let Some(backup) = &self.backup {
                    self.canvas.copy_from_slice(backup);
                }
            }
            DisposalMethod::Any | DisposalMethod::Keep => {}
        }
    }

    /// Copy the patch onto the canvas. Fully-transparent patch pixels leave
    /// the canvas pixel untouched, which is what lets earlier frames show
    /// through under disposal modes 0/1.
    fn blit(&mut self, rect: &PatchRect, patch: &[u8]) {
        for row in 0..rect.height {
            for col in 0..rect.width {
                let src = 4 * (row * rect.width + col) as usize;
                if patch[src + 3] == 0 {
                    continue;
                }
                let dst = 4 * ((rect.top + row) as usize * self.width as usize
                    + (rect.left + col) as usize);
                self.canvas[dst..dst + 4].copy_from_slice(&patch[src..src + 4]);
            }
        }
    }
}

/// A validated patch rectangle within the logical screen.
#[derive(Debug)]
struct PatchRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl PatchRect {
    fn checked(
        index: usize,
        frame: &gif::Frame<'_>,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Result<Self> {
        let rect = PatchRect {
            left: u32::from(frame.left),
            top: u32::from(frame.top),
            width: u32::from(frame.width),
            height: u32::from(frame.height),
        };

        if rect.width == 0 || rect.height == 0 {
            return Err(DecodeError::EmptyPatch {
                index,
                width: rect.width,
                height: rect.height,
            }
            .into());
        }

        if rect.left + rect.width > canvas_width || rect.top + rect.height > canvas_height {
            return Err(DecodeError::PatchOutOfBounds {
                index,
                left: rect.left,
                top: rect.top,
                width: rect.width,
                height: rect.height,
                canvas_width,
                canvas_height,
            }
            .into());
        }

        let expected = rect.width as usize * rect.height as usize * 4;
        if frame.buffer.len() != expected {
            return Err(DecodeError::PatchSizeMismatch {
                index,
                width: rect.width,
                height: rect.height,
                actual: frame.buffer.len(),
            }
            .into());
        }

        Ok(rect)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::Error;

    const TRANSPARENT: u8 = 0;
    const RED: u8 = 1;
    const BLUE: u8 = 2;
    const GREEN: u8 = 3;

    // index 0 is the transparent entry
    const PALETTE: [u8; 12] = [
        0, 0, 0, // transparent
        255, 0, 0, // red
        0, 0, 255, // blue
        0, 255, 0, // green
    ];

    struct TestFrame {
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        pixels: Vec<u8>,
        delay: u16,
        dispose: DisposalMethod,
    }

    impl TestFrame {
        fn filled(
            left: u16,
            top: u16,
            width: u16,
            height: u16,
            color: u8,
            dispose: DisposalMethod,
        ) -> Self {
            TestFrame {
                left,
                top,
                width,
                height,
                pixels: vec![color; width as usize * height as usize],
                delay: 5,
                dispose,
            }
        }
    }

    /// Encode indexed frames with an explicit palette so decoded pixel
    /// values are exact (no quantizer in the loop).
    fn encode_gif(width: u16, height: u16, test_frames: &[TestFrame]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut out, width, height, &[]).unwrap();
            for tf in test_frames {
                let mut frame = gif::Frame::default();
                frame.left = tf.left;
                frame.top = tf.top;
                frame.width = tf.width;
                frame.height = tf.height;
                frame.delay = tf.delay;
                frame.dispose = tf.dispose;
                frame.transparent = Some(TRANSPARENT);
                frame.palette = Some(PALETTE.to_vec());
                frame.buffer = Cow::Owned(tf.pixels.clone());
                encoder.write_frame(&frame).unwrap();
            }
        }
        out
    }

    fn px(frame: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
        frame.get_pixel(x, y).0
    }

    const RED_RGBA: [u8; 4] = [255, 0, 0, 255];
    const BLUE_RGBA: [u8; 4] = [0, 0, 255, 255];
    const GREEN_RGBA: [u8; 4] = [0, 255, 0, 255];
    const CLEAR_RGBA: [u8; 4] = [0, 0, 0, 0];

    #[test]
    fn single_frame_gif_decodes_to_one_full_frame() {
        let bytes = encode_gif(
            2,
            2,
            &[TestFrame::filled(0, 0, 2, 2, RED, DisposalMethod::Keep)],
        );

        let decoded = decode_gif(&bytes).unwrap();
        assert_eq!(decoded.width, 2);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.durations, vec![Duration::from_millis(50)]);
        assert_eq!(px(&decoded.frames[0], 1, 1), RED_RGBA);
    }

    #[test]
    fn zero_delay_is_floored_to_ten_ms() {
        let mut tf = TestFrame::filled(0, 0, 1, 1, RED, DisposalMethod::Keep);
        tf.delay = 0;
        let bytes = encode_gif(1, 1, &[tf]);

        let decoded = decode_gif(&bytes).unwrap();
        assert_eq!(decoded.durations, vec![Duration::from_millis(10)]);
    }

    #[test]
    fn keep_disposal_leaves_pixels_outside_the_patch_untouched() {
        let bytes = encode_gif(
            4,
            4,
            &[
                TestFrame::filled(0, 0, 4, 4, RED, DisposalMethod::Keep),
                TestFrame::filled(1, 1, 1, 1, BLUE, DisposalMethod::Keep),
            ],
        );

        let decoded = decode_gif(&bytes).unwrap();
        assert_eq!(decoded.frames.len(), 2);
        assert_eq!(px(&decoded.frames[1], 1, 1), BLUE_RGBA);
        for (x, y) in [(0, 0), (2, 1), (1, 2), (3, 3)] {
            assert_eq!(px(&decoded.frames[1], x, y), px(&decoded.frames[0], x, y));
        }
    }

    #[test]
    fn transparent_patch_pixels_let_the_previous_frame_show_through() {
        let bytes = encode_gif(
            2,
            1,
            &[
                TestFrame::filled(0, 0, 2, 1, RED, DisposalMethod::Keep),
                TestFrame {
                    left: 0,
                    top: 0,
                    width: 2,
                    height: 1,
                    pixels: vec![TRANSPARENT, BLUE],
                    delay: 5,
                    dispose: DisposalMethod::Keep,
                },
            ],
        );

        let decoded = decode_gif(&bytes).unwrap();
        assert_eq!(px(&decoded.frames[1], 0, 0), RED_RGBA);
        assert_eq!(px(&decoded.frames[1], 1, 0), BLUE_RGBA);
    }

    #[test]
    fn background_disposal_clears_the_canvas_before_the_next_frame() {
        // The scenario from the renderer bug reports: red 10x10 with keep,
        // blue 5x5 at (2,2) with restore-to-background, then a frame that
        // paints nothing.
        let bytes = encode_gif(
            10,
            10,
            &[
                TestFrame::filled(0, 0, 10, 10, RED, DisposalMethod::Keep),
                TestFrame::filled(2, 2, 5, 5, BLUE, DisposalMethod::Background),
                TestFrame::filled(0, 0, 1, 1, TRANSPARENT, DisposalMethod::Keep),
            ],
        );

        let decoded = decode_gif(&bytes).unwrap();
        assert_eq!(decoded.frames.len(), 3);

        // frame 0: all red
        assert_eq!(px(&decoded.frames[0], 0, 0), RED_RGBA);
        assert_eq!(px(&decoded.frames[0], 9, 9), RED_RGBA);

        // frame 1: red with the blue patch over (2,2)..(6,6)
        assert_eq!(px(&decoded.frames[1], 2, 2), BLUE_RGBA);
        assert_eq!(px(&decoded.frames[1], 6, 6), BLUE_RGBA);
        assert_eq!(px(&decoded.frames[1], 1, 1), RED_RGBA);
        assert_eq!(px(&decoded.frames[1], 7, 7), RED_RGBA);

        // frame 2: the background disposal wiped everything and the new
        // patch contributed nothing
        for y in 0..10 {
            for x in 0..10 {
                assert_eq!(px(&decoded.frames[2], x, y), CLEAR_RGBA, "at {x},{y}");
            }
        }
    }

    #[test]
    fn previous_disposal_round_trips_the_canvas() {
        let bytes = encode_gif(
            4,
            4,
            &[
                TestFrame::filled(0, 0, 4, 4, RED, DisposalMethod::Keep),
                TestFrame::filled(0, 0, 2, 2, GREEN, DisposalMethod::Previous),
                TestFrame::filled(3, 3, 1, 1, BLUE, DisposalMethod::Keep),
            ],
        );

        let decoded = decode_gif(&bytes).unwrap();

        // frame 1 shows the green patch over red
        assert_eq!(px(&decoded.frames[1], 0, 0), GREEN_RGBA);
        assert_eq!(px(&decoded.frames[1], 3, 3), RED_RGBA);

        // frame 2: the green patch was rolled back to the pre-paint canvas
        // before blue was painted
        assert_eq!(px(&decoded.frames[2], 0, 0), RED_RGBA);
        assert_eq!(px(&decoded.frames[2], 1, 1), RED_RGBA);
        assert_eq!(px(&decoded.frames[2], 3, 3), BLUE_RGBA);
    }

    #[test]
    fn gif_with_no_frames_is_an_error() {
        let bytes = encode_gif(2, 2, &[]);
        let err = decode_gif(&bytes).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::NoFrames)));
    }

    fn raw_frame(left: u16, width: u16, height: u16, buffer: Vec<u8>) -> gif::Frame<'static> {
        let mut frame = gif::Frame::default();
        frame.left = left;
        frame.width = width;
        frame.height = height;
        frame.buffer = Cow::Owned(buffer);
        frame
    }

    #[test]
    fn patch_outside_the_canvas_is_an_error() {
        let frame = raw_frame(1, 2, 1, vec![0; 8]);
        let err = PatchRect::checked(0, &frame, 2, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::PatchOutOfBounds { index: 0, .. })
        ));
    }

    #[test]
    fn empty_patch_rect_is_an_error() {
        let frame = raw_frame(0, 0, 2, Vec::new());
        let err = PatchRect::checked(3, &frame, 4, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::EmptyPatch { index: 3, .. })
        ));
    }

    #[test]
    fn short_patch_buffer_is_an_error() {
        // a 2x2 rect needs 16 bytes of RGBA
        let frame = raw_frame(0, 2, 2, vec![0; 12]);
        let err = PatchRect::checked(1, &frame, 4, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::PatchSizeMismatch {
                index: 1,
                actual: 12,
                ..
            })
        ));
    }

    #[test]
    fn truncated_gif_fails_to_decode() {
        let mut bytes = encode_gif(
            2,
            2,
            &[TestFrame::filled(0, 0, 2, 2, RED, DisposalMethod::Keep)],
        );
        // cut inside the first frame's descriptor
        bytes.truncate(20);

        assert!(decode_gif(&bytes).is_err());
    }

    #[test]
    fn frames_and_durations_stay_in_lockstep() {
        let mut frames = Vec::new();
        for (i, delay) in [0u16, 3, 12].iter().enumerate() {
            let mut tf = TestFrame::filled(0, 0, 2, 2, RED, DisposalMethod::Keep);
            tf.delay = *delay;
            tf.left = i as u16 % 2;
            tf.width = 1;
            tf.height = 1;
            tf.pixels = vec![RED];
            frames.push(tf);
        }
        let bytes = encode_gif(2, 2, &frames);

        let decoded = decode_gif(&bytes).unwrap();
        assert_eq!(decoded.frames.len(), decoded.durations.len());
        assert_eq!(
            decoded.durations,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(30),
                Duration::from_millis(120),
            ]
        );
        for duration in &decoded.durations {
            assert!(*duration >= MIN_FRAME_DELAY);
        }
    }
}
