//! Letterbox / pillarbox bars for a locked output aspect ratio.

use camfx_core::{AspectLock, FrameBuffer, Rect};

/// Frames whose ratio is within this fraction of the target get no bars.
pub const ASPECT_TOLERANCE: f32 = 0.01;

/// Visible content area for `lock`, or `None` when no bars are needed.
pub fn content_rect(lock: AspectLock, width: u32, height: u32) -> Option<Rect> {
    let target = lock.ratio()?;
    if width == 0 || height == 0 {
        return None;
    }
    let current = width as f32 / height as f32;
    if (current / target - 1.0).abs() < ASPECT_TOLERANCE {
        return None;
    }
    Some(Rect::fit_aspect(width as f32, height as f32, target))
}

/// Paint black bars outside the content area. Returns whether bars were drawn.
pub fn apply(frame: &mut FrameBuffer, lock: AspectLock) -> bool {
    let Some(content) = content_rect(lock, frame.width, frame.height) else {
        return false;
    };
    let x0 = content.x.round().max(0.0) as u32;
    let y0 = content.y.round().max(0.0) as u32;
    let x1 = ((content.x + content.width).round() as u32).min(frame.width);
    let y1 = ((content.y + content.height).round() as u32).min(frame.height);

    for y in 0..frame.height {
        let row = frame.row_mut(y);
        if y < y0 || y >= y1 {
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&[0, 0, 0, 255]);
            }
            continue;
        }
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let x = x as u32;
            if x < x0 || x >= x1 {
                px.copy_from_slice(&[0, 0, 0, 255]);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_and_matching_ratios_need_no_bars() {
        assert!(content_rect(AspectLock::Free, 1280, 720).is_none());
        assert!(content_rect(AspectLock::Wide16x9, 1280, 720).is_none());
        // 0.6 % off is inside the tolerance
        assert!(content_rect(AspectLock::Wide16x9, 1288, 720).is_none());
    }

    #[test]
    fn square_lock_pillarboxes_wide_frame() {
        let mut frame = FrameBuffer::solid(160, 90, [255, 255, 255, 255]);
        assert!(apply(&mut frame, AspectLock::Square));
        assert_eq!(frame.pixel(10, 45), [0, 0, 0, 255]);
        assert_eq!(frame.pixel(150, 45), [0, 0, 0, 255]);
        assert_eq!(frame.pixel(80, 45), [255, 255, 255, 255]);
    }

    #[test]
    fn cinema_lock_letterboxes() {
        let mut frame = FrameBuffer::solid(210, 120, [255, 255, 255, 255]);
        assert!(apply(&mut frame, AspectLock::Cinema21x9));
        // content height 90, bars of 15 rows
        assert_eq!(frame.pixel(100, 5), [0, 0, 0, 255]);
        assert_eq!(frame.pixel(100, 60), [255, 255, 255, 255]);
        assert_eq!(frame.pixel(100, 116), [0, 0, 0, 255]);
    }
}
