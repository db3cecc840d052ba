//! Pure calculation functions for image dimensions and sizes.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate fit-inside dimensions for a resize.
///
/// The source is scaled so that it fits within the requested box without
/// cropping, preserving aspect ratio. Either side of the box may be absent,
/// in which case only the other side constrains. A box that would enlarge
/// the image returns the source dimensions unchanged: fit-inside never
/// upscales.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Requested box (width, height), each optional
///
/// # Returns
/// * `(width, height)` - Output dimensions, both at least 1
///
/// # Examples
/// ```
/// # use picture_press::imaging::fit_inside;
/// // Width-only box on a 4:3 landscape → height follows the ratio
/// assert_eq!(fit_inside((4000, 3000), (Some(1920), None)), (1920, 1440));
///
/// // Box larger than the source → no upscaling
/// assert_eq!(fit_inside((200, 150), (Some(1200), None)), (200, 150));
/// ```
pub fn fit_inside(source: (u32, u32), target: (Option<u32>, Option<u32>)) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }

    let width_bound = match target {
        (None, None) => return source,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        // Source is relatively wider than the box: width is the binding side
        (Some(tw), Some(th)) => src_w as u64 * th as u64 >= src_h as u64 * tw as u64,
    };

    if width_bound {
        let tw = target.0.unwrap_or(src_w);
        if tw >= src_w {
            return source;
        }
        (tw.max(1), scale_side(src_h, tw, src_w))
    } else {
        let th = target.1.unwrap_or(src_h);
        if th >= src_h {
            return source;
        }
        (scale_side(src_w, th, src_h), th.max(1))
    }
}

/// `round(side * num / den)` in integer arithmetic, never below 1.
fn scale_side(side: u32, num: u32, den: u32) -> u32 {
    let den = den as u64;
    let scaled = (side as u64 * num as u64 + den / 2) / den;
    (scaled as u32).max(1)
}

/// Percentage saved by the optimized output relative to the original.
///
/// `round((1 - optimized / original) * 100)`. Negative when the output is
/// larger than the input; zero when the original is empty.
pub fn compression_ratio(original_size: usize, optimized_size: usize) -> i64 {
    if original_size == 0 {
        return 0;
    }
    ((1.0 - optimized_size as f64 / original_size as f64) * 100.0).round() as i64
}
