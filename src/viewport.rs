use crate::layout::PlacedBubble;

/// Visible bubbles restacked from `top` in arrival order. A hidden typing
/// placeholder leaves no hole; with nothing hidden this reproduces the plan.
pub fn stack(
    bubbles: &[PlacedBubble],
    visible: &[usize],
    top: f32,
    gap: f32,
) -> Vec<PlacedBubble> {
    let mut y = top;
    let mut stacked = Vec::with_capacity(visible.len());
    for placed in visible.iter().filter_map(|&index| bubbles.get(index)) {
        stacked.push(PlacedBubble {
            bubble: placed.bubble.clone(),
            x: placed.x,
            y,
        });
        y += placed.bubble.height + gap;
    }
    stacked
}

/// Scroll offset that keeps the last of `stacked` fully on a canvas of
/// `canvas_height`. Zero while the content still fits.
pub fn window(stacked: &[PlacedBubble], canvas_height: f32, bottom_margin: f32) -> f32 {
    let Some(last) = stacked.last() else {
        return 0.0;
    };

    let used_height = last.bottom() + bottom_margin;
    if used_height <= canvas_height {
        0.0
    } else {
        (used_height - canvas_height).max(0.0)
    }
}

/// Whether any part of `bubble` lands on the canvas after scrolling by `offset`.
pub fn intersects(bubble: &PlacedBubble, offset: f32, canvas_height: f32) -> bool {
    let top = bubble.y - offset;
    let bottom = bubble.bottom() - offset;
    bottom > 0.0 && top < canvas_height
}
