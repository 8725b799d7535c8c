//! Note color palette.
//!
//! Notes store only an index. Rendering clamps it with
//! [`Note::color_slot`](crate::Note::color_slot), so colors themselves live
//! with the UI.

use rand::Rng;

/// Number of slots in the palette shipped with this release.
pub const PALETTE_SIZE: usize = 10;

/// Picks a uniformly random slot of a palette with `palette_size` entries.
pub fn random_color_index(palette_size: usize) -> i32 {
    if palette_size == 0 {
        return 0;
    }
    rand::rng().random_range(0..palette_size) as i32
}
