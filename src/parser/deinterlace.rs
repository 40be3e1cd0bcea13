// Interlaced images store their rows in four passes; each pass covers the
// rows its predecessors skipped.
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// Reorder an interlaced index stream back to natural top-to-bottom rows.
///
/// Does nothing when the image has at most one row or the data does not
/// cover one. A truncated stream reorders only the full rows present; the
/// rest of the output stays at index zero.
pub(crate) fn deinterlace(indices: &[u8], width: u16, height: u16) -> Vec<u8> {
    let width = usize::from(width);
    let height = usize::from(height);
    if height <= 1 || width == 0 || indices.len() < width {
        return indices.to_vec();
    }

    let rows_present = indices.len() / width;
    let mut natural = vec![0; width * height];
    let mut source_row = 0;
    'passes: for (first_row, step) in INTERLACE_PASSES {
        let mut row = first_row;
        while row < height {
            if source_row == rows_present {
                break 'passes;
            }
            let source = &indices[source_row * width..(source_row + 1) * width];
            natural[row * width..(row + 1) * width].copy_from_slice(source);
            source_row += 1;
            row += step;
        }
    }
    natural
}
