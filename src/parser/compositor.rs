use super::decoder::{GraphicControlExtension, TableBasedImage};
use super::DisposalMethod;

use log::debug;

/// One fully composited animation frame at logical-screen size.
#[derive(Debug, Clone)]
pub struct Frame {
    pub delay_seconds: f32,
    pub width: u16,
    pub height: u16,
    /// RGBA, row-major, four bytes per pixel.
    pub pixels: Box<[u8]>,
}

/// The persistent logical screen. Each image block is drawn onto it
/// according to the active disposal method, then the result is snapshotted
/// into a [`Frame`].
#[derive(Debug)]
pub(crate) struct Canvas {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
    background: [u8; 4],
}

impl Canvas {
    pub(crate) fn new(width: u16, height: u16, background: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; usize::from(width) * usize::from(height) * 4],
            background,
        }
    }

    pub(crate) fn composite(
        &mut self,
        image: &TableBasedImage,
        color_table: &[u8],
        control: Option<&GraphicControlExtension>,
    ) -> Frame {
        let disposal = control
            .map(|c| c.disposal_method)
            .unwrap_or(DisposalMethod::None);
        debug!(
            "compositing {}x{} image at ({}, {}) with {:?}",
            image.width, image.height, image.left_position, image.top_position, disposal
        );

        let shown = match disposal {
            DisposalMethod::None => {
                self.draw(image, color_table, control, false);
                self.pixels.clone()
            }
            DisposalMethod::DoNotDispose => {
                self.draw(image, color_table, control, true);
                self.pixels.clone()
            }
            DisposalMethod::RestoreToBackgroundColor => {
                self.fill(self.background);
                self.draw(image, color_table, control, false);
                self.pixels.clone()
            }
            DisposalMethod::RestoreToPrevious => {
                // the emitted frame includes this image, but the live canvas
                // goes back to its pre-draw state for the next one
                let snapshot = self.pixels.clone();
                self.draw(image, color_table, control, false);
                std::mem::replace(&mut self.pixels, snapshot)
            }
        };

        Frame {
            delay_seconds: control.map(|c| f32::from(c.delay_time) / 100.0).unwrap_or(0.0),
            width: self.width,
            height: self.height,
            pixels: shown.into_boxed_slice(),
        }
    }

    fn fill(&mut self, color: [u8; 4]) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    fn draw(
        &mut self,
        image: &TableBasedImage,
        color_table: &[u8],
        control: Option<&GraphicControlExtension>,
        blend: bool,
    ) {
        let canvas_width = usize::from(self.width);
        let canvas_height = usize::from(self.height);
        let transparent_index = control
            .and_then(|c| c.transparent_color_flag.then_some(c.transparent_color_index));
        let indices = image.image_indexes.as_deref().unwrap_or_default();

        for row in 0..usize::from(image.height) {
            let canvas_y = usize::from(image.top_position) + row;
            if canvas_y >= canvas_height {
                break;
            }
            for column in 0..usize::from(image.width) {
                let canvas_x = usize::from(image.left_position) + column;
                if canvas_x >= canvas_width {
                    break;
                }
                // a truncated index stream simply stops the draw
                let Some(&index) = indices.get(row * usize::from(image.width) + column) else {
                    return;
                };

                let mut color = lookup(color_table, index, self.background);
                if transparent_index == Some(index) {
                    color[3] = 0;
                }

                let offset = (canvas_y * canvas_width + canvas_x) * 4;
                let pixel = &mut self.pixels[offset..offset + 4];
                if blend {
                    let alpha = color[3];
                    for channel in 0..4 {
                        pixel[channel] = lerp(pixel[channel], color[channel], alpha);
                    }
                } else {
                    pixel.copy_from_slice(&color);
                }
            }
        }
    }
}

fn lookup(color_table: &[u8], index: u8, background: [u8; 4]) -> [u8; 4] {
    let offset = usize::from(index) * 3;
    match color_table.get(offset..offset + 3) {
        Some(rgb) => [rgb[0], rgb[1], rgb[2], 255],
        // an index past the table resolves to the background color
        None => background,
    }
}

fn lerp(dst: u8, src: u8, alpha: u8) -> u8 {
    let dst = u16::from(dst);
    let src = u16::from(src);
    let alpha = u16::from(alpha);
    ((dst * (255 - alpha) + src * alpha) / 255) as u8
}
