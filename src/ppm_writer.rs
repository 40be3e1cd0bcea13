use std::fs::File;
use std::io::{prelude::*, BufWriter};

use anyhow::Result;

const MAGIC_NUMBER: &[u8] = b"P3";

/// Dump one RGBA frame as a plain-text PPM, dropping the alpha channel.
pub fn write_ppm(filename: &str, width: u16, height: u16, rgba: &[u8]) -> Result<()> {
    let file = File::create(filename)?;
    let mut writer = BufWriter::new(&file);

    writer.write_all(MAGIC_NUMBER)?;
    writer.write_all(b"\n")?;
    writer.write_all(format!("{width} {height}").as_bytes())?;
    writer.write_all(b" 255")?;
    writer.write_all(b"\n")?;

    for row in rgba.chunks(usize::from(width) * 4) {
        let mut pixels = row.chunks_exact(4).peekable();
        while let Some(pixel) = pixels.next() {
            writer.write_all(
                format!("{: >3} {: >3} {: >3}", pixel[0], pixel[1], pixel[2]).as_bytes(),
            )?;
            if pixels.peek().is_some() {
                writer.write_all(b" ")?;
            }
        }
        writer.write_all(b"\n")?;
    }

    Ok(())
}
