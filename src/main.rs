use std::env;
use std::fs;

use anyhow::{Context, Result};

mod ppm_writer;

fn main() -> Result<()> {
    env_logger::init();

    let path = env::args().nth(1).context("usage: jiffy <file.gif>")?;
    let bytes = fs::read(&path).with_context(|| format!("could not read {path}"))?;

    let (width, height) = jiffy::probe_size(&bytes)?;
    println!("{path}: {width}x{height}");

    for (i, frame) in jiffy::decode(&bytes)?.enumerate() {
        let frame = frame?;
        let filename = format!("frame_{i}.ppm");
        ppm_writer::write_ppm(&filename, frame.width, frame.height, &frame.pixels)?;
        println!("wrote {filename} (delay {}s)", frame.delay_seconds);
    }

    Ok(())
}
