use jpeg_encoder::{ColorType, Encoder};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{Error, Result};

fn dimension(n: usize) -> Result<u16> {
    u16::try_from(n).map_err(|_| Error::Render(format!("JPEG dimension {} exceeds 65535", n)))
}

pub fn write_rgb_jpeg(output: &Path, cols: usize, rows: usize, rgb_data: &[u8]) -> Result<()> {
    if rgb_data.len() != cols * rows * 3 {
        return Err(Error::Render(format!(
            "RGB buffer holds {} bytes, expected {}",
            rgb_data.len(),
            cols * rows * 3
        )));
    }
    let (w, h) = (dimension(cols)?, dimension(rows)?);
    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    let encoder = Encoder::new(&mut writer, 90);
    encoder
        .encode(rgb_data, w, h, ColorType::Rgb)
        .map_err(Error::render)?;
    Ok(())
}
