use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use medcard_core::GrayImage;

use crate::PrintError;

/// Write an 8-bit grayscale PNG.
pub fn write_gray_png(img: &GrayImage, path: impl AsRef<Path>) -> Result<(), PrintError> {
    let (w, h) = dims_u32(img)?;
    let file = File::create(path.as_ref())?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), w, h);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&img.data)?;
    writer.finish()?;
    log::debug!("wrote {}x{} png to {}", w, h, path.as_ref().display());
    Ok(())
}

fn dims_u32(img: &GrayImage) -> Result<(u32, u32), PrintError> {
    let w = u32::try_from(img.width)
        .map_err(|_| PrintError::InvalidConfig(format!("image too wide: {}", img.width)))?;
    let h = u32::try_from(img.height)
        .map_err(|_| PrintError::InvalidConfig(format!("image too tall: {}", img.height)))?;
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_valid_png_signature() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("g.png");
        let mut img = GrayImage::new(3, 2);
        img.data.copy_from_slice(&[0, 255, 0, 255, 0, 255]);
        write_gray_png(&img, &path).expect("write");
        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
