use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::frame::{Frame, PixelFormat};

#[derive(Error, Debug)]
pub enum ImageReadError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {0} has no pixels")]
    Empty(PathBuf),
}

/// Decodes a still image into an RGB [`Frame`] with index 0.
pub fn read_image(path: &Path) -> Result<Frame, ImageReadError> {
    let img = image::open(path).map_err(|e| ImageReadError::Decode {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(ImageReadError::Empty(path.to_path_buf()));
    }
    Ok(frame_from_rgb_image(rgb))
}

pub fn frame_from_rgb_image(img: image::RgbImage) -> Frame {
    let (width, height) = img.dimensions();
    Frame::new(img.into_raw(), width, height, PixelFormat::Rgb24, 0)
}
