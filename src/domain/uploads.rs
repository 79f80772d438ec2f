//! Image upload rules.

use thiserror::Error;

pub const MAX_DIMENSION: usize = 10_000;

/// Raster formats a browser can show inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProbe {
    pub format: ImageFormat,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("upload is empty")]
    Empty,
    #[error("upload is not a supported image")]
    Unsupported,
    #[error("image data is corrupted")]
    Corrupted,
    #[error("image dimensions {width}x{height} are out of range")]
    Dimensions { width: usize, height: usize },
}

impl ImageRejection {
    /// Message shown next to the image field.
    pub fn form_message(&self) -> &'static str {
        match self {
            Self::Empty => "Отправленный файл пуст.",
            Self::Unsupported | Self::Corrupted => {
                "Загрузите правильное изображение. Файл, который вы загрузили, поврежден или не является изображением."
            }
            Self::Dimensions { .. } => "Размеры изображения недопустимы.",
        }
    }
}

/// Sniffs the image format from its header bytes; the file name is never trusted.
pub fn probe_image(bytes: &[u8]) -> Result<ImageProbe, ImageRejection> {
    if bytes.is_empty() {
        return Err(ImageRejection::Empty);
    }

    let format = match imagesize::image_type(bytes).map_err(map_image_error)? {
        imagesize::ImageType::Png => ImageFormat::Png,
        imagesize::ImageType::Jpeg => ImageFormat::Jpeg,
        imagesize::ImageType::Gif => ImageFormat::Gif,
        imagesize::ImageType::Webp => ImageFormat::Webp,
        imagesize::ImageType::Bmp => ImageFormat::Bmp,
        _ => return Err(ImageRejection::Unsupported),
    };

    let size = imagesize::blob_size(bytes).map_err(map_image_error)?;
    if size.width == 0
        || size.height == 0
        || size.width > MAX_DIMENSION
        || size.height > MAX_DIMENSION
    {
        return Err(ImageRejection::Dimensions {
            width: size.width,
            height: size.height,
        });
    }

    Ok(ImageProbe {
        format,
        width: size.width,
        height: size.height,
    })
}

fn map_image_error(error: imagesize::ImageError) -> ImageRejection {
    match error {
        imagesize::ImageError::NotSupported => ImageRejection::Unsupported,
        imagesize::ImageError::CorruptedImage | imagesize::ImageError::IoError(_) => {
            ImageRejection::Corrupted
        }
    }
}
