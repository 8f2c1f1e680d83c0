use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use uuid::Uuid;

/// EXIF orientation of a captured image (tag values 1-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PhotoOrientation {
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl PhotoOrientation {
    /// Map a raw EXIF tag; unknown values yield `None`.
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(PhotoOrientation::Up),
            2 => Some(PhotoOrientation::UpMirrored),
            3 => Some(PhotoOrientation::Down),
            4 => Some(PhotoOrientation::DownMirrored),
            5 => Some(PhotoOrientation::LeftMirrored),
            6 => Some(PhotoOrientation::Right),
            7 => Some(PhotoOrientation::RightMirrored),
            8 => Some(PhotoOrientation::Left),
            _ => None,
        }
    }

    pub fn exif_value(&self) -> u32 {
        match self {
            PhotoOrientation::Up => 1,
            PhotoOrientation::UpMirrored => 2,
            PhotoOrientation::Down => 3,
            PhotoOrientation::DownMirrored => 4,
            PhotoOrientation::LeftMirrored => 5,
            PhotoOrientation::Right => 6,
            PhotoOrientation::RightMirrored => 7,
            PhotoOrientation::Left => 8,
        }
    }

    /// Transform stored pixels so they display upright.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        match self {
            PhotoOrientation::Up => image.clone(),
            PhotoOrientation::UpMirrored => image.fliph(),
            PhotoOrientation::Down => image.rotate180(),
            PhotoOrientation::DownMirrored => image.flipv(),
            PhotoOrientation::LeftMirrored => image.rotate90().fliph(),
            PhotoOrientation::Right => image.rotate90(),
            PhotoOrientation::RightMirrored => image.rotate270().fliph(),
            PhotoOrientation::Left => image.rotate270(),
        }
    }
}

/// A finished photo: decoded pixels plus the orientation needed to show them.
#[derive(Debug, Clone)]
pub struct Photo {
    pub request_id: Uuid,
    pub image: DynamicImage,
    pub orientation: PhotoOrientation,
    /// Encoded container bytes, when the backend supplied them
    pub file_data: Option<Bytes>,
    pub captured_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(request_id: Uuid, image: DynamicImage, orientation: PhotoOrientation) -> Self {
        Self {
            request_id,
            image,
            orientation,
            file_data: None,
            captured_at: Utc::now(),
        }
    }

    /// Wrap an externally imported image; it is assumed to already be upright.
    pub fn imported(image: DynamicImage) -> Self {
        Self::new(Uuid::new_v4(), image, PhotoOrientation::Up)
    }

    pub fn with_file_data(mut self, data: Option<Bytes>) -> Self {
        self.file_data = data;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Display-ready image with the orientation applied.
    pub fn upright(&self) -> DynamicImage {
        self.orientation.apply(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn marked_image() -> DynamicImage {
        // 3x2 image with a single red pixel at the top-left corner
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_exif_mapping() {
        for value in 1..=8 {
            let orientation = PhotoOrientation::from_exif(value).unwrap();
            assert_eq!(orientation.exif_value(), value);
        }
        assert_eq!(PhotoOrientation::from_exif(0), None);
        assert_eq!(PhotoOrientation::from_exif(9), None);
    }

    #[test]
    fn test_upright_rotates_right() {
        let photo = Photo::new(Uuid::new_v4(), marked_image(), PhotoOrientation::Right);
        let upright = photo.upright().to_rgb8();
        assert_eq!(upright.dimensions(), (2, 3));
        // Rotating clockwise moves the top-left pixel to the top-right
        assert_eq!(upright.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_upright_identity_for_up() {
        let photo = Photo::imported(marked_image());
        assert_eq!(photo.orientation, PhotoOrientation::Up);
        assert_eq!(photo.upright().to_rgb8(), marked_image().to_rgb8());
    }

    #[test]
    fn test_upright_mirror() {
        let photo = Photo::new(Uuid::new_v4(), marked_image(), PhotoOrientation::UpMirrored);
        let upright = photo.upright().to_rgb8();
        assert_eq!(upright.get_pixel(2, 0), &Rgb([255, 0, 0]));
    }
}
