//! Value codecs: typed values to stored payload bytes and back

use crate::error::{CacheError, Result};
use image::{DynamicImage, ImageFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Cursor;

/// Converts values of type `T` to and from the payload bytes kept on disk.
///
/// The cache never looks inside a payload; a codec only has to read back what it wrote.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Raw bytes, stored as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 text without a byte order mark
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

/// Any serde type as JSON. Use `serde_json::Value` for free-form objects and arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

/// Images, stored losslessly as PNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl Codec<DynamicImage> for ImageCodec {
    fn encode(&self, value: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        value
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CacheError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| CacheError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Author {
        name: String,
        project: String,
    }

    #[test]
    fn test_string_is_plain_utf8() {
        let bytes = StringCodec.encode(&"héllo".to_string()).unwrap();
        assert_eq!(bytes, "héllo".as_bytes());
        assert_eq!(StringCodec.decode(&bytes).unwrap(), "héllo");
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let err = StringCodec.decode(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[test]
    fn test_json_struct() {
        let author = Author {
            name: "Blankj".to_string(),
            project: "CacheUtils".to_string(),
        };
        let bytes = JsonCodec.encode(&author).unwrap();
        let decoded: Author = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, author);
    }

    #[test]
    fn test_json_free_form_value() {
        let value = serde_json::json!([{ "class": "CacheUtils", "author": "Blankj" }]);
        let bytes = JsonCodec.encode(&value).unwrap();
        let decoded: serde_json::Value = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_json_shape_mismatch_is_decode_error() {
        let bytes = JsonCodec.encode(&vec![1, 2, 3]).unwrap();
        let result: Result<Author> = JsonCodec.decode(&bytes);
        assert!(matches!(result, Err(CacheError::Decode(_))));
    }

    #[test]
    fn test_json_unserializable_value_is_encode_error() {
        let mut map = HashMap::new();
        map.insert((1u8, 2u8), 3u8);
        let result = JsonCodec.encode(&map);
        assert!(matches!(result, Err(CacheError::Encode(_))));
    }

    #[test]
    fn test_image_png() {
        let mut img = RgbImage::new(4, 3);
        img.put_pixel(1, 2, Rgb([200, 10, 30]));
        let img = DynamicImage::ImageRgb8(img);

        let bytes = ImageCodec.encode(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let decoded = ImageCodec.decode(&bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_image_rejects_garbage() {
        let err = ImageCodec.decode(b"not an image").unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }
}
