use std::ops::Range;

use serde::Serialize;

/// A horizontal band of the source image, before it has been encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strip {
    pub index: usize,
    pub y_range: Range<u32>,
}

impl Strip {
    pub fn new(index: usize, y_range: Range<u32>) -> Self {
        Self { index, y_range }
    }

    pub fn height(&self) -> u32 {
        self.y_range.end - self.y_range.start
    }
}

/// An encoded strip, ready to submit to the text-extraction service.
///
/// Parts own their payload and keep no reference to the source image.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePart {
    pub index: usize,
    pub y_range: Range<u32>,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub payload_size: usize,
    pub achieved_quality: u8,
    /// Still over the byte ceiling at the floor quality; submitted anyway.
    pub ceiling_exceeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_height() {
        assert_eq!(Strip::new(0, 0..2000).height(), 2000);
        assert_eq!(Strip::new(2, 4000..5000).height(), 1000);
    }

    #[test]
    fn test_image_part_serializes_without_payload() {
        let part = ImagePart {
            index: 1,
            y_range: 2000..4000,
            payload: vec![1, 2, 3],
            payload_size: 3,
            achieved_quality: 70,
            ceiling_exceeded: false,
        };

        let value = serde_json::to_value(&part).unwrap();
        assert!(value.get("payload").is_none());
        assert_eq!(value["payload_size"], 3);
        assert_eq!(value["y_range"]["start"], 2000);
    }
}
