/// A raw RGB video frame as delivered by the transport, row-major.
///
/// Only the learned-model classifier looks at pixels; everything else
/// works on landmarks.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    timestamp: i64,
}

const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp: i64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            timestamp,
        }
    }

    /// Builds a frame from a decoded image, converting to RGB8.
    pub fn from_image(image: image::DynamicImage, timestamp: i64) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, timestamp)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// RGB triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        match self.data.get(i..i + CHANNELS)? {
            [r, g, b] => Some([*r, *g, *b]),
            _ => None,
        }
    }
}
