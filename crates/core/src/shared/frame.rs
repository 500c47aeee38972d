use ndarray::ArrayView3;

/// Channel order of a frame's packed 8-bit pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Device-native order for most capture backends.
    Bgr24,
    /// Order the landmark models expect.
    Rgb24,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        3
    }
}

/// A single captured or decoded frame: contiguous bytes in row-major order.
///
/// Color conversion happens once, right before inference; the capture layer
/// hands frames over in whatever order the device produced.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (format.channels() as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    /// Builds a frame whose buffer may not match its dimensions.
    #[cfg(test)]
    pub(crate) fn new_unchecked(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        index: usize,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            index,
        }
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

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte length implied by the dimensions and pixel format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels() as usize
    }

    /// `false` when the buffer length disagrees with the dimensions; such a
    /// frame must not reach `as_ndarray`.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns an RGB copy of this frame, swapping channels if it is BGR.
    pub fn to_rgb(&self) -> Frame {
        match self.format {
            PixelFormat::Rgb24 => self.clone(),
            PixelFormat::Bgr24 => {
                let mut data = self.data.clone();
                for px in data.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                Frame::new(data, self.width, self.height, PixelFormat::Rgb24, self.index)
            }
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}
