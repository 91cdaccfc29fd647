use half::f16;
use image::imageops::{self, FilterType};
use ndarray::Array4;

use super::decoder::RasterImage;

pub const INPUT_SIZE: u32 = 256;
pub const INPUT_CHANNELS: usize = 3;
/// Shape of the classifier input: (batch, height, width, channels).
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

/// Divisor applied to every channel value. The classifier was validated
/// against inputs scaled by 225, not 255, so values reach ~1.133.
pub const PIXEL_SCALE: f32 = 225.0;

/// Half-precision NHWC batch of one image, channels in BGR order.
#[derive(Debug, Clone)]
pub struct InputTensor(Array4<f16>);

impl InputTensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f16> {
        self.0.view()
    }

    pub fn as_slice(&self) -> Option<&[f16]> {
        self.0.as_slice()
    }
}

impl From<Array4<f16>> for InputTensor {
    fn from(array: Array4<f16>) -> Self {
        Self(array)
    }
}

/// Every value a u8 channel can scale to, computed in half precision.
fn scale_table() -> [f16; 256] {
    let scale = f16::from_f32(PIXEL_SCALE);
    std::array::from_fn(|v| f16::from(v as u8) / scale)
}

/// Resizes to 256x256 (bilinear) and rescales into the classifier's input tensor.
pub fn normalize(image: RasterImage) -> InputTensor {
    let image = image.into_bgr();
    let resized = imageops::resize(image.pixels(), INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let table = scale_table();

    let array = Array4::from_shape_fn(INPUT_SHAPE, |(_, y, x, c)| {
        table[resized.get_pixel(x as u32, y as u32)[c] as usize]
    });
    InputTensor(array)
}
