//! Decoded pictures and pixel-format conversion.
//!
//! The decoder hands frames over as a [`DecodedPicture`]: planar 8-bit
//! samples stored in a **signed** domain, offset by -128 from the usual
//! unsigned byte range. That storage convention comes from the training data
//! this pipeline was built around; every consumer downstream expects the
//! conversion step to recover unsigned values by adding 128 back, so the
//! shift here is fixed and not configurable.
//!
//! [`DecodedPicture::to_bgr_buffer`] performs the full conversion:
//!
//! 1. If the picture is not already in RGB space, transform it to an RGB
//!    intermediate of the same dimensions (BT.601 integer math). Then swap
//!    the channel order to BGR — always, for every picture: the trained
//!    models consume BGR tensors, so a picture that arrives in RGB space
//!    skips only the color-space transform, never the swap.
//! 2. Copy into a packed unsigned [`PixelBuffer`], adding 128 to every
//!    sample. When the picture declares a crop region smaller than its
//!    backing buffer, only the cropped sub-rectangle is copied, row by row,
//!    with the cropped width as the output stride.

use crate::error::FramefeedError;

/// Number of channels in every converted buffer and numeric record.
pub const CHANNEL_COUNT: usize = 3;

/// Color space of a decoded picture's planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorSpace {
    /// One interleaved plane, three samples per pixel.
    Rgb,
    /// Three planes, chroma subsampled 2x2 (one Cb/Cr pair per 2×2 block).
    Yuv420,
    /// Three planes, chroma subsampled horizontally only.
    Yuv422,
}

impl ColorSpace {
    /// How many planes a picture in this color space carries.
    pub fn plane_count(self) -> usize {
        match self {
            ColorSpace::Rgb => 1,
            ColorSpace::Yuv420 | ColorSpace::Yuv422 => 3,
        }
    }
}

/// A rectangular sub-region of a picture, in pixels.
///
/// `x`/`y` anchor the region inside the backing buffer; `width`/`height`
/// give the size of the region that conversion will emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left edge of the region.
    pub x: u32,
    /// Top edge of the region.
    pub y: u32,
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
}

/// One decoded video frame in the signed 8-bit storage domain.
///
/// Samples are stored as `i8`, offset by -128 from the unsigned [0,255]
/// range; [`to_bgr_buffer`](DecodedPicture::to_bgr_buffer) recovers the
/// unsigned values. Pictures are ephemeral: the extractor creates one per
/// frame and discards it after conversion.
#[derive(Debug, Clone)]
pub struct DecodedPicture {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    crop: Option<CropRegion>,
    planes: Vec<Vec<i8>>,
}

impl DecodedPicture {
    /// Build a picture from raw signed planes.
    ///
    /// # Errors
    ///
    /// Returns [`FramefeedError::UnsupportedPixelLayout`] if the plane count
    /// or any plane length disagrees with the color space and dimensions.
    pub fn new(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        planes: Vec<Vec<i8>>,
    ) -> Result<Self, FramefeedError> {
        if planes.len() != color_space.plane_count() {
            return Err(FramefeedError::UnsupportedPixelLayout(format!(
                "{:?} expects {} plane(s), got {}",
                color_space,
                color_space.plane_count(),
                planes.len()
            )));
        }

        let w = width as usize;
        let h = height as usize;
        let chroma_w = width.div_ceil(2) as usize;
        let expected: Vec<usize> = match color_space {
            ColorSpace::Rgb => vec![w * h * CHANNEL_COUNT],
            ColorSpace::Yuv420 => {
                let chroma = chroma_w * height.div_ceil(2) as usize;
                vec![w * h, chroma, chroma]
            }
            ColorSpace::Yuv422 => {
                let chroma = chroma_w * h;
                vec![w * h, chroma, chroma]
            }
        };

        for (index, (plane, want)) in planes.iter().zip(&expected).enumerate() {
            if plane.len() != *want {
                return Err(FramefeedError::UnsupportedPixelLayout(format!(
                    "plane {index} of a {width}x{height} {color_space:?} picture \
                     should hold {want} samples, got {}",
                    plane.len()
                )));
            }
        }

        Ok(Self {
            width,
            height,
            color_space,
            crop: None,
            planes,
        })
    }

    /// Build an RGB picture from the unsigned interleaved bytes FFmpeg's
    /// scaler emits, shifting every sample into the signed storage domain.
    pub fn from_rgb24(width: u32, height: u32, data: &[u8]) -> Result<Self, FramefeedError> {
        let signed: Vec<i8> = data
            .iter()
            .map(|&sample| (sample as i16 - 128) as i8)
            .collect();
        Self::new(width, height, ColorSpace::Rgb, vec![signed])
    }

    /// Attach a crop region. Conversion will emit only this sub-rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`FramefeedError::UnsupportedPixelLayout`] if the region
    /// extends past the backing buffer or is empty.
    pub fn with_crop(mut self, crop: CropRegion) -> Result<Self, FramefeedError> {
        let fits = crop.width > 0
            && crop.height > 0
            && crop.x.checked_add(crop.width).is_some_and(|r| r <= self.width)
            && crop.y.checked_add(crop.height).is_some_and(|b| b <= self.height);
        if !fits {
            return Err(FramefeedError::UnsupportedPixelLayout(format!(
                "crop {}x{}+{}+{} does not fit a {}x{} picture",
                crop.width, crop.height, crop.x, crop.y, self.width, self.height
            )));
        }
        self.crop = Some(crop);
        Ok(self)
    }

    /// Backing buffer width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Backing buffer height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The color space the planes are stored in.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// The crop region, if one is set.
    pub fn crop(&self) -> Option<CropRegion> {
        self.crop
    }

    /// Width of the buffer conversion will produce (crop-aware).
    pub fn output_width(&self) -> u32 {
        self.crop.map_or(self.width, |c| c.width)
    }

    /// Height of the buffer conversion will produce (crop-aware).
    pub fn output_height(&self) -> u32 {
        self.crop.map_or(self.height, |c| c.height)
    }

    /// Raw signed samples of one plane.
    pub fn plane(&self, index: usize) -> &[i8] {
        &self.planes[index]
    }

    /// Convert to a packed unsigned buffer in BGR channel order.
    ///
    /// Non-RGB pictures are first transformed to an RGB intermediate; the
    /// R/B swap then applies to every picture, so the output is genuinely
    /// BGR regardless of the input space. Every output byte is the
    /// corresponding signed sample plus 128.
    ///
    /// # Errors
    ///
    /// Returns [`FramefeedError::UnsupportedPixelLayout`] if the picture's
    /// layout cannot be converted (guarded at construction, so this only
    /// fires for layouts added in future).
    pub fn to_bgr_buffer(&self) -> Result<PixelBuffer, FramefeedError> {
        let mut interleaved: Vec<i8> = match self.color_space {
            ColorSpace::Rgb => self.planes[0].clone(),
            ColorSpace::Yuv420 | ColorSpace::Yuv422 => self.yuv_to_rgb_signed(),
        };
        swap_red_blue(&mut interleaved);

        let out_width = self.output_width();
        let out_height = self.output_height();
        let mut data = vec![0u8; out_width as usize * out_height as usize * CHANNEL_COUNT];

        match self.crop {
            Some(crop)
                if crop.width != self.width
                    || crop.height != self.height
                    || crop.x != 0
                    || crop.y != 0 =>
            {
                let src_stride = self.width as usize * CHANNEL_COUNT;
                let dst_stride = crop.width as usize * CHANNEL_COUNT;
                let mut src_offset =
                    (crop.y as usize * self.width as usize + crop.x as usize) * CHANNEL_COUNT;
                let mut dst_offset = 0;
                for _ in 0..crop.height {
                    let src_row = &interleaved[src_offset..src_offset + dst_stride];
                    for (dst, &sample) in data[dst_offset..dst_offset + dst_stride]
                        .iter_mut()
                        .zip(src_row)
                    {
                        *dst = unshift(sample);
                    }
                    src_offset += src_stride;
                    dst_offset += dst_stride;
                }
            }
            _ => {
                for (dst, &sample) in data.iter_mut().zip(&interleaved) {
                    *dst = unshift(sample);
                }
            }
        }

        Ok(PixelBuffer {
            width: out_width,
            height: out_height,
            data,
        })
    }

    /// BT.601 integer transform of the chroma-subsampled planes into one
    /// interleaved signed RGB plane of the full backing dimensions.
    fn yuv_to_rgb_signed(&self) -> Vec<i8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let chroma_stride = self.width.div_ceil(2) as usize;

        let luma = &self.planes[0];
        let cb = &self.planes[1];
        let cr = &self.planes[2];

        let mut rgb = vec![0i8; width * height * CHANNEL_COUNT];
        for row in 0..height {
            let chroma_row = match self.color_space {
                ColorSpace::Yuv420 => row / 2,
                _ => row,
            };
            for col in 0..width {
                let chroma_index = chroma_row * chroma_stride + col / 2;

                // Signed storage holds Y-128 / Cb-128 / Cr-128, so the
                // chroma offsets come out directly and only luma needs the
                // studio-swing 16 removed.
                let c = luma[row * width + col] as i32 + 112;
                let d = cb[chroma_index] as i32;
                let e = cr[chroma_index] as i32;

                let r = ((298 * c + 409 * e + 128) >> 8).clamp(0, 255);
                let g = ((298 * c - 100 * d - 208 * e + 128) >> 8).clamp(0, 255);
                let b = ((298 * c + 516 * d + 128) >> 8).clamp(0, 255);

                let base = (row * width + col) * CHANNEL_COUNT;
                rgb[base] = (r - 128) as i8;
                rgb[base + 1] = (g - 128) as i8;
                rgb[base + 2] = (b - 128) as i8;
            }
        }
        rgb
    }
}

/// Recover an unsigned sample from the signed storage domain.
#[inline]
fn unshift(sample: i8) -> u8 {
    (sample as i16 + 128) as u8
}

/// Swap the first and third sample of every pixel in place.
fn swap_red_blue(interleaved: &mut [i8]) {
    for pixel in interleaved.chunks_exact_mut(CHANNEL_COUNT) {
        pixel.swap(0, 2);
    }
}

/// A packed, unsigned, interleaved pixel buffer in BGR channel order.
///
/// Produced by [`DecodedPicture::to_bgr_buffer`]; consumed by the flattening
/// step that turns frames into numeric records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Buffer width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed BGR bytes, row-major, three bytes per pixel.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the packed bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The three channel bytes of one pixel, as stored (B, G, R).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; CHANNEL_COUNT] {
        let base = (y as usize * self.width as usize + x as usize) * CHANNEL_COUNT;
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }

    /// Copy out the bytes with channels reordered to RGB, for handing to
    /// image encoders that expect conventional channel order.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut rgb = self.data.clone();
        for pixel in rgb.chunks_exact_mut(CHANNEL_COUNT) {
            pixel.swap(0, 2);
        }
        rgb
    }
}
