use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Unsupported component count {0} (expected 1 to 4)")]
    InvalidComponents(usize),
    #[error("Invalid pixel data length: expected {expected} bytes, got {actual}")]
    InvalidDataLength { expected: usize, actual: usize },
    #[error("Invalid delay count: expected {expected} delays, got {actual}")]
    InvalidDelayCount { expected: usize, actual: usize },
    #[error("Invalid palette index {index} in frame {frame} (palette has {size} entries)")]
    InvalidPaletteIndex {
        frame: usize,
        index: usize,
        size: usize,
    },
}

/// A color resolved from raw pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpacks a little-endian RGBA pixel value.
    pub fn from_packed(pxl: u32) -> Self {
        Self {
            r: pxl as u8,
            g: (pxl >> 8) as u8,
            b: (pxl >> 16) as u8,
            a: (pxl >> 24) as u8,
        }
    }

    pub fn packed(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | (self.a as u32) << 24
    }

    /// Expands a 5/5/5 color back to the 8-bit precision `quantize_rgb15` leaves behind.
    pub fn from_rgb15(color: u16, alpha: u8) -> Self {
        Self {
            r: ((color & 0x1F) << 3) as u8,
            g: (((color >> 5) & 0x1F) << 3) as u8,
            b: (((color >> 10) & 0x1F) << 3) as u8,
            a: alpha,
        }
    }

    pub fn rgb15(self) -> u16 {
        (self.r >> 3) as u16 | ((self.g >> 3) as u16) << 5 | ((self.b >> 3) as u16) << 10
    }
}

/// Anything that can be compared pixel by pixel.
pub trait PixelSource {
    /// Get the dimensions of the image (width, height)
    fn dims(&self) -> (usize, usize);

    fn frame_count(&self) -> usize;

    fn components(&self) -> usize;

    /// Get the resolved color at the specified coordinates
    fn pixel(&self, frame: usize, x: usize, y: usize) -> Rgba;
}

/// Pixel-level equivalence, not data-level: palettes may differ in order.
pub fn pixels_equal<A, B>(left: &A, right: &B) -> bool
where
    A: PixelSource + ?Sized,
    B: PixelSource + ?Sized,
{
    if left.dims() != right.dims()
        || left.frame_count() != right.frame_count()
        || left.components() != right.components()
    {
        return false;
    }
    let (width, height) = left.dims();
    (0..left.frame_count()).all(|z| {
        (0..height).all(|y| (0..width).all(|x| left.pixel(z, x, y) == right.pixel(z, x, y)))
    })
}

/// A decoded, possibly animated, image.
///
/// Before palettization every pixel holds `components` bytes. Afterwards every
/// pixel is a single byte indexing the palette of its frame, and palette
/// entries keep the packed `components` format.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) frames: usize,
    pub(crate) components: usize,
    pub(crate) data: Vec<u8>,
    /// 1/1000 second units, one per frame.
    pub(crate) delays: Option<Vec<u32>>,
    pub(crate) palettes: Option<Vec<Vec<u32>>>,
}

impl RasterImage {
    /// Creates a zero-filled image.
    pub fn new(width: usize, height: usize, frames: usize, components: usize) -> Self {
        Self {
            width,
            height,
            frames,
            components,
            data: vec![0; width * height * frames * components],
            delays: None,
            palettes: None,
        }
    }

    pub fn from_raw(
        width: usize,
        height: usize,
        frames: usize,
        components: usize,
        data: Vec<u8>,
    ) -> Result<Self, FormatError> {
        if !(1..=4).contains(&components) {
            return Err(FormatError::InvalidComponents(components));
        }
        let expected = width * height * frames * components;
        if data.len() != expected {
            return Err(FormatError::InvalidDataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            frames,
            components,
            data,
            delays: None,
            palettes: None,
        })
    }

    /// Builds an already palettized image from one index byte per pixel.
    pub fn from_indexed(
        width: usize,
        height: usize,
        components: usize,
        indices: Vec<u8>,
        palettes: Vec<Vec<u32>>,
    ) -> Result<Self, FormatError> {
        if !(1..=4).contains(&components) {
            return Err(FormatError::InvalidComponents(components));
        }
        let frames = palettes.len();
        let expected = width * height * frames;
        if indices.len() != expected {
            return Err(FormatError::InvalidDataLength {
                expected,
                actual: indices.len(),
            });
        }
        let frame_size = width * height;
        for (frame, palette) in palettes.iter().enumerate() {
            let frame_data = &indices[frame * frame_size..(frame + 1) * frame_size];
            if let Some(&index) = frame_data.iter().find(|&&i| i as usize >= palette.len()) {
                return Err(FormatError::InvalidPaletteIndex {
                    frame,
                    index: index as usize,
                    size: palette.len(),
                });
            }
        }
        Ok(Self {
            width,
            height,
            frames,
            components,
            data: indices,
            delays: None,
            palettes: Some(palettes),
        })
    }

    pub fn with_delays(mut self, delays: Vec<u32>) -> Result<Self, FormatError> {
        if delays.len() != self.frames {
            return Err(FormatError::InvalidDelayCount {
                expected: self.frames,
                actual: delays.len(),
            });
        }
        self.delays = Some(delays);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn has_palette(&self) -> bool {
        self.palettes.is_some()
    }

    pub fn has_alpha(&self) -> bool {
        self.components == 2 || self.components == 4
    }

    pub fn delays(&self) -> Option<&[u32]> {
        self.delays.as_deref()
    }

    pub fn palette(&self, frame: usize) -> Option<&[u32]> {
        self.palettes
            .as_ref()
            .and_then(|palettes| palettes.get(frame))
            .map(Vec::as_slice)
    }

    /// Bytes per stored pixel.
    pub fn component_size(&self) -> usize {
        if self.has_palette() {
            1
        } else {
            self.components
        }
    }

    fn offset(&self, z: usize, x: usize, y: usize) -> usize {
        ((z * self.height + y) * self.width + x) * self.component_size()
    }

    /// Raw pixel data (packed color or palette index) for a coordinate.
    pub fn get_data(&self, z: usize, x: usize, y: usize) -> u32 {
        let offset = self.offset(z, x, y);
        self.data[offset..offset + self.component_size()]
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &byte)| acc | (byte as u32) << (i * 8))
    }

    pub fn set_data(&mut self, z: usize, x: usize, y: usize, value: u32) {
        let offset = self.offset(z, x, y);
        let size = self.component_size();
        for (i, byte) in self.data[offset..offset + size].iter_mut().enumerate() {
            *byte = (value >> (i * 8)) as u8;
        }
    }

    /// Resolved color for a coordinate.
    pub fn get_pixel(&self, z: usize, x: usize, y: usize) -> Rgba {
        let mut pxl = self.get_data(z, x, y);
        if let Some(palettes) = &self.palettes {
            pxl = palettes[z][pxl as usize];
        }
        unpack_components(pxl, self.components)
    }

    /// Returns a borrowed view of a single frame.
    pub fn subimage(&self, frame: usize) -> Option<Subimage<'_>> {
        (frame < self.frames).then_some(Subimage {
            parent: self,
            frame,
        })
    }

    pub fn subimages(&self) -> impl Iterator<Item = Subimage<'_>> {
        (0..self.frames).map(move |frame| Subimage {
            parent: self,
            frame,
        })
    }

    /// Returns an owned copy, mirrored on the requested axes.
    pub fn clone_flipped(&self, flip_h: bool, flip_v: bool) -> RasterImage {
        let mut result = self.clone();
        for z in 0..self.frames {
            for y in 0..self.height {
                for x in 0..self.width {
                    let in_x = if flip_h { self.width - 1 - x } else { x };
                    let in_y = if flip_v { self.height - 1 - y } else { y };
                    result.set_data(z, x, y, self.get_data(z, in_x, in_y));
                }
            }
        }
        result
    }

    /// Returns a copy with every frame resolved to four components.
    pub fn expand_to_rgba(&self) -> RasterImage {
        RasterImage {
            width: self.width,
            height: self.height,
            frames: self.frames,
            components: 4,
            data: (0..self.frames).flat_map(|z| self.to_rgba8(z)).collect(),
            delays: self.delays.clone(),
            palettes: None,
        }
    }

    /// Resolves one frame to a tightly packed RGBA8 buffer.
    pub fn to_rgba8(&self, frame: usize) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.width * self.height * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = self.get_pixel(frame, x, y);
                rgba.extend_from_slice(&[color.r, color.g, color.b, color.a]);
            }
        }
        rgba
    }
}

pub(crate) fn unpack_components(pxl: u32, components: usize) -> Rgba {
    match components {
        1 => {
            let v = pxl as u8;
            Rgba::new(v, v, v, 0xFF)
        }
        2 => {
            let v = pxl as u8;
            Rgba::new(v, v, v, (pxl >> 8) as u8)
        }
        3 => Rgba::new(pxl as u8, (pxl >> 8) as u8, (pxl >> 16) as u8, 0xFF),
        _ => Rgba::from_packed(pxl),
    }
}

impl PixelSource for RasterImage {
    fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> usize {
        self.frames
    }

    fn components(&self) -> usize {
        self.components
    }

    fn pixel(&self, frame: usize, x: usize, y: usize) -> Rgba {
        self.get_pixel(frame, x, y)
    }
}

impl PartialEq for RasterImage {
    fn eq(&self, other: &Self) -> bool {
        pixels_equal(self, other)
    }
}

/// A single frame of a [`RasterImage`], borrowed from its parent.
///
/// Mutating operations only exist on the owning image.
#[derive(Debug, Clone, Copy)]
pub struct Subimage<'a> {
    parent: &'a RasterImage,
    frame: usize,
}

impl<'a> Subimage<'a> {
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn palette(&self) -> Option<&'a [u32]> {
        self.parent.palette(self.frame)
    }

    pub fn delay(&self) -> Option<u32> {
        self.parent
            .delays()
            .and_then(|delays| delays.get(self.frame))
            .copied()
    }

    /// Raw pixel data (packed color or palette index).
    pub fn get_data(&self, x: usize, y: usize) -> u32 {
        self.parent.get_data(self.frame, x, y)
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Rgba {
        self.parent.get_pixel(self.frame, x, y)
    }

    /// Copies this frame into a standalone image, mirrored on the requested axes.
    pub fn to_image(&self, flip_h: bool, flip_v: bool) -> RasterImage {
        let parent = self.parent;
        let frame_size = parent.width * parent.height * parent.component_size();
        let start = self.frame * frame_size;
        let single = RasterImage {
            width: parent.width,
            height: parent.height,
            frames: 1,
            components: parent.components,
            data: parent.data[start..start + frame_size].to_vec(),
            delays: self.delay().map(|delay| vec![delay]),
            palettes: self.palette().map(|palette| vec![palette.to_vec()]),
        };
        if flip_h || flip_v {
            single.clone_flipped(flip_h, flip_v)
        } else {
            single
        }
    }
}

impl PixelSource for Subimage<'_> {
    fn dims(&self) -> (usize, usize) {
        (self.parent.width, self.parent.height)
    }

    fn frame_count(&self) -> usize {
        1
    }

    fn components(&self) -> usize {
        self.parent.components
    }

    fn pixel(&self, _frame: usize, x: usize, y: usize) -> Rgba {
        self.get_pixel(x, y)
    }
}

impl PartialEq<RasterImage> for Subimage<'_> {
    fn eq(&self, other: &RasterImage) -> bool {
        pixels_equal(self, other)
    }
}

impl PartialEq<Subimage<'_>> for RasterImage {
    fn eq(&self, other: &Subimage<'_>) -> bool {
        pixels_equal(self, other)
    }
}
