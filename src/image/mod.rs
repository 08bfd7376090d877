//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - [`ImageView`] and [`ImageViewMut`], borrowed rectangular views into an underlying [`Image`].
//! - The [`AsImageView`] and [`AsImageViewMut`] traits to abstract over images and views.
//! - A variety of [`draw`] functions to visualize landmarks, detections, and counters.
//! - [`Rect`] and [`RotatedRect`], rectangles representing parts of an image.

pub mod draw;
mod jpeg;
mod rect;
mod resolution;

use std::{fmt, ops::Index};

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

pub use rect::{Rect, RotatedRect};
pub use resolution::{AspectRatio, Resolution};

/// An owned RGBA image (8-bit sRGB plus alpha).
#[derive(Clone)]
pub struct Image {
    // Internal representation is RGBA8 to match wgpu's texture formats, so frames can be uploaded
    // to the GPU without conversion.
    pub(crate) pixels: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: ImageBuffer::new(width, height),
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Creates an image from raw RGBA8 data.
    ///
    /// # Panics
    ///
    /// Panics if `buf` does not contain exactly `width * height * 4` bytes.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected_size = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected_size,
        );

        Self {
            pixels: ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
                .expect("buffer size does not match image resolution"),
        }
    }

    /// Returns the image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Returns the image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the [`Rect`] covering this image, anchored at `(0, 0)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Gets the image color at the given pixel coordinates.
    #[cfg(test)]
    fn get(&self, x: u32, y: u32) -> Color {
        let rgb = &self.pixels[(x, y)];
        Color(rgb.0)
    }

    /// Sets the image color at the given pixel coordinates.
    #[cfg(test)]
    fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(x, y)] = Rgba(color.0);
    }

    /// Creates an immutable view of the area of this image covered by `rect`.
    ///
    /// The view always has the size of `rect`; where `rect` sticks out of `self`, the view reads
    /// [`Color::NULL`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self,
            region: ViewRect::full(self).view(rect),
        }
    }

    /// Creates a mutable view of the area of this image covered by `rect`.
    ///
    /// The view always has the size of `rect`; where `rect` sticks out of `self`, reads return
    /// [`Color::NULL`] and writes are dropped.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            region: ViewRect::full(self).view(rect),
            image: self,
        }
    }

    /// Returns the raw RGBA8 pixel data of this image.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

#[derive(Debug, Clone, Copy)]
struct ViewRect {
    /// The viewed rectangle, in the coordinates of the root image.
    rect: RotatedRect,
}

impl ViewRect {
    fn full(image: &Image) -> Self {
        Self {
            rect: image.rect().into(),
        }
    }

    fn view(&self, rect: impl Into<RotatedRect>) -> Self {
        let rect: RotatedRect = rect.into();
        let radians = self.rect.rotation_radians() + rect.rotation_radians();

        let (cx, cy) = rect.rect().center();
        let [cx, cy] = self.rect.transform_out(cx, cy);
        let [x, y] = [
            cx - rect.rect().width() / 2.0,
            cy - rect.rect().height() / 2.0,
        ];

        Self {
            rect: RotatedRect::new(rect.rect().move_to(x, y), radians),
        }
    }

    fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width(), self.height())
    }

    fn width(&self) -> f32 {
        self.rect.rect().width()
    }

    fn height(&self) -> f32 {
        self.rect.rect().height()
    }

    fn image_coord(&self, x: u32, y: u32, image: &Image) -> Option<(u32, u32)> {
        let [x, y] = self.rect.transform_out(x as f32 + 0.5, y as f32 + 0.5);
        let [x, y] = [(x - 0.5).round(), (y - 0.5).round()];

        if x < 0.0 || y < 0.0 || x.ceil() >= u32::MAX as f32 || y.ceil() >= u32::MAX as f32 {
            return None;
        }

        let [x, y] = [x.round() as u32, y.round() as u32];
        if x >= image.width() || y >= image.height() {
            return None;
        }
        Some((x, y))
    }

    fn get(&self, x: u32, y: u32, image: &Image) -> Color {
        match self.image_coord(x, y, image) {
            Some((x, y)) => Color(image.pixels[(x, y)].0),
            _ => Color::NULL,
        }
    }
}

/// A read-only view of a (possibly rotated) rectangular section of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    region: ViewRect,
}

impl<'a> ImageView<'a> {
    /// Returns the view's width in pixels.
    pub fn width(&self) -> u32 {
        self.region.width() as u32
    }

    /// Returns the view's height in pixels.
    pub fn height(&self) -> u32 {
        self.region.height() as u32
    }

    /// Returns the size of this view.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the [`Rect`] covering this view, anchored at `(0, 0)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.region.rect()
    }

    /// Reads the color of the pixel at `(x, y)`.
    ///
    /// Coordinates that fall outside of the underlying [`Image`] read as [`Color::NULL`].
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.region.get(x, y, self.image)
    }

    /// Creates a subview of the area of this view covered by `rect`.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self.image,
            region: self.region.view(rect),
        }
    }

    /// Copies the contents of this view into a new [`Image`].
    pub fn to_image(&self) -> Image {
        let mut image = Image::new(self.width(), self.height());
        for y in 0..image.height() {
            for x in 0..image.width() {
                image.pixels[(x, y)] = Rgba(self.get(x, y).0);
            }
        }
        image
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageView", self.width(), self.height())
    }
}

/// A writable view of a (possibly rotated) rectangular section of an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    region: ViewRect,
}

impl<'a> ImageViewMut<'a> {
    /// Returns the view's width in pixels.
    pub fn width(&self) -> u32 {
        self.region.width() as u32
    }

    /// Returns the view's height in pixels.
    pub fn height(&self) -> u32 {
        self.region.height() as u32
    }

    /// Returns the size of this view.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the [`Rect`] covering this view, anchored at `(0, 0)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.region.rect()
    }

    /// Sets the color of the pixel at `(x, y)`.
    ///
    /// Writes outside of the underlying image are dropped.
    #[inline]
    fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some((x, y)) = self.region.image_coord(x, y, self.image) {
            self.image.pixels[(x, y)] = Rgba(color.0);
        }
    }

    /// Borrows an identical [`ImageViewMut`] from `self` with a shorter lifetime.
    ///
    /// This is the explicit spelling of the implicit reborrowing that plain `&mut` references
    /// get; user-defined types have to provide it as a method.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            region: self.region,
        }
    }

    /// Creates a mutable subview of the area of this view covered by `rect`.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            region: self.region.view(rect),
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageViewMut", self.width(), self.height())
    }
}

/// An 8-bit RGBA color in the sRGB color space, with non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (every component is 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Types that can act as read-only image data.
///
/// Code consuming image data should take this trait to work on [`Image`]s and [`ImageView`]s
/// alike.
pub trait AsImageView {
    /// Returns an [`ImageView`] covering `self`.
    fn as_view(&self) -> ImageView<'_>;
}

/// Types that can act as writable image data.
///
/// Code drawing to image data should take this trait to work on [`Image`]s and [`ImageViewMut`]s
/// alike.
pub trait AsImageViewMut: AsImageView {
    /// Returns an [`ImageViewMut`] covering `self`.
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.view_mut(self.rect())
    }
}

impl<'a> AsImageView for ImageView<'a> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl<'a> AsImageView for ImageViewMut<'a> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            region: self.region,
            image: self.image,
        }
    }
}

impl<'a> AsImageViewMut for ImageViewMut<'a> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<'a, V: AsImageView> AsImageView for &'a V {
    fn as_view(&self) -> ImageView<'_> {
        (*self).as_view()
    }
}

impl<'a, V: AsImageView> AsImageView for &'a mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<'a, V: AsImageViewMut> AsImageViewMut for &'a mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (*self).as_view_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_coordinates_are_offset() {
        let mut image = Image::new(4, 4);
        image.set(2, 1, Color::RED);

        let view = image.view(Rect::from_top_left(2.0, 1.0, 2.0, 2.0));
        assert_eq!(view.width(), 2);
        assert_eq!(view.height(), 2);
        assert_eq!(view.get(0, 0), Color::RED);
        assert_eq!(view.get(1, 0), Color::NULL);
    }

    #[test]
    fn view_outside_image_reads_null() {
        let mut image = Image::new(2, 2);
        image.set(1, 1, Color::RED);

        let view = image.view(Rect::from_top_left(1.0, 1.0, 3.0, 3.0));
        assert_eq!(view.get(0, 0), Color::RED);
        assert_eq!(view.get(2, 2), Color::NULL);
    }

    #[test]
    fn writes_outside_image_are_ignored() {
        let mut image = Image::new(2, 2);
        let mut view = image.view_mut(Rect::from_top_left(1.0, 1.0, 3.0, 3.0));
        view.set(0, 0, Color::GREEN); // maps to (1, 1)
        view.set(2, 2, Color::GREEN); // outside the image, ignored
        drop(view);

        assert_eq!(image.get(1, 1), Color::GREEN);
        assert_eq!(image.get(0, 0), Color::NULL);
    }

    #[test]
    fn subview_of_view() {
        let mut image = Image::new(4, 4);
        image.set(3, 3, Color::BLUE);

        let view = image.view(Rect::from_top_left(2.0, 2.0, 2.0, 2.0));
        let sub = view.view(Rect::from_top_left(1.0, 1.0, 1.0, 1.0));
        assert_eq!(sub.get(0, 0), Color::BLUE);
    }

    #[test]
    fn from_rgba8_round_trips() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let image = Image::from_rgba8(Resolution::new(2, 1), &data);
        assert_eq!(image.get(0, 0), Color([1, 2, 3, 4]));
        assert_eq!(image.get(1, 0), Color([5, 6, 7, 8]));
        assert_eq!(image.data(), &data);
    }

    #[test]
    fn to_image_copies_view_contents() {
        let mut image = Image::new(4, 4);
        image.set(1, 1, Color::WHITE);

        let copy = image.view(Rect::from_top_left(1.0, 1.0, 2.0, 2.0)).to_image();
        assert_eq!(copy.width(), 2);
        assert_eq!(copy.get(0, 0), Color::WHITE);
        assert_eq!(copy.get(1, 1), Color::NULL);
    }
}
