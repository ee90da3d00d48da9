//! Classified raster and its conversion to pixels.

use crate::{Result, Rgb, VoronoiError};

/// Seed index for every pixel of a `width`×`height` plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Seed index for each pixel (row-major order)
    cells: Vec<u32>,
    width: u32,
    height: u32,
}

impl Raster {
    pub(crate) fn new(cells: Vec<u32>, width: u32, height: u32) -> Self {
        debug_assert_eq!(cells.len(), width as usize * height as usize);
        Self { cells, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major seed indices
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u32> {
        self.cells
    }

    /// Seed index of pixel `(x, y)`, or `None` outside the raster
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Pixel count per seed, for `num_seeds` seeds
    pub fn cell_areas(&self, num_seeds: usize) -> Vec<u32> {
        let mut areas = vec![0u32; num_seeds];
        for &cell in &self.cells {
            if let Some(area) = areas.get_mut(cell as usize) {
                *area += 1;
            }
        }
        areas
    }

    /// Render to packed RGB bytes, colouring each pixel with its seed's
    /// palette entry
    pub fn render(&self, palette: &[Rgb]) -> Result<Vec<u8>> {
        let required = self.cells.iter().max().map_or(0, |&m| m as usize + 1);
        if palette.len() < required {
            return Err(VoronoiError::PaletteTooSmall {
                colors: palette.len(),
                required,
            });
        }

        let mut pixels = Vec::with_capacity(self.cells.len() * 3);
        for &cell in &self.cells {
            pixels.extend_from_slice(&palette[cell as usize]);
        }
        Ok(pixels)
    }

    /// Render to an image::RgbImage
    pub fn to_image(&self, palette: &[Rgb]) -> Result<image::RgbImage> {
        let pixels = self.render(palette)?;
        Ok(image::RgbImage::from_raw(self.width, self.height, pixels)
            .expect("render produces width * height * 3 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Raster {
        Raster::new(vec![0, 0, 1, 1, 2, 0], 3, 2)
    }

    #[test]
    fn test_get() {
        let raster = sample();
        assert_eq!(raster.get(0, 0), Some(0));
        assert_eq!(raster.get(2, 0), Some(1));
        assert_eq!(raster.get(1, 1), Some(2));
        assert_eq!(raster.get(3, 0), None);
        assert_eq!(raster.get(0, 2), None);
    }

    #[test]
    fn test_cell_areas() {
        assert_eq!(sample().cell_areas(4), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_render_palette_lookup() {
        let palette = [[10, 10, 10], [20, 20, 20], [30, 30, 30]];
        let pixels = sample().render(&palette).unwrap();
        assert_eq!(pixels.len(), 18);
        assert_eq!(&pixels[6..9], &[20, 20, 20]);
        assert_eq!(&pixels[12..15], &[30, 30, 30]);

        let image = sample().to_image(&palette).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 1).0, [30, 30, 30]);
    }

    #[test]
    fn test_render_rejects_short_palette() {
        let palette = [[0, 0, 0], [1, 1, 1]];
        assert!(matches!(
            sample().render(&palette),
            Err(VoronoiError::PaletteTooSmall { colors: 2, required: 3 })
        ));
    }
}
