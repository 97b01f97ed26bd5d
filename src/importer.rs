//! Slicing input sheets into the tile order the rest of the pipeline (and
//! the emitted `metatiles.bin`) assumes.

use image::RgbaImage;

use crate::colour::Rgba32;
use crate::tiles::{DecompiledTileset, RgbaTile, TILE_NUM_PIX, TILE_SIDE_LENGTH};
use crate::{Result, TilesetError};

/// A metatile is 2×2 tiles on each layer.
pub const METATILE_TILE_SIDE: usize = 2;
const METATILE_SIDE_PIXELS: u32 = (METATILE_TILE_SIDE * TILE_SIDE_LENGTH) as u32;
/// Layered sheets come as bottom, middle, top.
pub const MAX_LAYERS: usize = 3;

fn tile_at(sheet: &RgbaImage, tile_x: u32, tile_y: u32) -> RgbaTile {
    let mut pixels = [Rgba32::new(0, 0, 0, 0); TILE_NUM_PIX];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        let x = tile_x * TILE_SIDE_LENGTH as u32 + (i % TILE_SIDE_LENGTH) as u32;
        let y = tile_y * TILE_SIDE_LENGTH as u32 + (i / TILE_SIDE_LENGTH) as u32;
        let p = sheet.get_pixel(x, y);
        *pixel = Rgba32::new(p[0], p[1], p[2], p[3]);
    }
    RgbaTile { pixels }
}

fn check_dimensions(sheet: &RgbaImage, multiple: u32) -> Result<()> {
    let (width, height) = sheet.dimensions();
    for (name, value) in [("width", width), ("height", height)] {
        if value == 0 || value % multiple != 0 {
            return Err(TilesetError::InvalidInput(format!(
                "sheet {name} must be a non-zero multiple of {multiple}, was {value}"
            )));
        }
    }
    Ok(())
}

/// Imports one to three equally sized layer sheets (bottom first) as a
/// stream of tiles in metatile order: for each metatile in row-major
/// order, for each layer bottom to top, the four sub-tiles in reading
/// order.
pub fn import_layered_tiles(layers: &[RgbaImage]) -> Result<DecompiledTileset> {
    if layers.is_empty() || layers.len() > MAX_LAYERS {
        return Err(TilesetError::InvalidInput(format!(
            "expected between 1 and {MAX_LAYERS} layer sheets, got {}",
            layers.len()
        )));
    }
    check_dimensions(&layers[0], METATILE_SIDE_PIXELS)?;
    let (width, height) = layers[0].dimensions();
    for (i, layer) in layers.iter().enumerate().skip(1) {
        if layer.dimensions() != (width, height) {
            return Err(TilesetError::InvalidInput(format!(
                "layer sheet {i} is {}x{}, expected {width}x{height}",
                layer.width(),
                layer.height()
            )));
        }
    }

    let metatiles_wide = width / METATILE_SIDE_PIXELS;
    let metatiles_tall = height / METATILE_SIDE_PIXELS;
    let mut tiles = Vec::with_capacity(
        (metatiles_wide * metatiles_tall) as usize * MAX_LAYERS * METATILE_TILE_SIDE * METATILE_TILE_SIDE,
    );

    for metatile_y in 0..metatiles_tall {
        for metatile_x in 0..metatiles_wide {
            for layer in layers {
                for sub in 0..METATILE_TILE_SIDE * METATILE_TILE_SIDE {
                    let sub_x = (sub % METATILE_TILE_SIDE) as u32;
                    let sub_y = (sub / METATILE_TILE_SIDE) as u32;
                    tiles.push(tile_at(
                        layer,
                        metatile_x * METATILE_TILE_SIDE as u32 + sub_x,
                        metatile_y * METATILE_TILE_SIDE as u32 + sub_y,
                    ));
                }
            }
        }
    }

    Ok(DecompiledTileset { tiles })
}

/// Imports a raw sheet: plain 8×8 tiles in row-major order, no metatile
/// grouping and no layers.
pub fn import_raw_tiles(sheet: &RgbaImage) -> Result<DecompiledTileset> {
    check_dimensions(sheet, TILE_SIDE_LENGTH as u32)?;
    let (width, height) = sheet.dimensions();

    let tiles_wide = width / TILE_SIDE_LENGTH as u32;
    let tiles_tall = height / TILE_SIDE_LENGTH as u32;
    let mut tiles = Vec::with_capacity((tiles_wide * tiles_tall) as usize);
    for tile_y in 0..tiles_tall {
        for tile_x in 0..tiles_wide {
            tiles.push(tile_at(sheet, tile_x, tile_y));
        }
    }

    Ok(DecompiledTileset { tiles })
}
