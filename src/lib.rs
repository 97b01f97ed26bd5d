//! Compiler from layered RGBA tile sheets to the tileset data format used by
//! the Gen-3 engine family: a deduplicated 4bpp tile sheet, up to sixteen
//! 16-colour palettes and a binary metatile table.
//!
//! The pipeline runs in stages: the [`importer`] slices input sheets into
//! 8×8 [`tiles::RgbaTile`]s, the [`normalise`] module picks each tile's
//! canonical flip orientation, the [`palette`] packer fits the colour sets
//! into the available palettes, and the [`compiler`] re-renders and
//! deduplicates the tiles. The [`emitter`] serialises the compiled tileset
//! and the [`driver`] wires the whole thing to the filesystem.

use thiserror::Error;

pub mod colour;
pub mod compiler;
pub mod config;
pub mod driver;
pub mod emitter;
pub mod importer;
pub mod normalise;
pub mod palette;
pub mod tiles;

/// Everything that can go wrong between a decompiled tile sheet and a
/// compiled tileset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TilesetError {
    #[error("tile {tile}: pixel {pixel} has alpha {alpha}, expected 0 or 255")]
    InvalidAlpha { tile: usize, pixel: usize, alpha: u8 },

    #[error("tile {tile}: too many unique colours, at most 15 plus transparency")]
    TooManyColoursInTile { tile: usize },

    #[error("too many unique colours: found {count}, the palette budget allows {cap}")]
    TooManyUniqueColours { count: usize, cap: usize },

    #[error("could not fit the colour sets into the available palettes")]
    NoPaletteAssignment,

    #[error("palette assignment search exceeded {limit} steps")]
    SearchExhausted { limit: usize },

    #[error("too many unique tiles: found {count}, max {cap}")]
    TooManyTiles { count: usize, cap: usize },

    #[error("{0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TilesetError>;
