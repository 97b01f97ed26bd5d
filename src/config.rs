//! Compilation parameters, including the per-game fieldmap presets.

use crate::colour::{Rgba32, RGBA_MAGENTA};
use crate::tiles::MAX_BG_PALETTES;
use crate::{Result, TilesetError};

/// How the human-viewing palette of the emitted `tiles.png` is built. The
/// in-game data only depends on the low 4 bits of each pixel, so this is
/// cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TilesPngPaletteMode {
    /// Reserved: renders as greyscale until the engine semantics are
    /// pinned down.
    Pal0,
    /// Pack every compiled palette into the PNG palette and select with
    /// the high 4 bits of each pixel.
    TrueColor,
    #[default]
    Greyscale,
}

/// One compilation's parameters. Threaded by value through every stage;
/// there is no module-level state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub num_tiles_in_primary: usize,
    pub num_tiles_total: usize,
    pub num_metatiles_in_primary: usize,
    pub num_metatiles_total: usize,
    pub num_palettes_in_primary: usize,
    pub num_palettes_total: usize,
    /// Four sub-tiles per metatile across up to three layers.
    pub num_tiles_per_metatile: usize,
    pub secondary: bool,
    pub transparency_colour: Rgba32,
    pub tiles_png_palette_mode: TilesPngPaletteMode,
    /// Step bound on the palette-packing search.
    pub max_recurse_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config {
            num_tiles_in_primary: 0,
            num_tiles_total: 0,
            num_metatiles_in_primary: 0,
            num_metatiles_total: 0,
            num_palettes_in_primary: 0,
            num_palettes_total: 0,
            num_tiles_per_metatile: 12,
            secondary: false,
            transparency_colour: RGBA_MAGENTA,
            tiles_png_palette_mode: TilesPngPaletteMode::Greyscale,
            max_recurse_count: 2_000_000,
        };
        config.apply_emerald_preset();
        config
    }
}

impl Config {
    /// The pokeemerald `include/fieldmap.h` values. This is the default
    /// preset.
    pub fn apply_emerald_preset(&mut self) {
        self.num_tiles_in_primary = 512;
        self.num_tiles_total = 1024;
        self.num_metatiles_in_primary = 512;
        self.num_metatiles_total = 1024;
        self.num_palettes_in_primary = 6;
        self.num_palettes_total = 13;
    }

    /// The pokefirered `include/fieldmap.h` values.
    pub fn apply_firered_preset(&mut self) {
        self.num_tiles_in_primary = 640;
        self.num_tiles_total = 1024;
        self.num_metatiles_in_primary = 640;
        self.num_metatiles_total = 1024;
        self.num_palettes_in_primary = 7;
        self.num_palettes_total = 13;
    }

    /// The pokeruby `include/fieldmap.h` values.
    pub fn apply_ruby_preset(&mut self) {
        self.num_tiles_in_primary = 512;
        self.num_tiles_total = 1024;
        self.num_metatiles_in_primary = 512;
        self.num_metatiles_total = 1024;
        self.num_palettes_in_primary = 6;
        self.num_palettes_total = 12;
    }

    /// Rejects parameter combinations no target engine can load.
    pub fn validate(&self) -> Result<()> {
        if self.num_palettes_total > MAX_BG_PALETTES {
            return Err(TilesetError::InvalidInput(format!(
                "total palette count {} exceeds the hardware limit of {}",
                self.num_palettes_total, MAX_BG_PALETTES
            )));
        }
        let pairs = [
            ("tiles", self.num_tiles_in_primary, self.num_tiles_total),
            (
                "metatiles",
                self.num_metatiles_in_primary,
                self.num_metatiles_total,
            ),
            (
                "palettes",
                self.num_palettes_in_primary,
                self.num_palettes_total,
            ),
        ];
        for (name, in_primary, total) in pairs {
            if in_primary == 0 || total == 0 {
                return Err(TilesetError::InvalidInput(format!(
                    "{name} counts must be non-zero"
                )));
            }
            if in_primary > total {
                return Err(TilesetError::InvalidInput(format!(
                    "primary {name} count {in_primary} exceeds the total {total}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_the_emerald_preset() {
        let config = Config::default();
        assert_eq!(config.num_tiles_in_primary, 512);
        assert_eq!(config.num_palettes_in_primary, 6);
        assert_eq!(config.num_palettes_total, 13);
        assert_eq!(config.num_tiles_per_metatile, 12);
        assert_eq!(config.transparency_colour, RGBA_MAGENTA);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn presets_differ_where_the_games_do() {
        let mut firered = Config::default();
        firered.apply_firered_preset();
        assert_eq!(firered.num_tiles_in_primary, 640);
        assert_eq!(firered.num_palettes_in_primary, 7);

        let mut ruby = Config::default();
        ruby.apply_ruby_preset();
        assert_eq!(ruby.num_palettes_total, 12);
        assert!(firered.validate().is_ok());
        assert!(ruby.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_and_oversized_counts() {
        let mut config = Config::default();
        config.num_palettes_total = 17;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.num_tiles_in_primary = 2048;
        assert!(config.validate().is_err());
    }
}
