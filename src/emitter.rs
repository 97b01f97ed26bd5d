//! Serialisers for the three build artifacts: JASC `.pal` files, the
//! indexed `tiles.png`, and `metatiles.bin`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::colour::{bgr_to_rgba, rgba_to_bgr, Bgr15, Rgba32};
use crate::config::{Config, TilesPngPaletteMode};
use crate::tiles::{CompiledTileset, GbaPalette, TILE_NUM_PIX, TILE_SIDE_LENGTH};

/// The emitted tile sheet is always 16 tiles (128 pixels) wide.
pub const TILES_PNG_WIDTH_IN_TILES: usize = 16;

/// Writes one palette in JASC-PAL text form. All 16 slots are emitted;
/// the channels print as their 5-bit values times 8.
pub fn emit_palette<W: Write>(out: &mut W, palette: &GbaPalette) -> io::Result<()> {
    writeln!(out, "JASC-PAL")?;
    writeln!(out, "0100")?;
    writeln!(out, "16")?;
    for &colour in &palette.colours {
        writeln!(out, "{}", bgr_to_rgba(colour).jasc())?;
    }
    Ok(())
}

/// Writes the palette emitted for slots past the compiled set: slot 0 is
/// the transparency colour, everything else black.
pub fn emit_zeroed_palette<W: Write>(out: &mut W, transparency_colour: Rgba32) -> io::Result<()> {
    let mut palette = GbaPalette {
        colours: [Bgr15(0); 16],
    };
    palette.colours[0] = rgba_to_bgr(transparency_colour);
    emit_palette(out, &palette)
}

/// Writes `num_palettes_total` files named `00.pal`, `01.pal`, … into
/// `palettes_dir`, zero-padding past the compiled palettes.
pub fn emit_palettes(
    config: &Config,
    tileset: &CompiledTileset,
    palettes_dir: &Path,
) -> io::Result<()> {
    for i in 0..config.num_palettes_total {
        let path = palettes_dir.join(format!("{i:02}.pal"));
        let mut out = BufWriter::new(File::create(path)?);
        match tileset.palettes.get(i) {
            Some(palette) => emit_palette(&mut out, palette)?,
            None => emit_zeroed_palette(&mut out, config.transparency_colour)?,
        }
        out.flush()?;
    }
    Ok(())
}

fn png_palette(config: &Config, tileset: &CompiledTileset) -> Vec<u8> {
    match config.tiles_png_palette_mode {
        TilesPngPaletteMode::TrueColor => {
            // Pack every compiled palette; the high nibble of each pixel
            // selects among them, so the sheet shows real colours while
            // staying 4bpp for the assembler.
            tileset
                .palettes
                .iter()
                .flat_map(|palette| palette.colours)
                .flat_map(|colour| {
                    let rgba = bgr_to_rgba(colour);
                    [rgba.r, rgba.g, rgba.b]
                })
                .collect()
        }
        // Pal0 is reserved and renders as greyscale for now.
        TilesPngPaletteMode::Greyscale | TilesPngPaletteMode::Pal0 => (0..16u8)
            .flat_map(|i| [16 * i, 16 * i, 16 * i])
            .collect(),
    }
}

/// Writes the compiled tiles as an 8-bit indexed PNG, 16 tiles wide, with
/// trailing slots in the last row left transparent.
pub fn emit_tiles_png<W: Write>(
    config: &Config,
    tileset: &CompiledTileset,
    out: W,
) -> Result<(), png::EncodingError> {
    let width = TILES_PNG_WIDTH_IN_TILES * TILE_SIDE_LENGTH;
    let rows = tileset.tiles.len().div_ceil(TILES_PNG_WIDTH_IN_TILES).max(1);
    let height = rows * TILE_SIDE_LENGTH;

    let mut data = vec![0u8; width * height];
    for (tile_index, tile) in tileset.tiles.iter().enumerate() {
        let tile_row = tile_index / TILES_PNG_WIDTH_IN_TILES;
        let tile_col = tile_index % TILES_PNG_WIDTH_IN_TILES;
        let palette_index = tileset.palette_index_of_tile[tile_index];
        for pixel_index in 0..TILE_NUM_PIX {
            let x = tile_col * TILE_SIDE_LENGTH + pixel_index % TILE_SIDE_LENGTH;
            let y = tile_row * TILE_SIDE_LENGTH + pixel_index / TILE_SIDE_LENGTH;
            let index_in_palette = tile.pixel(pixel_index);
            data[y * width + x] = match config.tiles_png_palette_mode {
                TilesPngPaletteMode::TrueColor => (palette_index << 4) | index_in_palette,
                TilesPngPaletteMode::Greyscale | TilesPngPaletteMode::Pal0 => index_in_palette,
            };
        }
    }

    let mut encoder = png::Encoder::new(out, width as u32, height as u32);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(png_palette(config, tileset));
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    writer.finish()
}

/// Writes one little-endian 16-bit word per assignment:
/// tile index in bits 0..9, flips in bits 10 and 11, palette in 12..15.
pub fn emit_metatiles_bin<W: Write>(out: &mut W, tileset: &CompiledTileset) -> io::Result<()> {
    for assignment in &tileset.assignments {
        let word = (assignment.tile_index as u16 & 0x3ff)
            | (u16::from(assignment.h_flip) << 10)
            | (u16::from(assignment.v_flip) << 11)
            | ((assignment.palette_index as u16 & 0xf) << 12);
        out.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::{RGBA_BLUE, RGBA_GREEN, RGBA_MAGENTA, RGBA_RED, RGBA_WHITE};
    use crate::tiles::{Assignment, GbaTile};

    #[test]
    fn emit_palette_writes_exact_jasc_text() {
        let mut palette = GbaPalette {
            colours: [Bgr15(0); 16],
        };
        palette.colours[0] = rgba_to_bgr(RGBA_MAGENTA);
        palette.colours[1] = rgba_to_bgr(RGBA_RED);
        palette.colours[2] = rgba_to_bgr(RGBA_GREEN);
        palette.colours[3] = rgba_to_bgr(RGBA_BLUE);
        palette.colours[4] = rgba_to_bgr(RGBA_WHITE);

        let mut out = Vec::new();
        emit_palette(&mut out, &palette).unwrap();

        let expected = "JASC-PAL\n\
                        0100\n\
                        16\n\
                        248 0 248\n\
                        248 0 0\n\
                        0 248 0\n\
                        0 0 248\n\
                        248 248 248\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n\
                        0 0 0\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn emit_zeroed_palette_keeps_only_the_transparency_colour() {
        let mut out = Vec::new();
        emit_zeroed_palette(&mut out, RGBA_MAGENTA).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("JASC-PAL"));
        assert_eq!(lines.next(), Some("0100"));
        assert_eq!(lines.next(), Some("16"));
        assert_eq!(lines.next(), Some("248 0 248"));
        assert!(lines.all(|line| line == "0 0 0"));
    }

    #[test]
    fn emit_palettes_pads_out_to_the_total() {
        let config = Config::default();
        let mut palette = GbaPalette::filled_with(rgba_to_bgr(RGBA_MAGENTA));
        palette.colours[1] = rgba_to_bgr(RGBA_RED);
        let tileset = CompiledTileset {
            palettes: vec![palette, palette],
            ..CompiledTileset::default()
        };

        let dir = tempfile::tempdir().unwrap();
        emit_palettes(&config, &tileset, dir.path()).unwrap();

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names.len(), 13);
        assert_eq!(names[0], "00.pal");
        assert_eq!(names[12], "12.pal");

        // Files past the compiled palettes are zeroed, slot 0 aside.
        let padded = std::fs::read_to_string(dir.path().join("02.pal")).unwrap();
        let lines: Vec<_> = padded.lines().collect();
        assert_eq!(lines[3], "248 0 248");
        assert!(lines[4..].iter().all(|&line| line == "0 0 0"));
    }

    #[test]
    fn metatile_words_pack_index_flips_and_palette() {
        let tileset = CompiledTileset {
            assignments: vec![
                Assignment {
                    tile_index: 0x101,
                    palette_index: 3,
                    h_flip: false,
                    v_flip: true,
                },
                Assignment {
                    tile_index: 1,
                    palette_index: 2,
                    h_flip: false,
                    v_flip: false,
                },
            ],
            ..CompiledTileset::default()
        };

        let mut out = Vec::new();
        emit_metatiles_bin(&mut out, &tileset).unwrap();

        // 0x3901 and 0x2001, little endian.
        assert_eq!(out, vec![0x01, 0x39, 0x01, 0x20]);
    }

    fn one_tile_tileset() -> CompiledTileset {
        let mut tile = GbaTile::default();
        tile.index_pairs[0] = 0x21;
        let mut palette = GbaPalette::filled_with(rgba_to_bgr(RGBA_MAGENTA));
        palette.colours[1] = rgba_to_bgr(RGBA_RED);
        palette.colours[2] = rgba_to_bgr(RGBA_GREEN);
        CompiledTileset {
            tiles: vec![tile],
            palettes: vec![palette],
            palette_index_of_tile: vec![0],
            assignments: Vec::new(),
        }
    }

    fn decode(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>, Vec<u8>) {
        let decoder = png::Decoder::new(bytes);
        let mut reader = decoder.read_info().unwrap();
        let palette = reader.info().palette.clone().unwrap().into_owned();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info, buf, palette)
    }

    #[test]
    fn tiles_png_is_indexed_with_a_grey_ramp() {
        let config = Config::default();
        let tileset = one_tile_tileset();

        let mut bytes = Vec::new();
        emit_tiles_png(&config, &tileset, &mut bytes).unwrap();
        let (info, data, palette) = decode(&bytes);

        assert_eq!(info.width, 128);
        assert_eq!(info.height, 8);
        assert_eq!(info.color_type, png::ColorType::Indexed);
        assert_eq!(palette.len(), 16 * 3);
        assert_eq!(&palette[..6], &[0, 0, 0, 16, 16, 16]);

        // First two pixels carry the local indices; the rest of the sheet,
        // including the 15 unused tile slots, is transparent.
        assert_eq!(data[0], 1);
        assert_eq!(data[1], 2);
        assert!(data[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn tiles_png_true_colour_packs_the_palette_index() {
        let mut config = Config::default();
        config.tiles_png_palette_mode = TilesPngPaletteMode::TrueColor;
        let mut tileset = one_tile_tileset();
        tileset.palette_index_of_tile = vec![1];
        tileset.palettes = vec![tileset.palettes[0], tileset.palettes[0]];

        let mut bytes = Vec::new();
        emit_tiles_png(&config, &tileset, &mut bytes).unwrap();
        let (_, data, palette) = decode(&bytes);

        assert_eq!(palette.len(), 2 * 16 * 3);
        assert_eq!(data[0], 0x11);
        assert_eq!(data[1], 0x12);
    }

    #[test]
    fn tiles_png_height_grows_in_whole_tile_rows() {
        let config = Config::default();
        let mut tileset = one_tile_tileset();
        tileset.tiles = vec![GbaTile::default(); 17];
        tileset.palette_index_of_tile = vec![0; 17];

        let mut bytes = Vec::new();
        emit_tiles_png(&config, &tileset, &mut bytes).unwrap();
        let (info, _, _) = decode(&bytes);
        assert_eq!(info.height, 16);
    }
}
