//! The compiler driver: normalisation, palette packing, tile re-rendering
//! and deduplication, glued together for primary and secondary tilesets.

use std::collections::HashMap;

use crate::colour::rgba_to_bgr;
use crate::config::Config;
use crate::normalise::{normalise, Normalised};
use crate::palette::{pack_colour_sets, ColourSet, ColourUniverse};
use crate::tiles::{
    Assignment, CompiledTileset, DecompiledTileset, GbaPalette, GbaTile, COLOURS_PER_PALETTE,
};
use crate::{Result, TilesetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerMode {
    Primary,
    Secondary,
}

/// Everything one compilation needs: the configuration, the mode, and (for
/// a secondary compilation) a borrow of the compiled primary it extends.
/// The primary is never mutated and must outlive the compile call.
pub struct CompilerContext<'a> {
    pub config: &'a Config,
    pub mode: CompilerMode,
    pub primary: Option<&'a CompiledTileset>,
}

impl<'a> CompilerContext<'a> {
    pub fn primary(config: &'a Config) -> Self {
        CompilerContext {
            config,
            mode: CompilerMode::Primary,
            primary: None,
        }
    }

    pub fn secondary(config: &'a Config, primary: &'a CompiledTileset) -> Self {
        CompilerContext {
            config,
            mode: CompilerMode::Secondary,
            primary: Some(primary),
        }
    }

    /// Tile budget: a secondary set shares the total with its primary.
    fn max_tiles(&self) -> usize {
        match self.mode {
            CompilerMode::Primary => self.config.num_tiles_in_primary,
            CompilerMode::Secondary => self.config.num_tiles_total,
        }
    }

    fn max_palettes(&self) -> usize {
        match self.mode {
            CompilerMode::Primary => self.config.num_palettes_in_primary,
            CompilerMode::Secondary => self.config.num_palettes_total,
        }
    }
}

/// Re-renders a normalised tile against its assigned hardware palette:
/// every local palette index becomes the slot holding the same colour.
fn make_tile(normalised: &Normalised, palette: &GbaPalette) -> GbaTile {
    let mut slot_of_local = [0u8; 16];
    for local in 1..normalised.palette.size {
        let colour = normalised.palette.colours[local];
        let slot = palette.colours[1..]
            .iter()
            .position(|&c| c == colour)
            .expect("normalised colour missing from its assigned palette")
            + 1;
        slot_of_local[local] = slot as u8;
    }

    let mut index_pairs = [0u8; 32];
    for (pair, &local_pair) in index_pairs.iter_mut().zip(&normalised.pixels.0) {
        *pair = slot_of_local[(local_pair & 0xf) as usize]
            | (slot_of_local[(local_pair >> 4) as usize] << 4);
    }
    GbaTile { index_pairs }
}

/// Compiles a decompiled tile sheet. In secondary mode the output contains
/// the primary's tiles and palettes as a prefix and only appends.
pub fn compile(ctx: &CompilerContext, decompiled: &DecompiledTileset) -> Result<CompiledTileset> {
    let normalised = decompiled
        .tiles
        .iter()
        .enumerate()
        .map(|(index, tile)| normalise(index, tile))
        .collect::<Result<Vec<_>>>()?;
    log::debug!("normalised {} input tiles", normalised.len());

    // The colour universe indexes the primary's colours first so that the
    // pinned bins below translate directly into colour sets.
    let mut universe = ColourUniverse::new();
    let pinned: Vec<ColourSet> = match ctx.primary {
        Some(primary) => primary
            .palettes
            .iter()
            .map(|palette| {
                palette
                    .used_colours()
                    .map(|colour| universe.insert(colour))
                    .collect()
            })
            .collect(),
        None => Vec::new(),
    };
    for normalised in &normalised {
        for &colour in &normalised.palette.colours[1..normalised.palette.size] {
            universe.insert(colour);
        }
    }

    let cap = COLOURS_PER_PALETTE * ctx.max_palettes();
    if universe.len() > cap {
        return Err(TilesetError::TooManyUniqueColours {
            count: universe.len(),
            cap,
        });
    }

    let tile_sets: Vec<ColourSet> = normalised
        .iter()
        .map(|normalised| universe.colour_set(&normalised.palette))
        .collect();

    let bins = pack_colour_sets(
        &tile_sets,
        &pinned,
        ctx.max_palettes(),
        ctx.config.max_recurse_count,
    )?;

    // Materialise the bins. Pinned bins keep the primary's palettes
    // verbatim; new bins lay their colours out in universe order, with
    // unused slots repeating the transparency sentinel.
    let sentinel = rgba_to_bgr(ctx.config.transparency_colour);
    let palettes: Vec<GbaPalette> = bins
        .iter()
        .enumerate()
        .map(|(bin_index, bin)| match ctx.primary {
            Some(primary) if bin_index < primary.palettes.len() => primary.palettes[bin_index],
            _ => {
                let mut palette = GbaPalette::filled_with(sentinel);
                for (slot, colour_index) in bin.indices().enumerate() {
                    palette.colours[slot + 1] = universe.colour(colour_index);
                }
                palette
            }
        })
        .collect();

    let mut tiles: Vec<GbaTile> = Vec::new();
    let mut palette_index_of_tile: Vec<u8> = Vec::new();
    let mut tile_indices: HashMap<GbaTile, usize> = HashMap::new();
    if let Some(primary) = ctx.primary {
        tiles.extend_from_slice(&primary.tiles);
        palette_index_of_tile.extend_from_slice(&primary.palette_index_of_tile);
        for (index, tile) in primary.tiles.iter().enumerate() {
            tile_indices.entry(*tile).or_insert(index);
        }
    }

    let mut assignments = Vec::with_capacity(normalised.len());
    for (normalised, tile_set) in normalised.iter().zip(&tile_sets) {
        let palette_index = bins
            .iter()
            .position(|bin| tile_set.is_subset_of(bin))
            .expect("every colour set fits one packed palette");

        let tile = make_tile(normalised, &palettes[palette_index]);
        let tile_index = match tile_indices.get(&tile) {
            Some(&index) => index,
            None => {
                let index = tiles.len();
                tile_indices.insert(tile, index);
                tiles.push(tile);
                palette_index_of_tile.push(palette_index as u8);
                index
            }
        };

        assignments.push(Assignment {
            tile_index,
            palette_index,
            h_flip: normalised.h_flip,
            v_flip: normalised.v_flip,
        });
    }

    if tiles.len() > ctx.max_tiles() {
        return Err(TilesetError::TooManyTiles {
            count: tiles.len(),
            cap: ctx.max_tiles(),
        });
    }
    log::info!(
        "compiled {} unique tiles across {} palettes from {} input tiles",
        tiles.len(),
        palettes.len(),
        decompiled.tiles.len()
    );

    Ok(CompiledTileset {
        tiles,
        palettes,
        palette_index_of_tile,
        assignments,
    })
}
