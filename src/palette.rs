//! Colour universe construction and the palette-packing search.
//!
//! Packing the tiles' colour sets into at most K palettes of 15 opaque
//! slots is a bin-packing problem, solved here by backtracking over an
//! explicit stack of states. Sets are placed largest-first so that a set
//! tends to be processed before its subsets, which then merge into an
//! existing bin for free.

use std::collections::HashMap;

use crate::colour::Bgr15;
use crate::normalise::NormalisedPalette;
use crate::tiles::COLOURS_PER_PALETTE;
use crate::{Result, TilesetError};

/// Capacity of the colour universe: 15 opaque colours for each of the 16
/// hardware palettes.
pub const MAX_UNIQUE_COLOURS: usize = 240;

const WORDS: usize = MAX_UNIQUE_COLOURS.div_ceil(64);

/// A fixed 240-bit set of global colour indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColourSet {
    words: [u64; WORDS],
}

impl ColourSet {
    pub const EMPTY: ColourSet = ColourSet { words: [0; WORDS] };

    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < MAX_UNIQUE_COLOURS);
        self.words[index / 64] |= 1 << (index % 64);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn union(&self, other: &ColourSet) -> ColourSet {
        let mut words = self.words;
        for (word, other) in words.iter_mut().zip(&other.words) {
            *word |= other;
        }
        ColourSet { words }
    }

    pub fn is_subset_of(&self, other: &ColourSet) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(word, other)| word & !other == 0)
    }

    /// Member indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_UNIQUE_COLOURS).filter(move |&i| self.contains(i))
    }
}

impl FromIterator<usize> for ColourSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = ColourSet::EMPTY;
        for index in iter {
            set.insert(index);
        }
        set
    }
}

/// The distinct opaque colours seen across a compilation, each assigned a
/// stable index in first-seen order.
#[derive(Debug, Default)]
pub struct ColourUniverse {
    indices: HashMap<Bgr15, usize>,
    colours: Vec<Bgr15>,
}

impl ColourUniverse {
    pub fn new() -> Self {
        ColourUniverse::default()
    }

    pub fn insert(&mut self, colour: Bgr15) -> usize {
        match self.indices.get(&colour) {
            Some(&index) => index,
            None => {
                let index = self.colours.len();
                self.indices.insert(colour, index);
                self.colours.push(colour);
                index
            }
        }
    }

    pub fn len(&self) -> usize {
        self.colours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colours.is_empty()
    }

    pub fn colour(&self, index: usize) -> Bgr15 {
        self.colours[index]
    }

    /// The global colour set of a tile-local palette. Every colour must
    /// already be in the universe.
    pub fn colour_set(&self, palette: &NormalisedPalette) -> ColourSet {
        palette.colours[1..palette.size]
            .iter()
            .map(|colour| self.indices[colour])
            .collect()
    }
}

struct AssignState {
    bins: Vec<ColourSet>,
    /// Index into the sorted set list of the set being placed.
    index: usize,
    /// The bin the set will be tried against next.
    next_bin: usize,
}

/// Packs the tiles' colour sets into `num_palettes` bins of at most 15
/// colours each.
///
/// `pinned` bins (a compiled primary's palettes, in secondary mode) occupy
/// the first bin slots and are never modified; sets that already fit one
/// of them are satisfied without entering the search. Returns the bins,
/// pinned ones included, so bin positions are palette indices.
pub fn pack_colour_sets(
    tile_sets: &[ColourSet],
    pinned: &[ColourSet],
    num_palettes: usize,
    max_recurse_count: usize,
) -> Result<Vec<ColourSet>> {
    assert!(pinned.len() <= num_palettes);
    let first_mutable = pinned.len();

    // Distinct sets in deterministic first-seen order, skipping anything a
    // pinned bin already satisfies.
    let mut unassigned: Vec<ColourSet> = Vec::new();
    for set in tile_sets {
        if set.is_empty()
            || pinned.iter().any(|bin| set.is_subset_of(bin))
            || unassigned.contains(set)
        {
            continue;
        }
        unassigned.push(*set);
    }
    // Largest first, so a set is processed before its subsets.
    unassigned.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut initial = Vec::with_capacity(num_palettes);
    initial.extend_from_slice(pinned);
    initial.resize(num_palettes, ColourSet::EMPTY);

    let mut stack = vec![AssignState {
        bins: initial,
        index: 0,
        next_bin: first_mutable,
    }];
    let mut steps = 0usize;

    loop {
        let top = match stack.last() {
            Some(top) => top,
            None => return Err(TilesetError::NoPaletteAssignment),
        };
        if top.index == unassigned.len() {
            let solution = stack.pop().expect("stack is non-empty").bins;
            log::debug!(
                "packed {} colour sets into {} palettes after {} steps",
                unassigned.len(),
                num_palettes,
                steps
            );
            return Ok(solution);
        }
        if top.next_bin == num_palettes {
            stack.pop();
            continue;
        }
        if steps == max_recurse_count {
            return Err(TilesetError::SearchExhausted {
                limit: max_recurse_count,
            });
        }
        steps += 1;

        let top = stack.last_mut().expect("stack is non-empty");
        let bin = top.next_bin;
        top.next_bin += 1;
        let merged = top.bins[bin].union(&unassigned[top.index]);
        if merged.len() <= COLOURS_PER_PALETTE {
            let mut bins = top.bins.clone();
            bins[bin] = merged;
            let index = top.index + 1;
            stack.push(AssignState {
                bins,
                index,
                next_bin: first_mutable,
            });
        }
    }
}
