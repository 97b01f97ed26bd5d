//! Filesystem orchestration: loads the input sheets, runs the compiler,
//! lays out the output directory and emits every artifact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbaImage;

use crate::compiler::{compile, CompilerContext};
use crate::config::Config;
use crate::emitter;
use crate::importer;
use crate::tiles::{CompiledTileset, DecompiledTileset};
use crate::TilesetError;

/// The layered sheets of one `compile` invocation: the three primary
/// layers, plus the three secondary layers when compiling a secondary set.
pub struct CompileInputs {
    pub primary: [PathBuf; 3],
    pub secondary: Option<[PathBuf; 3]>,
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let image =
        image::open(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(image.to_rgba8())
}

fn load_layers(paths: &[PathBuf; 3]) -> Result<Vec<RgbaImage>> {
    paths.iter().map(|path| load_rgba(path)).collect()
}

fn check_metatile_count(
    config: &Config,
    decompiled: &DecompiledTileset,
    cap: usize,
    which: &str,
) -> Result<()> {
    let num_metatiles = decompiled.tiles.len() / config.num_tiles_per_metatile;
    if num_metatiles > cap {
        return Err(TilesetError::InvalidInput(format!(
            "{which} sheets hold {num_metatiles} metatiles, the target allows {cap}"
        ))
        .into());
    }
    Ok(())
}

struct OutputLayout {
    tiles_path: PathBuf,
    metatiles_path: PathBuf,
    palettes_dir: PathBuf,
}

fn prepare_output(output: &Path) -> Result<OutputLayout> {
    if output.exists() && !output.is_dir() {
        bail!("{}: exists but is not a directory", output.display());
    }
    let layout = OutputLayout {
        tiles_path: output.join("tiles.png"),
        metatiles_path: output.join("metatiles.bin"),
        palettes_dir: output.join("palettes"),
    };
    if layout.tiles_path.exists() && !layout.tiles_path.is_file() {
        bail!(
            "{}: exists in the output directory but is not a file",
            layout.tiles_path.display()
        );
    }
    if layout.palettes_dir.exists() && !layout.palettes_dir.is_dir() {
        bail!(
            "{}: exists in the output directory but is not a directory",
            layout.palettes_dir.display()
        );
    }
    fs::create_dir_all(&layout.palettes_dir)
        .with_context(|| format!("failed to create {}", layout.palettes_dir.display()))?;
    Ok(layout)
}

fn emit_artifacts(
    config: &Config,
    compiled: &CompiledTileset,
    output: &Path,
    with_metatiles: bool,
) -> Result<()> {
    let layout = prepare_output(output)?;

    emitter::emit_palettes(config, compiled, &layout.palettes_dir)
        .with_context(|| format!("failed to write palettes under {}", layout.palettes_dir.display()))?;
    log::info!("wrote {} palette files", config.num_palettes_total);

    let tiles_out = BufWriter::new(
        File::create(&layout.tiles_path)
            .with_context(|| format!("failed to create {}", layout.tiles_path.display()))?,
    );
    emitter::emit_tiles_png(config, compiled, tiles_out)
        .with_context(|| format!("failed to write {}", layout.tiles_path.display()))?;
    log::info!("wrote {} with {} tiles", layout.tiles_path.display(), compiled.tiles.len());

    if with_metatiles {
        let mut metatiles_out = BufWriter::new(
            File::create(&layout.metatiles_path)
                .with_context(|| format!("failed to create {}", layout.metatiles_path.display()))?,
        );
        emitter::emit_metatiles_bin(&mut metatiles_out, compiled)
            .with_context(|| format!("failed to write {}", layout.metatiles_path.display()))?;
        metatiles_out.flush()?;
        log::info!(
            "wrote {} with {} tile references",
            layout.metatiles_path.display(),
            compiled.assignments.len()
        );
    }
    Ok(())
}

/// Runs the layered `compile` pipeline end to end.
pub fn drive_compile(config: &Config, inputs: &CompileInputs, output: &Path) -> Result<()> {
    config.validate()?;

    let primary_layers = load_layers(&inputs.primary)?;
    let decompiled_primary = importer::import_layered_tiles(&primary_layers)?;
    check_metatile_count(
        config,
        &decompiled_primary,
        config.num_metatiles_in_primary,
        "primary",
    )?;
    let compiled_primary = compile(&CompilerContext::primary(config), &decompiled_primary)
        .context("failed to compile the primary tileset")?;

    let compiled = if config.secondary {
        let paths = inputs
            .secondary
            .as_ref()
            .context("secondary mode requires the three secondary layer sheets")?;
        let secondary_layers = load_layers(paths)?;
        let decompiled = importer::import_layered_tiles(&secondary_layers)?;
        // Secondary metatiles occupy the index range above the primary's,
        // so only the remainder of the total is available.
        check_metatile_count(
            config,
            &decompiled,
            config.num_metatiles_total - config.num_metatiles_in_primary,
            "secondary",
        )?;
        compile(
            &CompilerContext::secondary(config, &compiled_primary),
            &decompiled,
        )
        .context("failed to compile the secondary tileset")?
    } else {
        compiled_primary
    };

    emit_artifacts(config, &compiled, output, true)
}

/// Runs the `compile-raw` pipeline: one sheet, no metatile grouping, so no
/// `metatiles.bin` is produced.
pub fn drive_compile_raw(config: &Config, sheet: &Path, output: &Path) -> Result<()> {
    config.validate()?;

    let sheet = load_rgba(sheet)?;
    let decompiled = importer::import_raw_tiles(&sheet)?;
    let compiled = compile(&CompilerContext::primary(config), &decompiled)
        .context("failed to compile the tile sheet")?;

    emit_artifacts(config, &compiled, output, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One metatile (16×16) per layer: the bottom layer has an opaque red
    /// top-left tile, the other layers are fully transparent.
    fn write_test_sheets(dir: &Path) -> [PathBuf; 3] {
        let bottom = RgbaImage::from_fn(16, 16, |x, y| {
            if x < 8 && y < 8 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        });
        let clear = RgbaImage::from_fn(16, 16, |_, _| image::Rgba([0, 0, 0, 0]));

        let paths = [
            dir.join("bottom.png"),
            dir.join("middle.png"),
            dir.join("top.png"),
        ];
        bottom.save(&paths[0]).unwrap();
        clear.save(&paths[1]).unwrap();
        clear.save(&paths[2]).unwrap();
        paths
    }

    #[test]
    fn compile_emits_all_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let primary = write_test_sheets(dir.path());
        let output = dir.path().join("build");

        let config = Config::default();
        let inputs = CompileInputs {
            primary,
            secondary: None,
        };
        drive_compile(&config, &inputs, &output).unwrap();

        assert!(output.join("tiles.png").is_file());
        let palettes: Vec<_> = fs::read_dir(output.join("palettes"))
            .unwrap()
            .collect();
        assert_eq!(palettes.len(), config.num_palettes_total);

        // One metatile across three layers: 12 little-endian words. The
        // red tile is seen first and stored at index 0; the remaining
        // eleven references all share the transparent tile at index 1.
        let metatiles = fs::read(output.join("metatiles.bin")).unwrap();
        assert_eq!(metatiles.len(), 24);
        let words: Vec<u16> = metatiles
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(words[0], 0);
        assert!(words[1..].iter().all(|&word| word == 1));
    }

    #[test]
    fn secondary_compile_reuses_the_primary_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let primary = write_test_sheets(dir.path());

        // The secondary sheet reuses the primary's red tile and adds a
        // green one.
        let bottom = RgbaImage::from_fn(16, 16, |x, y| match (x < 8, y < 8) {
            (true, true) => image::Rgba([255, 0, 0, 255]),
            (false, true) => image::Rgba([0, 255, 0, 255]),
            _ => image::Rgba([0, 0, 0, 0]),
        });
        let clear = RgbaImage::from_fn(16, 16, |_, _| image::Rgba([0, 0, 0, 0]));
        let secondary = [
            dir.path().join("sec_bottom.png"),
            dir.path().join("sec_middle.png"),
            dir.path().join("sec_top.png"),
        ];
        bottom.save(&secondary[0]).unwrap();
        clear.save(&secondary[1]).unwrap();
        clear.save(&secondary[2]).unwrap();

        let output = dir.path().join("build");
        let mut config = Config::default();
        config.secondary = true;
        let inputs = CompileInputs {
            primary,
            secondary: Some(secondary),
        };
        drive_compile(&config, &inputs, &output).unwrap();

        let metatiles = fs::read(output.join("metatiles.bin")).unwrap();
        let words: Vec<u16> = metatiles
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        // Red resolves to its primary tile index and palette; green got a
        // fresh tile in a fresh palette above the primary's ranges.
        assert_eq!(words[0] & 0x3ff, 0);
        assert_eq!(words[0] >> 12, 0);
        assert_eq!(words[1] & 0x3ff, 2);
        assert_eq!(words[1] >> 12, config.num_palettes_in_primary as u16);
        // The transparent filler still points at the primary's shared
        // transparent tile.
        assert_eq!(words[2], 1);
    }

    #[test]
    fn missing_inputs_fail_with_the_path_in_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let inputs = CompileInputs {
            primary: [missing.clone(), missing.clone(), missing],
            secondary: None,
        };

        let err = drive_compile(&Config::default(), &inputs, dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("nope.png"));
    }

    #[test]
    fn output_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let primary = write_test_sheets(dir.path());
        let output = dir.path().join("occupied");
        fs::write(&output, b"").unwrap();

        let inputs = CompileInputs {
            primary,
            secondary: None,
        };
        assert!(drive_compile(&Config::default(), &inputs, &output).is_err());
    }

    #[test]
    fn compile_raw_skips_the_metatile_table() {
        let dir = tempfile::tempdir().unwrap();
        let sheet_path = dir.path().join("sheet.png");
        RgbaImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                image::Rgba([0, 0, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        })
        .save(&sheet_path)
        .unwrap();

        let output = dir.path().join("build");
        drive_compile_raw(&Config::default(), &sheet_path, &output).unwrap();

        assert!(output.join("tiles.png").is_file());
        assert!(!output.join("metatiles.bin").exists());
    }
}
