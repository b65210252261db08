use std::{
    fs::File,
    io::{BufWriter, Cursor},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, ensure, Context, Result};
use byteordered::ByteOrdered;
use csq::{FrameReader, ReaderConfig, ThermalImage};
use image::codecs::tiff::TiffEncoder;
use indicatif::ProgressBar;
use log::warn;

use super::Args;

pub struct TransformArgs {
    pub distance: Option<f64>,
    pub coeffs: [f64; 2],
    pub output: PathBuf,
    pub config: ReaderConfig,
}

impl TransformArgs {
    pub fn from_args(args: &Args) -> Result<Self> {
        ensure!(args.max > args.min, "max must be larger than min");
        let factor = u16::MAX as f64 / (args.max - args.min);
        let coeffs = [-args.min * factor, factor];

        Ok(TransformArgs {
            distance: args.distance,
            coeffs,
            output: args.output.clone(),
            config: args.config.clone(),
        })
    }

    pub fn transform(&self, val: f64) -> u16 {
        let tval = self.coeffs[0] + self.coeffs[1] * val;
        tval.max(0.).min(u16::MAX as f64) as u16
    }

    pub fn output_path_for(&self, path: &Path, index: usize) -> Result<PathBuf> {
        let stem = path
            .file_stem()
            .ok_or_else(|| anyhow!("no file name in {}", path.display()))?;
        let name = format!("{}-{:05}.tif", stem.to_string_lossy(), index);
        Ok(self.output.join(name))
    }
}

fn write_frame_tiff(thermal: ThermalImage, output_path: &Path, args: &TransformArgs) -> Result<()> {
    let thermal = match args.distance {
        Some(d) => ThermalImage {
            settings: thermal.settings.with_object_distance(d),
            ..thermal
        },
        None => thermal,
    };
    let temps = thermal.temperatures()?;
    let (ht, wid) = temps.dim();

    let mut image_buffer = ByteOrdered::native(Cursor::new(Vec::with_capacity(2 * ht * wid)));
    for val in temps.iter() {
        image_buffer.write_u16(args.transform(*val))?;
    }

    let image_writer = BufWriter::new(File::create(output_path)?);
    TiffEncoder::new(image_writer).encode(
        &image_buffer.into_inner().into_inner(),
        wid as u32,
        ht as u32,
        image::ColorType::L16,
    )?;
    Ok(())
}

/// Write every frame of a video; returns the number of
/// frames written.
pub fn transform_video(path: &Path, args: &TransformArgs, bar: &ProgressBar) -> Result<usize> {
    let mut reader = FrameReader::open(path, &args.config)?;
    let mut written = 0;
    for index in 0.. {
        let image = match reader.next_image() {
            Ok(Some(image)) => image,
            Ok(None) => break,
            Err(e) if !e.is_terminal() => {
                warn!("{}: frame {}: {}", path.display(), index, e);
                bar.inc(1);
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let out_path = args.output_path_for(path, index)?;
        write_frame_tiff(image, &out_path, args)
            .with_context(|| format!("writing {}", out_path.display()))?;
        written += 1;
        bar.inc(1);
    }
    reader.close()?;
    Ok(written)
}
