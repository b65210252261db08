mod args;

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::warn;
use rayon::prelude::*;
use serde_derive::*;

use csq::{
    cli::{count_file_frames, init_logging, progress_bar},
    extract::{FrameExtractor, StillImageDecoder},
    stats::Stats,
    FrameReader, ThermalImage,
};

use args::Args;

fn main() -> Result<()> {
    init_logging();
    let args = Args::from_cmd_line()?;

    if args.count_only {
        let counts = args
            .paths
            .par_iter()
            .map(|p| -> Result<_> {
                Ok(FrameCount {
                    path: p.clone(),
                    frames: count_file_frames(Path::new(p), &args.config)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        serde_json::to_writer(std::io::stdout().lock(), &counts)?;
        return Ok(());
    }

    let bar = progress_bar(args.paths.len() as u64);
    let (videos, cumulative) = args
        .paths
        .par_iter()
        .map(|p| -> Result<_> {
            bar.set_message(p.clone());
            let stats = video_stats(p, &args)?;
            bar.inc(1);
            Ok(stats)
        })
        .try_fold(
            || (vec![], Stats::default()),
            |mut acc, try_video| -> Result<_> {
                let video: VideoStats = try_video?;
                acc.1 += &video.cumulative;
                acc.0.push(video);
                Ok(acc)
            },
        )
        .try_reduce(
            || (vec![], Stats::default()),
            |mut acc1, acc2| -> Result<_> {
                acc1.0.extend(acc2.0);
                acc1.1 += &acc2.1;
                Ok(acc1)
            },
        )?;
    bar.finish_and_clear();

    #[derive(Debug, Serialize)]
    struct OutputJson {
        videos: Vec<VideoStats>,
        cumulative: Stats,
    }

    serde_json::to_writer(
        std::io::stdout().lock(),
        &OutputJson { videos, cumulative },
    )?;

    Ok(())
}

#[derive(Serialize, Debug)]
struct FrameCount {
    path: String,
    frames: usize,
}

#[derive(Serialize, Debug)]
struct FrameStats {
    index: usize,
    width: usize,
    height: usize,
    stats: Stats,
}

#[derive(Serialize, Debug)]
struct VideoStats {
    path: String,
    frames: Vec<FrameStats>,
    failed_frames: usize,
    cumulative: Stats,
}

fn video_stats(path: &str, args: &Args) -> Result<VideoStats> {
    let stats = if args.use_exiftool {
        let reader = FrameReader::open_with_exiftool(path, &args.config)?;
        frames_stats(reader, args.distance)
    } else {
        let reader = FrameReader::open(path, &args.config)?;
        frames_stats(reader, args.distance)
    };
    let (frames, failed_frames) = stats.with_context(|| format!("reading {}", path))?;

    let mut cumulative = Stats::default();
    for frame in frames.iter() {
        cumulative += &frame.stats;
    }
    Ok(VideoStats {
        path: path.into(),
        frames,
        failed_frames,
        cumulative,
    })
}

fn frames_stats<X: FrameExtractor>(
    mut reader: FrameReader<BufReader<File>, X, StillImageDecoder>,
    distance: Option<f64>,
) -> Result<(Vec<FrameStats>, usize)> {
    let mut frames = vec![];
    let mut failed = 0;
    for index in 0.. {
        let frame = reader
            .next_image()
            .and_then(|image| image.map(|i| frame_stats(index, i, distance)).transpose());
        match frame {
            Ok(Some(stats)) => frames.push(stats),
            Ok(None) => break,
            Err(e) if !e.is_terminal() => {
                warn!("frame {}: {}", index, e);
                failed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    reader.close()?;
    Ok((frames, failed))
}

fn frame_stats(
    index: usize,
    image: ThermalImage,
    distance: Option<f64>,
) -> csq::Result<FrameStats> {
    let image = match distance {
        Some(d) => ThermalImage {
            settings: image.settings.with_object_distance(d),
            ..image
        },
        None => image,
    };
    let temps = image.temperatures()?;
    let (height, width) = temps.dim();
    let stats = temps
        .par_iter()
        .fold(Stats::default, |mut acc, val| {
            acc += *val;
            acc
        })
        .reduce(Stats::default, |mut acc, val| {
            acc += &val;
            acc
        });

    Ok(FrameStats {
        index,
        width,
        height,
        stats,
    })
}
