mod args;
mod proc;

use std::fs::create_dir_all;

use anyhow::Result;
use csq::cli::{count_file_frames, init_logging, progress_bar};

use crate::{
    args::Args,
    proc::{transform_video, TransformArgs},
};

fn main() -> Result<()> {
    init_logging();
    let args = Args::from_cmd_line()?;
    let t_args = TransformArgs::from_args(&args)?;
    create_dir_all(&t_args.output)?;

    use rayon::prelude::*;
    let total = args
        .paths
        .par_iter()
        .map(|p| count_file_frames(p, &args.config))
        .try_reduce(|| 0, |a, b| Ok(a + b))?;
    let bar = progress_bar(total as u64);

    let count = args
        .paths
        .par_iter()
        .map(|p| transform_video(p, &t_args, &bar))
        .try_reduce(|| 0, |a, b| Ok(a + b))?;
    bar.finish_and_clear();

    eprintln!("Processed {} frames", count);
    eprintln!(
        "Transform equation: V = {} + {} C",
        t_args.coeffs[0], t_args.coeffs[1]
    );
    eprintln!(
        "Inverse equation: C = {} + {} V",
        -t_args.coeffs[0] / t_args.coeffs[1],
        1. / t_args.coeffs[1]
    );
    Ok(())
}
