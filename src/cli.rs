//! Helpers to parse CLI arguments in the accompanying
//! binaries.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use std::path::Path;

use anyhow::{Context, Result};
pub use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use log::info;

use crate::{config::ReaderConfig, FrameReader};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name).version(clap::crate_version!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Log to stderr, filtered by `RUST_LOG` (default: warnings).
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    // A second initialisation only fails; keep the first.
    let _ = env_logger::Builder::from_env(env).try_init();
}

pub fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7} {msg}"),
    );
    bar
}

/// Number of frames in a CSQ file.
pub fn count_file_frames(path: &Path, config: &ReaderConfig) -> Result<usize> {
    let mut reader = FrameReader::open(path, config)
        .with_context(|| format!("opening {}", path.display()))?;
    let frames = reader
        .count_frames()
        .with_context(|| format!("counting frames of {}", path.display()))?;
    reader.close()?;
    info!("{}: {} frames", path.display(), frames);
    Ok(frames)
}
