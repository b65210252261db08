use anyhow::Result;
use clap::value_t_or_exit;
use csq::{arg, args_parser, opt, ReaderConfig, TrailingFrame};
use std::path::PathBuf;

pub struct Args {
    pub paths: Vec<PathBuf>,
    pub output: PathBuf,
    pub min: f64,
    pub max: f64,
    pub distance: Option<f64>,
    pub config: ReaderConfig,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("csq-transform")
            .setting(clap::AppSettings::AllowLeadingHyphen)
            .about("Write the temperatures of every CSQ frame as a 16-bit TIFF.")
            .arg(
                opt!("output")
                    .short("o")
                    .required(true)
                    .help("Output directory"),
            )
            .arg(opt!("min").required(true).help("Temperature mapped to 0"))
            .arg(opt!("max").required(true).help("Temperature mapped to 65535"))
            .arg(
                opt!("distance")
                    .short("d")
                    .help("Object distance to use instead of the recorded one"),
            )
            .arg(opt!("config").help("Reader configuration (json)"))
            .arg(opt!("block size").help("Bytes to read at a time (default: 1000000)"))
            .arg(
                opt!("emit trailing")
                    .takes_value(false)
                    .help("Keep an unterminated last frame"),
            )
            .arg(
                arg!("videos")
                    .required(true)
                    .multiple(true)
                    .help("CSQ video paths"),
            )
            .get_matches();

        let paths = matches
            .values_of("videos")
            .map(|v| v.map(PathBuf::from).collect())
            .unwrap_or_default();
        let output = value_t_or_exit!(matches, "output", PathBuf);
        let min = value_t_or_exit!(matches, "min", f64);
        let max = value_t_or_exit!(matches, "max", f64);
        let distance = matches
            .is_present("distance")
            .then(|| value_t_or_exit!(matches.value_of("distance"), f64));

        let mut config = match matches.value_of("config") {
            Some(path) => ReaderConfig::from_json_path(path)?,
            None => ReaderConfig::default(),
        };
        if matches.is_present("block size") {
            config.block_size = value_t_or_exit!(matches, "block size", usize);
        }
        if matches.is_present("emit trailing") {
            config.trailing_frame = TrailingFrame::Emit;
        }

        Ok(Args {
            paths,
            output,
            min,
            max,
            distance,
            config,
        })
    }
}
