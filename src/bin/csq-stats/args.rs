use anyhow::Result;
use clap::value_t_or_exit;
use csq::{arg, args_parser, opt, ReaderConfig, TrailingFrame};

pub struct Args {
    pub paths: Vec<String>,
    pub config: ReaderConfig,
    pub distance: Option<f64>,
    pub count_only: bool,
    pub use_exiftool: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("csq-stats")
            .about("Compute per-frame temperature stats of CSQ videos.")
            .arg(
                opt!("count")
                    .short("c")
                    .takes_value(false)
                    .help("Only count the frames of each video"),
            )
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
                opt!("exiftool")
                    .short("x")
                    .takes_value(false)
                    .help("Extract frames with exiftool instead of the built-in parser"),
            )
            .arg(
                arg!("paths")
                    .required(true)
                    .multiple(true)
                    .help("CSQ video paths"),
            )
            .get_matches();

        let paths = matches
            .values_of("paths")
            .map(|v| v.map(String::from).collect())
            .unwrap_or_default();

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

        let distance = matches
            .is_present("distance")
            .then(|| value_t_or_exit!(matches.value_of("distance"), f64));

        Ok(Args {
            paths,
            config,
            distance,
            count_only: matches.is_present("count"),
            use_exiftool: matches.is_present("exiftool"),
        })
    }
}
