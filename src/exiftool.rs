//! [`FrameExtractor`] backed by a long-lived ExifTool process.
//!
//! ExifTool is started once in `-stay_open` mode and fed one
//! command per request over stdin. Frames are handed over in
//! a temporary file. Metadata is requested as JSON; the raw
//! thermal image comes back base64 encoded in the same JSON
//! envelope (`exiftool -j -b`).
use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use serde_derive::*;

use crate::{calibration::Metadata, extract::FrameExtractor};

#[derive(Debug)]
struct Process {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Debug)]
pub struct ExiftoolExtractor {
    program: String,
    process: Option<Process>,
    seq: u64,
}

impl ExiftoolExtractor {
    pub fn new<S: Into<String>>(program: S) -> Self {
        ExiftoolExtractor {
            program: program.into(),
            process: None,
            seq: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Run one command and collect its output up to the
    /// `{readyN}` line.
    fn execute(&mut self, args: &[&str]) -> Result<Vec<u8>> {
        self.seq += 1;
        let seq = self.seq;
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| anyhow!("exiftool is not running"))?;

        for arg in args {
            writeln!(process.stdin, "{}", arg)?;
        }
        writeln!(process.stdin, "-execute{}", seq)?;
        process.stdin.flush()?;

        let ready = format!("{{ready{}}}", seq);
        let mut output = vec![];
        let mut line = vec![];
        loop {
            line.clear();
            if process.stdout.read_until(b'\n', &mut line)? == 0 {
                bail!("exiftool exited while running {:?}", args);
            }
            if trim_newline(&line) == ready.as_bytes() {
                return Ok(output);
            }
            output.extend_from_slice(&line);
        }
    }

    fn execute_on_frame<T>(&mut self, frame: &[u8], args: &[&str]) -> Result<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let mut file = tempfile::Builder::new()
            .prefix("csq-frame-")
            .suffix(".fff")
            .tempfile()
            .context("creating temporary frame file")?;
        file.write_all(frame)?;
        file.flush()?;

        let path = file
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("temporary path is not valid UTF-8"))?
            .to_string();
        let mut args = args.to_vec();
        args.push(&path);

        let output = self.execute(&args)?;
        let mut values: Vec<T> = serde_json::from_slice(&output)
            .with_context(|| format!("parsing exiftool output for {:?}", args))?;
        match values.len() {
            1 => Ok(values.remove(0)),
            n => bail!("expected exiftool json array with one item, found {}", n),
        }
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Default for ExiftoolExtractor {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

#[derive(Deserialize, Debug)]
struct ThermalRawBytes {
    #[serde(rename = "RawThermalImageType", default)]
    ty: Option<String>,

    #[serde(
        rename = "RawThermalImage",
        deserialize_with = "serde_helpers::base64_bytes"
    )]
    bytes: Vec<u8>,
}

impl FrameExtractor for ExiftoolExtractor {
    fn start(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }
        let mut child = Command::new(&self.program)
            .args(&["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("starting `{}`", self.program))?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("exiftool stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("exiftool stdout unavailable"))?;
        info!("started exiftool (pid {})", child.id());
        self.process = Some(Process {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut process = match self.process.take() {
            Some(p) => p,
            None => return Ok(()),
        };
        let request = writeln!(process.stdin, "-stay_open\nFalse")
            .and_then(|_| process.stdin.flush());
        if let Err(e) = request {
            warn!("exiftool did not accept shutdown ({}), killing it", e);
            process.child.kill()?;
        }
        drop(process.stdin);
        let status = process.child.wait()?;
        info!("exiftool exited with {}", status);
        Ok(())
    }

    fn extract_metadata(&mut self, frame: &[u8]) -> Result<Metadata> {
        self.execute_on_frame(frame, &["-j", "-FLIR:all"])
    }

    fn extract_raw_binary(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let raw: ThermalRawBytes = self.execute_on_frame(
            frame,
            &["-j", "-b", "-RawThermalImageType", "-RawThermalImage"],
        )?;
        debug!(
            "raw thermal image: {} bytes ({})",
            raw.bytes.len(),
            raw.ty.as_deref().unwrap_or("unknown type")
        );
        Ok(raw.bytes)
    }
}

impl Drop for ExiftoolExtractor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("stopping exiftool: {:#}", e);
        }
    }
}

mod serde_helpers {
    use lazy_static::lazy_static;
    use regex::Regex;
    use serde::*;

    pub fn base64_bytes<'de, D>(de: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^base64:").unwrap();
        }

        use serde::de::Error;
        let str_rep = <String as Deserialize>::deserialize(de)?;

        RE.find(&str_rep)
            .ok_or_else(|| Error::custom("unexpected format: must begin with `base64:`"))?;

        use base64::decode;
        let slice = &str_rep[7..];
        let bytes = decode(slice).map_err(Error::custom)?;

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_bytes_from_json() {
        let json = r#"{"SourceFile": "x.fff", "RawThermalImageType": "PNG", "RawThermalImage": "base64:iVBORw=="}"#;
        let raw: ThermalRawBytes = serde_json::from_str(json).unwrap();
        assert_eq!(raw.ty.as_deref(), Some("PNG"));
        assert_eq!(raw.bytes, b"\x89PNG");
    }

    #[test]
    fn raw_bytes_need_base64_prefix() {
        let json = r#"{"RawThermalImage": "iVBORw=="}"#;
        assert!(serde_json::from_str::<ThermalRawBytes>(json).is_err());
    }

    #[test]
    fn ready_line_detection() {
        assert_eq!(trim_newline(b"{ready3}\r\n"), b"{ready3}");
        assert_eq!(trim_newline(b"{ready3}\n"), b"{ready3}");
        assert_eq!(trim_newline(b"{ready3}"), b"{ready3}");
    }

    #[test]
    fn not_running_is_an_error() {
        let mut et = ExiftoolExtractor::new("exiftool");
        assert!(!et.is_running());
        assert!(et.extract_metadata(b"FFF\0RT").is_err());
        assert!(et.stop().is_ok());
    }

    #[test]
    fn missing_program_fails_to_start() {
        let mut et = ExiftoolExtractor::new("/nonexistent/exiftool");
        assert!(et.start().is_err());
        assert!(!et.is_running());
    }

    // Answers like `exiftool -stay_open True -@ -` and logs
    // every argument line it receives.
    #[cfg(unix)]
    const STAND_IN: &str = r#"#!/bin/sh
log="$(dirname "$0")/requests.log"
raw=0
while IFS= read -r line; do
    printf '%s\n' "$line" >> "$log"
    case "$line" in
        -b) raw=1 ;;
        -execute*)
            if [ "$raw" = 1 ]; then
                echo '[{"SourceFile":"f","RawThermalImageType":"PNG","RawThermalImage":"base64:iVBORw=="}]'
            else
                echo '[{"SourceFile":"f","FLIR:Emissivity":0.95,"FLIR:ObjectDistance":"1.00 m"}]'
            fi
            echo "{ready${line#-execute}}"
            raw=0
            ;;
        False) exit 0 ;;
    esac
done
"#;

    #[cfg(unix)]
    #[test]
    fn stay_open_session() {
        use std::{fs, os::unix::fs::PermissionsExt};

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("exiftool");
        fs::write(&program, STAND_IN).unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let mut et = ExiftoolExtractor::new(program.to_str().unwrap());
        et.start().unwrap();
        assert!(et.is_running());

        let metadata = et.extract_metadata(b"FFF\0RT frame").unwrap();
        assert_eq!(metadata["FLIR:Emissivity"], serde_json::json!(0.95));
        assert_eq!(metadata["FLIR:ObjectDistance"], serde_json::json!("1.00 m"));

        assert_eq!(et.extract_raw_binary(b"FFF\0RT frame").unwrap(), b"\x89PNG");
        // Next request still finds its own ready line.
        assert!(et.extract_metadata(b"FFF\0RT frame").is_ok());

        et.stop().unwrap();
        assert!(!et.is_running());

        let log = fs::read_to_string(dir.path().join("requests.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(&lines[..2], &["-j", "-FLIR:all"]);
        assert!(lines[2].contains("csq-frame-"));
        assert_eq!(lines[3], "-execute1");
        assert_eq!(
            &lines[4..8],
            &["-j", "-b", "-RawThermalImageType", "-RawThermalImage"]
        );
        assert_eq!(lines[9], "-execute2");
        assert_eq!(lines[13], "-execute3");
        assert_eq!(&lines[14..], &["-stay_open", "False"]);
    }
}
