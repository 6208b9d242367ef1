//! Command-line options.

use std::path::PathBuf;

use clap::Parser;

const MAX_DIMENSION: u32 = 8192;
const MAX_REFRESH_HZ: f32 = 480.0;

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

fn parse_size(s: &str) -> Result<FrameSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size `{s}`, expected WxH"))?;
    let dimension = |v: &str| -> Result<u32, String> {
        let n: u32 = v.trim().parse().map_err(|_| format!("invalid dimension `{v}`"))?;
        if n == 0 || n > MAX_DIMENSION {
            return Err(format!("dimension {n} must be between 1 and {MAX_DIMENSION}"));
        }
        Ok(n)
    };
    Ok(FrameSize {
        width: dimension(w)?,
        height: dimension(h)?,
    })
}

fn parse_refresh(s: &str) -> Result<f32, String> {
    let hz: f32 = s.parse().map_err(|_| format!("invalid refresh rate `{s}`"))?;
    if !(hz.is_finite() && hz > 0.0 && hz <= MAX_REFRESH_HZ) {
        return Err(format!("refresh rate must be in (0, {MAX_REFRESH_HZ}] Hz"));
    }
    Ok(hz)
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "camfx")]
#[command(about = "Headless CamFX live effects runner")]
#[command(version)]
pub struct Options {
    /// Pipeline configuration (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Effect parameters (JSON)
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Virtual background image
    #[arg(long, value_name = "IMAGE")]
    pub background: Option<PathBuf>,

    /// Synthetic camera frame size
    #[arg(long, value_name = "WxH", default_value = "1280x720", value_parser = parse_size)]
    pub size: FrameSize,

    /// Refreshes to run; runs until interrupted when omitted
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Display refresh rate
    #[arg(long = "refresh", value_name = "HZ", default_value = "60", value_parser = parse_refresh)]
    pub refresh_hz: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        Options::try_parse_from(std::iter::once("camfx").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_without_arguments() {
        let opts = parse(&[]).unwrap();
        assert_eq!(
            opts.size,
            FrameSize {
                width: 1280,
                height: 720
            }
        );
        assert_eq!(opts.refresh_hz, 60.0);
        assert_eq!(opts.frames, None);
        assert_eq!(opts.config, None);
    }

    #[test]
    fn parses_every_flag() {
        let opts = parse(&[
            "--config", "c.json", "--params", "p.json", "--background", "bg.jpg", "--size",
            "640x360", "--frames", "120", "--refresh", "30",
        ])
        .unwrap();
        assert_eq!(opts.config, Some(PathBuf::from("c.json")));
        assert_eq!(opts.params, Some(PathBuf::from("p.json")));
        assert_eq!(opts.background, Some(PathBuf::from("bg.jpg")));
        assert_eq!((opts.size.width, opts.size.height), (640, 360));
        assert_eq!(opts.frames, Some(120));
        assert_eq!(opts.refresh_hz, 30.0);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--size", "640"]).is_err());
        assert!(parse(&["--size", "0x10"]).is_err());
        assert!(parse(&["--size", "99999x10"]).is_err());
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--refresh", "0"]).is_err());
        assert!(parse(&["--refresh", "NaN"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
