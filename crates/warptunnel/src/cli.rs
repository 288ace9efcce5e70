use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use field::Style;
use renderer::DeviceKind;

#[derive(Parser, Debug)]
#[command(
    name = "warptunnel",
    author,
    version,
    about = "Interactive procedural warp tunnel",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `$WARPTUNNEL_CONFIG` or the user config dir.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tunnel style: `classic`, `twirl`, `thor`, `rings`, or flags joined by `+` (e.g. `drift+banking`).
    #[arg(long, value_name = "STYLE", value_parser = parse_style)]
    pub style: Option<Style>,

    /// Where the program runs: `gpu` (default) or `cpu`.
    #[arg(long, value_name = "DEVICE", value_parser = parse_device)]
    pub device: Option<DeviceKind>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Internal resolution factor for the CPU device (0.1-1.0).
    #[arg(long, value_name = "SCALE")]
    pub render_scale: Option<f32>,

    /// CPU worker threads; defaults to one per core.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// WGSL fragment body replacing the built-in tunnel (GPU device only).
    #[arg(long, value_name = "FILE")]
    pub shader: Option<PathBuf>,

    /// Freeze the clock at this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub time: Option<f32>,

    /// Initial travel speed.
    #[arg(long, value_name = "VALUE")]
    pub speed: Option<f32>,

    /// Initial palette drift rate.
    #[arg(long, value_name = "VALUE")]
    pub warp: Option<f32>,

    /// Initial glow band thickness.
    #[arg(long, value_name = "VALUE")]
    pub thickness: Option<f32>,

    /// Initial palette phase offset.
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub color_shift: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the tunnel window (the default when no subcommand is given).
    Run(RunArgs),
    /// Compile, link and bind the program without a window, then print its input slots.
    Check(CheckArgs),
    /// Print the keyboard controls.
    Keys,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Also render this many frames on the CPU device.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub frames: u64,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_style(value: &str) -> Result<Style, String> {
    value.parse::<Style>().map_err(|err| err.to_string())
}

pub fn parse_device(value: &str) -> Result<DeviceKind, String> {
    value.parse::<DeviceKind>()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    tunnelconfig::parse_size(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_flags_fill_run_args() {
        let cli = Cli::try_parse_from([
            "warptunnel",
            "--style",
            "thor",
            "--device",
            "cpu",
            "--size",
            "640x480",
            "--color-shift",
            "-0.25",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.style, Some(Style::thor()));
        assert_eq!(cli.run.device, Some(DeviceKind::Cpu));
        assert_eq!(cli.run.size, Some((640, 480)));
        assert_eq!(cli.run.color_shift, Some(-0.25));
    }

    #[test]
    fn check_subcommand_takes_frames_and_run_flags() {
        let cli = Cli::try_parse_from(["warptunnel", "check", "--frames", "3", "--style", "twirl"])
            .unwrap();
        let Some(Command::Check(args)) = cli.command else {
            panic!("expected check subcommand");
        };
        assert_eq!(args.frames, 3);
        assert_eq!(args.run.style, Some(Style::twirl()));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["warptunnel", "--device", "tpu"]).is_err());
        assert!(Cli::try_parse_from(["warptunnel", "--size", "big"]).is_err());
        assert!(Cli::try_parse_from(["warptunnel", "--style", "sparkle"]).is_err());
    }
}
