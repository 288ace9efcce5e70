mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::{CheckArgs, Command};

const KEY_MAP: [(&str, &str); 5] = [
    ("Up / Down", "speed x1.1 / /1.1 (0.001-1000)"),
    ("Right / Left", "warp +0.1 / -0.1 (floor 0.1)"),
    ("X / Z", "thickness +0.01 / -0.01 (floor 0.01)"),
    ("C / V", "color shift +0.05 / -0.05"),
    ("Escape", "quit"),
];

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Run(args)) => run::run(args),
        Some(Command::Check(args)) => run_check(args),
        Some(Command::Keys) => {
            run_keys();
            Ok(())
        }
        None => run::run(cli.run),
    }
}

fn run_check(args: CheckArgs) -> Result<()> {
    let config = run::resolve_config(&args.run)?;
    let report = renderer::check(&config, args.frames)?;

    println!("Program: {}", report.program);
    println!("Input block: {} bytes", report.block_size);
    println!("Slots:");
    for (name, slot) in &report.slots {
        println!(
            "  {:<12} offset={:<4} type={}",
            name.to_string(),
            slot.offset,
            slot.kind
        );
    }
    if let Some((width, height)) = report.frame_size {
        println!(
            "Rendered {} frame(s) at {width}x{height} on the cpu device",
            report.frames
        );
    }
    Ok(())
}

fn run_keys() {
    println!("Keyboard controls (step sizes configurable under [controls]):");
    for (keys, action) in KEY_MAP {
        println!("  {keys:<14} {action}");
    }
}
