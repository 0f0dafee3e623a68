//! `murphi-format` executable (§4.H): a round-tripping pretty printer
//! for Murphi source.

use clap::Parser as ClapParser;
use rumur::drivers::format;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "murphi-format")]
#[command(about = "Reformats a Murphi source file", long_about = None)]
struct Cli {
    /// Input .m source file
    input: PathBuf,

    /// Rewrite the input file in place instead of printing to stdout
    #[arg(short, long)]
    in_place: bool,

    /// Output path (default stdout, ignored with --in-place)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("murphi-format: {message}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let source = std::fs::read_to_string(&cli.input).map_err(|e| format!("{}: {e}", cli.input.display()))?;
    let formatted = format::format_source(&source).map_err(|e| e.to_string())?;

    if cli.in_place {
        return std::fs::write(&cli.input, formatted).map_err(|e| format!("{}: {e}", cli.input.display()));
    }

    match &cli.output {
        Some(path) => std::fs::write(path, formatted).map_err(|e| format!("{}: {e}", path.display())),
        None => {
            print!("{formatted}");
            Ok(())
        }
    }
}
