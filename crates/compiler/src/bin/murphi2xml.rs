//! `murphi2xml` executable (§4.H): prints the entire IR as an XML
//! document conforming to the bundled `murphi2xml.rng` schema.

use clap::Parser as ClapParser;
use rumur::drivers::xml;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "murphi2xml")]
#[command(about = "Prints a Murphi model's IR as RelaxNG-validated XML", long_about = None)]
struct Cli {
    /// Input .m source file
    input: PathBuf,

    /// Output path (default stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("murphi2xml: {message}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let source = std::fs::read_to_string(&cli.input).map_err(|e| format!("{}: {e}", cli.input.display()))?;
    let compiled = rumur::compile_source(&source, 0, false, None).map_err(|e| e.to_string())?;
    let out = xml::generate(&compiled).map_err(|e| e.to_string())?;
    match &cli.output {
        Some(path) => std::fs::write(path, out).map_err(|e| format!("{}: {e}", path.display())),
        None => {
            print!("{out}");
            Ok(())
        }
    }
}
