//! `murphi2c` executable (§4.H): a pure-C transliteration of a Murphi
//! model's type decls, const decls, functions and procedures.

use clap::Parser as ClapParser;
use rumur::drivers::c;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "murphi2c")]
#[command(about = "Transliterates a Murphi model's declarations into C", long_about = None)]
struct Cli {
    /// Input .m source file
    input: PathBuf,

    /// Output path (default stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit a public header valid in both C and C++
    #[arg(long)]
    header: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("murphi2c: {message}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let source = std::fs::read_to_string(&cli.input).map_err(|e| format!("{}: {e}", cli.input.display()))?;
    let compiled = rumur::compile_source(&source, 0, false, None).map_err(|e| e.to_string())?;
    let out = c::generate(&compiled, cli.header).map_err(|e| e.to_string())?;
    match &cli.output {
        Some(path) => std::fs::write(path, out).map_err(|e| format!("{}: {e}", path.display())),
        None => {
            print!("{out}");
            Ok(())
        }
    }
}
