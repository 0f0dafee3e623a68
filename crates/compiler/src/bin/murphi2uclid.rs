//! `murphi2uclid` executable (§4.H): emits a Uclid5 module from a
//! Murphi model, rejecting constructs Uclid5 cannot express.

use clap::Parser as ClapParser;
use rumur::drivers::uclid::{self, NumericType};
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "murphi2uclid")]
#[command(about = "Translates a Murphi model into a Uclid5 module", long_about = None)]
struct Cli {
    /// Input .m source file
    input: PathBuf,

    /// Output path (default stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Integer encoding used for the generated module's numeric type
    #[arg(long, value_name = "integer|bv8|bv16|bv32|bv64", default_value = "integer")]
    numeric_type: String,
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("murphi2uclid: {message}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let numeric = NumericType::parse(&cli.numeric_type)
        .ok_or_else(|| format!("unknown --numeric-type '{}'", cli.numeric_type))?;
    let source = std::fs::read_to_string(&cli.input).map_err(|e| format!("{}: {e}", cli.input.display()))?;
    let compiled = rumur::compile_source(&source, 0, false, None).map_err(|e| e.to_string())?;
    let out = uclid::generate(&compiled, numeric).map_err(|e| e.to_string())?;
    match &cli.output {
        Some(path) => std::fs::write(path, out).map_err(|e| format!("{}: {e}", path.display())),
        None => {
            print!("{out}");
            Ok(())
        }
    }
}
