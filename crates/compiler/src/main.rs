//! `rumur` CLI: compiles a Murphi source file into a standalone
//! explicit-state checker (§6 generator interface).

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{generate, Shell};
use rumur::codegen::{self, GenConfig, OutputFormat};
use rumur::config::FileConfig;
use rumur::smt::SmtConfig;
use std::io::Write as _;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "rumur")]
#[command(about = "Compiles a Murphi finite-state specification into a standalone model checker", long_about = None)]
struct Cli {
    /// Input .m source file; omitted only when `--completions` is given
    input: Option<PathBuf>,

    /// Generate a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Output path (default stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose diagnostics (record-reordering notices, SMT prune decisions)
    #[arg(long)]
    debug: bool,

    /// Default worker thread count baked into the emitted checker
    #[arg(long)]
    threads: Option<usize>,

    /// plain text or machine-readable (XML) trace output by default
    #[arg(long, value_name = "FORMAT", default_value = "plain")]
    output_format: OutputFormatArg,

    /// Enable the platform sandbox in the emitted checker
    #[arg(long, value_name = "on|off", default_value = "off")]
    sandbox: OnOff,

    /// Collapse scalarset permutations into one canonical representative
    #[arg(long, value_name = "on|off", default_value = "on")]
    symmetry_reduction: OnOff,

    /// Path to an SMT solver binary used to prune unreachable guards
    #[arg(long, value_name = "PATH")]
    smt_path: Option<String>,

    /// Extra argument passed to the SMT solver (repeatable)
    #[arg(long = "smt-arg", value_name = "ARG")]
    smt_args: Vec<String>,

    /// SMT prelude text prepended to every query
    #[arg(long, value_name = "TEXT")]
    smt_prelude: Option<String>,

    /// SMT logic name (e.g. QF_LIA)
    #[arg(long, value_name = "NAME")]
    smt_logic: Option<String>,

    /// Encode ranges as bitvectors rather than unbounded integers
    #[arg(long, value_name = "on|off", default_value = "off")]
    smt_bitvectors: OnOff,

    /// Print the version and exit
    #[arg(long)]
    version: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormatArg {
    Plain,
    MachineReadable,
}

#[derive(Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
enum OnOff {
    On,
    Off,
}

impl OnOff {
    fn is_on(self) -> bool {
        self == OnOff::On
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", std::env::var("RUMUR_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()));
        return;
    }

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    match run(&cli) {
        Ok(()) => {}
        Err(message) => {
            eprintln!("rumur: {message}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let input = cli.input.as_ref().ok_or_else(|| "missing input file (or pass --completions)".to_string())?;
    let source = std::fs::read_to_string(input).map_err(|e| format!("{}: {e}", input.display()))?;

    let dir = input.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_config = FileConfig::load(dir).map_err(|e| e.to_string())?;

    let threads = cli.threads.or(file_config.threads);
    let sandbox = cli.sandbox.is_on() || file_config.sandbox.unwrap_or(false);
    let symmetry_reduction = if cli.symmetry_reduction.is_on() { file_config.symmetry_reduction.unwrap_or(true) } else { false };

    let smt_config = build_smt_config(cli, &file_config);

    let compiled = rumur::compile_source(&source, 0, cli.debug, smt_config).map_err(|e| e.to_string())?;

    if cli.debug {
        for line in &compiled.debug_log {
            eprintln!("rumur: debug: {line}");
        }
    }

    let gen_config = GenConfig {
        default_threads: threads,
        sandbox,
        output_format: match cli.output_format {
            OutputFormatArg::Plain => OutputFormat::Plain,
            OutputFormatArg::MachineReadable => OutputFormat::MachineReadable,
        },
        symmetry_reduction,
    };

    let source = codegen::generate(&compiled, &gen_config).map_err(|e| e.to_string())?;

    match &cli.output {
        Some(path) => std::fs::write(path, source).map_err(|e| format!("{}: {e}", path.display()))?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(source.as_bytes()).map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}

fn build_smt_config(cli: &Cli, file_config: &FileConfig) -> Option<SmtConfig> {
    let file_smt = file_config.smt.as_ref();
    let solver_path = cli.smt_path.clone().or_else(|| file_smt.and_then(|s| s.path.clone()));
    solver_path.as_ref()?;

    let mut extra_args = file_smt.and_then(|s| s.args.clone()).unwrap_or_default();
    extra_args.extend(cli.smt_args.clone());

    Some(SmtConfig {
        solver_path,
        extra_args,
        prelude: cli.smt_prelude.clone().or_else(|| file_smt.and_then(|s| s.prelude.clone())),
        logic: cli.smt_logic.clone().or_else(|| file_smt.and_then(|s| s.logic.clone())),
        bitvectors: cli.smt_bitvectors.is_on() || file_smt.and_then(|s| s.bitvectors).unwrap_or(false),
    })
}
