//! Rfun compiler CLI.
//!
//! Usage:
//!   rfunc program.json
//!   rfunc program.json -o program.s
//!
//! The input is a surface AST serialized by the external parser; the output
//! is GAS x86-64 assembly (default `<input>.s`). Set
//! `RUST_LOG=rfun_compiler=debug` to watch the passes run.

use std::env;
use std::path::PathBuf;
use std::process;

use rfun_compiler::compile_file;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
struct Args {
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    show_help: bool,
    show_version: bool,
}

impl Args {
    fn parse() -> Result<Args, String> {
        let mut parsed = Args::default();
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.show_help = true,
                "-v" | "--version" => parsed.show_version = true,
                "-o" | "--output" => match args.next() {
                    Some(path) => parsed.output_file = Some(PathBuf::from(path)),
                    None => return Err(format!("{} requires a path", arg)),
                },
                other if other.starts_with('-') => {
                    return Err(format!("unknown option {}", other));
                }
                other => {
                    if parsed.input_file.is_some() {
                        return Err("more than one input file given".to_string());
                    }
                    parsed.input_file = Some(PathBuf::from(other));
                }
            }
        }
        Ok(parsed)
    }
}

fn print_usage() {
    println!("Usage: rfunc <ast.json> [-o <output.s>]");
    println!();
    println!("Compiles a serialized Rfun surface AST to x86-64 assembly.");
    println!();
    println!("Options:");
    println!("  -o, --output <path>  Write assembly to <path> (default: <input>.s)");
    println!("  -h, --help           Show this help");
    println!("  -v, --version        Show version");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match Args::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("rfunc: {}", message);
            process::exit(2);
        }
    };

    if args.show_help {
        print_usage();
        return;
    }
    if args.show_version {
        println!("rfunc {}", VERSION);
        return;
    }

    let input = match args.input_file {
        Some(path) => path,
        None => {
            print_usage();
            process::exit(2);
        }
    };

    match compile_file(&input, args.output_file.as_deref()) {
        Ok(out_path) => {
            println!("Wrote {}", out_path.display());
        }
        Err(err) => {
            eprintln!("rfunc: {}", err);
            process::exit(1);
        }
    }
}
