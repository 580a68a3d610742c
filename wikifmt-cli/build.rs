use clap::{Arg, ArgAction, Command, ValueHint};
use clap_complete::{generate_to, Shell};
use std::env;
use std::io::Error;

// Mirror of the subcommands from src/main.rs
// We need to duplicate this here since build scripts can't access src/ modules
const SUBCOMMANDS: &[(&str, &str)] = &[
    ("parse", "Print the segment list of a storage document as JSON"),
    ("convert", "Convert between storage text and an editing surface"),
    ("diagrams", "Print the diagram registry of a storage document as JSON"),
    ("set-diagram", "Replace the source of one diagram"),
    ("check", "Verify that the document survives parse and serialize byte for byte"),
    ("snapshot", "Print a version snapshot of a storage document as JSON"),
];

const SURFACES: &[&str] = &["rich-text", "plain-text", "preview", "source"];

fn main() -> Result<(), Error> {
    let outdir = match env::var_os("OUT_DIR") {
        None => return Ok(()),
        Some(outdir) => outdir,
    };

    let mut cmd = Command::new("wikifmt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A tool for inspecting and converting wiki storage documents")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to a wikifmt.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true),
        );

    for (name, about) in SUBCOMMANDS {
        let mut sub = Command::new(*name).about(*about).arg(
            Arg::new("input")
                .help("Input file path")
                .required(true)
                .index(1)
                .value_hint(ValueHint::FilePath),
        );
        if *name == "convert" {
            sub = sub
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_parser(clap::builder::PossibleValuesParser::new(SURFACES)),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_parser(clap::builder::PossibleValuesParser::new(SURFACES)),
                )
                .arg(Arg::new("base").long("base").value_hint(ValueHint::FilePath));
        }
        cmd = cmd.subcommand(sub);
    }
    cmd = cmd.subcommand(Command::new("list-surfaces").about("List the available editing surfaces"));

    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        generate_to(shell, &mut cmd, "wikifmt", &outdir)?;
    }

    println!("cargo:warning=Shell completions generated in {outdir:?}");

    Ok(())
}
