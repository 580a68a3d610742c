// Command-line interface for wikifmt
//
// This binary exposes the wikifmt-babel library to the shell: inspecting storage documents,
// converting them to and from editing surfaces, and editing diagrams in place.
//
// The library is shell agnostic. Everything that touches files, stdout or the process exit code
// lives here.
//
// Usage:
//  wikifmt parse <input>                                   - Segment list as JSON
//  wikifmt convert <input> --to <surface> [-o <file>]      - Storage text to a surface
//  wikifmt convert <input> --from <surface> --base <file>  - Surface text back to storage
//  wikifmt diagrams <input>                                - Diagram registry as JSON
//  wikifmt set-diagram <input> <id> <code> [-o <file>]     - Replace one diagram's source
//  wikifmt check <input>                                   - Verify the round-trip law
//  wikifmt snapshot <input> [--title <title>]              - Version snapshot as JSON
//  wikifmt list-surfaces                                   - Available surfaces
//
// Errors are printed as "Error: ..." on stderr with exit code 1.

mod commands;

use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use std::process;
use tracing::Level;
use wikifmt_config::{Loader, WikifmtConfig};

fn build_cli() -> Command {
    Command::new("wikifmt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A tool for inspecting and converting wiki storage documents")
        .long_about(
            "wikifmt works with wiki pages in their storage format (XHTML with structured macros).\n\n\
            Commands:\n  \
            - parse, diagrams: inspect how a document is split into segments and diagrams\n  \
            - convert: move a document to and from an editing surface\n  \
            - set-diagram: replace the source of one diagram, touching nothing else\n  \
            - check: verify that parsing and serializing reproduces the input exactly\n\n\
            Examples:\n  \
            wikifmt convert page.xml --to plain-text         # Markdown view on stdout\n  \
            wikifmt convert page.md --base page.xml -o new.xml  # Markdown edit back to storage\n  \
            wikifmt set-diagram page.xml diagram-0 'graph TD;A-->C'"
        )
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to a wikifmt.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log progress to stderr (repeat for more detail)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("parse")
                .about("Print the segment list of a storage document as JSON")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert between storage text and an editing surface")
                .long_about(
                    "Convert a storage document to a surface (--to), or surface text back to\n\
                    storage (--from, with --base naming the storage document it was made from).\n\n\
                    Surfaces: rich-text, plain-text, preview, source.\n\
                    The surface of the input is auto-detected from its extension when --from is\n\
                    omitted and --base is given."
                )
                .arg(input_arg())
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Surface to convert the storage document to")
                        .conflicts_with("from")
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Surface the input was written in")
                        .requires("base")
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("base")
                        .long("base")
                        .help("Storage document the surface text was generated from")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("diagrams")
                .about("Print the diagram registry of a storage document as JSON")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("set-diagram")
                .about("Replace the source of one diagram")
                .arg(input_arg())
                .arg(
                    Arg::new("id")
                        .help("Diagram id, as printed by the diagrams command")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("code")
                        .help("New diagram source")
                        .required_unless_present("code-file")
                        .index(3),
                )
                .arg(
                    Arg::new("code-file")
                        .long("code-file")
                        .help("Read the new diagram source from a file")
                        .conflicts_with("code")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Verify that the document survives parse and serialize byte for byte")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Print a version snapshot of a storage document as JSON")
                .arg(input_arg())
                .arg(
                    Arg::new("title")
                        .long("title")
                        .help("Snapshot title (defaults to the file stem)"),
                ),
        )
        .subcommand(Command::new("list-surfaces").about("List the available editing surfaces"))
}

fn input_arg() -> Arg {
    Arg::new("input")
        .help("Input file path")
        .required(true)
        .index(1)
        .value_hint(ValueHint::FilePath)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .long("output")
        .short('o')
        .help("Output file path (defaults to stdout)")
        .value_hint(ValueHint::FilePath)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_cli_config(path: Option<&str>) -> Result<WikifmtConfig, String> {
    let mut loader = Loader::new();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader
        .build()
        .map_err(|e| format!("failed to load configuration: {e}"))
}

fn run(matches: &ArgMatches, config: &WikifmtConfig) -> Result<(), String> {
    match matches.subcommand() {
        Some(("parse", sub)) => commands::parse(input(sub), config),
        Some(("convert", sub)) => commands::convert(
            input(sub),
            sub.get_one::<String>("to").map(String::as_str),
            sub.get_one::<String>("from").map(String::as_str),
            sub.get_one::<String>("base").map(String::as_str),
            output(sub),
            config,
        ),
        Some(("diagrams", sub)) => commands::diagrams(input(sub), config),
        Some(("set-diagram", sub)) => {
            let id = sub
                .get_one::<String>("id")
                .map(String::as_str)
                .unwrap_or_default();
            let code = match sub.get_one::<String>("code-file") {
                Some(path) => commands::read_file(path)?,
                None => sub.get_one::<String>("code").cloned().unwrap_or_default(),
            };
            commands::set_diagram(input(sub), id, &code, output(sub), config)
        }
        Some(("check", sub)) => commands::check(input(sub), config),
        Some(("snapshot", sub)) => commands::snapshot(
            input(sub),
            sub.get_one::<String>("title").map(String::as_str),
        ),
        Some(("list-surfaces", _)) => {
            commands::list_surfaces();
            Ok(())
        }
        _ => Err("unknown subcommand, use --help for usage information".to_string()),
    }
}

fn input(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or_default()
}

fn output(matches: &ArgMatches) -> Option<&str> {
    matches.get_one::<String>("output").map(String::as_str)
}

fn main() {
    let matches = build_cli().get_matches();
    init_logging(matches.get_count("verbose"));

    let result = load_cli_config(matches.get_one::<String>("config").map(String::as_str))
        .and_then(|config| run(&matches, &config));

    if let Err(message) = result {
        eprintln!("Error: {message}");
        process::exit(1);
    }
}
