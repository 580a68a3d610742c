//! Subcommand handlers
//!
//! Each handler reads its input, runs one library operation and writes the result to stdout or
//! the `--output` file. Errors come back as display strings for `main` to print.

use std::fs;
use std::path::Path;
use tracing::{debug, info};
use wikifmt_babel::codec::{self, visit_macros};
use wikifmt_babel::{
    DiagramRegistry, EditSession, NullSink, SurfaceContext, SurfaceRegistry, VersionSnapshot,
};
use wikifmt_config::WikifmtConfig;

pub fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("reading file '{path}': {e}"))
}

fn write_output(output: Option<&str>, text: &str) -> Result<(), String> {
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("writing file '{path}': {e}"))?;
            info!(path, bytes = text.len(), "output written");
            Ok(())
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value)
        .map(|json| json + "\n")
        .map_err(|e| format!("serializing JSON: {e}"))
}

pub fn parse(input: &str, config: &WikifmtConfig) -> Result<(), String> {
    let text = read_file(input)?;
    let segments = codec::parse_with(&text, &config.catalog());
    write_output(None, &to_json(&segments)?)
}

pub fn convert(
    input: &str,
    to: Option<&str>,
    from: Option<&str>,
    base: Option<&str>,
    output: Option<&str>,
    config: &WikifmtConfig,
) -> Result<(), String> {
    let surfaces = SurfaceRegistry::with_defaults();
    let content = read_file(input)?;

    if let Some(to) = to {
        surfaces.get(to).map_err(|e| e.to_string())?;
        let catalog = config.catalog();
        let segments = codec::parse_with(&content, &catalog);
        let registry = DiagramRegistry::register(&segments);
        let ctx = SurfaceContext::new(&segments, &registry, &catalog);
        let text = surfaces
            .to_surface(&segments, to, &ctx)
            .map_err(|e| e.to_string())?;
        return write_output(output, &text);
    }

    let base = base.ok_or("--base is required when converting back to storage")?;
    let from = match from {
        Some(from) => from.to_string(),
        None => surfaces.detect_surface_from_filename(input).ok_or_else(|| {
            format!("could not detect surface from filename '{input}', specify --from or --to")
        })?,
    };
    debug!(surface = %from, base, "converting surface text back to storage");

    let mut options = config.session_options();
    options.surface = from.clone();
    let mut session = EditSession::open(title_of(base), read_file(base)?, options, NullSink)
        .map_err(|e| e.to_string())?;
    if session.is_degraded() && from != "source" {
        return Err(format!(
            "base document '{base}' is malformed, only the source surface can be applied"
        ));
    }
    session
        .load_surface_edit(&content)
        .map_err(|e| e.to_string())?;
    write_output(output, session.storage_text())
}

pub fn diagrams(input: &str, config: &WikifmtConfig) -> Result<(), String> {
    let text = read_file(input)?;
    let segments = codec::parse_with(&text, &config.catalog());
    let registry = DiagramRegistry::register(&segments);
    write_output(None, &to_json(registry.diagrams())?)
}

pub fn set_diagram(
    input: &str,
    id: &str,
    code: &str,
    output: Option<&str>,
    config: &WikifmtConfig,
) -> Result<(), String> {
    let mut options = config.session_options();
    options.surface = "source".to_string();
    let mut session = EditSession::open(title_of(input), read_file(input)?, options, NullSink)
        .map_err(|e| e.to_string())?;
    session
        .update_diagram(id, code.trim_end_matches('\n'))
        .map_err(|e| e.to_string())?;
    write_output(output, session.storage_text())
}

pub fn check(input: &str, config: &WikifmtConfig) -> Result<(), String> {
    let text = read_file(input)?;
    let catalog = config.catalog();
    let segments = codec::try_parse_with(&text, &catalog)
        .map_err(|e| format!("'{input}' is malformed: {e}"))?;
    if codec::serialize(&segments) != text {
        return Err(format!("'{input}' does not survive parse and serialize unchanged"));
    }

    let mut macros = 0;
    visit_macros(&segments, &mut |_, _| macros += 1);
    let diagrams = DiagramRegistry::register(&segments).len();
    println!(
        "ok: {} segments, {macros} macros, {diagrams} diagrams",
        segments.len()
    );
    Ok(())
}

pub fn snapshot(input: &str, title: Option<&str>) -> Result<(), String> {
    let text = read_file(input)?;
    let title = title.map(str::to_string).unwrap_or_else(|| title_of(input));
    let json = VersionSnapshot::new(title, text)
        .to_json()
        .map_err(|e| e.to_string())?;
    write_output(None, &(json + "\n"))
}

pub fn list_surfaces() {
    let surfaces = SurfaceRegistry::with_defaults();
    println!("Available surfaces:\n");
    for name in surfaces.list_surfaces() {
        if let Ok(surface) = surfaces.get(&name) {
            let mode = if surface.is_editable() { "" } else { " (read-only)" };
            println!("  {name:<12} {}{mode}", surface.description());
        }
    }
}

fn title_of(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}
