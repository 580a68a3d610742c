//! Shared fixtures for the integration tests.

use std::path::PathBuf;

pub const SPEC_DIAGRAM: &str = r#"<ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code"><![CDATA[graph TD;A-->B]]></ac:parameter></ac:structured-macro>"#;

/// The paragraph with one inline diagram used throughout the docs
pub fn hello_world() -> String {
    format!("<p>Hello {SPEC_DIAGRAM} world</p>")
}

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {path:?}: {e}"))
}

pub fn kitchensink() -> String {
    fixture("kitchensink.xml")
}
