//! Macro classification tables

use super::segment::MacroType;
use std::collections::BTreeMap;

/// Names and parameters the codec uses to classify macros
///
/// Macro names are matched case-insensitively. A macro whose name is in none of the lists is
/// [`MacroType::Opaque`] and round-trips untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCatalog {
    /// Macros whose body is diagram source
    pub diagram_macros: Vec<String>,
    /// Parameter holding the source of a diagram macro
    pub diagram_parameter: String,
    /// Macros whose plain-text body is source code
    pub code_macros: Vec<String>,
    /// Parameter holding the language of a code macro
    pub language_parameter: String,
    /// Languages that turn a code macro into a diagram
    pub diagram_languages: Vec<String>,
    /// Macros whose rich-text body is editable document content
    pub callout_macros: Vec<String>,
}

impl Default for MacroCatalog {
    fn default() -> Self {
        MacroCatalog {
            diagram_macros: strings(&["mermaid", "mermaid-cloud", "mermaid-macro"]),
            diagram_parameter: "code".to_string(),
            code_macros: strings(&["code", "noformat"]),
            language_parameter: "language".to_string(),
            diagram_languages: strings(&["mermaid"]),
            callout_macros: strings(&["info", "note", "warning", "tip", "panel", "expand"]),
        }
    }
}

impl MacroCatalog {
    pub fn classify(&self, name: &str, parameters: &BTreeMap<String, String>) -> MacroType {
        if contains(&self.diagram_macros, name) {
            MacroType::Diagram
        } else if contains(&self.code_macros, name) {
            let is_diagram = parameters
                .get(&self.language_parameter)
                .is_some_and(|lang| contains(&self.diagram_languages, lang.trim()));
            if is_diagram {
                MacroType::CodeDiagram
            } else {
                MacroType::Code
            }
        } else if contains(&self.callout_macros, name) {
            MacroType::Callout
        } else {
            MacroType::Opaque
        }
    }

    /// Macro name used when a diagram has to be created from scratch
    pub fn default_diagram_macro(&self) -> &str {
        self.diagram_macros
            .first()
            .map(String::as_str)
            .unwrap_or("mermaid")
    }

    /// Macro name used when a code block has to be created from scratch
    pub fn default_code_macro(&self) -> &str {
        self.code_macros.first().map(String::as_str).unwrap_or("code")
    }

    pub fn is_diagram_language(&self, language: &str) -> bool {
        contains(&self.diagram_languages, language)
    }
}

fn contains(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
