//! Per-language tree-sitter query tables.

mod c;
mod cpp;
mod go;
mod java;
mod javascript;
mod python;
mod rust;

use sift_core::Language;
use tree_sitter::{Language as TsLanguage, Query};

use crate::parser::LanguageQueries;

pub fn compile_query(grammar: &TsLanguage, source: &str) -> Option<Query> {
  match Query::new(grammar, source) {
    Ok(query) => Some(query),
    Err(err) => {
      tracing::warn!(error = %err, "failed to compile tree-sitter query");
      None
    }
  }
}

pub fn load_queries(lang: Language, grammar: &TsLanguage) -> LanguageQueries {
  match lang {
    Language::Rust => rust::queries(grammar),
    Language::Python => python::queries(grammar),
    Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx => javascript::queries(grammar),
    Language::Go => go::queries(grammar),
    Language::Java => java::queries(grammar),
    Language::C => c::queries(grammar),
    Language::Cpp => cpp::queries(grammar),
    _ => LanguageQueries { imports: None, calls: None, definitions: None },
  }
}
