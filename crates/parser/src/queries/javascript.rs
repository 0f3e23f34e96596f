//! JavaScript/TypeScript tree-sitter queries.
//!
//! The TypeScript and TSX grammars are supersets of the JavaScript grammar
//! and share the node types these queries match against, so one table
//! covers all four languages handled by [`super::load_queries`].

use tree_sitter::Language as TsLanguage;

use super::compile_query;
use crate::parser::LanguageQueries;

/// Import extraction query for JS/JSX/TS/TSX
const IMPORTS_QUERY: &str = r#"
; import foo from 'module'
(import_statement
  source: (string) @import)

; export ... from 'module'
(export_statement
  source: (string) @import)

; require('module') / dynamic import('module')
(call_expression
  arguments: (arguments (string) @import))
"#;

/// Call extraction query for JS/JSX/TS/TSX
const CALLS_QUERY: &str = r#"
; Direct calls: foo()
(call_expression
  function: (identifier) @call)

; Method calls: obj.method()
(call_expression
  function: (member_expression
    property: (property_identifier) @call))

; JSX components rendered as elements are effectively calls
(jsx_opening_element
  name: (identifier) @call)
(jsx_self_closing_element
  name: (identifier) @call)
"#;

/// Definition extraction query for JS/JSX/TS/TSX
const DEFINITIONS_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name) @definition.function

(method_definition
  name: (property_identifier) @name) @definition.method

(class_declaration
  name: [(identifier) (type_identifier)] @name) @definition.class

(interface_declaration
  name: (type_identifier) @name) @definition.interface
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    imports: compile_query(grammar, IMPORTS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
  }
}
