//! Go tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::compile_query;
use crate::parser::LanguageQueries;

/// Import extraction query for Go
const IMPORTS_QUERY: &str = r#"
; import "fmt" / import f "fmt" / import _ "fmt" / import . "fmt"
(import_spec
  path: (interpreted_string_literal) @import)
"#;

/// Call extraction query for Go
const CALLS_QUERY: &str = r#"
; Direct calls: foo()
(call_expression
  function: (identifier) @call)

; Selector calls: pkg.Foo() / obj.Method()
(call_expression
  function: (selector_expression
    field: (field_identifier) @call))
"#;

/// Definition extraction query for Go
const DEFINITIONS_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name) @definition.function

(method_declaration
  name: (field_identifier) @name) @definition.method

(type_spec
  name: (type_identifier) @name) @definition.type
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    imports: compile_query(grammar, IMPORTS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
  }
}
