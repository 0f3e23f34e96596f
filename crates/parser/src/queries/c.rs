//! C tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::compile_query;
use crate::parser::LanguageQueries;

/// Import extraction query for C
const IMPORTS_QUERY: &str = r#"
; #include "foo.h"
(preproc_include
  path: (string_literal) @import)

; #include <foo.h>
(preproc_include
  path: (system_lib_string) @import)
"#;

/// Call extraction query for C
const CALLS_QUERY: &str = r#"
; Direct calls, including macro-style calls: foo() / MAX(a, b)
(call_expression
  function: (identifier) @call)
"#;

/// Definition extraction query for C
const DEFINITIONS_QUERY: &str = r#"
(function_definition
  declarator: (function_declarator
    declarator: (identifier) @name)) @definition.function

(struct_specifier
  name: (type_identifier) @name) @definition.struct

(enum_specifier
  name: (type_identifier) @name) @definition.enum
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    imports: compile_query(grammar, IMPORTS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
  }
}
