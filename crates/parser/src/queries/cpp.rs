//! C++ tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::compile_query;
use crate::parser::LanguageQueries;

/// Import extraction query for C++
const IMPORTS_QUERY: &str = r#"
; #include "foo.h"
(preproc_include
  path: (string_literal) @import)

; #include <foo.h>
(preproc_include
  path: (system_lib_string) @import)
"#;

/// Call extraction query for C++
const CALLS_QUERY: &str = r#"
; Direct calls: foo() / MAX(a, b)
(call_expression
  function: (identifier) @call)

; Method calls: obj.foo() / obj->foo()
(call_expression
  function: (field_expression
    field: (field_identifier) @call))

; Qualified calls: ns::foo() / Class::foo()
(call_expression
  function: (qualified_identifier
    name: (identifier) @call))
"#;

/// Definition extraction query for C++
const DEFINITIONS_QUERY: &str = r#"
(function_definition
  declarator: (function_declarator
    declarator: (identifier) @name)) @definition.function

(function_definition
  declarator: (function_declarator
    declarator: (field_identifier) @name)) @definition.method

(class_specifier
  name: (type_identifier) @name) @definition.class

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
