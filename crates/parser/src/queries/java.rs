//! Java tree-sitter queries

use tree_sitter::Language as TsLanguage;

use super::compile_query;
use crate::parser::LanguageQueries;

/// Import extraction query for Java
const IMPORTS_QUERY: &str = r#"
; import foo.bar.Baz; / import static foo.Bar.baz;
(import_declaration
  (scoped_identifier) @import)

(import_declaration
  (identifier) @import)
"#;

/// Call extraction query for Java
const CALLS_QUERY: &str = r#"
; Direct/method calls: foo() / obj.method()
(method_invocation
  name: (identifier) @call)

; Object creation, including anonymous classes: new Runnable() { ... }
(object_creation_expression
  type: (type_identifier) @call)
"#;

/// Definition extraction query for Java
const DEFINITIONS_QUERY: &str = r#"
(method_declaration
  name: (identifier) @name) @definition.method

(class_declaration
  name: (identifier) @name) @definition.class

(interface_declaration
  name: (identifier) @name) @definition.interface

(enum_declaration
  name: (identifier) @name) @definition.enum
"#;

pub fn queries(grammar: &TsLanguage) -> LanguageQueries {
  LanguageQueries {
    imports: compile_query(grammar, IMPORTS_QUERY),
    calls: compile_query(grammar, CALLS_QUERY),
    definitions: compile_query(grammar, DEFINITIONS_QUERY),
  }
}
