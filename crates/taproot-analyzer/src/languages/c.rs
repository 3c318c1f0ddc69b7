//! C and C++ scope rules

use super::{ScopeKind, ScopeRules, field_text};
use tree_sitter::Node;

/// Function names hide inside the declarator chain; walk down until the
/// function declarator's identifier appears.
fn declarator_name(node: &Node, source: &[u8]) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => {
                current = current.child_by_field_name("declarator")?;
            }
            "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
            | "operator_name" => {
                return current.utf8_text(source).ok().map(|s| s.to_string());
            }
            "pointer_declarator" | "reference_declarator" | "parenthesized_declarator" => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0))?;
            }
            _ => return None,
        }
    }
}

pub struct C;

impl ScopeRules for C {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "function_definition" => Some(ScopeKind::Function),
            // A bare `struct foo;` declaration is not a scope.
            "struct_specifier" if node.child_by_field_name("body").is_some() => {
                Some(ScopeKind::Class)
            }
            _ => None,
        }
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "function_definition" => declarator_name(node, source),
            _ => field_text(node, "name", source),
        }
    }
}

pub struct Cpp;

impl ScopeRules for Cpp {
    fn grammar(&self) -> tree_sitter::Language {
        tree_sitter_cpp::LANGUAGE.into()
    }

    fn scope_kind(&self, node: &Node) -> Option<ScopeKind> {
        match node.kind() {
            "function_definition" => Some(ScopeKind::Function),
            "class_specifier" | "struct_specifier"
                if node.child_by_field_name("body").is_some() =>
            {
                Some(ScopeKind::Class)
            }
            "namespace_definition" => Some(ScopeKind::Namespace),
            _ => None,
        }
    }

    fn scope_name(&self, node: &Node, source: &[u8]) -> Option<String> {
        match node.kind() {
            "function_definition" => declarator_name(node, source),
            _ => field_text(node, "name", source),
        }
    }
}
