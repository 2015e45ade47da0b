//! Source-level reference rewriting
//!
//! Renames free identifiers in expression text using the spans recorded in
//! its AST. Member property names, object keys and string contents are
//! never touched.

use crate::ast::{Expr, Span};

/// Rewrite free identifiers of `source`.
///
/// `ast` must be the parse of `source`. `rename` receives each free
/// identifier as written and returns its replacement spelling, or `None`
/// to leave it alone. Shorthand object entries keep their key: `{ x }`
/// becomes `{ x: y }`.
pub fn rewrite_identifiers<F>(source: &str, ast: &Expr, mut rename: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut edits: Vec<(Span, String)> = Vec::new();
    collect_edits(ast, &mut rename, &mut edits);
    if edits.is_empty() {
        return source.to_string();
    }

    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        if span.start < cursor || span.end > source.len() {
            continue;
        }
        out.push_str(&source[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Rename references to a cell from `old` to `new`, keeping a leading `$`
pub fn rename_references(source: &str, ast: &Expr, old: &str, new: &str) -> String {
    rewrite_identifiers(source, ast, |name| renamed_reference(name, old, new))
}

/// New spelling of `name` if it refers to `old` either bare or as `$old`
pub fn renamed_reference(name: &str, old: &str, new: &str) -> Option<String> {
    if name == old {
        Some(new.to_string())
    } else if name.strip_prefix('$') == Some(old) {
        Some(format!("${}", new))
    } else {
        None
    }
}

fn collect_edits<F>(expr: &Expr, rename: &mut F, edits: &mut Vec<(Span, String)>)
where
    F: FnMut(&str) -> Option<String>,
{
    match expr {
        Expr::Ident { name, span } => {
            if let Some(replacement) = rename(name) {
                edits.push((*span, replacement));
            }
        }
        Expr::Object(props) => {
            for prop in props {
                match &prop.value {
                    Expr::Ident { name, span } if prop.shorthand => {
                        if let Some(replacement) = rename(name) {
                            edits.push((*span, format!("{}: {}", prop.key, replacement)));
                        }
                    }
                    value => collect_edits(value, &mut *rename, &mut *edits),
                }
            }
        }
        _ => expr.for_each_child(|child| collect_edits(child, &mut *rename, &mut *edits)),
    }
}
