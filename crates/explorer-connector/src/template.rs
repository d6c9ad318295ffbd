//! Query text rendering and literal escaping shared by every engine.
//!
//! Templates are written indented like the code around them. Rendering
//! strips the common indentation, drops blank lines and re-indents
//! multi-line substitutions to the column of the line they land on, so
//! the same logical query always comes out byte-identical.

use crate::error::QueryBuildError;

/// Render a template given as `{}`-separated text.
///
/// ```
/// use explorer_connector::query;
/// let filter = "FILTER (\n  ?x = 1\n)";
/// let text = query!(
///     "
///     SELECT ?x {
///       {}
///     }
///     ",
///     filter
/// );
/// assert_eq!(text, "SELECT ?x {\n  FILTER (\n    ?x = 1\n  )\n}");
/// ```
#[macro_export]
macro_rules! query {
    ($template:expr $(, $value:expr)* $(,)?) => {
        $crate::template::render_template(
            $template,
            &[$(::std::convert::AsRef::<str>::as_ref(&$value)),*],
        )
    };
}

/// Split `template` at each `{}` and render it with `values`.
pub fn render_template(template: &str, values: &[&str]) -> String {
    let fragments: Vec<&str> = template.split("{}").collect();
    debug_assert_eq!(
        fragments.len(),
        values.len() + 1,
        "placeholder count does not match value count"
    );
    render(&fragments, values)
}

/// Interleave literal fragments with substitution values and sanitize.
///
/// `values[i]` is inserted after `fragments[i]`. Every line after the first
/// of a substitution is indented to match the line it is inserted into.
pub fn render(fragments: &[&str], values: &[&str]) -> String {
    let mut out = String::new();
    for (i, fragment) in fragments.iter().enumerate() {
        out.push_str(fragment);
        let Some(value) = values.get(i) else {
            continue;
        };
        let indent = current_indent(&out);
        let value = sanitize(value);
        let mut lines = value.lines();
        if let Some(first) = lines.next() {
            out.push_str(first);
        }
        for line in lines {
            out.push('\n');
            out.push_str(&indent);
            out.push_str(line);
        }
    }
    sanitize(&out)
}

/// Remove blank lines, trailing whitespace and the common leading indentation.
pub fn sanitize(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let indent = lines
        .iter()
        .map(|line| indent_width(line))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|line| &line[indent..])
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn current_indent(out: &str) -> String {
    let line_start = out.rfind('\n').map_or(0, |i| i + 1);
    let line = &out[line_start..];
    line[..indent_width(line)].to_string()
}

// ── Literal escaping ─────────────────────────────────────────────

fn quote(value: &str, escape_dollar: bool) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if escape_dollar => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A double-quoted Gremlin string literal. `$` is escaped so Groovy
/// never interpolates user input.
pub fn gremlin_string(value: &str) -> String {
    quote(value, true)
}

/// A double-quoted openCypher string literal.
pub fn cypher_string(value: &str) -> String {
    quote(value, false)
}

/// A backtick-quoted openCypher identifier (label, type or property key).
/// Control characters would not survive rendering, so they are rejected.
pub fn cypher_identifier(name: &str) -> Result<String, QueryBuildError> {
    if name.is_empty() || name.chars().any(char::is_control) {
        return Err(QueryBuildError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// A double-quoted SPARQL string literal.
pub fn sparql_string(value: &str) -> String {
    quote(value, false)
}

/// A SPARQL IRI reference. Characters that cannot appear in an IRIREF
/// are rejected rather than escaped.
pub fn sparql_iri(value: &str) -> Result<String, QueryBuildError> {
    let forbidden = |c: char| c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\');
    if value.is_empty() || value.chars().any(forbidden) {
        return Err(QueryBuildError::InvalidIri(value.to_string()));
    }
    Ok(format!("<{value}>"))
}

/// Quote each item and join with `", "`.
pub(crate) fn join_quoted(items: &[String], quote: fn(&str) -> String) -> String {
    items
        .iter()
        .map(|item| quote(item))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_dedents_and_drops_blank_lines() {
        let text = "
            MATCH (v)

              WHERE v.x = 1
            RETURN v
        ";
        assert_eq!(sanitize(text), "MATCH (v)\n  WHERE v.x = 1\nRETURN v");
    }

    #[test]
    fn nesting_depth_does_not_change_output() {
        let shallow = query!(
            "
            g.V()
              .limit(1)
            "
        );
        let deep = query!(
            "
                        g.V()
                          .limit(1)
            "
        );
        assert_eq!(shallow, deep);
    }

    #[test]
    fn multi_line_substitutions_are_reindented() {
        let filters = sanitize(
            "
            FILTER (?a = 1)
            FILTER (?b = 2)
            ",
        );
        let text = query!(
            "
            SELECT ?a {
              {
                {}
              }
            }
            ",
            filters
        );
        assert_eq!(
            text,
            "SELECT ?a {\n  {\n    FILTER (?a = 1)\n    FILTER (?b = 2)\n  }\n}"
        );
    }

    #[test]
    fn empty_substitution_leaves_no_blank_line() {
        let text = query!(
            "
            MATCH (v)
            {}
            RETURN v
            ",
            ""
        );
        assert_eq!(text, "MATCH (v)\nRETURN v");
    }

    #[test]
    fn gremlin_strings_escape_quotes_and_interpolation() {
        assert_eq!(gremlin_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(gremlin_string("${x}"), r#""\${x}""#);
        assert_eq!(gremlin_string("a\\b\nc"), r#""a\\b\nc""#);
    }

    #[test]
    fn cypher_identifiers_double_backticks() {
        assert_eq!(cypher_identifier("air`port").unwrap(), "`air``port`");
        assert_eq!(cypher_string("x\" OR 1=1"), r#""x\" OR 1=1""#);
    }

    #[test]
    fn cypher_identifiers_reject_control_characters() {
        for name in ["", "air\nport", "code\t", "a\u{0}b"] {
            assert_eq!(
                cypher_identifier(name),
                Err(QueryBuildError::InvalidIdentifier(name.to_string()))
            );
        }
        assert_eq!(cypher_identifier("län der").unwrap(), "`län der`");
    }

    #[test]
    fn sparql_iri_rejects_injection() {
        assert_eq!(
            sparql_iri("http://example.org/a").unwrap(),
            "<http://example.org/a>"
        );
        assert!(sparql_iri("http://x> } DROP ALL { <y").is_err());
        assert!(sparql_iri("").is_err());
        assert!(sparql_iri("http://x y").is_err());
    }
}
