//! Display-template renderer.
//!
//! Templates are plain text with three directives:
//!
//! - `{{name}}` — interpolate the raw text of parameter `name` (missing
//!   optional parameters interpolate as empty),
//! - `{{#if name}}…{{/if}}` — keep the body only when `name` is truthy;
//!   `children.<slot>` names test whether the slot holds any children,
//! - `{{#each children.<slot>}}…{{/each}}` — instantiate the body once per
//!   pre-rendered child text, substituting `{{this}}` with the child text
//!   indented by one level.
//!
//! Conditionals are resolved innermost-first against the raw parameter map
//! (never against substituted text) and the template is re-scanned until no
//! conditional remains. Parameter interpolation happens last, in a single
//! left-to-right pass, so parameter values containing `{{` are emitted
//! literally.

use indexmap::IndexMap;
use tracing::debug;

const IF_OPEN: &str = "{{#if ";
const IF_CLOSE: &str = "{{/if}}";
const EACH_OPEN: &str = "{{#each children.";
const EACH_CLOSE: &str = "{{/each}}";

/// Indent applied to each line of a child inserted by `{{#each}}`.
const CHILD_INDENT: &str = "  ";

/// Render one block's template against its parameter map and the
/// pre-rendered text of its children, keyed by slot.
pub fn render(
    template: &str,
    params: &IndexMap<String, String>,
    children: &IndexMap<String, Vec<String>>,
) -> String {
    let text = resolve_conditionals(template, params, children);
    let text = expand_each(&text, children);
    interpolate(&text, params)
}

/// Truthiness of a guard name: `children.<slot>` names are truthy when the
/// slot is non-empty; parameter names are truthy unless missing, empty,
/// a false/NULL literal, or a number ≤ 0.
fn truthy(
    name: &str,
    params: &IndexMap<String, String>,
    children: &IndexMap<String, Vec<String>>,
) -> bool {
    if let Some(slot) = name.strip_prefix("children.") {
        return children.get(slot).is_some_and(|c| !c.is_empty());
    }
    match params.get(name) {
        None => false,
        Some(value) => {
            let value = value.trim();
            if value.is_empty() || value == "FALSE" || value == "false" || value == "NULL" {
                false
            } else if let Ok(n) = value.parse::<f64>() {
                n > 0.0
            } else {
                true
            }
        }
    }
}

fn resolve_conditionals(
    template: &str,
    params: &IndexMap<String, String>,
    children: &IndexMap<String, Vec<String>>,
) -> String {
    let mut text = template.to_string();
    loop {
        let Some(close) = text.find(IF_CLOSE) else {
            if text.contains(IF_OPEN) {
                debug!("template: unterminated {{{{#if}}}} directive");
            }
            break;
        };
        // The last opener before the first closer delimits the innermost
        // conditional.
        let Some(open) = text[..close].rfind(IF_OPEN) else {
            debug!("template: {{{{/if}}}} without opener");
            text.replace_range(close..close + IF_CLOSE.len(), "");
            continue;
        };
        let name_start = open + IF_OPEN.len();
        let Some(name_len) = text[name_start..close].find("}}") else {
            debug!("template: malformed {{{{#if}}}} opener");
            text.replace_range(open..close + IF_CLOSE.len(), "");
            continue;
        };
        let name = text[name_start..name_start + name_len].trim().to_string();
        let body_start = name_start + name_len + 2;
        let body = text[body_start..close].to_string();
        let replacement = if truthy(&name, params, children) {
            body
        } else {
            String::new()
        };
        text.replace_range(open..close + IF_CLOSE.len(), &replacement);
    }
    text
}

fn expand_each(template: &str, children: &IndexMap<String, Vec<String>>) -> String {
    let mut text = template.to_string();
    while let Some(open) = text.find(EACH_OPEN) {
        let name_start = open + EACH_OPEN.len();
        let Some(name_len) = text[name_start..].find("}}") else {
            debug!("template: malformed {{{{#each}}}} opener");
            text.replace_range(open..open + EACH_OPEN.len(), "");
            continue;
        };
        let slot = text[name_start..name_start + name_len].trim().to_string();
        let body_start = name_start + name_len + 2;
        let Some(close_rel) = text[body_start..].find(EACH_CLOSE) else {
            debug!("template: unterminated {{{{#each}}}} directive");
            text.replace_range(open..body_start, "");
            continue;
        };
        let body = text[body_start..body_start + close_rel].to_string();
        let mut expanded = String::new();
        if let Some(items) = children.get(&slot) {
            for item in items {
                expanded.push_str(&body.replace("{{this}}", &indent_lines(item)));
            }
        }
        text.replace_range(open..body_start + close_rel + EACH_CLOSE.len(), &expanded);
    }
    text
}

/// Indent every line of a child's text by one level.
fn indent_lines(text: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", CHILD_INDENT, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn interpolate(template: &str, params: &IndexMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let name = after[..close].trim();
        match params.get(name) {
            Some(value) => out.push_str(value),
            None => debug!(param = name, "template: unresolved parameter"),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn no_children() -> IndexMap<String, Vec<String>> {
        IndexMap::new()
    }

    #[test]
    fn plain_interpolation() {
        let out = render("library({{package}})", &params(&[("package", "ggplot2")]), &no_children());
        assert_eq!(out, "library(ggplot2)");
    }

    #[test]
    fn missing_parameter_interpolates_empty() {
        let out = render("f({{x}})", &params(&[]), &no_children());
        assert_eq!(out, "f()");
    }

    #[test]
    fn if_guards_exclude_false_and_zero() {
        let template = "g({{#if a}}a = {{a}}{{/if}})";
        assert_eq!(render(template, &params(&[("a", "2")]), &no_children()), "g(a = 2)");
        assert_eq!(render(template, &params(&[("a", "0")]), &no_children()), "g()");
        assert_eq!(render(template, &params(&[("a", "FALSE")]), &no_children()), "g()");
        assert_eq!(render(template, &params(&[("a", "")]), &no_children()), "g()");
        assert_eq!(render(template, &params(&[]), &no_children()), "g()");
        assert_eq!(
            render(template, &params(&[("a", "wt")]), &no_children()),
            "g(a = wt)"
        );
    }

    #[test]
    fn nested_if_resolves_innermost_first() {
        let template = "{{#if a}}A{{#if b}}B{{/if}}{{/if}}";
        assert_eq!(
            render(template, &params(&[("a", "x"), ("b", "y")]), &no_children()),
            "AB"
        );
        assert_eq!(render(template, &params(&[("a", "x")]), &no_children()), "A");
        assert_eq!(render(template, &params(&[("b", "y")]), &no_children()), "");
    }

    #[test]
    fn each_indents_children_per_line() {
        let mut children = IndexMap::new();
        children.insert(
            "body".to_string(),
            vec!["print(i)".to_string(), "a <- 1\nb <- 2".to_string()],
        );
        let out = render(
            "for ({{var}} in {{range}}) {\n{{#each children.body}}{{this}}\n{{/each}}}",
            &params(&[("var", "i"), ("range", "1:3")]),
            &children,
        );
        assert_eq!(out, "for (i in 1:3) {\n  print(i)\n  a <- 1\n  b <- 2\n}");
    }

    #[test]
    fn children_guard_tests_slot_occupancy() {
        let template = "x{{#if children.else}}y{{/if}}";
        let mut children = IndexMap::new();
        children.insert("else".to_string(), vec!["e".to_string()]);
        assert_eq!(render(template, &params(&[]), &children), "xy");
        children.get_mut("else").unwrap().clear();
        assert_eq!(render(template, &params(&[]), &children), "x");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        // A parameter value containing directive syntax must come through
        // verbatim.
        let out = render(
            "f({{x}})",
            &params(&[("x", "\"{{#if y}}\"")]),
            &no_children(),
        );
        assert_eq!(out, "f(\"{{#if y}}\")");
    }
}
