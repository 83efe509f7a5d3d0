//! Parse-tree input shape and expression-text reconstruction.
//!
//! The upstream parser (external to this crate) turns source text into an
//! ordered forest of [`ParseNode`]s serialized as JSON, e.g.:
//!
//! ```json
//! {
//!   "kind": "call",
//!   "function": "geom_point",
//!   "args": [{"name": "size", "value": {"kind": "literal", "value": "2", "class": "numeric"}}]
//! }
//! ```
//!
//! The importer consumes this closed tagged union with exhaustive matching;
//! there is deliberately no optional-field probing of loose JSON values.
//!
//! [`deparse`] is the inverse direction at expression granularity: it
//! reconstructs source text for a node, rendering a fixed operator set in
//! infix/indexing notation rather than prefix call form. Reconstruction is
//! total: an arity-broken operator node degrades to a visible sentinel
//! instead of failing or disappearing.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Visible stand-in emitted where an expression cannot be reconstructed.
pub const UNPARSEABLE: &str = "<<unparseable>>";

// ────────────────────────────────────────────────────────────────────────────
// Parse nodes
// ────────────────────────────────────────────────────────────────────────────

/// One node of the upstream parse tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParseNode {
    /// A literal constant with its source class (`"character"`, `"numeric"`,
    /// `"logical"`, `"integer"`, `"null"`, …).
    Literal { value: String, class: String },
    /// A bare name.
    Symbol { name: String },
    /// A function call; operators and control constructs arrive as calls
    /// with the operator text as `function`.
    Call {
        function: String,
        #[serde(default)]
        args: Vec<CallArg>,
    },
    /// A formal-argument pairlist.
    Pairlist {
        #[serde(default)]
        entries: Vec<CallArg>,
    },
    /// Source the upstream parser could not classify; carried verbatim.
    Opaque { text: String },
}

/// One (optionally named) call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallArg {
    #[serde(default)]
    pub name: Option<String>,
    pub value: ParseNode,
}

impl CallArg {
    pub fn positional(value: ParseNode) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: ParseNode) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

impl ParseNode {
    pub fn symbol(name: impl Into<String>) -> Self {
        ParseNode::Symbol { name: name.into() }
    }

    pub fn call(function: impl Into<String>, args: Vec<CallArg>) -> Self {
        ParseNode::Call {
            function: function.into(),
            args,
        }
    }

    /// True for a call to the given (namespace-normalized) function name.
    pub fn is_call_to(&self, name: &str) -> bool {
        matches!(self, ParseNode::Call { function, .. }
            if crate::catalog::normalize_key(function) == name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Deparse – node → expression text
// ────────────────────────────────────────────────────────────────────────────

/// Binary operators rendered infix with surrounding spaces.
const SPACED_BINARY: &[&str] = &[
    "+", "-", "*", "/", "==", "!=", "<", "<=", ">", ">=", "&", "&&", "|", "||", "%%", "%/%",
    "%in%", "%o%", "%*%", "%>%", "|>", "~", "<-", "<<-", "=",
];

/// Binary operators rendered infix without spaces.
const TIGHT_BINARY: &[&str] = &[":", "^"];

/// Operators usable in unary prefix position.
const UNARY: &[&str] = &["-", "+", "!", "~"];

/// Reconstruct expression text for a parse node.
pub fn deparse(node: &ParseNode) -> String {
    match node {
        ParseNode::Literal { value, class } => deparse_literal(value, class),
        ParseNode::Symbol { name } => name.clone(),
        ParseNode::Call { function, args } => deparse_call(function, args),
        ParseNode::Pairlist { entries } => args_text(entries),
        ParseNode::Opaque { text } => text.clone(),
    }
}

fn deparse_literal(value: &str, class: &str) -> String {
    match class {
        // Character literals are re-quoted; everything else (logical,
        // numeric, integer, NULL, NaN, Inf, NA) renders bare.
        "character" | "string" => format!(
            "\"{}\"",
            value.replace('\\', "\\\\").replace('"', "\\\"")
        ),
        _ => value.to_string(),
    }
}

fn deparse_call(function: &str, args: &[CallArg]) -> String {
    let argv: Vec<&CallArg> = args.iter().collect();
    match function {
        "(" if argv.len() == 1 => format!("({})", deparse(&argv[0].value)),
        "{" => {
            let body: Vec<String> = argv.iter().map(|a| deparse(&a.value)).collect();
            format!("{{ {} }}", body.join("; "))
        }
        "[" | "[[" if !argv.is_empty() => {
            let object = deparse(&argv[0].value);
            let indices: Vec<String> = argv[1..]
                .iter()
                .map(|a| match &a.name {
                    Some(n) => format!("{} = {}", n, deparse(&a.value)),
                    None => deparse(&a.value),
                })
                .collect();
            if function == "[" {
                format!("{}[{}]", object, indices.join(", "))
            } else {
                format!("{}[[{}]]", object, indices.join(", "))
            }
        }
        "$" | "@" if argv.len() == 2 => {
            format!(
                "{}{}{}",
                deparse(&argv[0].value),
                function,
                deparse(&argv[1].value)
            )
        }
        "::" | ":::" if argv.len() == 2 => {
            format!(
                "{}{}{}",
                deparse(&argv[0].value),
                function,
                deparse(&argv[1].value)
            )
        }
        op if TIGHT_BINARY.contains(&op) && argv.len() == 2 => {
            format!("{}{}{}", deparse(&argv[0].value), op, deparse(&argv[1].value))
        }
        op if SPACED_BINARY.contains(&op) && argv.len() == 2 => {
            format!(
                "{} {} {}",
                deparse(&argv[0].value),
                op,
                deparse(&argv[1].value)
            )
        }
        op if UNARY.contains(&op) && argv.len() == 1 => {
            format!("{}{}", op, deparse(&argv[0].value))
        }
        _ => {
            if is_function_name(function) {
                format!("{}({})", function, args_text(args))
            } else {
                debug!(function, "deparse: unrecognized operator shape");
                UNPARSEABLE.to_string()
            }
        }
    }
}

/// Render an argument list as `a, b = 2, …`.
pub fn args_text(args: &[CallArg]) -> String {
    args.iter()
        .map(|a| match &a.name {
            Some(n) => format!("{} = {}", n, deparse(&a.value)),
            None => deparse(&a.value),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A callable name: identifier characters, dots and underscores, optionally
/// namespace-qualified. Anything else is an operator we failed to place.
pub(crate) fn is_function_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == ':')
        && name.chars().next().is_some_and(|c| !c.is_ascii_digit())
}
