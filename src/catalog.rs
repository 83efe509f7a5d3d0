//! Static catalog of block types for the supported plotting grammar.
//!
//! Each [`BlockDefinition`] carries everything the generator and importer
//! need to know about one statement shape: the display template, the
//! parameter schema, the container slots, and the positional-argument
//! mapping hints used when an imported call is matched against the catalog.
//!
//! The catalog is intentionally a template-covered subset of the grammar;
//! anything outside it round-trips through the generic `call` / `expr`
//! fallback blocks.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::model::ENTRY_TYPE;

// ────────────────────────────────────────────────────────────────────────────
// Parameter schema
// ────────────────────────────────────────────────────────────────────────────

/// How a parameter's raw text should be edited and validated by a surface.
/// The generator treats every kind as opaque expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Arbitrary expression text (`aes(x = wt)`, `1:10`, `df$col`).
    Expression,
    /// Plain text such as a variable or package name.
    Text,
    /// Numeric literal text.
    Number,
    /// Logical literal text (`TRUE` / `FALSE`).
    Flag,
    /// One of a fixed set of options.
    Choice,
}

/// Schema entry for one block parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<&'static str>,
    pub required: bool,
    pub options: &'static [&'static str],
}

const fn p(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        default: None,
        required: false,
        options: &[],
    }
}

const fn req(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        default: None,
        required: true,
        options: &[],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block definitions
// ────────────────────────────────────────────────────────────────────────────

/// Catalog entry for one block type.
#[derive(Debug, Clone, Copy)]
pub struct BlockDefinition {
    /// Catalog key. For call-shaped blocks this is the (unqualified)
    /// function name the importer matches against.
    pub key: &'static str,
    /// Human-readable name shown in a block browser.
    pub display_name: &'static str,
    /// Category path (e.g. "Geometries", "Control Flow").
    pub category: &'static str,
    /// Display template rendered by [`crate::template::render`].
    pub template: &'static str,
    /// Parameter schema.
    pub params: &'static [ParamSpec],
    /// Named container slots, in rendering order. Empty for leaf blocks.
    pub slots: &'static [&'static str],
    /// Parameter names positional call arguments map to, in order.
    pub positional: &'static [&'static str],
    /// If set, a positional argument that is itself an `aes(…)` call maps to
    /// the `mapping` parameter instead of consuming a positional name.
    pub aes_first: bool,
    pub description: &'static str,
}

impl BlockDefinition {
    pub fn is_container(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    /// Names of required parameters missing from a parameter map. Surfaced
    /// to the editing surface; the renderer itself substitutes empty text.
    pub fn missing_required(
        &self,
        params: &indexmap::IndexMap<String, String>,
    ) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .filter(|p| params.get(p.name).map_or(true, |v| v.trim().is_empty()))
            .map(|p| p.name)
            .collect()
    }

    /// Check if this entry matches a search query (case-insensitive substring
    /// match on key, display name, category, or description).
    pub fn matches_query(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let q = query.to_lowercase();
        self.key.to_lowercase().contains(&q)
            || self.display_name.to_lowercase().contains(&q)
            || self.category.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
    }
}

/// Key of the generic function-call fallback block.
pub const CALL_TYPE: &str = "call";
/// Key of the generic expression fallback block.
pub const EXPR_TYPE: &str = "expr";
/// Key of the dataset-import block.
pub const DATA_TYPE: &str = "data";

const E: ParamKind = ParamKind::Expression;
const T: ParamKind = ParamKind::Text;
const N: ParamKind = ParamKind::Number;

static DEFINITIONS: &[BlockDefinition] = &[
    // ── Internal ─────────────────────────────────────────────────────────
    BlockDefinition {
        key: ENTRY_TYPE,
        display_name: "Start",
        category: "Internal",
        template: "",
        params: &[],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Starting point of the script; renders nothing",
    },
    // ── Setup ────────────────────────────────────────────────────────────
    BlockDefinition {
        key: "library",
        display_name: "Load Package",
        category: "Setup",
        template: "library({{package}})",
        params: &[ParamSpec {
            name: "package",
            kind: T,
            default: Some("ggplot2"),
            required: true,
            options: &[],
        }],
        slots: &[],
        positional: &["package"],
        aes_first: false,
        description: "Attach a package to the session",
    },
    BlockDefinition {
        key: DATA_TYPE,
        display_name: "Data Import",
        category: "Data",
        template: "{{source}}",
        params: &[req("source", E)],
        slots: &[],
        positional: &["source"],
        aes_first: false,
        description: "Bind the dataset placeholder to a data source",
    },
    // ── Plot ─────────────────────────────────────────────────────────────
    BlockDefinition {
        key: "ggplot",
        display_name: "Plot Canvas",
        category: "Plot",
        template: "ggplot({{#if data}}{{data}}{{/if}}{{#if mapping}}, {{mapping}}{{/if}})",
        params: &[p("data", E), p("mapping", E)],
        slots: &[],
        positional: &["data", "mapping"],
        aes_first: true,
        description: "Initialize a plot with data and aesthetic mapping",
    },
    // ── Geometries ───────────────────────────────────────────────────────
    BlockDefinition {
        key: "geom_point",
        display_name: "Points",
        category: "Geometries",
        template: "geom_point({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if size}}size = {{size}}, {{/if}}{{#if colour}}colour = {{colour}}, {{/if}}{{#if alpha}}alpha = {{alpha}}, {{/if}}{{#if shape}}shape = {{shape}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[
            p("mapping", E),
            p("data", E),
            p("size", N),
            p("colour", E),
            p("alpha", N),
            p("shape", E),
            p("extra", E),
        ],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Scatter plot layer",
    },
    BlockDefinition {
        key: "geom_line",
        display_name: "Lines",
        category: "Geometries",
        template: "geom_line({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if colour}}colour = {{colour}}, {{/if}}{{#if linewidth}}linewidth = {{linewidth}}, {{/if}}{{#if linetype}}linetype = {{linetype}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[
            p("mapping", E),
            p("data", E),
            p("colour", E),
            p("linewidth", N),
            p("linetype", E),
            p("extra", E),
        ],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Line plot layer",
    },
    BlockDefinition {
        key: "geom_bar",
        display_name: "Bars (counted)",
        category: "Geometries",
        template: "geom_bar({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if stat}}stat = {{stat}}, {{/if}}{{#if fill}}fill = {{fill}}, {{/if}}{{#if width}}width = {{width}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[
            p("mapping", E),
            p("data", E),
            p("stat", E),
            p("fill", E),
            p("width", N),
            p("extra", E),
        ],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Bar chart layer with counted heights",
    },
    BlockDefinition {
        key: "geom_col",
        display_name: "Bars (values)",
        category: "Geometries",
        template: "geom_col({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if fill}}fill = {{fill}}, {{/if}}{{#if width}}width = {{width}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[p("mapping", E), p("data", E), p("fill", E), p("width", N), p("extra", E)],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Bar chart layer with explicit heights",
    },
    BlockDefinition {
        key: "geom_histogram",
        display_name: "Histogram",
        category: "Geometries",
        template: "geom_histogram({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if bins}}bins = {{bins}}, {{/if}}{{#if binwidth}}binwidth = {{binwidth}}, {{/if}}{{#if fill}}fill = {{fill}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[
            p("mapping", E),
            p("data", E),
            ParamSpec {
                name: "bins",
                kind: N,
                default: Some("30"),
                required: false,
                options: &[],
            },
            p("binwidth", N),
            p("fill", E),
            p("extra", E),
        ],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Histogram layer",
    },
    BlockDefinition {
        key: "geom_boxplot",
        display_name: "Box Plot",
        category: "Geometries",
        template: "geom_boxplot({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if fill}}fill = {{fill}}, {{/if}}{{#if width}}width = {{width}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[p("mapping", E), p("data", E), p("fill", E), p("width", N), p("extra", E)],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Box-and-whisker layer",
    },
    BlockDefinition {
        key: "geom_smooth",
        display_name: "Smoother",
        category: "Geometries",
        template: "geom_smooth({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if method}}method = {{method}}, {{/if}}{{#if se}}se = {{se}}, {{/if}}{{#if formula}}formula = {{formula}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[
            p("mapping", E),
            p("data", E),
            ParamSpec {
                name: "method",
                kind: ParamKind::Choice,
                default: None,
                required: false,
                options: &["\"lm\"", "\"glm\"", "\"gam\"", "\"loess\""],
            },
            p("se", ParamKind::Flag),
            p("formula", E),
            p("extra", E),
        ],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Fitted-trend layer",
    },
    BlockDefinition {
        key: "geom_area",
        display_name: "Area",
        category: "Geometries",
        template: "geom_area({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if fill}}fill = {{fill}}, {{/if}}{{#if alpha}}alpha = {{alpha}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[p("mapping", E), p("data", E), p("fill", E), p("alpha", N), p("extra", E)],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Filled area layer",
    },
    BlockDefinition {
        key: "geom_text",
        display_name: "Text Labels",
        category: "Geometries",
        template: "geom_text({{#if mapping}}mapping = {{mapping}}, {{/if}}{{#if data}}data = {{data}}, {{/if}}{{#if size}}size = {{size}}, {{/if}}{{#if vjust}}vjust = {{vjust}}, {{/if}}{{#if hjust}}hjust = {{hjust}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[
            p("mapping", E),
            p("data", E),
            p("size", N),
            p("vjust", N),
            p("hjust", N),
            p("extra", E),
        ],
        slots: &[],
        positional: &["mapping", "data"],
        aes_first: true,
        description: "Text annotation layer",
    },
    // ── Scales / Coordinates / Facets ────────────────────────────────────
    BlockDefinition {
        key: "scale_x_continuous",
        display_name: "X Scale (continuous)",
        category: "Scales",
        template: "scale_x_continuous({{#if name}}name = {{name}}, {{/if}}{{#if limits}}limits = {{limits}}, {{/if}}{{#if breaks}}breaks = {{breaks}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[p("name", E), p("limits", E), p("breaks", E), p("extra", E)],
        slots: &[],
        positional: &["name"],
        aes_first: false,
        description: "Continuous x-axis scale",
    },
    BlockDefinition {
        key: "scale_y_continuous",
        display_name: "Y Scale (continuous)",
        category: "Scales",
        template: "scale_y_continuous({{#if name}}name = {{name}}, {{/if}}{{#if limits}}limits = {{limits}}, {{/if}}{{#if breaks}}breaks = {{breaks}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[p("name", E), p("limits", E), p("breaks", E), p("extra", E)],
        slots: &[],
        positional: &["name"],
        aes_first: false,
        description: "Continuous y-axis scale",
    },
    BlockDefinition {
        key: "coord_flip",
        display_name: "Flip Coordinates",
        category: "Coordinates",
        template: "coord_flip()",
        params: &[],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Swap the x and y axes",
    },
    BlockDefinition {
        key: "facet_wrap",
        display_name: "Facet Wrap",
        category: "Facets",
        template: "facet_wrap({{facets}}{{#if nrow}}, nrow = {{nrow}}{{/if}}{{#if ncol}}, ncol = {{ncol}}{{/if}})",
        params: &[req("facets", E), p("nrow", N), p("ncol", N)],
        slots: &[],
        positional: &["facets"],
        aes_first: false,
        description: "Wrap panels by a faceting formula",
    },
    BlockDefinition {
        key: "facet_grid",
        display_name: "Facet Grid",
        category: "Facets",
        template: "facet_grid({{facets}})",
        params: &[req("facets", E)],
        slots: &[],
        positional: &["facets"],
        aes_first: false,
        description: "Lay panels out on a row ~ column grid",
    },
    // ── Labels / Themes ──────────────────────────────────────────────────
    BlockDefinition {
        key: "labs",
        display_name: "Labels",
        category: "Labels",
        template: "labs({{#if title}}title = {{title}}, {{/if}}{{#if subtitle}}subtitle = {{subtitle}}, {{/if}}{{#if x}}x = {{x}}, {{/if}}{{#if y}}y = {{y}}, {{/if}}{{#if caption}}caption = {{caption}}, {{/if}}{{#if extra}}{{extra}}, {{/if}})",
        params: &[p("title", E), p("subtitle", E), p("x", E), p("y", E), p("caption", E), p("extra", E)],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Set plot and axis labels",
    },
    BlockDefinition {
        key: "ggtitle",
        display_name: "Title",
        category: "Labels",
        template: "ggtitle({{title}}{{#if subtitle}}, subtitle = {{subtitle}}{{/if}})",
        params: &[req("title", E), p("subtitle", E)],
        slots: &[],
        positional: &["title", "subtitle"],
        aes_first: false,
        description: "Set the plot title",
    },
    BlockDefinition {
        key: "xlab",
        display_name: "X Label",
        category: "Labels",
        template: "xlab({{label}})",
        params: &[req("label", E)],
        slots: &[],
        positional: &["label"],
        aes_first: false,
        description: "Set the x-axis label",
    },
    BlockDefinition {
        key: "ylab",
        display_name: "Y Label",
        category: "Labels",
        template: "ylab({{label}})",
        params: &[req("label", E)],
        slots: &[],
        positional: &["label"],
        aes_first: false,
        description: "Set the y-axis label",
    },
    BlockDefinition {
        key: "theme_minimal",
        display_name: "Minimal Theme",
        category: "Themes",
        template: "theme_minimal()",
        params: &[],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Minimal theme with no background annotations",
    },
    BlockDefinition {
        key: "theme_bw",
        display_name: "Black & White Theme",
        category: "Themes",
        template: "theme_bw()",
        params: &[],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Dark-on-light theme",
    },
    BlockDefinition {
        key: "theme_classic",
        display_name: "Classic Theme",
        category: "Themes",
        template: "theme_classic()",
        params: &[],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Classic theme with axis lines and no gridlines",
    },
    BlockDefinition {
        key: "theme_dark",
        display_name: "Dark Theme",
        category: "Themes",
        template: "theme_dark()",
        params: &[],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Dark background theme",
    },
    // ── Output ───────────────────────────────────────────────────────────
    BlockDefinition {
        key: "print",
        display_name: "Print",
        category: "Output",
        template: "print({{value}})",
        params: &[req("value", E)],
        slots: &[],
        positional: &["value"],
        aes_first: false,
        description: "Print a value or plot object",
    },
    // ── Control Flow ─────────────────────────────────────────────────────
    BlockDefinition {
        key: "for",
        display_name: "For Loop",
        category: "Control Flow",
        template: "for ({{var}} in {{range}}) {\n{{#each children.body}}{{this}}\n{{/each}}}",
        params: &[req("var", T), req("range", E)],
        slots: &["body"],
        positional: &[],
        aes_first: false,
        description: "Repeat the body for each element of a range",
    },
    BlockDefinition {
        key: "if",
        display_name: "If / Else",
        category: "Control Flow",
        template: "if ({{condition}}) {\n{{#each children.then}}{{this}}\n{{/each}}}{{#if children.else}} else {\n{{#each children.else}}{{this}}\n{{/each}}}{{/if}}",
        params: &[req("condition", E)],
        slots: &["then", "else"],
        positional: &[],
        aes_first: false,
        description: "Run the then-branch when the condition holds",
    },
    // ── Advanced fallbacks ───────────────────────────────────────────────
    BlockDefinition {
        key: CALL_TYPE,
        display_name: "Function Call",
        category: "Advanced",
        template: "{{fn}}({{args}})",
        params: &[req("fn", T), p("args", E)],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Call a function the catalog does not know",
    },
    BlockDefinition {
        key: EXPR_TYPE,
        display_name: "Expression",
        category: "Advanced",
        template: "{{code}}",
        params: &[req("code", E)],
        slots: &[],
        positional: &[],
        aes_first: false,
        description: "Verbatim expression statement",
    },
];

// ────────────────────────────────────────────────────────────────────────────
// Lookup
// ────────────────────────────────────────────────────────────────────────────

static INDEX: Lazy<HashMap<&'static str, &'static BlockDefinition>> = Lazy::new(|| {
    let mut m = HashMap::with_capacity(DEFINITIONS.len());
    for def in DEFINITIONS {
        m.insert(def.key, def);
    }
    m
});

/// All catalog definitions, in category order.
pub fn definitions() -> &'static [BlockDefinition] {
    DEFINITIONS
}

/// Strip a namespace qualifier (`pkg::fn` or `pkg:::fn`) down to the bare
/// function name used as a catalog key.
pub fn normalize_key(name: &str) -> &str {
    match name.rsplit_once("::") {
        Some((_, bare)) => bare.trim_start_matches(':'),
        None => name,
    }
}

/// Look a block type up by key, normalizing namespace qualifiers.
pub fn lookup(key: &str) -> Option<&'static BlockDefinition> {
    INDEX.get(normalize_key(key)).copied()
}

/// Search the catalog with a case-insensitive query.
pub fn search(query: &str) -> Vec<&'static BlockDefinition> {
    DEFINITIONS.iter().filter(|d| d.matches_query(query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_normalizes_namespaced_calls() {
        assert_eq!(lookup("ggplot2::geom_point").unwrap().key, "geom_point");
        assert_eq!(lookup("ggplot2:::geom_point").unwrap().key, "geom_point");
        assert_eq!(lookup("geom_point").unwrap().key, "geom_point");
        assert!(lookup("no_such_fn").is_none());
    }

    #[test]
    fn containers_declare_slots() {
        let for_def = lookup("for").unwrap();
        assert!(for_def.is_container());
        assert_eq!(for_def.slots, &["body"]);
        let if_def = lookup("if").unwrap();
        assert_eq!(if_def.slots, &["then", "else"]);
        assert!(!lookup("geom_point").unwrap().is_container());
    }

    #[test]
    fn search_matches_category_and_name() {
        assert!(search("geometr").len() >= 5);
        assert!(search("histogram").iter().any(|d| d.key == "geom_histogram"));
        assert_eq!(search("").len(), definitions().len());
    }

    #[test]
    fn missing_required_reports_empty_and_absent_values() {
        let def = lookup("for").unwrap();
        let mut params = indexmap::IndexMap::new();
        assert_eq!(def.missing_required(&params), vec!["var", "range"]);
        params.insert("var".to_string(), "i".to_string());
        params.insert("range".to_string(), "  ".to_string());
        assert_eq!(def.missing_required(&params), vec!["range"]);
        params.insert("range".to_string(), "1:3".to_string());
        assert!(def.missing_required(&params).is_empty());
    }

    #[test]
    fn choice_parameters_carry_their_options() {
        let method = lookup("geom_smooth").unwrap().param("method").unwrap();
        assert_eq!(method.kind, ParamKind::Choice);
        assert!(method.options.contains(&"\"lm\""));
    }

    #[test]
    fn unique_keys() {
        let mut seen = std::collections::HashSet::new();
        for def in definitions() {
            assert!(seen.insert(def.key), "duplicate catalog key {}", def.key);
        }
    }
}
