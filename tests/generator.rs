use blockplot::generator::{NO_ENTRY_COMMENT, generate};
use blockplot::model::{BlockGraph, BlockInstance, Position};

fn add(graph: &mut BlockGraph, block_type: &str, params: &[(&str, &str)]) -> String {
    let id = graph.allocate_id();
    let mut block = BlockInstance::new(&id, block_type);
    for (k, v) in params {
        block.params.insert(k.to_string(), v.to_string());
    }
    graph.blocks.push(block);
    id
}

fn wire(graph: &mut BlockGraph, from: &str, to: &str) {
    graph.block_mut(from).unwrap().connections.output = Some(to.to_string());
    graph.block_mut(to).unwrap().connections.input = Some(from.to_string());
}

/// entry → library(ggplot2) → data <- iris → ggplot(...) + geom_point()
fn scatter_graph() -> BlockGraph {
    let mut graph = BlockGraph::with_entry(Position::new(40, 40));
    let entry = graph.blocks[0].id.clone();
    let lib = add(&mut graph, "library", &[("package", "ggplot2")]);
    let data = add(&mut graph, "data", &[("source", "iris")]);
    graph.block_mut(&data).unwrap().assigned_to = Some("data".to_string());
    let plot = add(
        &mut graph,
        "ggplot",
        &[
            ("data", "data"),
            ("mapping", "aes(x = Sepal.Length, y = Sepal.Width)"),
        ],
    );
    let point = add(&mut graph, "geom_point", &[]);
    graph.block_mut(&plot).unwrap().chain_links.push(point);
    wire(&mut graph, &entry, &lib);
    wire(&mut graph, &lib, &data);
    wire(&mut graph, &data, &plot);
    graph
}

#[test]
fn scatter_plot_generates_the_expected_script() {
    let text = generate(&scatter_graph());
    assert_eq!(
        text,
        "library(ggplot2)\n\
         data <- iris\n\
         ggplot(data, aes(x = Sepal.Length, y = Sepal.Width)) +\n\
         \x20\x20geom_point()\n"
    );
}

#[test]
fn generation_is_deterministic() {
    let graph = scatter_graph();
    assert_eq!(generate(&graph), generate(&graph));
}

#[test]
fn entry_renders_nothing_but_traversal_continues() {
    let mut graph = BlockGraph::with_entry(Position::default());
    let entry = graph.blocks[0].id.clone();
    let lib = add(&mut graph, "library", &[("package", "ggplot2")]);
    wire(&mut graph, &entry, &lib);
    assert_eq!(generate(&graph), "library(ggplot2)\n");
}

#[test]
fn unreachable_blocks_are_omitted() {
    let mut graph = scatter_graph();
    // A block with no path from the entry produces no code at all.
    add(&mut graph, "theme_minimal", &[]);
    let text = generate(&graph);
    assert!(!text.contains("theme_minimal"));
}

#[test]
fn missing_entry_yields_a_diagnostic_comment() {
    let mut graph = BlockGraph::new();
    add(&mut graph, "library", &[("package", "ggplot2")]);
    assert_eq!(generate(&graph), NO_ENTRY_COMMENT);
}

#[test]
fn dangling_commas_from_omitted_parameters_are_stripped() {
    let mut graph = BlockGraph::with_entry(Position::default());
    let entry = graph.blocks[0].id.clone();
    let point = add(&mut graph, "geom_point", &[("size", "2")]);
    wire(&mut graph, &entry, &point);
    assert_eq!(generate(&graph), "geom_point(size = 2)\n");
}

#[test]
fn chain_assignment_prefixes_only_the_first_line() {
    let mut graph = BlockGraph::with_entry(Position::default());
    let entry = graph.blocks[0].id.clone();
    let plot = add(&mut graph, "ggplot", &[("data", "df")]);
    let point = add(&mut graph, "geom_point", &[]);
    let smooth = add(&mut graph, "geom_smooth", &[("method", "\"lm\"")]);
    {
        let head = graph.block_mut(&plot).unwrap();
        head.assigned_to = Some("p".to_string());
        head.chain_links = vec![point, smooth];
    }
    wire(&mut graph, &entry, &plot);
    assert_eq!(
        generate(&graph),
        "p <- ggplot(df) +\n\
         \x20\x20geom_point() +\n\
         \x20\x20geom_smooth(method = \"lm\")\n"
    );
}

#[test]
fn transitive_chain_links_are_collected_depth_first() {
    let mut graph = BlockGraph::with_entry(Position::default());
    let entry = graph.blocks[0].id.clone();
    let plot = add(&mut graph, "ggplot", &[("data", "df")]);
    let point = add(&mut graph, "geom_point", &[]);
    let flip = add(&mut graph, "coord_flip", &[]);
    // The follower itself carries a further link.
    graph.block_mut(&plot).unwrap().chain_links = vec![point.clone()];
    graph.block_mut(&point).unwrap().chain_links = vec![flip];
    wire(&mut graph, &entry, &plot);
    assert_eq!(
        generate(&graph),
        "ggplot(df) +\n\x20\x20geom_point() +\n\x20\x20coord_flip()\n"
    );
}

#[test]
fn containers_render_children_with_assignments() {
    let mut graph = BlockGraph::with_entry(Position::default());
    let entry = graph.blocks[0].id.clone();
    let cond = add(&mut graph, "if", &[("condition", "x > 0")]);
    let then_branch = add(&mut graph, "expr", &[("code", "1")]);
    let else_branch = add(&mut graph, "expr", &[("code", "2")]);
    for (id, slot) in [(&then_branch, "then"), (&else_branch, "else")] {
        let block = graph.block_mut(id).unwrap();
        block.assigned_to = Some("y".to_string());
        block.parent_id = Some(cond.clone());
        block.slot_name = Some(slot.to_string());
    }
    let container = graph.block_mut(&cond).unwrap();
    container
        .children
        .insert("then".to_string(), vec![then_branch]);
    container
        .children
        .insert("else".to_string(), vec![else_branch]);
    wire(&mut graph, &entry, &cond);

    assert_eq!(
        generate(&graph),
        "if (x > 0) {\n  y <- 1\n} else {\n  y <- 2\n}\n"
    );
}

#[test]
fn unknown_block_type_is_flagged_in_place() {
    let mut graph = BlockGraph::with_entry(Position::default());
    let entry = graph.blocks[0].id.clone();
    let stray = add(&mut graph, "not_in_catalog", &[]);
    wire(&mut graph, &entry, &stray);
    let text = generate(&graph);
    assert!(text.contains("# unknown block type 'not_in_catalog'"));
}
