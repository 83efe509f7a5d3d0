use blockplot::ast::{CallArg, ParseNode};
use blockplot::generator::generate;
use blockplot::importer::import;
use blockplot::layout::{CHAIN_COLUMN_X, CHILD_INDENT, LEFT_COLUMN_X};
use blockplot::model::{BlockGraph, BlockInstance};
use blockplot::validate::validate;

fn lit(value: &str, class: &str) -> ParseNode {
    ParseNode::Literal {
        value: value.to_string(),
        class: class.to_string(),
    }
}

fn sym(name: &str) -> ParseNode {
    ParseNode::symbol(name)
}

fn call(function: &str, args: Vec<CallArg>) -> ParseNode {
    ParseNode::call(function, args)
}

fn pos(value: ParseNode) -> CallArg {
    CallArg::positional(value)
}

fn named(name: &str, value: ParseNode) -> CallArg {
    CallArg::named(name, value)
}

fn assign(target: &str, value: ParseNode) -> ParseNode {
    call("<-", vec![pos(sym(target)), pos(value)])
}

fn brace(stmts: Vec<ParseNode>) -> ParseNode {
    call("{", stmts.into_iter().map(pos).collect())
}

fn only_of_type<'g>(graph: &'g BlockGraph, block_type: &str) -> &'g BlockInstance {
    let found = graph.blocks_of_type(block_type);
    assert_eq!(found.len(), 1, "expected exactly one '{}' block", block_type);
    found[0]
}

#[test]
fn for_loop_becomes_a_container_with_its_body_child() {
    let forest = vec![call(
        "for",
        vec![
            pos(sym("i")),
            pos(call(":", vec![pos(lit("1", "numeric")), pos(lit("3", "numeric"))])),
            pos(brace(vec![call("print", vec![pos(sym("i"))])])),
        ],
    )];
    let graph = import(&forest);
    assert!(validate(&graph).is_empty());

    let for_block = only_of_type(&graph, "for");
    assert_eq!(for_block.params.get("var").unwrap(), "i");
    assert_eq!(for_block.params.get("range").unwrap(), "1:3");

    let print_block = only_of_type(&graph, "print");
    assert_eq!(for_block.slot_children("body"), &[print_block.id.clone()]);
    assert_eq!(print_block.parent_id.as_deref(), Some(for_block.id.as_str()));
    assert_eq!(print_block.slot_name.as_deref(), Some("body"));
    assert!(print_block.connections.is_empty());

    assert_eq!(generate(&graph), "for (i in 1:3) {\n  print(i)\n}\n");
}

#[test]
fn conditional_populates_then_and_else_slots() {
    let forest = vec![call(
        "if",
        vec![
            pos(call(">", vec![pos(sym("x")), pos(lit("0", "numeric"))])),
            pos(brace(vec![assign("y", lit("1", "numeric"))])),
            pos(brace(vec![assign("y", lit("2", "numeric"))])),
        ],
    )];
    let graph = import(&forest);
    assert!(validate(&graph).is_empty());

    let if_block = only_of_type(&graph, "if");
    assert_eq!(if_block.params.get("condition").unwrap(), "x > 0");
    assert_eq!(if_block.slot_children("then").len(), 1);
    assert_eq!(if_block.slot_children("else").len(), 1);

    let then_block = graph.block(&if_block.slot_children("then")[0]).unwrap();
    assert_eq!(then_block.assigned_to.as_deref(), Some("y"));
    assert_eq!(then_block.params.get("code").unwrap(), "1");
    let else_block = graph.block(&if_block.slot_children("else")[0]).unwrap();
    assert_eq!(else_block.params.get("code").unwrap(), "2");

    assert_eq!(
        generate(&graph),
        "if (x > 0) {\n  y <- 1\n} else {\n  y <- 2\n}\n"
    );
}

#[test]
fn conditional_without_else_leaves_the_slot_unpopulated() {
    let forest = vec![call(
        "if",
        vec![
            pos(sym("flag")),
            pos(brace(vec![call("print", vec![pos(sym("flag"))])])),
        ],
    )];
    let graph = import(&forest);
    let if_block = only_of_type(&graph, "if");
    assert!(if_block.slot_children("else").is_empty());
    assert_eq!(generate(&graph), "if (flag) {\n  print(flag)\n}\n");
}

#[test]
fn unknown_function_round_trips_through_literal_argument_text() {
    let forest = vec![call(
        "customFn",
        vec![pos(sym("a")), named("b", lit("2", "numeric"))],
    )];
    let graph = import(&forest);
    let block = only_of_type(&graph, "call");
    assert_eq!(block.params.get("fn").unwrap(), "customFn");
    assert_eq!(block.params.get("args").unwrap(), "a, b = 2");
    assert_eq!(generate(&graph), "customFn(a, b = 2)\n");
}

#[test]
fn assigned_chain_flattens_into_head_and_followers() {
    let plot = call(
        "ggplot",
        vec![
            pos(sym("data")),
            pos(call("aes", vec![named("x", sym("wt")), named("y", sym("mpg"))])),
        ],
    );
    let chain = call(
        "+",
        vec![
            pos(call("+", vec![pos(plot), pos(call("geom_point", vec![]))])),
            pos(call("geom_smooth", vec![])),
        ],
    );
    let forest = vec![assign("p", chain)];
    let graph = import(&forest);
    assert!(validate(&graph).is_empty());

    let head = only_of_type(&graph, "ggplot");
    assert_eq!(head.assigned_to.as_deref(), Some("p"));
    assert_eq!(head.params.get("data").unwrap(), "data");
    assert_eq!(head.params.get("mapping").unwrap(), "aes(x = wt, y = mpg)");
    assert_eq!(head.chain_links.len(), 2);

    let point = only_of_type(&graph, "geom_point");
    let smooth = only_of_type(&graph, "geom_smooth");
    assert_eq!(head.chain_links, vec![point.id.clone(), smooth.id.clone()]);
    // Chain members never join the execution chain.
    assert!(point.connections.is_empty());
    assert!(smooth.connections.is_empty());

    // Followers land in the right-hand column, the head in the left one.
    assert_eq!(head.position.x, LEFT_COLUMN_X);
    assert_eq!(point.position.x, CHAIN_COLUMN_X);
    assert_eq!(smooth.position.x, CHAIN_COLUMN_X);
    assert!(point.position.y < smooth.position.y);
}

#[test]
fn dataset_placeholder_assignment_becomes_a_data_block() {
    let forest = vec![assign("data", sym("iris"))];
    let graph = import(&forest);
    let data = only_of_type(&graph, "data");
    assert_eq!(data.params.get("source").unwrap(), "iris");
    assert_eq!(data.assigned_to.as_deref(), Some("data"));
    assert_eq!(generate(&graph), "data <- iris\n");
}

#[test]
fn other_assignments_stay_generic() {
    let forest = vec![assign("n", lit("10", "numeric"))];
    let graph = import(&forest);
    let block = only_of_type(&graph, "expr");
    assert_eq!(block.assigned_to.as_deref(), Some("n"));
    assert_eq!(generate(&graph), "n <- 10\n");
}

#[test]
fn statements_wire_in_document_order_from_the_entry() {
    let forest = vec![
        call("library", vec![pos(sym("ggplot2"))]),
        assign("data", sym("iris")),
        call("print", vec![pos(sym("data"))]),
    ];
    let graph = import(&forest);
    assert!(validate(&graph).is_empty());

    let entry = graph.entry().unwrap();
    let lib = only_of_type(&graph, "library");
    let data = only_of_type(&graph, "data");
    let print = only_of_type(&graph, "print");
    assert_eq!(entry.connections.output.as_deref(), Some(lib.id.as_str()));
    assert_eq!(lib.connections.input.as_deref(), Some(entry.id.as_str()));
    assert_eq!(lib.connections.output.as_deref(), Some(data.id.as_str()));
    assert_eq!(data.connections.output.as_deref(), Some(print.id.as_str()));
    assert_eq!(print.connections.output, None);

    // Top-level statements run down the left column below the entry.
    assert!(graph
        .top_level_blocks()
        .iter()
        .all(|b| b.position.x == LEFT_COLUMN_X));
    assert!(lib.position.y < data.position.y && data.position.y < print.position.y);
}

#[test]
fn three_level_nesting_parents_each_block_to_its_immediate_container() {
    let innermost = call(
        "if",
        vec![
            pos(sym("flag")),
            pos(brace(vec![call("print", vec![pos(sym("j"))])])),
        ],
    );
    let inner_for = call(
        "for",
        vec![
            pos(sym("j")),
            pos(call(":", vec![pos(lit("1", "numeric")), pos(sym("i"))])),
            pos(brace(vec![innermost])),
        ],
    );
    let outer_for = call(
        "for",
        vec![
            pos(sym("i")),
            pos(call(":", vec![pos(lit("1", "numeric")), pos(lit("3", "numeric"))])),
            pos(brace(vec![inner_for])),
        ],
    );
    let graph = import(&[outer_for]);
    assert!(validate(&graph).is_empty());

    let fors = graph.blocks_of_type("for");
    assert_eq!(fors.len(), 2);
    let outer = fors[0];
    let inner = fors[1];
    let cond = only_of_type(&graph, "if");
    let print = only_of_type(&graph, "print");

    // Grandchildren attach to their immediate parent, never skipping levels.
    assert_eq!(outer.parent_id, None);
    assert_eq!(inner.parent_id.as_deref(), Some(outer.id.as_str()));
    assert_eq!(cond.parent_id.as_deref(), Some(inner.id.as_str()));
    assert_eq!(print.parent_id.as_deref(), Some(cond.id.as_str()));

    // Indentation deepens one step per level.
    assert_eq!(outer.position.x, LEFT_COLUMN_X);
    assert_eq!(inner.position.x, LEFT_COLUMN_X + CHILD_INDENT);
    assert_eq!(cond.position.x, LEFT_COLUMN_X + 2 * CHILD_INDENT);
    assert_eq!(print.position.x, LEFT_COLUMN_X + 3 * CHILD_INDENT);

    assert_eq!(
        generate(&graph),
        "for (i in 1:3) {\n  for (j in 1:i) {\n    if (flag) {\n      print(j)\n    }\n  }\n}\n"
    );
}

#[test]
fn chain_inside_a_container_degrades_to_verbatim_text() {
    let chain = call(
        "+",
        vec![pos(call("ggplot", vec![pos(sym("df"))])), pos(call("geom_point", vec![]))],
    );
    let loop_stmt = call(
        "for",
        vec![
            pos(sym("i")),
            pos(call(":", vec![pos(lit("1", "numeric")), pos(lit("2", "numeric"))])),
            pos(brace(vec![assign("p", chain)])),
        ],
    );
    let graph = import(&[loop_stmt]);
    assert!(validate(&graph).is_empty());

    let for_block = only_of_type(&graph, "for");
    let child = graph.block(&for_block.slot_children("body")[0]).unwrap();
    assert_eq!(child.block_type, "expr");
    assert_eq!(
        child.params.get("code").unwrap(),
        "p <- ggplot(df) + geom_point()"
    );
    assert!(child.chain_links.is_empty());
}

#[test]
fn opaque_statements_are_carried_verbatim() {
    let forest = vec![ParseNode::Opaque {
        text: "x |> unclassifiable_syntax".to_string(),
    }];
    let graph = import(&forest);
    let block = only_of_type(&graph, "expr");
    assert_eq!(block.params.get("code").unwrap(), "x |> unclassifiable_syntax");
}

#[test]
fn every_import_synthesizes_exactly_one_entry() {
    let graph = import(&[]);
    assert_eq!(graph.blocks.len(), 1);
    assert!(graph.entry().is_some());
    assert_eq!(generate(&graph), "");
}
