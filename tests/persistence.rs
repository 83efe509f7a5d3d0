use blockplot::ast::{CallArg, ParseNode};
use blockplot::importer::import;
use blockplot::model::{BlockGraph, GraphDoc};

fn sample_graph() -> BlockGraph {
    let aes = ParseNode::call("aes", vec![CallArg::named("x", ParseNode::symbol("wt"))]);
    let plot = ParseNode::call(
        "ggplot",
        vec![
            CallArg::positional(ParseNode::symbol("data")),
            CallArg::positional(aes),
        ],
    );
    let chain = ParseNode::call(
        "+",
        vec![
            CallArg::positional(plot),
            CallArg::positional(ParseNode::call("geom_point", vec![])),
        ],
    );
    import(&[
        ParseNode::call(
            "<-",
            vec![
                CallArg::positional(ParseNode::symbol("data")),
                CallArg::positional(ParseNode::symbol("mtcars")),
            ],
        ),
        chain,
    ])
}

#[test]
fn binary_document_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.bpg");

    let doc = GraphDoc {
        graph: sample_graph(),
    };
    doc.save_to_binary(&path).unwrap();
    let loaded = GraphDoc::load_from_binary(&path).unwrap();
    assert_eq!(loaded.graph, doc.graph);
}

#[test]
fn binary_load_rejects_wrong_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not_a_doc.bpg");
    std::fs::write(&path, b"NOTADOCXX_some_garbage").unwrap();
    let err = GraphDoc::load_from_binary(&path).unwrap_err();
    assert!(err.to_string().contains("magic"));
}

#[test]
fn json_round_trip_preserves_the_serialized_record_shape() {
    let graph = sample_graph();
    let json = serde_json::to_string_pretty(&graph).unwrap();
    // The on-disk shape uses the documented field names.
    assert!(json.contains("\"blockType\""));
    assert!(json.contains("\"chainLinks\""));
    assert!(json.contains("\"assignedTo\""));
    let back: BlockGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(back, graph);
}
