use vlx_core::{
    export_text, export_text_with, parse_text, ArrayInteger, ArrayReal, List, RawtextBlock,
    Structure, StructureRef, TextExportOptions, Value,
};

const HEADER: &str = "VLX version=100 encoding=ascii\n\n";

/// Assert that `root` survives export → parse unchanged.
fn assert_reparses(root: &StructureRef) -> String {
    let text = export_text(root);
    let back = parse_text(&text).unwrap_or_else(|e| panic!("re-parse failed: {e}\n{text}"));
    assert_eq!(*back.borrow(), *root.borrow(), "round trip changed the tree:\n{text}");
    text
}

fn root_with(key: &str, value: Value) -> StructureRef {
    let mut root = Structure::new("<Root>");
    root.push(key, value);
    root.into_ref()
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn header_and_root() {
    let root = Structure::new("<Root>").into_ref();
    assert_eq!(export_text(&root), format!("{HEADER}<Root>\n{{\n}}\n"));
}

#[test]
fn scalars_one_per_line() {
    let mut root = Structure::new("<Root>");
    root.push("b", Value::bool(true));
    root.push("i", Value::integer(-3));
    root.push("r", Value::real(0.5));
    root.push("s", Value::string("a \"q\""));
    root.push("e", Value::identifier("Mode_Fill"));
    let text = export_text(&root.into_ref());
    assert_eq!(
        text,
        format!(
            "{HEADER}<Root>\n{{\n\tb = true\n\ti = -3\n\tr = 0.5\n\ts = \"a \\\"q\\\"\"\n\te = Mode_Fill\n}}\n"
        )
    );
}

#[test]
fn nested_structure_layout() {
    let mut child = Structure::new("<Child>");
    child.push("x", Value::integer(1));
    let root = root_with("child", Value::structure(child));
    assert_eq!(
        export_text(&root),
        format!("{HEADER}<Root>\n{{\n\tchild = <Child>\n\t{{\n\t\tx = 1\n\t}}\n}}\n")
    );
}

#[test]
fn empty_list_is_compact() {
    let root = root_with("l", Value::list(List::new("")));
    let text = assert_reparses(&root);
    assert!(text.contains("\tl = [ ]\n"), "{text}");
}

#[test]
fn tagged_empty_list_is_compact() {
    let root = root_with("l", Value::list(List::new("<Items>")));
    let text = assert_reparses(&root);
    assert!(text.contains("\tl = <Items> [ ]\n"), "{text}");
}

#[test]
fn short_array_is_one_line() {
    let root = root_with("a", Value::array_integer(ArrayInteger::new("", vec![1, 2, 3])));
    let text = assert_reparses(&root);
    assert!(text.contains("\ta = ( 1 2 3 )\n"), "{text}");
}

#[test]
fn long_array_wraps_every_ten() {
    let values: Vec<i64> = (0..25).collect();
    let root = root_with("a", Value::array_integer(ArrayInteger::new("", values)));
    let text = assert_reparses(&root);
    assert!(text.contains("\t\t0 1 2 3 4 5 6 7 8 9\n"), "{text}");
    assert!(text.contains("\t\t20 21 22 23 24\n\t)"), "{text}");
}

#[test]
fn custom_options() {
    let mut root = Structure::new("<Root>");
    root.push("a", Value::array_integer(ArrayInteger::new("", vec![1, 2, 3, 4])));
    let options = TextExportOptions {
        indent: "  ".to_string(),
        array_chunk: 2,
        format_name: "SRF".to_string(),
    };
    let text = export_text_with(&root.into_ref(), &options, None);
    assert!(text.starts_with("SRF version=100 encoding=ascii\n"));
    assert!(text.contains("  a = (\n    1 2\n    3 4\n  )"), "{text}");
    assert!(parse_text(&text).is_ok());
}

#[test]
fn reals_keep_a_fraction() {
    let root = root_with("r", Value::real(2.0));
    let text = assert_reparses(&root);
    assert!(text.contains("r = 2.0\n"));
}

#[test]
fn real_array_round_trips() {
    let root = root_with(
        "a",
        Value::array_real(ArrayReal::new("<Weights>", vec![0.1, 1.0 / 3.0, -2.0, 1e-12])),
    );
    assert_reparses(&root);
}

#[test]
fn rawtext_with_terminator_inside() {
    let root = root_with(
        "src",
        Value::rawtext(RawtextBlock::new("<Code>", "if (a >} b) {\n  x();\n}")),
    );
    let text = assert_reparses(&root);
    assert!(text.contains("\\>}"), "{text}");
}

#[test]
fn rawtext_with_edge_newlines() {
    let root = root_with("src", Value::rawtext(RawtextBlock::new("", "\nbody\n")));
    assert_reparses(&root);
}

#[test]
fn string_escapes_round_trip() {
    let root = root_with("s", Value::string("tab\there\nquote\" back\\ \u{8}\u{c}\r"));
    assert_reparses(&root);
}

// ============================================================================
// UID handling
// ============================================================================

#[test]
fn unreferenced_id_is_pruned() {
    let root = parse_text(&format!("{HEADER}<Root> {{ ID = #root count = 3 }}")).unwrap();
    let text = export_text(&root);
    assert!(!text.contains("ID ="), "{text}");
}

#[test]
fn referenced_id_is_kept() {
    let root = parse_text(&format!(
        "{HEADER}<Root> {{ a = <A> {{ ID = #a }} b = <B> {{ ID = #b peer = #a }} }}"
    ))
    .unwrap();
    let text = export_text(&root);
    assert!(text.contains("ID = #a"), "{text}");
    assert!(!text.contains("ID = #b"), "{text}");
    assert!(text.contains("peer = #a"), "{text}");
}

#[test]
fn self_reference_keeps_id() {
    let root = parse_text(&format!("{HEADER}<Root> {{ ID = #me me = #me }}")).unwrap();
    assert!(export_text(&root).contains("ID = #me"));
}

#[test]
fn without_usage_every_id_is_written() {
    let root = parse_text(&format!("{HEADER}<Root> {{ ID = #root }}")).unwrap();
    let text = export_text_with(&root, &TextExportOptions::default(), None);
    assert!(text.contains("ID = #root"));
}

#[test]
fn shared_structure_written_once() {
    let shared = Structure::with_uid("<Mat>", "#mat").into_ref();
    let mut root = Structure::new("<Root>");
    root.push("first", Value::from(shared.clone()));
    root.push("second", Value::from(shared));
    let text = export_text(&root.into_ref());
    assert_eq!(text.matches("<Mat>").count(), 1, "{text}");
    assert!(text.contains("ID = #mat"), "{text}");
    assert!(text.contains("second = #mat"), "{text}");

    let back = parse_text(&text).unwrap();
    vlx_core::link(&back).unwrap();
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn self_containing_list_terminates() {
    let list = List::new("").into_ref();
    list.borrow_mut().push(Value::integer(1));
    list.borrow_mut().push(Value::from(list.clone()));
    let root = root_with("l", Value::from(list.clone()));

    let text = export_text(&root);
    assert!(text.contains("[ ]"), "{text}");
    assert!(parse_text(&text).is_ok(), "{text}");

    // Break the cycle so the list can be freed.
    list.borrow_mut().values.clear();
}

#[test]
fn shared_list_written_once() {
    let list = List::new("").into_ref();
    list.borrow_mut().push(Value::integer(7));
    let mut root = Structure::new("<Root>");
    root.push("a", Value::from(list.clone()));
    root.push("b", Value::from(list));
    let text = export_text(&root.into_ref());
    assert!(text.contains("b = [ ]"), "{text}");
    assert_eq!(text.matches('7').count(), 1, "{text}");
}
