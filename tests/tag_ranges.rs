//! Tag range invariants of the symbol tree

use proptest::prelude::*;
use xmlpack::parser::DocumentParser;
use xmlpack::symbol::RelativePosition;

fn element() -> impl Strategy<Value = (String, String, String, String)> {
    (
        "[a-z][a-z0-9]{0,8}",
        "[a-z]{1,6}",
        "[a-z0-9 ]{0,10}",
        "[a-z0-9]{0,12}",
    )
}

proptest! {
    #[test]
    fn start_and_end_tags_span_their_markup((name, attr, value, text) in element()) {
        let start = format!("<{} {}=\"{}\">", name, attr, value);
        let end = format!("</{}>", name);
        let document = format!("<doc>\n{}{}{}\n</doc>\n", start, text, end);

        let analysis = DocumentParser::new().parse(None, document.as_bytes(), 1).unwrap();
        prop_assert!(analysis.diagnostics.is_empty());

        let tree = &analysis.tree;
        let doc = tree.children(tree.root())[0];
        let id = tree.children(doc)[0];
        let node = &tree[id];
        prop_assert_eq!(&node.element_name, &name);

        let start_tag = node.start_tag;
        prop_assert_eq!((start_tag.start_line, start_tag.start_col), (2, 1));
        prop_assert_eq!((start_tag.end_line, start_tag.end_col), (2, start.len() as u32));

        let end_col = (start.len() + text.len() + 1) as u32;
        let end_tag = node.end_tag.unwrap();
        prop_assert_eq!((end_tag.start_line, end_tag.start_col), (2, end_col));
        prop_assert_eq!(end_tag.end_col, end_col + end.len() as u32 - 1);

        prop_assert_eq!(node.compare_location(2, 1), RelativePosition::Before);
        for col in 2..=start_tag.end_col {
            prop_assert_eq!(node.compare_location(2, col), RelativePosition::InStartTag);
        }
        for col in start_tag.end_col + 1..=end_tag.start_col {
            prop_assert_eq!(node.compare_location(2, col), RelativePosition::InContent);
        }
        for col in end_tag.start_col + 1..=end_tag.end_col {
            prop_assert_eq!(node.compare_location(2, col), RelativePosition::InEndTag);
        }
        prop_assert_eq!(node.compare_location(2, end_tag.end_col + 1), RelativePosition::After);
        prop_assert_eq!(node.compare_location(3, 1), RelativePosition::After);
    }
}

#[test]
fn multiline_start_tag() {
    let document = "<doc>\n  <item\n    id=\"1\">x</item>\n</doc>";
    let analysis = DocumentParser::new().parse(None, document.as_bytes(), 1).unwrap();
    let tree = &analysis.tree;
    let doc = tree.children(tree.root())[0];
    let item = &tree[tree.children(doc)[0]];

    assert_eq!((item.start_tag.start_line, item.start_tag.start_col), (2, 3));
    assert_eq!((item.start_tag.end_line, item.start_tag.end_col), (3, 11));
    assert_eq!(item.compare_location(3, 5), RelativePosition::InStartTag);
    assert_eq!(item.compare_location(3, 12), RelativePosition::InContent);
}
