//! Front end for plain XML documents

use super::{FrontEnd, NodeSpec};
use crate::sax::RawAttribute;
use crate::symbol::{SymbolKind, SymbolNode};

/// Every element becomes a visible node labelled with its name
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericFrontEnd;

impl FrontEnd for GenericFrontEnd {
    fn start_element(
        &mut self,
        _parent: &SymbolNode,
        name: &str,
        _attributes: &[RawAttribute],
    ) -> Option<NodeSpec> {
        Some(NodeSpec::visible(SymbolNode::new(name, SymbolKind::Element)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::ChildKind;

    #[test]
    fn test_elements_are_visible() {
        let parent = SymbolNode::new("root", SymbolKind::Root);
        let spec = GenericFrontEnd.start_element(&parent, "svg:rect", &[]).unwrap();
        assert_eq!(spec.kind, ChildKind::Visible);
        assert_eq!(spec.node.label.name, "svg:rect");
        assert_eq!(spec.node.local_name(), "rect");
        assert!(!spec.capture_text);
    }
}
