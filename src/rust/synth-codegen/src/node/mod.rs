// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

/// A node of the program tree.
///
/// `S` is the span the node occupies once laid out (e.g. its address range),
/// `T` the node kind.
#[derive(Debug, Clone)]
pub struct Node<S, T> {
    data: T,
    span: S,
    children: Vec<Node<S, T>>,
}

impl<S, T> Node<S, T> {
    pub fn new(data: T, span: S) -> Self {
        Self {
            data,
            span,
            children: Vec::new(),
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn span(&self) -> &S {
        &self.span
    }

    pub fn span_mut(&mut self) -> &mut S {
        &mut self.span
    }

    pub fn iter_children(&self) -> impl DoubleEndedIterator<Item = &Node<S, T>> {
        self.children.iter()
    }

    pub fn iter_children_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Node<S, T>> {
        self.children.iter_mut()
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node<S, T>> {
        &mut self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn add_child_node(&mut self, node: Node<S, T>) {
        self.children.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children() {
        let mut root = Node::new("root", 0);
        assert!(!root.has_children());
        root.add_child_node(Node::new("a", 1));
        root.add_child_node(Node::new("b", 2));
        for child in root.iter_children_mut() {
            *child.span_mut() += 10;
        }
        let spans: Vec<_> = root.iter_children().map(|c| (*c.data(), *c.span())).collect();
        assert_eq!(spans, vec![("a", 11), ("b", 12)]);
    }
}
