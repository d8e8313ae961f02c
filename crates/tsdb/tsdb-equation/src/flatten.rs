use std::collections::HashMap;

use crate::ast::Node;
use crate::error::EquationError;

/// Substitutes every `Ref` leaf that names another registered equation with
/// that equation's (already-flattened) tree, leaving references to physical
/// series untouched. A slug that reappears on the current substitution
/// stack is a cycle and is rejected — the original this is ported from used
/// an unguarded recursive substitution with no visited set.
pub fn flatten(root: &Node, registry: &HashMap<String, Node>) -> Result<Node, EquationError> {
    let mut stack = Vec::new();
    flatten_inner(root, registry, &mut stack)
}

fn flatten_inner(node: &Node, registry: &HashMap<String, Node>, stack: &mut Vec<String>) -> Result<Node, EquationError> {
    match node {
        Node::Const(_) => Ok(node.clone()),
        Node::Ref(name) => match registry.get(name) {
            None => Ok(node.clone()),
            Some(referenced) => {
                if stack.contains(name) {
                    return Err(EquationError::Cycle(name.clone()));
                }
                stack.push(name.clone());
                let flattened = flatten_inner(referenced, registry, stack)?;
                stack.pop();
                Ok(flattened)
            }
        },
        Node::Add(a, b) => Ok(flatten_inner(a, registry, stack)?.add(flatten_inner(b, registry, stack)?)),
        Node::Sub(a, b) => Ok(flatten_inner(a, registry, stack)?.sub(flatten_inner(b, registry, stack)?)),
        Node::Mul(a, b) => Ok(flatten_inner(a, registry, stack)?.mul(flatten_inner(b, registry, stack)?)),
        Node::Div(a, b) => Ok(flatten_inner(a, registry, stack)?.div(flatten_inner(b, registry, stack)?)),
        Node::Neg(a) => Ok(flatten_inner(a, registry, stack)?.neg()),
    }
}
