use crate::ast::Node;
use crate::error::EquationError;

/// Evaluates a (flattened) equation against a lookup of a physical series'
/// reading at whatever instant the caller is resolving. The combinator has
/// no I/O of its own: `lookup` is owned by the caller (typically backed by
/// the series engine's `fetch`/`info` read path).
pub fn evaluate(node: &Node, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, EquationError> {
    match node {
        Node::Const(value) => Ok(*value),
        Node::Ref(name) => lookup(name).ok_or_else(|| EquationError::UnknownReference(name.clone())),
        Node::Add(a, b) => Ok(evaluate(a, lookup)? + evaluate(b, lookup)?),
        Node::Sub(a, b) => Ok(evaluate(a, lookup)? - evaluate(b, lookup)?),
        Node::Mul(a, b) => Ok(evaluate(a, lookup)? * evaluate(b, lookup)?),
        Node::Div(a, b) => {
            let divisor = evaluate(b, lookup)?;
            if divisor == 0.0 {
                return Err(EquationError::DivisionByZero);
            }
            Ok(evaluate(a, lookup)? / divisor)
        }
        Node::Neg(a) => Ok(-evaluate(a, lookup)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn evaluates_arithmetic() {
        let node = parse("a + b * 2").unwrap();
        let lookup = |name: &str| match name {
            "a" => Some(1.0),
            "b" => Some(3.0),
            _ => None,
        };
        assert_eq!(evaluate(&node, &lookup).unwrap(), 7.0);
    }

    #[test]
    fn unknown_reference_errors() {
        let node = parse("missing").unwrap();
        let lookup = |_: &str| None;
        assert!(evaluate(&node, &lookup).is_err());
    }

    #[test]
    fn division_by_zero_errors() {
        let node = parse("a / b").unwrap();
        let lookup = |name: &str| match name {
            "a" => Some(1.0),
            "b" => Some(0.0),
            _ => None,
        };
        assert_eq!(evaluate(&node, &lookup).unwrap_err(), EquationError::DivisionByZero);
    }
}
