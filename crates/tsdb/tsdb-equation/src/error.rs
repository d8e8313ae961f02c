use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EquationError {
    #[error("could not parse equation: {0}")]
    Parse(String),

    #[error("equation reference cycle detected at {0:?}")]
    Cycle(String),

    #[error("equation references unknown series or equation {0:?}")]
    UnknownReference(String),

    #[error("division by zero while evaluating equation")]
    DivisionByZero,
}
