use std::cmp::Ordering;

use crate::{
    ast::{BinaryOp, Expr, UnaryOp},
    error::EvaluationError,
    interface::{Context, FunctionRegistry, Value},
};

type EvalResult = Result<Value, EvaluationError>;

/// Walks expression trees against a data context.
///
/// Function calls resolve through the registry; without one every call fails
/// with [`EvaluationError::UnknownFunction`].
#[derive(Clone, Copy, Default)]
pub struct Evaluator<'f> {
    functions: Option<&'f dyn FunctionRegistry>,
}

impl<'f> Evaluator<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions(functions: &'f dyn FunctionRegistry) -> Self {
        Self {
            functions: Some(functions),
        }
    }

    /// Evaluates `expr` against `context`.
    ///
    /// Missing variables, missing fields and out of range indexes evaluate to
    /// `null`.
    ///
    /// # Errors
    /// - Division or modulo by zero, modulo of non-integers.
    /// - Arithmetic on non-numeric operands (other than string `+`).
    /// - Ordering comparisons between incomparable values.
    /// - Unknown or failing functions, or an index of an unsupported type.
    pub fn evaluate(&self, expr: &Expr, context: &Context) -> EvalResult {
        match expr {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Variable { name } => Ok(context.get(name).cloned().unwrap_or_default()),
            Expr::FieldAccess { object, field } => {
                let object = self.evaluate(object, context)?;
                Ok(object.get_field(field).cloned().unwrap_or_default())
            }
            Expr::IndexAccess { object, index } => {
                let object = self.evaluate(object, context)?;
                let index = self.evaluate(index, context)?;
                index_value(&object, &index)
            }
            Expr::UnaryOp { op, operand } => {
                let operand = self.evaluate(operand, context)?;
                unary(*op, operand)
            }
            Expr::BinaryOp { op, left, right } => match op {
                BinaryOp::And => {
                    let left = self.evaluate(left, context)?;
                    if !left.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.evaluate(right, context)?.is_truthy()))
                }
                BinaryOp::Or => {
                    let left = self.evaluate(left, context)?;
                    if left.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.evaluate(right, context)?.is_truthy()))
                }
                BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod => {
                    let left = self.evaluate(left, context)?;
                    let right = self.evaluate(right, context)?;
                    binary(*op, &left, &right)
                }
            },
            Expr::FunctionCall { name, args } => {
                let function = self
                    .functions
                    .and_then(|registry| registry.lookup(name))
                    .ok_or_else(|| EvaluationError::UnknownFunction { name: name.clone() })?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&args).map_err(|message| EvaluationError::FunctionFailed {
                    name: name.clone(),
                    message,
                })
            }
        }
    }
}

/// Evaluates `expr` with no function registry.
///
/// # Errors
/// - See [`Evaluator::evaluate`].
pub fn evaluate(expr: &Expr, context: &Context) -> EvalResult {
    Evaluator::new().evaluate(expr, context)
}

fn index_value(object: &Value, index: &Value) -> EvalResult {
    match index {
        Value::Int(_) | Value::Float(_) => {
            let i = index
                .as_exact_i64()
                .ok_or_else(|| EvaluationError::InvalidIndexType {
                    found: index.type_name().to_string(),
                })?;
            Ok(match object {
                Value::Array(items) => usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or_default(),
                Value::Object(map) => map.get(&i.to_string()).cloned().unwrap_or_default(),
                Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
                    Value::Null
                }
            })
        }
        Value::String(key) => Ok(object.get_field(key).cloned().unwrap_or_default()),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            Err(EvaluationError::InvalidIndexType {
                found: index.type_name().to_string(),
            })
        }
    }
}

fn unary(op: UnaryOp, operand: Value) -> EvalResult {
    match (op, operand) {
        (UnaryOp::Not, operand) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => Ok(i
            .checked_neg()
            .map_or_else(|| Value::Float(-(i as f64)), Value::Int)),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Plus, operand @ (Value::Int(_) | Value::Float(_))) => Ok(operand),
        (op, operand) => Err(EvaluationError::NonNumericOperand {
            operator: op.symbol().to_string(),
            found: operand.type_name().to_string(),
        }),
    }
}

/// Equality with numeric coercion: `1 == 1.0`.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a == b,
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, EvaluationError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    ordering.ok_or_else(|| EvaluationError::InvalidComparison {
        operator: op.symbol().to_string(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(op, left, right)?.is_lt())),
        BinaryOp::LtEq => Ok(Value::Bool(compare(op, left, right)?.is_le())),
        BinaryOp::Gt => Ok(Value::Bool(compare(op, left, right)?.is_gt())),
        BinaryOp::GtEq => Ok(Value::Bool(compare(op, left, right)?.is_ge())),
        BinaryOp::Add
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) =>
        {
            Ok(Value::String(format!("{}{}", left, right)))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
        // Short-circuited in the evaluator; kept total for direct callers.
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    for operand in [left, right] {
        if !operand.is_number() {
            return Err(EvaluationError::NonNumericOperand {
                operator: op.symbol().to_string(),
                found: operand.type_name().to_string(),
            });
        }
    }

    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return integer_arithmetic(op, *a, *b);
    }

    let (a, b) = (
        left.as_f64().unwrap_or_default(),
        right.as_f64().unwrap_or_default(),
    );
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div if b == 0.0 => Err(EvaluationError::DivisionByZero),
        BinaryOp::Div => Ok(Value::Float(a / b)),
        BinaryOp::Mod
        | BinaryOp::Or
        | BinaryOp::And
        | BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => {
            let (Some(x), Some(y)) = (left.as_exact_i64(), right.as_exact_i64()) else {
                return Err(EvaluationError::NonIntegerModulo {
                    left: left.to_string(),
                    right: right.to_string(),
                });
            };
            if y == 0 {
                return Err(EvaluationError::ModuloByZero);
            }
            Ok(Value::Float(x.checked_rem(y).unwrap_or(0) as f64))
        }
    }
}

/// Integer operands keep an integer result when it is exact and in range.
fn integer_arithmetic(op: BinaryOp, a: i64, b: i64) -> EvalResult {
    let (x, y) = (a as f64, b as f64);
    match op {
        BinaryOp::Add => Ok(a.checked_add(b).map_or(Value::Float(x + y), Value::Int)),
        BinaryOp::Sub => Ok(a.checked_sub(b).map_or(Value::Float(x - y), Value::Int)),
        BinaryOp::Mul => Ok(a.checked_mul(b).map_or(Value::Float(x * y), Value::Int)),
        BinaryOp::Div => {
            if b == 0 {
                return Err(EvaluationError::DivisionByZero);
            }
            match (a.checked_rem(b), a.checked_div(b)) {
                (Some(0), Some(quotient)) => Ok(Value::Int(quotient)),
                _ => Ok(Value::Float(x / y)),
            }
        }
        BinaryOp::Mod
        | BinaryOp::Or
        | BinaryOp::And
        | BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => {
            if b == 0 {
                return Err(EvaluationError::ModuloByZero);
            }
            Ok(Value::Int(a.checked_rem(b).unwrap_or(0)))
        }
    }
}
