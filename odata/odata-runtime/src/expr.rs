//! Lambda expressions used for filter predicates, key selectors and projections.

use std::{borrow::Cow, fmt::Debug, sync::Arc};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{NULL, Struct, Value};

#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// The body of a [Lambda].
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub enum Expr {
    /// The lambda parameter
    Param,
    /// Member access on a struct value
    Member(Box<Expr>, String),
    Const(Value),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Construct a new struct of the given type from member bindings
    MemberInit {
        type_name: ArcStr,
        bindings: Vec<(String, Expr)>,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Const(value.into())
    }

    /// Member access on the lambda parameter
    pub fn prop(name: impl Into<String>) -> Self {
        Self::Param.member(name)
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Self::Member(Box::new(self), name.into())
    }

    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(self), Box::new(rhs))
    }

    pub fn equals(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn less_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn greater_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn and_also(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or_else(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// If this is a direct member access on the parameter, the name of the member
    pub fn as_param_member(&self) -> Option<&str> {
        match self {
            Self::Member(target, name) if matches!(target.as_ref(), Self::Param) => Some(name),
            _ => None,
        }
    }
}

/// A single-parameter lambda expression.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Lambda {
    /// Full type name of the parameter
    pub param_type: ArcStr,
    pub body: Expr,
}

impl Lambda {
    pub fn new(param_type: impl Into<ArcStr>, body: Expr) -> Self {
        Self {
            param_type: param_type.into(),
            body,
        }
    }

    /// A projection lambda of the shape
    /// `p => p == null ? null : new {projected_type} { PropertyNameList = "..", .. }`.
    pub fn null_guarded_projection(
        param_type: impl Into<ArcStr>,
        projected_type: impl Into<ArcStr>,
        properties: &[&str],
    ) -> Self {
        let mut bindings = vec![(
            PROPERTY_NAME_LIST.to_string(),
            Expr::constant(properties.join(",")),
        )];
        bindings.extend(
            properties
                .iter()
                .map(|name| (name.to_string(), Expr::prop(*name))),
        );

        Self::new(
            param_type,
            Expr::Conditional {
                test: Box::new(Expr::Param.equals(Expr::Const(Value::Null))),
                if_true: Box::new(Expr::Const(Value::Null)),
                if_false: Box::new(Expr::MemberInit {
                    type_name: projected_type.into(),
                    bindings,
                }),
            },
        )
    }

    /// `(member, constant)` when the body is `p.member == constant`
    pub fn as_member_equality(&self) -> Option<(&str, &Value)> {
        match &self.body {
            Expr::Binary(BinaryOp::Eq, left, right) => match (left.as_param_member(), right.as_ref())
            {
                (Some(member), Expr::Const(value)) => Some((member, value)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Compile the lambda into a reusable closure
    pub fn compile(&self) -> CompiledLambda {
        CompiledLambda(compile_expr(&self.body))
    }

    /// Evaluate the lambda once. Prefer [Self::compile] for repeated evaluation.
    pub fn eval(&self, arg: &Value) -> EvalResult<Value> {
        self.compile().call(arg)
    }
}

/// Name of the member-init binding that lists the projected property names
pub const PROPERTY_NAME_LIST: &str = "PropertyNameList";

#[derive(Clone, Debug, Error)]
pub enum EvalError {
    #[error("cannot access member `{member}` of {kind} value")]
    MemberAccess { member: String, kind: &'static str },
    #[error("operator {op:?} cannot be applied to {left} and {right} values")]
    IncompatibleOperands {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },
    #[error("expected a boolean, found {0} value")]
    NotBoolean(&'static str),
}

pub type EvalResult<T> = Result<T, EvalError>;

type Closure = Arc<dyn for<'a> Fn(&'a Value) -> EvalResult<Cow<'a, Value>> + Send + Sync>;

/// A compiled [Lambda].
#[derive(Clone)]
pub struct CompiledLambda(Closure);

impl CompiledLambda {
    pub fn call(&self, arg: &Value) -> EvalResult<Value> {
        (self.0)(arg).map(Cow::into_owned)
    }

    /// Call a predicate, requiring a boolean result
    pub fn test(&self, arg: &Value) -> EvalResult<bool> {
        eval_bool(&self.0, arg)
    }
}

impl Debug for CompiledLambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompiledLambda")
    }
}

fn closure<F>(f: F) -> Closure
where
    F: for<'a> Fn(&'a Value) -> EvalResult<Cow<'a, Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn compile_expr(expr: &Expr) -> Closure {
    match expr {
        Expr::Param => closure(|arg| Ok(Cow::Borrowed(arg))),
        Expr::Member(target, name) => {
            let target = compile_expr(target);
            let name = name.clone();
            closure(move |arg| match target(arg)? {
                Cow::Borrowed(value) => member(value, &name).map(Cow::Borrowed),
                Cow::Owned(value) => member(&value, &name).map(|m| Cow::Owned(m.clone())),
            })
        }
        Expr::Const(value) => {
            let value = value.clone();
            closure(move |_| Ok(Cow::Owned(value.clone())))
        }
        Expr::Binary(op @ (BinaryOp::And | BinaryOp::Or), left, right) => {
            let op = *op;
            let left = compile_expr(left);
            let right = compile_expr(right);
            closure(move |arg| {
                let left = eval_bool(&left, arg)?;
                let output = match (op, left) {
                    (BinaryOp::And, false) => false,
                    (BinaryOp::Or, true) => true,
                    _ => eval_bool(&right, arg)?,
                };
                Ok(Cow::Owned(Value::Bool(output)))
            })
        }
        Expr::Binary(op, left, right) => {
            let op = *op;
            let left = compile_expr(left);
            let right = compile_expr(right);
            closure(move |arg| {
                let left = left(arg)?;
                let right = right(arg)?;
                compare(op, &left, &right).map(|b| Cow::Owned(Value::Bool(b)))
            })
        }
        Expr::Not(inner) => {
            let inner = compile_expr(inner);
            closure(move |arg| Ok(Cow::Owned(Value::Bool(!eval_bool(&inner, arg)?))))
        }
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            let test = compile_expr(test);
            let if_true = compile_expr(if_true);
            let if_false = compile_expr(if_false);
            closure(move |arg| {
                if eval_bool(&test, arg)? {
                    if_true(arg)
                } else {
                    if_false(arg)
                }
            })
        }
        Expr::MemberInit {
            type_name,
            bindings,
        } => {
            let type_name = type_name.clone();
            let bindings: Vec<(String, Closure)> = bindings
                .iter()
                .map(|(name, expr)| (name.clone(), compile_expr(expr)))
                .collect();
            closure(move |arg| {
                let mut props = indexmap::IndexMap::with_capacity(bindings.len());
                for (name, binding) in &bindings {
                    props.insert(name.clone(), binding(arg)?.into_owned());
                }
                Ok(Cow::Owned(Value::Struct(Box::new(Struct {
                    type_name: type_name.clone(),
                    props,
                }))))
            })
        }
    }
}

fn member<'v>(value: &'v Value, name: &str) -> EvalResult<&'v Value> {
    match value {
        Value::Struct(s) => Ok(s.props.get(name).unwrap_or(&NULL)),
        // null propagates through member access
        Value::Null => Ok(&NULL),
        other => Err(EvalError::MemberAccess {
            member: name.to_string(),
            kind: other.kind_name(),
        }),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<bool> {
    match op {
        BinaryOp::Eq => Ok(left.loose_eq(right)),
        BinaryOp::Ne => Ok(!left.loose_eq(right)),
        _ if left.is_null() || right.is_null() => Ok(false),
        _ => {
            let ordering = left
                .compare(right)
                .ok_or(EvalError::IncompatibleOperands {
                    op,
                    left: left.kind_name(),
                    right: right.kind_name(),
                })?;
            Ok(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => false,
            })
        }
    }
}

fn eval_bool(closure: &Closure, arg: &Value) -> EvalResult<bool> {
    let output: Cow<Value> = closure(arg)?;
    as_bool(output.as_ref())
}

fn as_bool(value: &Value) -> EvalResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| EvalError::NotBoolean(value.kind_name()))
}
