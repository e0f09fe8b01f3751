use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::{
    expr::{Expr, Lambda},
    query::order::OrderMethod,
    value::Value,
};

/// A composed chain of query operators.
///
/// Each [QueryExpr::Call] applies an operator to its receiver; the chain ends in a source.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub enum QueryExpr {
    /// The queryable collection of the given entity type
    Source(ArcStr),
    /// A constant that is not a queryable source
    Constant(Value),
    Call(Box<QueryExpr>, QueryMethod),
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub enum QueryMethod {
    Where(Lambda),
    Select(Lambda),
    SelectMany(Lambda),
    LongCount,
    Order(OrderMethod, Lambda),
    Take(usize),
    Skip(usize),
}

/// Fluent builder of [QueryExpr] chains, mirroring the way a host composes requests.
///
/// Lambdas are given the current element type as their parameter type.
#[derive(Clone, Debug)]
pub struct Queryable {
    expr: QueryExpr,
    element_type: ArcStr,
}

impl Queryable {
    pub fn source(entity_type: impl Into<ArcStr>) -> Self {
        let element_type: ArcStr = entity_type.into();
        Self {
            expr: QueryExpr::Source(element_type.clone()),
            element_type,
        }
    }

    pub fn element_type(&self) -> &ArcStr {
        &self.element_type
    }

    pub fn expr(&self) -> &QueryExpr {
        &self.expr
    }

    pub fn into_expr(self) -> QueryExpr {
        self.expr
    }

    fn call(self, method: QueryMethod) -> Self {
        Self {
            expr: QueryExpr::Call(Box::new(self.expr), method),
            element_type: self.element_type,
        }
    }

    fn lambda(&self, body: Expr) -> Lambda {
        Lambda::new(self.element_type.clone(), body)
    }

    pub fn filter(self, predicate: Expr) -> Self {
        let lambda = self.lambda(predicate);
        self.call(QueryMethod::Where(lambda))
    }

    /// Filter on `property == value`, the way key segments of a resource path are expressed
    pub fn key(self, property: &str, value: impl Into<Value>) -> Self {
        self.filter(Expr::prop(property).equals(Expr::Const(value.into())))
    }

    /// Navigate through a single-valued navigation property
    pub fn navigate(self, property: &str, target_type: impl Into<ArcStr>) -> Self {
        let lambda = self.lambda(Expr::prop(property));
        let mut next = self.call(QueryMethod::Select(lambda));
        next.element_type = target_type.into();
        next
    }

    /// Navigate through a collection-valued navigation property
    pub fn navigate_many(self, property: &str, target_type: impl Into<ArcStr>) -> Self {
        let lambda = self.lambda(Expr::prop(property));
        let mut next = self.call(QueryMethod::SelectMany(lambda));
        next.element_type = target_type.into();
        next
    }

    /// Project each element into the named properties
    pub fn select(self, projected_type: impl Into<ArcStr>, properties: &[&str]) -> Self {
        let lambda = Lambda::null_guarded_projection(
            self.element_type.clone(),
            projected_type,
            properties,
        );
        self.call(QueryMethod::Select(lambda))
    }

    pub fn order_by(self, key_selector: Expr) -> Self {
        self.order(OrderMethod::OrderBy, key_selector)
    }

    pub fn order_by_descending(self, key_selector: Expr) -> Self {
        self.order(OrderMethod::OrderByDescending, key_selector)
    }

    pub fn then_by(self, key_selector: Expr) -> Self {
        self.order(OrderMethod::ThenBy, key_selector)
    }

    pub fn then_by_descending(self, key_selector: Expr) -> Self {
        self.order(OrderMethod::ThenByDescending, key_selector)
    }

    fn order(self, method: OrderMethod, key_selector: Expr) -> Self {
        let lambda = self.lambda(key_selector);
        self.call(QueryMethod::Order(method, lambda))
    }

    pub fn skip(self, count: usize) -> Self {
        self.call(QueryMethod::Skip(count))
    }

    pub fn take(self, count: usize) -> Self {
        self.call(QueryMethod::Take(count))
    }

    pub fn long_count(self) -> Self {
        self.call(QueryMethod::LongCount)
    }
}

impl From<Queryable> for QueryExpr {
    fn from(value: Queryable) -> Self {
        value.expr
    }
}
