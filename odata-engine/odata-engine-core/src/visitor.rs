//! Translation of a query expression chain into a [QueryOperation].

use std::collections::VecDeque;

use arcstr::ArcStr;
use odata_runtime::{
    expr::{Expr, Lambda},
    query::{
        expression::{QueryExpr, QueryMethod},
        operation::{Compound, KeyValues, OperationKind, QueryOperation, SelectMany, SelectOne},
        order::{OrderClause, OrderMethod, OrderStack},
        projection::Projection,
    },
    schema::Schema,
};
use tracing::{debug, trace};

/// One queued operator of the expression chain.
#[derive(Clone, Copy, Debug)]
enum Token<'e> {
    /// A null-guarded projection
    Select(&'e Lambda),
    /// A navigation, either through `SelectMany` or a non-projecting `Select`
    SelectMany(&'e Lambda),
    Where(&'e Lambda),
    Count,
    Order(OrderMethod, &'e Lambda),
    Take(usize),
    Skip(usize),
    Root(&'e ArcStr),
}

/// Parse a query expression into an operation.
///
/// Returns `None` when the shape of the chain is not supported.
pub fn parse(expr: &QueryExpr, schema: &Schema) -> Option<QueryOperation> {
    let mut queue = VecDeque::new();
    enqueue(expr, &mut queue)?;

    trace!("token queue: {queue:?}");

    let operation = Parser { schema }.fold(&mut queue);
    match &operation {
        Some(operation) => debug!(
            "parsed {} operation of {}",
            operation.kind_name(),
            operation.of_type
        ),
        None => debug!("unsupported query shape"),
    }
    operation
}

/// Queue the chain's operators, outermost first. The root source ends up last.
fn enqueue<'e>(mut expr: &'e QueryExpr, queue: &mut VecDeque<Token<'e>>) -> Option<()> {
    loop {
        match expr {
            QueryExpr::Call(receiver, method) => {
                queue.push_back(match method {
                    QueryMethod::Where(lambda) => Token::Where(lambda),
                    QueryMethod::Select(lambda) => {
                        if matches!(lambda.body, Expr::Conditional { .. }) {
                            Token::Select(lambda)
                        } else {
                            Token::SelectMany(lambda)
                        }
                    }
                    QueryMethod::SelectMany(lambda) => Token::SelectMany(lambda),
                    QueryMethod::LongCount => Token::Count,
                    QueryMethod::Order(method, lambda) => Token::Order(*method, lambda),
                    QueryMethod::Take(count) => Token::Take(*count),
                    QueryMethod::Skip(count) => Token::Skip(*count),
                });
                expr = receiver;
            }
            QueryExpr::Source(element_type) => {
                queue.push_back(Token::Root(element_type));
                return Some(());
            }
            QueryExpr::Constant(_) => return None,
        }
    }
}

struct Parser<'s> {
    schema: &'s Schema,
}

/// Operators collected before the operation kind is known.
#[derive(Default)]
struct Modifiers {
    projection: Option<Projection>,
    is_count_request: bool,
    top_count: usize,
    skip_count: usize,
    order_stack: OrderStack,
    filter: Option<Lambda>,
}

impl Modifiers {
    fn build(self, of_type: ArcStr, kind: OperationKind) -> QueryOperation {
        QueryOperation {
            skip_count: self.skip_count,
            top_count: self.top_count,
            filter: self.filter,
            is_count_request: self.is_count_request,
            order_stack: self.order_stack,
            projection: self.projection,
            kind,
            ..QueryOperation::new(of_type)
        }
    }
}

impl<'e> Parser<'_> {
    fn fold(&self, queue: &mut VecDeque<Token<'e>>) -> Option<QueryOperation> {
        let mut modifiers = Modifiers::default();
        let mut item = queue.pop_front()?;

        if let Token::Select(lambda) = item {
            modifiers.projection = Some(self.projection(lambda));
            item = queue.pop_front()?;
        }

        if let Token::Where(lambda) = item {
            if self.is_key_filter(lambda) {
                let keys = self.accumulate_keys(lambda, queue)?;
                let parent = self.fold_parent(queue);

                return Some(
                    modifiers.build(
                        lambda.param_type.clone(),
                        OperationKind::SelectOne(SelectOne { keys, parent }),
                    ),
                );
            }
        }

        if let Token::Count = item {
            modifiers.is_count_request = true;
            item = queue.pop_front()?;
        }

        if let Token::Take(count) = item {
            modifiers.top_count = count;
            item = queue.pop_front()?;
        }

        if let Token::Skip(count) = item {
            modifiers.skip_count = count;
            item = queue.pop_front()?;
        }

        while let Token::Order(method, lambda) = item {
            modifiers.order_stack.push(OrderClause {
                method,
                key_selector: lambda.clone(),
            });
            item = queue.pop_front()?;
        }

        if let Token::Where(lambda) = item {
            if !self.is_key_filter(lambda) {
                modifiers.filter = Some(lambda.clone());
                item = queue.pop_front()?;
            }
        }

        // two navigations in a row: the outer one extends the inner one
        let mut extended_property: Option<(&str, &ArcStr)> = None;
        if let Token::SelectMany(lambda) = item {
            if matches!(queue.front(), Some(Token::SelectMany(_))) {
                extended_property = Some((lambda.body.as_param_member()?, &lambda.param_type));
                item = queue.pop_front()?;
            }
        }

        if let Token::SelectMany(lambda) = item {
            if let Some(Token::Where(_)) = queue.front() {
                let Some(Token::Where(owner_filter)) = queue.pop_front() else {
                    return None;
                };
                let navigation_property = lambda.body.as_param_member()?.to_string();
                let (member, value) = owner_filter.as_member_equality()?;

                let mut keys = KeyValues::default();
                keys.insert(member, value.to_string());
                let keys = self.accumulate_more_keys(owner_filter, keys, queue)?;

                let parent = self.fold_parent(queue);
                let owner_type = owner_filter.param_type.clone();

                return Some(match extended_property {
                    Some((extended_property, intermediate_type)) => {
                        let anonymous_get_many =
                            QueryOperation::select_many(owner_type, keys, navigation_property);

                        modifiers.build(
                            intermediate_type.clone(),
                            OperationKind::Compound(Compound {
                                many: SelectMany {
                                    one: SelectOne {
                                        keys: KeyValues::default(),
                                        parent,
                                    },
                                    navigation_property: extended_property.to_string(),
                                },
                                anonymous_get_many: Box::new(anonymous_get_many),
                            }),
                        )
                    }
                    None => modifiers.build(
                        owner_type,
                        OperationKind::SelectMany(SelectMany {
                            one: SelectOne { keys, parent },
                            navigation_property,
                        }),
                    ),
                });
            }
        }

        if let Token::Root(element_type) = item {
            return Some(modifiers.build(element_type.clone(), OperationKind::Query));
        }

        trace!("unexpected token {item:?}");
        None
    }

    /// Fold the rest of the queue into the parent of a select-one operation.
    /// Only select-one (and derived) operations are retained as parents.
    fn fold_parent(&self, queue: &mut VecDeque<Token<'e>>) -> Option<Box<QueryOperation>> {
        self.fold(queue)
            .filter(|parent| parent.as_select_one().is_some())
            .map(Box::new)
    }

    fn projection(&self, lambda: &Lambda) -> Projection {
        Projection::from_lambda(lambda.clone(), self.schema).unwrap_or_else(|| {
            let projected_type = match &lambda.body {
                Expr::Conditional { if_false, .. } => match if_false.as_ref() {
                    Expr::MemberInit { type_name, .. } => Some(type_name.clone()),
                    _ => None,
                },
                _ => None,
            };
            Projection::new(lambda.clone(), projected_type)
        })
    }

    /// Whether the lambda is `p.Key == constant` for a key property of its parameter type.
    fn is_key_filter(&self, lambda: &Lambda) -> bool {
        match lambda.as_member_equality() {
            Some((member, _)) => self.schema.is_key_property(&lambda.param_type, member),
            None => false,
        }
    }

    fn accumulate_keys(
        &self,
        first: &Lambda,
        queue: &mut VecDeque<Token<'e>>,
    ) -> Option<KeyValues> {
        let (member, value) = first.as_member_equality()?;
        let mut keys = KeyValues::default();
        keys.insert(member, value.to_string());
        self.accumulate_more_keys(first, keys, queue)
    }

    /// Merge the following key filters on the same operand type.
    ///
    /// A key given twice makes the query unsupported.
    fn accumulate_more_keys(
        &self,
        first: &Lambda,
        mut keys: KeyValues,
        queue: &mut VecDeque<Token<'e>>,
    ) -> Option<KeyValues> {
        while let Some(Token::Where(next)) = queue.front().copied() {
            if next.param_type != first.param_type || !self.is_key_filter(next) {
                break;
            }
            queue.pop_front();

            let (member, value) = next.as_member_equality()?;
            if keys.insert(member, value.to_string()).is_some() {
                debug!("key `{member}` given twice");
                return None;
            }
        }

        Some(keys)
    }
}
