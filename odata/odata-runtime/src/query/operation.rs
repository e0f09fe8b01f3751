use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::{
    context::{CaseInsensitiveMap, ContextParameters},
    expr::Lambda,
    query::{
        order::{OrderClause, OrderStack},
        projection::Projection,
    },
    schema::{PropertyDef, Schema},
};

/// Key name => key value, compared case-insensitively
pub type KeyValues = CaseInsensitiveMap;

/// A structured description of one query against the repositories.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct QueryOperation {
    /// Full type name of the queried entity type
    pub of_type: ArcStr,
    pub skip_count: usize,
    pub top_count: usize,
    pub filter: Option<Lambda>,
    pub is_count_request: bool,
    pub order_stack: OrderStack,
    pub projection: Option<Projection>,
    pub continuation_token: Option<String>,
    pub context_parameters: ContextParameters,
    pub kind: OperationKind,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub enum OperationKind {
    /// A query over the whole collection
    Query,
    SelectOne(SelectOne),
    SelectMany(SelectMany),
    Compound(Compound),
}

/// Lookup of a single entity by its keys.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Debug)]
pub struct SelectOne {
    pub keys: KeyValues,
    pub parent: Option<Box<QueryOperation>>,
}

impl SelectOne {
    /// The first key value
    pub fn key(&self) -> Option<&str> {
        self.keys.first().map(|(_, value)| value)
    }
}

/// Navigation from a single entity through one of its navigation properties.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct SelectMany {
    pub one: SelectOne,
    pub navigation_property: String,
}

/// Two-hop navigation.
///
/// The anonymous select-many resolves the intermediate entity, whose keys then
/// identify the owner of the navigation property.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Compound {
    pub many: SelectMany,
    pub anonymous_get_many: Box<QueryOperation>,
}

impl QueryOperation {
    pub fn new(of_type: impl Into<ArcStr>) -> Self {
        Self {
            of_type: of_type.into(),
            skip_count: 0,
            top_count: 0,
            filter: None,
            is_count_request: false,
            order_stack: Default::default(),
            projection: None,
            continuation_token: None,
            context_parameters: Default::default(),
            kind: OperationKind::Query,
        }
    }

    pub fn select_one(of_type: impl Into<ArcStr>, keys: KeyValues) -> Self {
        Self {
            kind: OperationKind::SelectOne(SelectOne { keys, parent: None }),
            ..Self::new(of_type)
        }
    }

    pub fn select_many(
        of_type: impl Into<ArcStr>,
        keys: KeyValues,
        navigation_property: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::SelectMany(SelectMany {
                one: SelectOne { keys, parent: None },
                navigation_property: navigation_property.into(),
            }),
            ..Self::new(of_type)
        }
    }

    pub fn with_filter(mut self, filter: Lambda) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_count_request(mut self) -> Self {
        self.is_count_request = true;
        self
    }

    pub fn with_skip(mut self, skip_count: usize) -> Self {
        self.skip_count = skip_count;
        self
    }

    pub fn with_top(mut self, top_count: usize) -> Self {
        self.top_count = top_count;
        self
    }

    pub fn with_order(mut self, clause: OrderClause) -> Self {
        self.order_stack.push(clause);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// The select-one part of this operation.
    /// Select-many and compound operations are select-one operations too.
    pub fn as_select_one(&self) -> Option<&SelectOne> {
        match &self.kind {
            OperationKind::Query => None,
            OperationKind::SelectOne(one) => Some(one),
            OperationKind::SelectMany(many) => Some(&many.one),
            OperationKind::Compound(compound) => Some(&compound.many.one),
        }
    }

    pub fn as_select_one_mut(&mut self) -> Option<&mut SelectOne> {
        match &mut self.kind {
            OperationKind::Query => None,
            OperationKind::SelectOne(one) => Some(one),
            OperationKind::SelectMany(many) => Some(&mut many.one),
            OperationKind::Compound(compound) => Some(&mut compound.many.one),
        }
    }

    /// The select-many part of this operation.
    /// Compound operations are select-many operations too.
    pub fn as_select_many(&self) -> Option<&SelectMany> {
        match &self.kind {
            OperationKind::SelectMany(many) => Some(many),
            OperationKind::Compound(compound) => Some(&compound.many),
            OperationKind::Query | OperationKind::SelectOne(_) => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match &self.kind {
            OperationKind::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    pub fn keys(&self) -> Option<&KeyValues> {
        self.as_select_one().map(|one| &one.keys)
    }

    /// The first key value of a select-one operation
    pub fn key(&self) -> Option<&str> {
        self.as_select_one().and_then(SelectOne::key)
    }

    /// Metadata of the navigation property of a select-many operation
    pub fn navigation_property<'s>(&self, schema: &'s Schema) -> Option<&'s PropertyDef> {
        let many = self.as_select_many()?;
        schema.property(&self.of_type, &many.navigation_property)
    }

    /// The element type of the navigation property of a select-many operation
    pub fn navigation_element_type<'s>(&self, schema: &'s Schema) -> Option<&'s ArcStr> {
        self.navigation_property(schema)?.element_type()
    }

    /// Whether the named property (by source column name) is read by the projection.
    /// Without a projection, every property is.
    pub fn is_property_in_projection(&self, column_name: &str) -> bool {
        match &self.projection {
            None => true,
            Some(projection) => projection.properties.contains_key(column_name),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            OperationKind::Query => "query",
            OperationKind::SelectOne(_) => "select-one",
            OperationKind::SelectMany(_) => "select-many",
            OperationKind::Compound(_) => "compound",
        }
    }
}
