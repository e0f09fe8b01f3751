use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    expr::{Expr, Lambda, PROPERTY_NAME_LIST},
    schema::{PropertyKind, Schema},
    value::Value,
};

/// A projection ($select) applied to each resulting element.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Projection {
    pub lambda: Lambda,
    /// The type produced by the projection, when known
    pub projected_type: Option<ArcStr>,
    /// Properties read by the projection, keyed by underlying source column name
    pub properties: IndexMap<String, PropertyDetails>,
}

impl Projection {
    /// A projection for an arbitrary lambda, with no property analysis
    pub fn new(lambda: Lambda, projected_type: Option<ArcStr>) -> Self {
        Self {
            lambda,
            projected_type,
            properties: Default::default(),
        }
    }

    /// Analyze a null-guarded member-init projection lambda.
    ///
    /// Returns `None` unless the body has the shape `p == null ? null : new T { PropertyNameList = "a,b", .. }`.
    pub fn from_lambda(lambda: Lambda, schema: &Schema) -> Option<Self> {
        let Expr::Conditional { if_false, .. } = &lambda.body else {
            return None;
        };
        let Expr::MemberInit {
            type_name,
            bindings,
        } = if_false.as_ref()
        else {
            return None;
        };

        let property_list = bindings
            .iter()
            .find(|(name, _)| name == PROPERTY_NAME_LIST)
            .and_then(|(_, expr)| match expr {
                Expr::Const(Value::Text(list)) => Some(list.as_str()),
                _ => None,
            })?;

        let properties = property_details(
            schema,
            &lambda.param_type,
            property_list.split(',').map(str::trim).filter(|name| !name.is_empty()),
        );

        Some(Self {
            projected_type: Some(type_name.clone()),
            properties,
            lambda,
        })
    }
}

/// How to reach a projected property from the projected element.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct PropertyDetails {
    /// Complex-type properties leading to the owner of the property
    pub accessor: Vec<String>,
    pub property: String,
}

impl PropertyDetails {
    pub fn get_value<'v>(&self, target: &'v Value) -> Option<&'v Value> {
        let mut owner = target;
        for step in &self.accessor {
            owner = owner.get(step)?;
        }
        owner.get(&self.property)
    }

    /// Assign the property on `target`, reaching through the intermediate complex values.
    ///
    /// Returns `false` when an intermediate value is missing or not a struct.
    pub fn set_value(&self, target: &mut Value, value: Value) -> bool {
        let mut owner = target;
        for step in &self.accessor {
            match owner.get_mut(step) {
                Some(next) => owner = next,
                None => return false,
            }
        }
        match owner.as_struct_mut() {
            Some(owner) => {
                owner.props.insert(self.property.clone(), value);
                true
            }
            None => false,
        }
    }
}

/// Resolve projected property names to [PropertyDetails], keyed by source column name.
///
/// Complex-typed properties are expanded into their leaf properties.
pub fn property_details<'n>(
    schema: &Schema,
    type_name: &str,
    names: impl Iterator<Item = &'n str>,
) -> IndexMap<String, PropertyDetails> {
    let mut output = IndexMap::new();
    for name in names {
        collect_details(schema, type_name, name, &[], &mut output);
    }
    output
}

fn collect_details(
    schema: &Schema,
    type_name: &str,
    name: &str,
    accessor: &[String],
    output: &mut IndexMap<String, PropertyDetails>,
) {
    let property = schema.property(type_name, name);

    if let Some(property) = property {
        if let PropertyKind::Complex(complex_type) = &property.kind {
            if let Some(complex_info) = schema.find_type(complex_type) {
                let mut nested_accessor = accessor.to_vec();
                nested_accessor.push(property.name.clone());

                for nested in complex_info.properties.keys() {
                    collect_details(schema, complex_type, nested, &nested_accessor, output);
                }
                return;
            }
        }
    }

    let column_name = property.map(|p| p.column_name()).unwrap_or(name);

    output.insert(
        column_name.to_string(),
        PropertyDetails {
            accessor: accessor.to_vec(),
            property: name.to_string(),
        },
    );
}
