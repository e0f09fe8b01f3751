//! Entity type metadata, registered once at startup.

use arcstr::ArcStr;
use fnv::FnvHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simple_type_name;

/// Registry of all entity and complex types known to the query engine.
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct Schema {
    types: FnvHashMap<ArcStr, TypeInfo>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn find_type(&self, full_name: &str) -> Option<&TypeInfo> {
        self.types.get(full_name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    /// Whether `member` identifies an instance of the type.
    ///
    /// Declared keys are matched exactly. Without declared keys,
    /// the `ID` or `{TypeName}ID` convention applies.
    pub fn is_key_property(&self, type_full_name: &str, member: &str) -> bool {
        match self.find_type(type_full_name) {
            Some(info) => info.is_key_property(member),
            None => is_conventional_key(simple_type_name(type_full_name), member),
        }
    }

    /// Whether the type is only used as the value of complex properties
    pub fn is_complex_type(&self, type_full_name: &str) -> bool {
        self.types
            .values()
            .flat_map(|info| info.properties.values())
            .any(|property| {
                matches!(&property.kind, PropertyKind::Complex(type_name) if type_name == type_full_name)
            })
    }

    /// The property of a type
    pub fn property(&self, type_full_name: &str, property: &str) -> Option<&PropertyDef> {
        self.find_type(type_full_name)?.property(property)
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    types: Vec<TypeInfo>,
}

impl SchemaBuilder {
    pub fn add_type(mut self, info: TypeInfo) -> Self {
        self.types.push(info);
        self
    }

    /// Build and validate the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types: FnvHashMap<ArcStr, TypeInfo> = FnvHashMap::default();

        for info in self.types {
            if types.contains_key(&info.full_name) {
                return Err(SchemaError::DuplicateType(info.full_name.to_string()));
            }
            types.insert(info.full_name.clone(), info);
        }

        for info in types.values() {
            if let Some(keys) = &info.keys {
                for key in keys {
                    if !info.properties.contains_key(key) {
                        return Err(SchemaError::UnknownKeyProperty {
                            type_name: info.full_name.to_string(),
                            key: key.clone(),
                        });
                    }
                }
            }

            for property in info.properties.values() {
                if let Some(element_type) = property.element_type() {
                    if !types.contains_key(element_type) {
                        return Err(SchemaError::UnknownPropertyType {
                            type_name: info.full_name.to_string(),
                            property: property.name.clone(),
                            target: element_type.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Schema { types })
    }
}

#[derive(Clone, Debug, Error)]
pub enum SchemaError {
    #[error("type {0} registered twice")]
    DuplicateType(String),
    #[error("key `{key}` is not a property of {type_name}")]
    UnknownKeyProperty { type_name: String, key: String },
    #[error("property `{property}` of {type_name} refers to unknown type {target}")]
    UnknownPropertyType {
        type_name: String,
        property: String,
        target: String,
    },
}

/// Metadata of one entity type or complex type.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct TypeInfo {
    pub full_name: ArcStr,
    /// The simple name, derived from the full name
    pub name: ArcStr,
    /// Declared key property names, if any
    pub keys: Option<Vec<String>>,
    pub properties: IndexMap<String, PropertyDef>,
    /// The type can count its own collection through a dedicated repository method
    pub collection_count: Option<CollectionCount>,
}

impl TypeInfo {
    pub fn new(full_name: impl Into<ArcStr>) -> Self {
        let full_name: ArcStr = full_name.into();
        let name = ArcStr::from(simple_type_name(&full_name));

        Self {
            full_name,
            name,
            keys: None,
            properties: Default::default(),
            collection_count: None,
        }
    }

    pub fn with_keys<K: Into<String>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn with_collection_count(mut self, collection_count: CollectionCount) -> Self {
        self.collection_count = Some(collection_count);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    pub fn declared_keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    pub fn is_key_property(&self, member: &str) -> bool {
        match &self.keys {
            Some(keys) => keys.iter().any(|key| key == member),
            None => is_conventional_key(&self.name, member),
        }
    }
}

fn is_conventional_key(simple_name: &str, member: &str) -> bool {
    member == "ID"
        || member
            .strip_suffix("ID")
            .is_some_and(|prefix| prefix == simple_name)
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
    /// The underlying source column name, when it differs from the property name
    pub source_name: Option<String>,
    /// The navigation is serviced by the target type's repository
    pub foreign: Option<ForeignMarker>,
    /// Counting the navigation is serviced by the target type's repository
    pub foreign_count: Option<ForeignMarker>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum PropertyKind {
    /// A primitive value
    Scalar,
    /// A collection of primitive or complex values, projected as a whole
    Collection,
    /// A complex (non-entity) structured value of the given type
    Complex(ArcStr),
    /// A reference to one or many entities of the given type
    Navigation { target: ArcStr, many: bool },
}

impl PropertyDef {
    fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            source_name: None,
            foreign: None,
            foreign_count: None,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Scalar)
    }

    pub fn collection(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Collection)
    }

    pub fn complex(name: impl Into<String>, type_name: impl Into<ArcStr>) -> Self {
        Self::new(name, PropertyKind::Complex(type_name.into()))
    }

    pub fn navigation(name: impl Into<String>, target: impl Into<ArcStr>) -> Self {
        Self::new(
            name,
            PropertyKind::Navigation {
                target: target.into(),
                many: false,
            },
        )
    }

    pub fn navigation_many(name: impl Into<String>, target: impl Into<ArcStr>) -> Self {
        Self::new(
            name,
            PropertyKind::Navigation {
                target: target.into(),
                many: true,
            },
        )
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn with_foreign(mut self, marker: ForeignMarker) -> Self {
        self.foreign = Some(marker);
        self
    }

    pub fn with_foreign_count(mut self, marker: ForeignMarker) -> Self {
        self.foreign_count = Some(marker);
        self
    }

    /// The element type of a navigation or complex property.
    /// For collections of entities this is the entity type, not the collection.
    pub fn element_type(&self) -> Option<&ArcStr> {
        match &self.kind {
            PropertyKind::Navigation { target, .. } => Some(target),
            PropertyKind::Complex(type_name) => Some(type_name),
            PropertyKind::Scalar | PropertyKind::Collection => None,
        }
    }

    /// The name of the underlying source column
    pub fn column_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.name)
    }
}

/// Marks a navigation (or its count) as serviced by a dedicated repository method
/// on the repository of the target type.
///
/// The conventional method name is `{Verb}{PropertyAlias}By{ParentAlias}`.
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct ForeignMarker {
    /// Explicit repository method name, overriding the convention
    pub repository_method: Option<String>,
    /// Replaces the property name in the conventional method name
    pub property_alias: Option<String>,
    /// Replaces the parent type name in the conventional method name
    pub parent_alias: Option<String>,
}

impl ForeignMarker {
    pub fn with_repository_method(method: impl Into<String>) -> Self {
        Self {
            repository_method: Some(method.into()),
            ..Default::default()
        }
    }
}

/// Marks a type whose root collection count is serviced by a dedicated repository method.
///
/// The conventional method name is `{TypeName}Count`.
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct CollectionCount {
    pub repository_method: Option<String>,
}
