//! Mapping configuration: which data type maps to which model type,
//! and how each model member is populated from the data side.
//!
//! Maps are declared data to model (`create_map(data, model)`), so a
//! `TypeMap`'s source is a data type and its destination a model type.
pub mod builder;

use crate::error::MappingError;
use crate::expr::RcExpr;
use crate::types::{Member, TypeId, TypePair, TypeRegistry};
use indexmap::IndexMap;
use itertools::Itertools;
use std::rc::Rc;

pub use self::builder::{ConfigurationBuilder, TypeMapBuilder};

/// How one destination member is populated
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap {
    pub destination_member: Member,
    /// Chain of members read from the source type. Flattened members
    /// (`ChildValue` from `Child.Value`) have several.
    pub source_members: Vec<Member>,
    /// Lambda over the source type computing the member
    pub custom_expression: Option<RcExpr>,
    pub ignored: bool,
}

impl PropertyMap {
    /// The type of the data side value feeding the member
    pub fn source_type(&self) -> Option<TypeId> {
        match &self.custom_expression {
            Some(custom) => custom.as_lambda().map(|(_, body, _)| body.ty()),
            None => self.source_members.last().map(|m| m.ty),
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.custom_expression.is_some() || !self.source_members.is_empty()
    }

    pub fn source_path(&self) -> String {
        self.source_members.iter().map(|m| &m.name).join(".")
    }
}

/// A custom expression for a whole destination member path
#[derive(Debug, Clone, PartialEq)]
pub struct PathMap {
    pub destination_path: Vec<String>,
    pub custom_expression: RcExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeMap {
    pub source: TypeId,
    pub destination: TypeId,
    pub property_maps: Vec<PropertyMap>,
    pub path_maps: Vec<PathMap>,
    pub included_base_types: Vec<TypePair>,
    pub included_derived_types: Vec<TypePair>,
}

impl TypeMap {
    pub fn new(source: TypeId, destination: TypeId) -> Self {
        TypeMap {
            source,
            destination,
            property_maps: vec![],
            path_maps: vec![],
            included_base_types: vec![],
            included_derived_types: vec![],
        }
    }

    pub fn type_pair(&self) -> TypePair {
        TypePair::new(self.source, self.destination)
    }

    pub fn property_map(&self, member: &str) -> Option<&PropertyMap> {
        self.property_maps
            .iter()
            .find(|pm| pm.destination_member.name == member)
    }

    pub fn path_map<S: AsRef<str>>(&self, path: &[S]) -> Option<&PathMap> {
        self.path_maps.iter().find(|pm| {
            pm.destination_path.len() == path.len()
                && pm
                    .destination_path
                    .iter()
                    .zip(path)
                    .all(|(a, b)| a == b.as_ref())
        })
    }
}

/// An immutable set of type maps over a shared type registry
pub struct MapperConfiguration {
    types: Rc<TypeRegistry>,
    maps: IndexMap<TypePair, TypeMap>,
}

impl MapperConfiguration {
    pub fn builder(types: Rc<TypeRegistry>) -> ConfigurationBuilder {
        ConfigurationBuilder::new(types)
    }

    pub(crate) fn from_maps(types: Rc<TypeRegistry>, maps: IndexMap<TypePair, TypeMap>) -> Self {
        MapperConfiguration { types, maps }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn shared_types(&self) -> Rc<TypeRegistry> {
        self.types.clone()
    }

    pub fn type_maps(&self) -> impl Iterator<Item = &TypeMap> {
        self.maps.values()
    }

    pub fn find_type_map(&self, source: TypeId, destination: TypeId) -> Option<&TypeMap> {
        self.maps.get(&TypePair::new(source, destination))
    }

    /// Property map for a member, inherited from included base maps
    /// when not configured on the map itself
    pub fn property_map<'a>(&'a self, map: &'a TypeMap, member: &str) -> Option<&'a PropertyMap> {
        self.with_bases(map, &mut |m| m.property_map(member).filter(|pm| pm.is_mapped() || pm.ignored))
            .or_else(|| map.property_map(member))
    }

    /// Path map for a member path, inherited from included base maps
    pub fn path_map<'a, S: AsRef<str>>(&'a self, map: &'a TypeMap, path: &[S]) -> Option<&'a PathMap> {
        self.with_bases(map, &mut |m| m.path_map(path))
    }

    /// All property maps of a map, with inherited ones for members the
    /// map itself leaves unmapped
    pub fn effective_property_maps<'a>(&'a self, map: &'a TypeMap) -> Vec<&'a PropertyMap> {
        map.property_maps
            .iter()
            .filter_map(|pm| self.property_map(map, &pm.destination_member.name))
            .collect()
    }

    fn with_bases<'a, T, F>(&'a self, map: &'a TypeMap, find: &mut F) -> Option<&'a T>
    where
        F: FnMut(&'a TypeMap) -> Option<&'a T>,
    {
        let mut pending = vec![map];
        let mut seen = vec![];
        while let Some(current) = pending.pop() {
            if seen.contains(&current.type_pair()) {
                continue;
            }
            seen.push(current.type_pair());
            if let Some(found) = find(current) {
                return Some(found);
            }
            pending.extend(
                current
                    .included_base_types
                    .iter()
                    .rev()
                    .filter_map(|pair| self.maps.get(pair)),
            );
        }
        None
    }

    /// The single data type configured to map to `model`, if any
    pub fn unique_source_for(&self, model: TypeId) -> Result<Option<TypeId>, MappingError> {
        let sources: Vec<TypeId> = self
            .maps
            .keys()
            .filter(|pair| pair.destination == model)
            .map(|pair| pair.source)
            .collect();
        match sources.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            many => Err(MappingError::AmbiguousDestination {
                model_type: self.types.display(model),
                candidates: many.iter().map(|t| self.types.display(*t)).join(", "),
            }),
        }
    }

    /// Fail if any destination member is neither mapped nor ignored
    pub fn assert_configuration_is_valid(&self) -> Result<(), MappingError> {
        let unmapped: Vec<String> = self
            .maps
            .values()
            .flat_map(|map| {
                self.effective_property_maps(map)
                    .into_iter()
                    .filter(|pm| !pm.ignored && !pm.is_mapped())
                    .map(move |pm| {
                        format!(
                            "{}.{}",
                            self.types.display(map.destination),
                            pm.destination_member.name
                        )
                    })
            })
            .collect();
        if unmapped.is_empty() {
            Ok(())
        } else {
            Err(MappingError::UnmappedMembers(unmapped))
        }
    }
}
