//! Fluent construction of a `MapperConfiguration`
use super::{MapperConfiguration, PathMap, PropertyMap, TypeMap};
use crate::common::naming::{is_pascal_case, split_pascal_case};
use crate::error::MappingError;
use crate::expr::build;
use crate::expr::{Expr, Parameter, RcExpr};
use crate::types::{Member, TypeId, TypePair, TypeRegistry};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, trace};

struct Draft {
    map: TypeMap,
    reverse: bool,
}

impl Draft {
    fn new(pair: TypePair) -> Self {
        Draft {
            map: TypeMap::new(pair.source, pair.destination),
            reverse: false,
        }
    }

    fn set_property(&mut self, pm: PropertyMap) {
        let maps = &mut self.map.property_maps;
        maps.retain(|existing| existing.destination_member.name != pm.destination_member.name);
        maps.push(pm);
    }

    fn set_path(&mut self, path: PathMap) {
        let maps = &mut self.map.path_maps;
        maps.retain(|existing| existing.destination_path != path.destination_path);
        maps.push(path);
    }
}

/// Collects type maps. Errors in fluent calls are held back and
/// reported by `build`.
pub struct ConfigurationBuilder {
    types: Rc<TypeRegistry>,
    drafts: IndexMap<TypePair, Draft>,
    errors: Vec<MappingError>,
}

impl ConfigurationBuilder {
    pub fn new(types: Rc<TypeRegistry>) -> Self {
        ConfigurationBuilder {
            types,
            drafts: IndexMap::new(),
            errors: vec![],
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Declare a map from a data type to a model type
    pub fn create_map(&mut self, source: TypeId, destination: TypeId) -> TypeMapBuilder<'_> {
        let pair = TypePair::new(source, destination);
        self.drafts.entry(pair).or_insert_with(|| Draft::new(pair));
        TypeMapBuilder {
            builder: self,
            pair,
        }
    }

    pub fn build(self) -> Result<MapperConfiguration, MappingError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        let types = self.types;

        let mut maps: IndexMap<TypePair, TypeMap> = IndexMap::new();
        let mut reversible = vec![];
        for (pair, draft) in self.drafts {
            if draft.reverse {
                reversible.push(pair);
            }
            maps.insert(pair, complete(&types, draft.map));
        }

        for pair in reversible {
            if maps.contains_key(&pair.reversed()) {
                continue;
            }
            if let Some(forward) = maps.get(&pair) {
                let reverse = complete(&types, reverse_of(&types, forward));
                trace!(
                    source = %types.display(reverse.source),
                    destination = %types.display(reverse.destination),
                    "generated reverse map"
                );
                maps.insert(pair.reversed(), reverse);
            }
        }

        let links: Vec<(TypePair, TypePair)> = maps
            .values()
            .flat_map(|m| {
                let base = m.type_pair();
                m.included_derived_types.iter().map(move |d| (*d, base))
            })
            .collect();
        for (derived, base) in links {
            if let Some(map) = maps.get_mut(&derived) {
                if !map.included_base_types.contains(&base) {
                    map.included_base_types.push(base);
                }
            }
        }

        debug!(maps = maps.len(), "built mapping configuration");
        Ok(MapperConfiguration::from_maps(types, maps))
    }
}

/// Configures a single type map
pub struct TypeMapBuilder<'b> {
    builder: &'b mut ConfigurationBuilder,
    pair: TypePair,
}

impl<'b> TypeMapBuilder<'b> {
    fn draft(&mut self) -> &mut Draft {
        let pair = self.pair;
        self.builder
            .drafts
            .entry(pair)
            .or_insert_with(|| Draft::new(pair))
    }

    fn record(mut self, result: Result<PropertyMap, MappingError>) -> Self {
        match result {
            Ok(pm) => self.draft().set_property(pm),
            Err(e) => self.builder.errors.push(e),
        }
        self
    }

    fn destination_member(&self, name: &str) -> Result<Member, MappingError> {
        let types = &self.builder.types;
        types
            .member(self.pair.destination, name)
            .ok_or_else(|| MappingError::MemberNotFound {
                type_name: types.display(self.pair.destination),
                member: name.to_string(),
                suggestions: crate::common::naming::suggest_similar(
                    name,
                    &types.member_names(self.pair.destination),
                    3,
                    3,
                ),
            })
    }

    /// Build a lambda over the source type from `f`
    fn source_lambda<F>(&self, f: F) -> Result<RcExpr, MappingError>
    where
        F: FnOnce(&TypeRegistry, RcExpr) -> Result<RcExpr, MappingError>,
    {
        let types = &self.builder.types;
        let s = Parameter::new("s", self.pair.source);
        let body = f(types, build::parameter(&s))?;
        Ok(build::lambda(types, vec![s], body))
    }

    /// Populate a destination member with a custom expression over the
    /// source
    pub fn for_member<F>(self, member: &str, f: F) -> Self
    where
        F: FnOnce(&TypeRegistry, RcExpr) -> Result<RcExpr, MappingError>,
    {
        let result = self.destination_member(member).and_then(|dm| {
            Ok(PropertyMap {
                destination_member: dm,
                source_members: vec![],
                custom_expression: Some(self.source_lambda(f)?),
                ignored: false,
            })
        });
        self.record(result)
    }

    /// Populate a destination member from a dotted source member path
    pub fn map_from_path(self, member: &str, path: &str) -> Self {
        let types = self.builder.types.clone();
        let result = self.destination_member(member).and_then(|dm| {
            let mut current = self.pair.source;
            let mut chain = vec![];
            for segment in path.split('.') {
                let m = types
                    .member(current, segment)
                    .ok_or_else(|| MappingError::MemberNotFound {
                        type_name: types.display(current),
                        member: segment.to_string(),
                        suggestions: vec![],
                    })?;
                current = m.ty;
                chain.push(m);
            }
            Ok(PropertyMap {
                destination_member: dm,
                source_members: chain,
                custom_expression: None,
                ignored: false,
            })
        });
        self.record(result)
    }

    pub fn ignore(self, member: &str) -> Self {
        let result = self.destination_member(member).map(|dm| PropertyMap {
            destination_member: dm,
            source_members: vec![],
            custom_expression: None,
            ignored: true,
        });
        self.record(result)
    }

    /// Populate a nested destination path (`Child.Value`) with a
    /// custom expression over the source
    pub fn for_path<F>(mut self, path: &str, f: F) -> Self
    where
        F: FnOnce(&TypeRegistry, RcExpr) -> Result<RcExpr, MappingError>,
    {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        let types = self.builder.types.clone();
        let valid = segments
            .iter()
            .try_fold(self.pair.destination, |ty, segment| {
                types
                    .member(ty, segment)
                    .map(|m| m.ty)
                    .ok_or_else(|| MappingError::MemberNotFound {
                        type_name: types.display(ty),
                        member: segment.clone(),
                        suggestions: vec![],
                    })
            });
        match valid.and_then(|_| self.source_lambda(f)) {
            Ok(custom) => self.draft().set_path(PathMap {
                destination_path: segments,
                custom_expression: custom,
            }),
            Err(e) => self.builder.errors.push(e),
        }
        self
    }

    /// Inherit member configuration from the map between base types
    pub fn include_base(mut self, source: TypeId, destination: TypeId) -> Self {
        let pair = TypePair::new(source, destination);
        let draft = self.draft();
        if !draft.map.included_base_types.contains(&pair) {
            draft.map.included_base_types.push(pair);
        }
        self
    }

    /// Declare a map between derived types that inherits this one
    pub fn include(mut self, source: TypeId, destination: TypeId) -> Self {
        let pair = TypePair::new(source, destination);
        let draft = self.draft();
        if !draft.map.included_derived_types.contains(&pair) {
            draft.map.included_derived_types.push(pair);
        }
        self
    }

    /// Also generate the inverse map (model to data)
    pub fn reverse_map(mut self) -> Self {
        self.draft().reverse = true;
        self
    }
}

/// Match a destination member name against the source by name, then
/// by splitting PascalCase words into a member chain
fn match_members(types: &TypeRegistry, source: TypeId, name: &str) -> Option<Vec<Member>> {
    if let Some(m) = types.member(source, name) {
        return Some(vec![m]);
    }
    if !is_pascal_case(name) {
        return None;
    }
    let words = split_pascal_case(name);
    for split in 1..words.len() {
        let head = words[..split].concat();
        if let Some(first) = types.member(source, &head) {
            if let Some(mut chain) = match_members(types, first.ty, &words[split..].concat()) {
                chain.insert(0, first);
                return Some(chain);
            }
        }
    }
    None
}

/// Fill in convention based property maps for every destination
/// member not explicitly configured
fn complete(types: &TypeRegistry, mut map: TypeMap) -> TypeMap {
    let mut explicit = std::mem::take(&mut map.property_maps);
    map.property_maps = types
        .members(map.destination)
        .into_iter()
        .map(|dm| {
            match explicit.iter().position(|pm| pm.destination_member.name == dm.name) {
                Some(index) => explicit.remove(index),
                None => PropertyMap {
                    source_members: match_members(types, map.source, &dm.name).unwrap_or_default(),
                    destination_member: dm,
                    custom_expression: None,
                    ignored: false,
                },
            }
        })
        .collect();
    map.property_maps.extend(explicit);
    map
}

/// Invert the plain member correspondences of a map. Flattened chains
/// become path maps on the reverse map.
fn reverse_of(types: &TypeRegistry, forward: &TypeMap) -> TypeMap {
    let mut reverse = TypeMap::new(forward.destination, forward.source);
    for pm in &forward.property_maps {
        if pm.custom_expression.is_some() || pm.ignored {
            continue;
        }
        match pm.source_members.as_slice() {
            [] => {}
            [single] => reverse.property_maps.push(PropertyMap {
                destination_member: single.clone(),
                source_members: vec![pm.destination_member.clone()],
                custom_expression: None,
                ignored: false,
            }),
            chain => {
                let d = Parameter::new("d", forward.destination);
                let body = RcExpr::from(Expr::Member(
                    build::parameter(&d),
                    pm.destination_member.clone(),
                ));
                reverse.path_maps.push(PathMap {
                    destination_path: chain.iter().map(|m| m.name.clone()).collect(),
                    custom_expression: build::lambda(types, vec![d], body),
                });
            }
        }
    }
    reverse.included_base_types = forward
        .included_base_types
        .iter()
        .map(TypePair::reversed)
        .collect();
    reverse.included_derived_types = forward
        .included_derived_types
        .iter()
        .map(TypePair::reversed)
        .collect();
    reverse
}
