//! The table of model to data type correspondences built up during a
//! rewrite
use crate::error::MappingError;
use crate::mapping::MapperConfiguration;
use crate::types::{TypeId, TypeRegistry};
use indexmap::IndexMap;
use std::collections::VecDeque;
use tracing::trace;

/// Model type to data type correspondences. Once a model type is
/// registered its data type never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeMappings {
    map: IndexMap<TypeId, TypeId>,
}

impl TypeMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: TypeId) -> Option<TypeId> {
        self.map.get(&model).copied()
    }

    pub fn contains(&self, model: TypeId) -> bool {
        self.map.contains_key(&model)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, TypeId)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }

    /// Record that `model` rewrites to `data` along with everything
    /// that correspondence implies: delegate parameters and returns,
    /// sequence elements, generic arguments and the member types of
    /// the configured map between the two.
    pub fn register(
        &mut self,
        config: &MapperConfiguration,
        model: TypeId,
        data: TypeId,
    ) -> Result<(), MappingError> {
        let types = config.types();
        let mut pending = VecDeque::from(vec![(model, data)]);

        while let Some((model, data)) = pending.pop_front() {
            let (model, data) = (types.unwrap_expression(model), types.unwrap_expression(data));
            if model == data || self.map.contains_key(&model) {
                continue;
            }
            trace!(
                model = %types.display(model),
                data = %types.display(data),
                "register type mapping"
            );
            self.map.insert(model, data);

            if let Some((model_params, model_ret)) = types.function_parts(model) {
                let (data_params, data_ret) = types.function_parts(data).ok_or_else(|| {
                    MappingError::InvalidArgument(format!(
                        "{} is a delegate type but {} is not",
                        types.display(model),
                        types.display(data)
                    ))
                })?;
                if model_params.len() != data_params.len() {
                    return Err(MappingError::ArgumentCountMismatch {
                        model_type: types.display(model),
                        data_type: types.display(data),
                        expected: model_params.len(),
                        actual: data_params.len(),
                    });
                }
                pending.extend(model_params.into_iter().zip(data_params));
                pending.push_back((model_ret, data_ret));
            } else if types.is_sequence(model) || types.is_sequence(data) {
                if let (Some(m), Some(d)) = (types.element_type(model), types.element_type(data)) {
                    pending.push_back((m, d));
                }
            } else if types.generic_definition(model).is_some()
                && types.generic_definition(model) == types.generic_definition(data)
                && config.find_type_map(data, model).is_none()
            {
                pending.extend(
                    types
                        .type_arguments(model)
                        .into_iter()
                        .zip(types.type_arguments(data)),
                );
            } else if let Some(map) = config.find_type_map(data, model) {
                for pm in config.effective_property_maps(map) {
                    let model_ty = pm.destination_member.ty;
                    match pm.source_type() {
                        Some(data_ty)
                            if pm.is_mapped()
                                && !types.is_literal(model_ty)
                                && !types.is_literal(data_ty) =>
                        {
                            pending.push_back((model_ty, data_ty))
                        }
                        _ => {}
                    }
                }
                pending.extend(
                    map.included_base_types
                        .iter()
                        .chain(map.included_derived_types.iter())
                        .map(|pair| (pair.destination, pair.source)),
                );
            }
        }
        Ok(())
    }

    /// The data type a model type rewrites to. Constructed types are
    /// rebuilt over resolved arguments; anything unregistered maps to
    /// itself.
    pub fn resolve(&self, types: &TypeRegistry, model: TypeId) -> TypeId {
        if let Some(data) = self.map.get(&model) {
            return *data;
        }
        let args = types.type_arguments(model);
        if args.is_empty() {
            return model;
        }
        let resolved: Vec<TypeId> = args.iter().map(|a| self.resolve(types, *a)).collect();
        if resolved == args {
            model
        } else {
            types.with_type_arguments(model, &resolved)
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::rewrite::testing::*;

    #[test]
    pub fn test_register_follows_members_and_delegates() {
        let f = orders();
        let config = f.config();
        let types = config.types();
        let mut mappings = TypeMappings::new();
        let model_fn = types.function(vec![f.order], types.boolean());
        let data_fn = types.function(vec![f.order_entity], types.boolean());
        mappings.register(&config, model_fn, data_fn).unwrap();
        assert_eq!(mappings.get(f.order), Some(f.order_entity));
        assert_eq!(mappings.get(f.customer), Some(f.customer_entity));
        assert_eq!(mappings.get(types.list(f.line)), Some(types.list(f.line_entity)));
        assert_eq!(mappings.get(f.line), Some(f.line_entity));
        assert_eq!(mappings.get(types.boolean()), None);
    }

    #[test]
    pub fn test_register_is_idempotent() {
        let f = orders();
        let config = f.config();
        let mut mappings = TypeMappings::new();
        mappings.register(&config, f.order, f.order_entity).unwrap();
        let once = mappings.clone();
        mappings.register(&config, f.order, f.order_entity).unwrap();
        assert_eq!(once, mappings);
        // first registration wins
        mappings.register(&config, f.order, f.customer_entity).unwrap();
        assert_eq!(mappings.get(f.order), Some(f.order_entity));
    }

    #[test]
    pub fn test_register_rejects_arity_mismatch() {
        let f = orders();
        let config = f.config();
        let types = config.types();
        let one = types.function(vec![f.order], types.boolean());
        let two = types.function(vec![f.order_entity, types.int32()], types.boolean());
        assert!(matches!(
            TypeMappings::new().register(&config, one, two),
            Err(MappingError::ArgumentCountMismatch { .. })
        ));
    }

    #[test]
    pub fn test_resolve_rebuilds_constructed_types() {
        let f = orders();
        let config = f.config();
        let types = config.types();
        let mut mappings = TypeMappings::new();
        mappings.register(&config, f.order, f.order_entity).unwrap();
        assert_eq!(
            mappings.resolve(types, types.array(f.order)),
            types.array(f.order_entity)
        );
        let anon = types.anonymous(vec![crate::types::Member::new("O", f.order)]);
        let resolved = mappings.resolve(types, anon);
        assert_eq!(
            types.member(resolved, "O").map(|m| m.ty),
            Some(f.order_entity)
        );
        assert_eq!(mappings.resolve(types, types.string()), types.string());
    }

    #[test]
    pub fn test_register_follows_included_maps() {
        let types = std::rc::Rc::new(TypeRegistry::new());
        let animal_entity = types.record("AnimalEntity").member("Name", types.string()).build();
        let dog_entity = types.record("DogEntity").base(animal_entity).build();
        let cat_entity = types.record("CatEntity").base(animal_entity).build();
        let animal = types.record("Animal").member("Name", types.string()).build();
        let dog = types.record("Dog").base(animal).build();
        let cat = types.record("Cat").base(animal).build();
        let mut builder = MapperConfiguration::builder(types.clone());
        builder.create_map(dog_entity, dog).include_base(animal_entity, animal);
        builder.create_map(animal_entity, animal).include(cat_entity, cat);
        let config = builder.build().unwrap();

        let mut mappings = TypeMappings::new();
        mappings.register(&config, dog, dog_entity).unwrap();
        assert_eq!(mappings.get(dog), Some(dog_entity));
        assert_eq!(mappings.get(animal), Some(animal_entity));
        assert_eq!(mappings.get(cat), Some(cat_entity));
        assert_eq!(mappings.len(), 3);
    }
}
