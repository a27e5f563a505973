//! Resolution of model member paths against the data side
use super::typemap::TypeMappings;
use crate::common::naming::suggest_similar;
use crate::error::MappingError;
use crate::mapping::MapperConfiguration;
use crate::types::{Member, TypeId, TypeRegistry};
use itertools::Itertools;
use tracing::trace;

/// One step of a resolved path, applied to the expression resolved so
/// far
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// Plain member accesses on the data side
    Members(Vec<Member>),
    /// Custom lambda whose single parameter stands for the expression
    /// resolved so far
    Custom(crate::expr::RcExpr),
}

fn member_of(types: &TypeRegistry, ty: TypeId, name: &str) -> Result<Member, MappingError> {
    types
        .member(ty, name)
        .ok_or_else(|| MappingError::MemberNotFound {
            type_name: types.display(ty),
            member: name.to_string(),
            suggestions: suggest_similar(name, &types.member_names(ty), 3, 3),
        })
}

fn push_members(steps: &mut Vec<PathStep>, members: Vec<Member>) {
    if members.is_empty() {
        return;
    }
    match steps.last_mut() {
        Some(PathStep::Members(existing)) => existing.extend(members),
        _ => steps.push(PathStep::Members(members)),
    }
}

/// Resolve a path of model member names, read from a value of model
/// type `model`, into steps over the corresponding data type `data`.
///
/// Type correspondences discovered along generic or literal members
/// are registered in `mappings`.
pub fn resolve_path<S: AsRef<str>>(
    config: &MapperConfiguration,
    mappings: &mut TypeMappings,
    model: TypeId,
    data: TypeId,
    path: &[S],
    max_depth: usize,
) -> Result<Vec<PathStep>, MappingError> {
    let types = config.types();
    let full_path = path.iter().map(|s| s.as_ref()).join(".");
    let mut remaining: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
    let (mut model, mut data) = (model, data);
    let mut steps = vec![];
    let mut depth = 0;

    while !remaining.is_empty() {
        depth += 1;
        if depth > max_depth {
            return Err(MappingError::RecursionLimit(max_depth));
        }
        trace!(
            model = %types.display(model),
            data = %types.display(data),
            path = %remaining.join("."),
            "resolve path"
        );

        if model == data {
            let mut ty = model;
            let mut members = vec![];
            for segment in remaining.drain(..) {
                let m = member_of(types, ty, &segment)?;
                ty = m.ty;
                members.push(m);
            }
            push_members(&mut steps, members);
            break;
        }

        let same_generic = types.generic_definition(model).is_some()
            && types.generic_definition(model) == types.generic_definition(data)
            && config.find_type_map(data, model).is_none();
        if same_generic || (types.is_literal(model) && types.is_literal(data)) {
            let segment = remaining.remove(0);
            let model_member = member_of(types, model, &segment)?;
            let data_member = member_of(types, data, &segment)?;
            mappings.register(config, model_member.ty, data_member.ty)?;
            model = model_member.ty;
            data = data_member.ty;
            push_members(&mut steps, vec![data_member]);
            continue;
        }

        let map = config
            .find_type_map(data, model)
            .ok_or_else(|| MappingError::MissingTypeMap {
                data_type: types.display(data),
                model_type: types.display(model),
            })?;

        // a path map covering a prefix of the remaining path wins
        let path_map = (1..=remaining.len())
            .rev()
            .find_map(|n| config.path_map(map, &remaining[..n]).map(|pm| (n, pm)));
        if let Some((len, pm)) = path_map {
            let mut ty = model;
            for segment in &remaining[..len] {
                ty = member_of(types, ty, segment)?.ty;
            }
            let custom = pm.custom_expression.clone();
            data = custom
                .as_lambda()
                .map(|(_, body, _)| body.ty())
                .ok_or_else(|| {
                    MappingError::InvalidConfiguration(format!(
                        "path map {} is not a lambda",
                        remaining[..len].join(".")
                    ))
                })?;
            model = ty;
            steps.push(PathStep::Custom(custom));
            remaining.drain(..len);
            continue;
        }

        let segment = remaining.remove(0);
        let model_member = member_of(types, model, &segment)?;
        let pm = config
            .property_map(map, &segment)
            .filter(|pm| pm.is_mapped() && !pm.ignored)
            .ok_or_else(|| MappingError::UnmappedMember {
                type_name: types.display(model),
                member: segment.clone(),
                path: full_path.clone(),
            })?;
        let data_ty = pm.source_type().unwrap_or(model_member.ty);

        if pm.custom_expression.is_none()
            && types.is_literal(model_member.ty)
            && types.is_literal(data_ty)
            && model_member.ty != data_ty
        {
            return Err(MappingError::LiteralTypeMismatch {
                model_member: format!(
                    "{}.{} ({})",
                    types.display(model),
                    segment,
                    types.display(model_member.ty)
                ),
                data_member: format!(
                    "{}.{} ({})",
                    types.display(data),
                    pm.source_path(),
                    types.display(data_ty)
                ),
            });
        }

        match &pm.custom_expression {
            Some(custom) => steps.push(PathStep::Custom(custom.clone())),
            None => push_members(&mut steps, pm.source_members.clone()),
        }
        model = model_member.ty;
        data = data_ty;
    }

    Ok(steps)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::expr::build::member;
    use crate::expr::pretty::text;
    use crate::rewrite::testing::*;

    /// Orders whose `Customer.Name` is read from the entity's `Note`
    fn customer_name_from_note(f: &Orders) -> MapperConfiguration {
        let mut builder = MapperConfiguration::builder(f.types.clone());
        builder
            .create_map(f.order_entity, f.order)
            .for_path("Customer.Name", |types, s| member(types, s, "Note"));
        builder.create_map(f.customer_entity, f.customer);
        builder.build().unwrap()
    }

    fn names(steps: &[PathStep]) -> Vec<String> {
        steps
            .iter()
            .map(|s| match s {
                PathStep::Members(ms) => ms.iter().map(|m| m.name.clone()).join("."),
                PathStep::Custom(_) => "<custom>".to_string(),
            })
            .collect()
    }

    #[test]
    pub fn test_flattened_member() {
        let f = flattening();
        let config = f.config();
        let steps = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.dest,
            f.source,
            &["ChildValue"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["Child.Value"]);
    }

    #[test]
    pub fn test_custom_then_trailing_members() {
        let f = orders();
        let config = f.config();
        let steps = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Buyer", "Name"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["<custom>", "Name"]);
    }

    #[test]
    pub fn test_self_typed_path_needs_no_configuration() {
        let f = orders();
        let config = f.config();
        let steps = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.customer_entity,
            f.customer_entity,
            &["Name", "Length"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["Name.Length"]);
    }

    #[test]
    pub fn test_literal_mismatch_without_custom_expression() {
        let f = orders();
        let config = f.config();
        let err = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Discount"],
            64,
        )
        .unwrap_err();
        assert!(matches!(err, MappingError::LiteralTypeMismatch { .. }));
        assert!(err.to_string().contains("Nullable<Int32>"));
    }

    #[test]
    pub fn test_missing_map_names_both_types() {
        let f = dealers();
        let config = f.config();
        let err = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.dealer,
            f.dealer_entity,
            &["Car", "Year"],
            64,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing map from CarModel to Car. Create using CreateMap<CarModel, Car>."
        );
    }

    #[test]
    pub fn test_unmapped_member() {
        let f = orders();
        let config = f.config();
        let err = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Reference"],
            64,
        )
        .unwrap_err();
        assert!(matches!(err, MappingError::UnmappedMember { .. }));
    }

    #[test]
    pub fn test_depth_guard() {
        let f = orders();
        let config = f.config();
        let err = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Customer", "Name"],
            1,
        )
        .unwrap_err();
        assert_eq!(err, MappingError::RecursionLimit(1));
    }

    #[test]
    pub fn test_path_map_covers_whole_path() {
        let f = orders();
        let config = customer_name_from_note(&f);
        let steps = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Customer", "Name"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["<custom>"]);
        match &steps[0] {
            PathStep::Custom(custom) => assert_eq!(text(&f.types, custom), "s => s.Note"),
            other => panic!("expected a custom step, found {:?}", other),
        }
    }

    #[test]
    pub fn test_path_map_prefix_then_trailing_members() {
        let f = orders();
        let config = customer_name_from_note(&f);
        let steps = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Customer", "Name", "Length"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["<custom>", "Length"]);

        // the rest of Customer is still resolved through its own map
        let steps = resolve_path(
            &config,
            &mut TypeMappings::new(),
            f.order,
            f.order_entity,
            &["Customer", "Age"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["Customer.Age"]);
    }

    #[test]
    pub fn test_shared_generic_record_members() {
        let f = orders();
        let types = &f.types;
        let wrap = types.generic_record("Wrap", 1).member("Item", types.param(0)).build();
        let wrapped = types.instantiate(wrap, &[f.customer]).unwrap();
        let wrapped_entity = types.instantiate(wrap, &[f.customer_entity]).unwrap();
        let holder = types.record("Holder").member("W", wrapped).build();
        let holder_entity = types.record("HolderEntity").member("W", wrapped_entity).build();
        let mut builder = MapperConfiguration::builder(types.clone());
        builder.create_map(holder_entity, holder);
        builder.create_map(f.customer_entity, f.customer);
        let config = builder.build().unwrap();

        let mut mappings = TypeMappings::new();
        let steps = resolve_path(
            &config,
            &mut mappings,
            holder,
            holder_entity,
            &["W", "Item", "Name"],
            64,
        )
        .unwrap();
        assert_eq!(names(&steps), vec!["W.Item.Name"]);
        assert_eq!(mappings.get(f.customer), Some(f.customer_entity));
    }
}
