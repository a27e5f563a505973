//! Mapping values (constants and in-memory rows) between model and
//! data types
pub mod error;

use self::error::MapperError;
use crate::eval::error::EvalError;
use crate::eval::{convert_value, Evaluator};
use crate::expr::build;
use crate::expr::value::RecordValue;
use crate::expr::{Expr, Parameter, RcExpr, Value};
use crate::mapping::MapperConfiguration;
use crate::types::{Literal, TypeId};
use indexmap::IndexMap;
use std::rc::Rc;

/// Converts a value of one type to another
pub trait ValueMapper {
    fn map_value(&self, value: &Value, from: TypeId, to: TypeId) -> Result<Value, MapperError>;
}

/// Maps values using the type maps of a configuration
pub struct ConfiguredMapper<'c> {
    config: &'c MapperConfiguration,
}

impl<'c> ConfiguredMapper<'c> {
    pub fn new(config: &'c MapperConfiguration) -> Self {
        ConfiguredMapper { config }
    }

    fn unsupported(&self, value: &Value, from: TypeId, to: TypeId) -> MapperError {
        let types = self.config.types();
        MapperError::Unsupported {
            value: value.to_string(),
            from: types.display(from),
            to: types.display(to),
        }
    }

    fn map_scalar(&self, value: &Value, from: TypeId, to: TypeId) -> Result<Value, MapperError> {
        let types = self.config.types();
        let (source, target) = (types.non_nullable(from), types.non_nullable(to));

        if let Some(variants) = types.enum_variants(target) {
            return match value {
                Value::Str(s) | Value::Enum(s) => {
                    if variants.contains(s) {
                        Ok(Value::enumeration(s))
                    } else {
                        Err(MapperError::UnknownVariant {
                            variant: s.clone(),
                            enum_type: types.display(target),
                        })
                    }
                }
                _ => Ok(convert_value(types, value, source, target)?),
            };
        }

        match types.literal_of(target) {
            Some(Literal::String) => Ok(Value::Str(value.to_text())),
            Some(_) if types.is_scalar(source) => Ok(convert_value(types, value, source, target)?),
            _ => Err(self.unsupported(value, from, to)),
        }
    }

    fn map_record(
        &self,
        value: &RecordValue,
        from: TypeId,
        to: TypeId,
    ) -> Result<Value, MapperError> {
        let types = self.config.types();
        let map = self
            .config
            .find_type_map(from, to)
            .ok_or_else(|| MapperError::MissingMap {
                from: types.display(from),
                to: types.display(to),
            })?;

        let source = Value::Record(Rc::new(value.clone()));
        let mut fields = IndexMap::new();
        for pm in self.config.effective_property_maps(map) {
            let name = pm.destination_member.name.clone();
            let destination_ty = pm.destination_member.ty;
            if pm.ignored || !pm.is_mapped() {
                fields.insert(name, Value::Null);
                continue;
            }
            let (raw, raw_ty) = match &pm.custom_expression {
                Some(custom) => {
                    let raw = Evaluator::new(types).apply_expr(custom, vec![source.clone()])?;
                    let raw_ty = custom
                        .as_lambda()
                        .map(|(_, body, _)| body.ty())
                        .unwrap_or(destination_ty);
                    (raw, raw_ty)
                }
                None => {
                    let s = Parameter::new("s", from);
                    let body = pm.source_members.iter().fold(build::parameter(&s), |e, m| {
                        RcExpr::from(Expr::Member(e, m.clone()))
                    });
                    let chain = build::lambda(types, vec![s], body);
                    // flattened chains read null through missing links
                    let raw = match Evaluator::new(types).apply_expr(&chain, vec![source.clone()]) {
                        Err(EvalError::NullReference(_)) => Value::Null,
                        other => other?,
                    };
                    (raw, pm.source_type().unwrap_or(destination_ty))
                }
            };
            fields.insert(name, self.map_value(&raw, raw_ty, destination_ty)?);
        }
        Ok(Value::Record(Rc::new(RecordValue { ty: to, fields })))
    }
}

impl<'c> ValueMapper for ConfiguredMapper<'c> {
    fn map_value(&self, value: &Value, from: TypeId, to: TypeId) -> Result<Value, MapperError> {
        let types = self.config.types();
        if from == to {
            return Ok(value.clone());
        }
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Some(underlying) = types.nullable_underlying(from) {
            return self.map_value(value, underlying, to);
        }
        if let Some(underlying) = types.nullable_underlying(to) {
            return self.map_value(value, from, underlying);
        }
        if types.is_scalar(from) || types.is_scalar(to) {
            return self.map_scalar(value, from, to);
        }

        match value {
            Value::Record(record) if self.config.find_type_map(from, to).is_some() => {
                self.map_record(record, from, to)
            }
            Value::Record(record) if self.config.find_type_map(record.ty, to).is_some() => {
                self.map_record(record, record.ty, to)
            }
            Value::List(items) => match (types.element_type(from), types.element_type(to)) {
                (Some(fe), Some(te)) => Ok(Value::list(
                    items
                        .iter()
                        .map(|i| self.map_value(i, fe, te))
                        .collect::<Result<Vec<_>, _>>()?,
                )),
                _ => Err(self.unsupported(value, from, to)),
            },
            _ if types.is_assignable(from, to) => Ok(value.clone()),
            Value::Record(_) => Err(MapperError::MissingMap {
                from: types.display(from),
                to: types.display(to),
            }),
            _ => Err(self.unsupported(value, from, to)),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::expr::build::*;
    use crate::types::TypeRegistry;

    fn fixture() -> (Rc<TypeRegistry>, TypeId, TypeId, TypeId, MapperConfiguration) {
        let types = Rc::new(TypeRegistry::new());
        let status = types.enumeration("Status", &["Open", "Closed"]);
        let entity = types
            .record("TicketEntity")
            .member("Id", types.int32())
            .member("Status", types.string())
            .member("Points", types.int32())
            .build();
        let ticket = types
            .record("Ticket")
            .member("Id", types.int32())
            .member("Status", status)
            .member("Score", types.nullable(types.int64()))
            .build();
        let mut builder = MapperConfiguration::builder(types.clone());
        builder
            .create_map(entity, ticket)
            .for_member("Score", |types, s| {
                let points = member(types, s, "Points")?;
                convert(types, points, types.nullable(types.int64()))
            })
            .reverse_map();
        let config = builder.build().unwrap();
        (types, status, entity, ticket, config)
    }

    #[test]
    pub fn test_enum_to_string_and_back() {
        let (types, status, _, _, config) = fixture();
        let mapper = ConfiguredMapper::new(&config);
        assert_eq!(
            mapper.map_value(&Value::enumeration("Closed"), status, types.string()),
            Ok(Value::str("Closed"))
        );
        assert_eq!(
            mapper.map_value(&Value::str("Open"), types.string(), status),
            Ok(Value::enumeration("Open"))
        );
        assert!(matches!(
            mapper.map_value(&Value::str("Lost"), types.string(), status),
            Err(MapperError::UnknownVariant { .. })
        ));
    }

    #[test]
    pub fn test_record_mapping_uses_custom_expressions() {
        let (_, _, entity, ticket, config) = fixture();
        let mapper = ConfiguredMapper::new(&config);
        let row = Value::record(
            entity,
            vec![
                ("Id", Value::int(7)),
                ("Status", Value::str("Open")),
                ("Points", Value::int(3)),
            ],
        );
        let model = mapper.map_value(&row, entity, ticket).unwrap();
        assert_eq!(model.field("Id"), Some(&Value::int(7)));
        assert_eq!(model.field("Status"), Some(&Value::enumeration("Open")));
        assert_eq!(model.field("Score"), Some(&Value::int(3)));
    }

    #[test]
    pub fn test_missing_map() {
        let (types, _, entity, _, config) = fixture();
        let other = types.record("Other").build();
        let mapper = ConfiguredMapper::new(&config);
        let row = Value::record(other, Vec::<(&str, Value)>::new());
        assert!(matches!(
            mapper.map_value(&row, other, entity),
            Err(MapperError::MissingMap { .. })
        ));
    }

    #[test]
    pub fn test_lists_map_elementwise() {
        let (types, status, _, _, config) = fixture();
        let mapper = ConfiguredMapper::new(&config);
        let values = Value::list(vec![Value::enumeration("Open"), Value::enumeration("Closed")]);
        assert_eq!(
            mapper.map_value(&values, types.list(status), types.list(types.string())),
            Ok(Value::list(vec![Value::str("Open"), Value::str("Closed")]))
        );
    }
}
