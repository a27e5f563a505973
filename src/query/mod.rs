//! Querying data sources with expressions written against the model
//!
//! `MappedQuery` accepts model lambdas (`Where`, `OrderBy`, `Select`
//! and friends), rewrites each over the source's data type and hands
//! the result to the underlying `DataSource`.
use crate::error::MappingError;
use crate::eval::apply;
use crate::expr::{RcExpr, Value};
use crate::rewrite::{ExpressionMapper, TypeMappings};
use crate::types::{TypeId, TypePair, TypeRegistry};
use std::cmp::Ordering;
use std::rc::Rc;
use tracing::debug;

/// A queryable collection of data rows
pub trait DataSource {
    /// The data type of each row
    fn element_type(&self) -> TypeId;

    fn filter(&mut self, predicate: &RcExpr) -> Result<(), MappingError>;

    fn order_by(&mut self, key: &RcExpr, descending: bool) -> Result<(), MappingError>;

    fn take(&mut self, n: usize);

    fn skip(&mut self, n: usize);

    /// Apply a selector to every row
    fn project(&self, selector: &RcExpr) -> Result<Vec<Value>, MappingError>;

    fn rows(&self) -> Vec<Value>;
}

/// Rows held in memory, queried with the evaluator
pub struct InMemorySource {
    types: Rc<TypeRegistry>,
    element: TypeId,
    rows: Vec<Value>,
}

impl InMemorySource {
    pub fn new(types: Rc<TypeRegistry>, element: TypeId, rows: Vec<Value>) -> Self {
        InMemorySource {
            types,
            element,
            rows,
        }
    }
}

impl DataSource for InMemorySource {
    fn element_type(&self) -> TypeId {
        self.element
    }

    fn filter(&mut self, predicate: &RcExpr) -> Result<(), MappingError> {
        let mut kept = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            if apply(&self.types, predicate, vec![row.clone()])?.as_bool() == Some(true) {
                kept.push(row);
            }
        }
        self.rows = kept;
        Ok(())
    }

    fn order_by(&mut self, key: &RcExpr, descending: bool) -> Result<(), MappingError> {
        let mut keyed = self
            .rows
            .drain(..)
            .map(|row| apply(&self.types, key, vec![row.clone()]).map(|k| (k, row)))
            .collect::<Result<Vec<_>, _>>()?;
        keyed.sort_by(|(a, _), (b, _)| {
            let ordering = a.compare(b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }

    fn take(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    fn skip(&mut self, n: usize) {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
    }

    fn project(&self, selector: &RcExpr) -> Result<Vec<Value>, MappingError> {
        self.rows
            .iter()
            .map(|row| apply(&self.types, selector, vec![row.clone()]).map_err(MappingError::from))
            .collect()
    }

    fn rows(&self) -> Vec<Value> {
        self.rows.clone()
    }
}

/// A query over `source` expressed against model type `model`
pub struct MappedQuery<'m, S: DataSource> {
    mapper: &'m ExpressionMapper<'m>,
    model: TypeId,
    source: S,
    mappings: TypeMappings,
}

impl<'m, S: DataSource> MappedQuery<'m, S> {
    pub fn new(mapper: &'m ExpressionMapper<'m>, model: TypeId, source: S) -> Result<Self, MappingError> {
        let mut mappings = TypeMappings::new();
        mappings.register(mapper.config(), model, source.element_type())?;
        Ok(MappedQuery {
            mapper,
            model,
            source,
            mappings,
        })
    }

    pub fn model_type(&self) -> TypeId {
        self.model
    }

    pub fn data_type(&self) -> TypeId {
        self.source.element_type()
    }

    /// Rewrite a single-parameter model lambda over the data type,
    /// returning it with the model and data result types
    fn rewrite(&mut self, lambda: &RcExpr) -> Result<(RcExpr, TypeId, TypeId), MappingError> {
        let types = self.mapper.types();
        let (_, body, _) = lambda.as_lambda().ok_or_else(|| {
            MappingError::InvalidArgument("query operators take lambda expressions".to_string())
        })?;
        let model_ret = body.ty();
        let data_ret = self.mappings.resolve(types, model_ret);
        let pair = TypePair::new(
            types.function(vec![self.model], model_ret),
            types.function(vec![self.source.element_type()], data_ret),
        );
        let rewritten = self.mapper.rewrite_with(lambda, Some(pair), &mut self.mappings)?;
        debug!(
            expression = %crate::expr::pretty::text(types, &rewritten),
            "query operator"
        );
        Ok((rewritten, model_ret, data_ret))
    }

    pub fn where_(mut self, predicate: &RcExpr) -> Result<Self, MappingError> {
        let (rewritten, _, _) = self.rewrite(predicate)?;
        self.source.filter(&rewritten)?;
        Ok(self)
    }

    pub fn order_by(mut self, key: &RcExpr) -> Result<Self, MappingError> {
        let (rewritten, _, _) = self.rewrite(key)?;
        self.source.order_by(&rewritten, false)?;
        Ok(self)
    }

    pub fn order_by_descending(mut self, key: &RcExpr) -> Result<Self, MappingError> {
        let (rewritten, _, _) = self.rewrite(key)?;
        self.source.order_by(&rewritten, true)?;
        Ok(self)
    }

    pub fn take(mut self, n: usize) -> Self {
        self.source.take(n);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.source.skip(n);
        self
    }

    /// Project each row and map the results back to the selector's
    /// model result type
    pub fn select(mut self, selector: &RcExpr) -> Result<Vec<Value>, MappingError> {
        let (rewritten, model_ret, data_ret) = self.rewrite(selector)?;
        let mapper = self.mapper.value_mapper();
        self.source
            .project(&rewritten)?
            .iter()
            .map(|v| mapper.map_value(v, data_ret, model_ret).map_err(MappingError::from))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.source.rows().len()
    }

    /// The matching rows as data values
    pub fn to_data(&self) -> Vec<Value> {
        self.source.rows()
    }

    /// The matching rows mapped to the model type
    pub fn to_models(&self) -> Result<Vec<Value>, MappingError> {
        let mapper = self.mapper.value_mapper();
        let data = self.source.element_type();
        self.source
            .rows()
            .iter()
            .map(|row| mapper.map_value(row, data, self.model).map_err(MappingError::from))
            .collect()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::expr::build::*;
    use crate::expr::BinaryOp;
    use crate::rewrite::testing::*;

    fn epoch() -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn rows(o: &Orders) -> Vec<Value> {
        let customer = |name: &str, age: i64| {
            Value::record(
                o.customer_entity,
                vec![
                    ("Name", Value::str(name)),
                    ("Age", Value::int(age)),
                    ("Born", Value::DateTime(epoch())),
                ],
            )
        };
        let order = |id: i64, name: &str, age: i64, status: &str| {
            Value::record(
                o.order_entity,
                vec![
                    ("Id", Value::int(id)),
                    ("Customer", customer(name, age)),
                    ("Lines", Value::list(vec![])),
                    ("Status", Value::str(status)),
                    ("Placed", Value::DateTime(epoch())),
                    ("Discount", Value::int(0)),
                    ("Note", Value::str("")),
                ],
            )
        };
        vec![
            order(1, "Ada", 36, "Shipped"),
            order(2, "Grace", 45, "Pending"),
            order(3, "Alan", 41, "Shipped"),
        ]
    }

    #[test]
    pub fn test_where_order_and_select() {
        let o = orders();
        let config = o.config();
        let mapper = ExpressionMapper::new(&config);
        let types = &o.types;
        let source = InMemorySource::new(types.clone(), o.order_entity, rows(&o));

        let m = param("m", o.order);
        let shipped = lambda(
            types,
            vec![m.clone()],
            binary(
                types,
                BinaryOp::Equal,
                member(types, parameter(&m), "Status").unwrap(),
                constant(Value::enumeration("Shipped"), o.status),
            )
            .unwrap(),
        );
        let age = lambda(
            types,
            vec![m.clone()],
            path(types, parameter(&m), "Customer.Age").unwrap(),
        );
        let name = lambda(
            types,
            vec![m.clone()],
            member(types, parameter(&m), "CustomerName").unwrap(),
        );

        let names = MappedQuery::new(&mapper, o.order, source)
            .unwrap()
            .where_(&shipped)
            .unwrap()
            .order_by_descending(&age)
            .unwrap()
            .select(&name)
            .unwrap();
        assert_eq!(names, vec![Value::str("Alan"), Value::str("Ada")]);
    }

    #[test]
    pub fn test_to_models_maps_rows_back() {
        let o = orders();
        let config = o.config();
        let mapper = ExpressionMapper::new(&config);
        let source = InMemorySource::new(o.types.clone(), o.order_entity, rows(&o));
        let query = MappedQuery::new(&mapper, o.order, source).unwrap().skip(1).take(1);
        assert_eq!(query.count(), 1);
        let models = query.to_models().unwrap();
        assert_eq!(models[0].field("Status"), Some(&Value::enumeration("Pending")));
        assert_eq!(models[0].field("CustomerName"), Some(&Value::str("Grace")));
        assert_eq!(models[0].field("Rebate"), Some(&Value::int(0)));
        let buyer = models[0].field("Buyer").and_then(|b| b.as_record()).unwrap();
        assert_eq!(buyer.ty, o.customer);
    }
}
