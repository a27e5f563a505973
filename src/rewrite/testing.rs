//! Shared model/data fixtures for rewrite tests
#![cfg(test)]
use crate::expr::build::*;
use crate::mapping::MapperConfiguration;
use crate::types::{TypeId, TypeRegistry};
use std::rc::Rc;

/// `Source { Value, Foo, Child { Value } }` mapped onto
/// `Dest { Value, Bar = Foo, ChildValue }`
pub struct Flattening {
    pub types: Rc<TypeRegistry>,
    pub child: TypeId,
    pub source: TypeId,
    pub dest: TypeId,
}

impl Flattening {
    pub fn config(&self) -> MapperConfiguration {
        let mut builder = MapperConfiguration::builder(self.types.clone());
        builder
            .create_map(self.source, self.dest)
            .for_member("Bar", |types, s| member(types, s, "Foo"));
        builder.build().unwrap()
    }
}

pub fn flattening() -> Flattening {
    let types = Rc::new(TypeRegistry::new());
    let child = types.record("Child").member("Value", types.int32()).build();
    let source = types
        .record("Source")
        .member("Value", types.int32())
        .member("Foo", types.int32())
        .member("Child", child)
        .build();
    let dest = types
        .record("Dest")
        .member("Value", types.int32())
        .member("Bar", types.int32())
        .member("ChildValue", types.int32())
        .build();
    Flattening {
        types,
        child,
        source,
        dest,
    }
}

/// Orders with customers and lines, exercising custom expressions,
/// enums stored as strings and literal mismatches
pub struct Orders {
    pub types: Rc<TypeRegistry>,
    pub status: TypeId,
    pub customer: TypeId,
    pub customer_entity: TypeId,
    pub line: TypeId,
    pub line_entity: TypeId,
    pub order: TypeId,
    pub order_entity: TypeId,
}

impl Orders {
    pub fn config(&self) -> MapperConfiguration {
        let line_entity = self.line_entity;
        let mut builder = MapperConfiguration::builder(self.types.clone());
        builder
            .create_map(self.order_entity, self.order)
            .for_member("Buyer", |types, s| member(types, s, "Customer"))
            .for_member("Total", move |types, s| {
                let l = param("l", line_entity);
                let quantity = lambda(
                    types,
                    vec![l.clone()],
                    member(types, parameter(&l), "Quantity")?,
                );
                call_static(
                    types,
                    "Enumerable",
                    "Sum",
                    &[],
                    vec![member(types, s, "Lines")?, quantity],
                )
            })
            .for_member("Rebate", |types, s| member(types, s, "Discount"));
        builder.create_map(self.customer_entity, self.customer);
        builder.create_map(self.line_entity, self.line);
        builder.build().unwrap()
    }
}

pub fn orders() -> Orders {
    let types = Rc::new(TypeRegistry::new());
    let customer_entity = types
        .record("CustomerEntity")
        .member("Name", types.string())
        .member("Age", types.int32())
        .member("Born", types.date_time())
        .build();
    let line_entity = types
        .record("LineEntity")
        .member("Product", types.string())
        .member("Quantity", types.int32())
        .build();
    let order_entity = types
        .record("OrderEntity")
        .member("Id", types.int32())
        .member("Customer", customer_entity)
        .member("Lines", types.list(line_entity))
        .member("Status", types.string())
        .member("Placed", types.date_time())
        .member("Discount", types.int32())
        .member("Note", types.string())
        .build();

    let status = types.enumeration("OrderStatus", &["Pending", "Shipped", "Cancelled"]);
    let customer = types
        .record("Customer")
        .member("Name", types.string())
        .member("Age", types.int32())
        .member("Born", types.date_time_offset())
        .build();
    let line = types
        .record("Line")
        .member("Product", types.string())
        .member("Quantity", types.int32())
        .build();
    let order = types
        .record("Order")
        .member("Id", types.int32())
        .member("CustomerName", types.string())
        .member("Customer", customer)
        .member("Buyer", customer)
        .member("Lines", types.list(line))
        .member("Status", status)
        .member("Placed", types.date_time())
        .member("Discount", types.nullable(types.int32()))
        .member("Total", types.int32())
        .member("Rebate", types.nullable(types.int32()))
        .member("Note", types.string())
        .member("Reference", types.string())
        .build();

    Orders {
        types,
        status,
        customer,
        customer_entity,
        line,
        line_entity,
        order,
        order_entity,
    }
}

/// Dealers whose cars have no configured map between them
pub struct Dealers {
    pub types: Rc<TypeRegistry>,
    pub car: TypeId,
    pub car_model: TypeId,
    pub dealer: TypeId,
    pub dealer_entity: TypeId,
}

impl Dealers {
    pub fn config(&self) -> MapperConfiguration {
        let mut builder = MapperConfiguration::builder(self.types.clone());
        builder.create_map(self.dealer_entity, self.dealer);
        builder.build().unwrap()
    }
}

pub fn dealers() -> Dealers {
    let types = Rc::new(TypeRegistry::new());
    let car = types.record("Car").member("Year", types.int32()).build();
    let car_model = types.record("CarModel").member("Year", types.int32()).build();
    let dealer = types
        .record("Dealer")
        .member("Name", types.string())
        .member("Car", car)
        .build();
    let dealer_entity = types
        .record("DealerEntity")
        .member("Name", types.string())
        .member("Car", car_model)
        .build();
    Dealers {
        types,
        car,
        car_model,
        dealer,
        dealer_entity,
    }
}
