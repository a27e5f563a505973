//! The type universe that expressions and mapping configurations are
//! written against.
//!
//! Types live in an arena owned by a `TypeRegistry` and are addressed
//! by `TypeId` handles. Structural types (literals, nullables, arrays,
//! containers, delegates...) are interned so that equal structure
//! always yields an equal id. Records and enums are nominal: every
//! declaration mints a new id.
pub mod method;

use indexmap::IndexMap;
use itertools::Itertools;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use self::method::MethodDefinition;

/// Handle to a type in a `TypeRegistry`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A (source, destination) pair of types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypePair {
    pub source: TypeId,
    pub destination: TypeId,
}

impl TypePair {
    pub fn new(source: TypeId, destination: TypeId) -> Self {
        TypePair {
            source,
            destination,
        }
    }

    pub fn reversed(&self) -> Self {
        TypePair::new(self.destination, self.source)
    }
}

/// Terminal types: values of these are never decomposed into members
/// for mapping purposes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Boolean,
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    Char,
    String,
    Guid,
    DateTime,
    DateTimeOffset,
    TimeSpan,
}

impl Literal {
    pub fn name(&self) -> &'static str {
        match self {
            Literal::Boolean => "Boolean",
            Literal::Byte => "Byte",
            Literal::SByte => "SByte",
            Literal::Int16 => "Int16",
            Literal::UInt16 => "UInt16",
            Literal::Int32 => "Int32",
            Literal::UInt32 => "UInt32",
            Literal::Int64 => "Int64",
            Literal::UInt64 => "UInt64",
            Literal::Single => "Single",
            Literal::Double => "Double",
            Literal::Decimal => "Decimal",
            Literal::Char => "Char",
            Literal::String => "String",
            Literal::Guid => "Guid",
            Literal::DateTime => "DateTime",
            Literal::DateTimeOffset => "DateTimeOffset",
            Literal::TimeSpan => "TimeSpan",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Literal::Byte
                | Literal::SByte
                | Literal::Int16
                | Literal::UInt16
                | Literal::Int32
                | Literal::UInt32
                | Literal::Int64
                | Literal::UInt64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, Literal::Single | Literal::Double | Literal::Decimal)
    }

    /// Literals with a natural ordering (and hence `<`, `>` etc.)
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
            || matches!(
                self,
                Literal::Char | Literal::DateTime | Literal::DateTimeOffset | Literal::TimeSpan
            )
    }

    /// Everything but `String` is a value type
    pub fn is_value_type(&self) -> bool {
        *self != Literal::String
    }
}

/// Built-in generic containers
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Container {
    List,
    Enumerable,
    Queryable,
    Dictionary,
    KeyValuePair,
}

impl Container {
    pub fn name(&self) -> &'static str {
        match self {
            Container::List => "List",
            Container::Enumerable => "IEnumerable",
            Container::Queryable => "IQueryable",
            Container::Dictionary => "Dictionary",
            Container::KeyValuePair => "KeyValuePair",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Container::Dictionary | Container::KeyValuePair => 2,
            _ => 1,
        }
    }
}

/// A named member (field or property) of a type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub ty: TypeId,
}

impl Member {
    pub fn new<S: AsRef<str>>(name: S, ty: TypeId) -> Self {
        Member {
            name: name.as_ref().to_string(),
            ty,
        }
    }
}

/// A closed record type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordDef {
    pub name: String,
    pub base: Option<TypeId>,
    pub members: Vec<Member>,
    /// Generic definition and type arguments this record instantiates
    pub origin: Option<(TypeId, Vec<TypeId>)>,
}

/// An open generic record whose members may mention `Param` types
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericRecordDef {
    pub name: String,
    pub params: usize,
    pub base: Option<TypeId>,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Void,
    Literal(Literal),
    Nullable(TypeId),
    /// Generic parameter by position
    Param(usize),
    Enum { name: String, variants: Vec<String> },
    Record(RecordDef),
    GenericRecord(GenericRecordDef),
    /// Anonymous record descriptor (ordered field names and types)
    Anonymous(Vec<Member>),
    Array(TypeId),
    Container(Container, Vec<TypeId>),
    /// Delegate type: parameter types and return type
    Function(Vec<TypeId>, TypeId),
    /// Quoted expression of a delegate type
    Expression(TypeId),
}

impl TypeKind {
    fn is_nominal(&self) -> bool {
        matches!(
            self,
            TypeKind::Enum { .. } | TypeKind::Record(_) | TypeKind::GenericRecord(_)
        )
    }
}

/// Identifies the generic definition a constructed type instantiates
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GenericDefinition {
    Container(Container),
    Record(TypeId),
    Nullable,
    Array,
}

#[derive(Default)]
struct Arena {
    defs: Vec<Rc<TypeKind>>,
    interned: HashMap<TypeKind, TypeId>,
    instances: HashMap<(TypeId, Vec<TypeId>), TypeId>,
    methods: IndexMap<(String, String), Vec<Rc<MethodDefinition>>>,
}

/// Arena of all types known to a mapping configuration and the
/// expressions written against it.
pub struct TypeRegistry {
    arena: RefCell<Arena>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry with the standard method catalogue installed
    pub fn new() -> Self {
        let registry = TypeRegistry {
            arena: RefCell::new(Arena::default()),
        };
        method::install_standard_methods(&registry);
        registry
    }

    fn intern(&self, kind: TypeKind) -> TypeId {
        let mut arena = self.arena.borrow_mut();
        if !kind.is_nominal() {
            if let Some(id) = arena.interned.get(&kind) {
                return *id;
            }
        }
        let id = TypeId(arena.defs.len() as u32);
        arena.defs.push(Rc::new(kind.clone()));
        if !kind.is_nominal() {
            arena.interned.insert(kind, id);
        }
        id
    }

    fn replace(&self, id: TypeId, kind: TypeKind) {
        self.arena.borrow_mut().defs[id.index()] = Rc::new(kind);
    }

    /// Retrieve the definition of a type
    pub fn kind(&self, id: TypeId) -> Rc<TypeKind> {
        self.arena.borrow().defs[id.index()].clone()
    }

    pub fn len(&self) -> usize {
        self.arena.borrow().defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object(&self) -> TypeId {
        self.intern(TypeKind::Object)
    }

    pub fn void(&self) -> TypeId {
        self.intern(TypeKind::Void)
    }

    pub fn literal(&self, literal: Literal) -> TypeId {
        self.intern(TypeKind::Literal(literal))
    }

    pub fn boolean(&self) -> TypeId {
        self.literal(Literal::Boolean)
    }

    pub fn int32(&self) -> TypeId {
        self.literal(Literal::Int32)
    }

    pub fn int64(&self) -> TypeId {
        self.literal(Literal::Int64)
    }

    pub fn double(&self) -> TypeId {
        self.literal(Literal::Double)
    }

    pub fn decimal(&self) -> TypeId {
        self.literal(Literal::Decimal)
    }

    pub fn string(&self) -> TypeId {
        self.literal(Literal::String)
    }

    pub fn char(&self) -> TypeId {
        self.literal(Literal::Char)
    }

    pub fn guid(&self) -> TypeId {
        self.literal(Literal::Guid)
    }

    pub fn date_time(&self) -> TypeId {
        self.literal(Literal::DateTime)
    }

    pub fn date_time_offset(&self) -> TypeId {
        self.literal(Literal::DateTimeOffset)
    }

    pub fn time_span(&self) -> TypeId {
        self.literal(Literal::TimeSpan)
    }

    /// `Nullable<T>`; reference types and nullables are returned as is
    pub fn nullable(&self, ty: TypeId) -> TypeId {
        if self.is_value_type(ty) && self.nullable_underlying(ty).is_none() {
            self.intern(TypeKind::Nullable(ty))
        } else {
            ty
        }
    }

    pub fn param(&self, index: usize) -> TypeId {
        self.intern(TypeKind::Param(index))
    }

    pub fn array(&self, element: TypeId) -> TypeId {
        self.intern(TypeKind::Array(element))
    }

    pub fn container(&self, container: Container, args: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Container(container, args))
    }

    pub fn list(&self, element: TypeId) -> TypeId {
        self.container(Container::List, vec![element])
    }

    pub fn enumerable(&self, element: TypeId) -> TypeId {
        self.container(Container::Enumerable, vec![element])
    }

    pub fn queryable(&self, element: TypeId) -> TypeId {
        self.container(Container::Queryable, vec![element])
    }

    pub fn dictionary(&self, key: TypeId, value: TypeId) -> TypeId {
        self.container(Container::Dictionary, vec![key, value])
    }

    pub fn key_value_pair(&self, key: TypeId, value: TypeId) -> TypeId {
        self.container(Container::KeyValuePair, vec![key, value])
    }

    /// A delegate type `Func<params..., ret>`
    pub fn function(&self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(TypeKind::Function(params, ret))
    }

    /// `Expression<TDelegate>`
    pub fn expression(&self, delegate: TypeId) -> TypeId {
        self.intern(TypeKind::Expression(delegate))
    }

    /// Anonymous record descriptor with the given ordered members
    pub fn anonymous(&self, members: Vec<Member>) -> TypeId {
        self.intern(TypeKind::Anonymous(members))
    }

    /// Declare an enumeration
    pub fn enumeration<S: AsRef<str>>(&self, name: &str, variants: &[S]) -> TypeId {
        self.intern(TypeKind::Enum {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.as_ref().to_string()).collect(),
        })
    }

    /// Declare a record and start defining its members
    pub fn record(&self, name: &str) -> RecordBuilder<'_> {
        let id = self.intern(TypeKind::Record(RecordDef {
            name: name.to_string(),
            base: None,
            members: vec![],
            origin: None,
        }));
        RecordBuilder {
            registry: self,
            id,
            name: name.to_string(),
            base: None,
            members: vec![],
            generic_params: None,
        }
    }

    /// Continue defining a previously declared record (used to tie
    /// knots between mutually referring records)
    pub fn define(&self, id: TypeId) -> RecordBuilder<'_> {
        let (name, base, members) = match &*self.kind(id) {
            TypeKind::Record(def) => (def.name.clone(), def.base, def.members.clone()),
            _ => (self.display(id), None, vec![]),
        };
        RecordBuilder {
            registry: self,
            id,
            name,
            base,
            members,
            generic_params: None,
        }
    }

    /// Declare an open generic record with `params` type parameters,
    /// whose members are expressed in terms of `param(i)`
    pub fn generic_record(&self, name: &str, params: usize) -> RecordBuilder<'_> {
        let id = self.intern(TypeKind::GenericRecord(GenericRecordDef {
            name: name.to_string(),
            params,
            base: None,
            members: vec![],
        }));
        RecordBuilder {
            registry: self,
            id,
            name: name.to_string(),
            base: None,
            members: vec![],
            generic_params: Some(params),
        }
    }

    /// Close a generic record definition over type arguments
    pub fn instantiate(&self, definition: TypeId, args: &[TypeId]) -> Option<TypeId> {
        let def = match &*self.kind(definition) {
            TypeKind::GenericRecord(def) if def.params == args.len() => def.clone(),
            _ => return None,
        };

        let key = (definition, args.to_vec());
        if let Some(id) = self.arena.borrow().instances.get(&key) {
            return Some(*id);
        }

        let name = format!(
            "{}<{}>",
            def.name,
            args.iter().map(|a| self.display(*a)).join(", ")
        );
        let id = self.intern(TypeKind::Record(RecordDef {
            name: name.clone(),
            base: None,
            members: vec![],
            origin: Some((definition, args.to_vec())),
        }));
        self.arena.borrow_mut().instances.insert(key, id);

        let members = def
            .members
            .iter()
            .map(|m| Member::new(&m.name, self.substitute(m.ty, args)))
            .collect();
        let base = def.base.map(|b| self.substitute(b, args));
        self.replace(
            id,
            TypeKind::Record(RecordDef {
                name,
                base,
                members,
                origin: Some((definition, args.to_vec())),
            }),
        );
        Some(id)
    }

    /// Replace generic parameters in `ty` by the supplied arguments
    pub fn substitute(&self, ty: TypeId, args: &[TypeId]) -> TypeId {
        match &*self.kind(ty) {
            TypeKind::Param(i) => args.get(*i).copied().unwrap_or(ty),
            TypeKind::Nullable(t) => {
                let inner = self.substitute(*t, args);
                self.nullable(inner)
            }
            TypeKind::Array(t) => {
                let inner = self.substitute(*t, args);
                self.array(inner)
            }
            TypeKind::Container(c, ts) => {
                let ts = ts.iter().map(|t| self.substitute(*t, args)).collect();
                self.container(*c, ts)
            }
            TypeKind::Function(ps, r) => {
                let ps = ps.iter().map(|t| self.substitute(*t, args)).collect();
                let r = self.substitute(*r, args);
                self.function(ps, r)
            }
            TypeKind::Expression(f) => {
                let f = self.substitute(*f, args);
                self.expression(f)
            }
            TypeKind::Anonymous(ms) => {
                let ms = ms
                    .iter()
                    .map(|m| Member::new(&m.name, self.substitute(m.ty, args)))
                    .collect();
                self.anonymous(ms)
            }
            TypeKind::Record(RecordDef {
                origin: Some((def, oargs)),
                ..
            }) => {
                let oargs: Vec<TypeId> = oargs.iter().map(|t| self.substitute(*t, args)).collect();
                self.instantiate(*def, &oargs).unwrap_or(ty)
            }
            _ => ty,
        }
    }

    /// True if `ty` mentions any generic parameter
    pub fn is_open(&self, ty: TypeId) -> bool {
        match &*self.kind(ty) {
            TypeKind::Param(_) => true,
            _ => self.type_arguments(ty).iter().any(|t| self.is_open(*t)),
        }
    }

    /// Human readable name
    pub fn display(&self, id: TypeId) -> String {
        match &*self.kind(id) {
            TypeKind::Object => "Object".to_string(),
            TypeKind::Void => "Void".to_string(),
            TypeKind::Literal(l) => l.name().to_string(),
            TypeKind::Nullable(t) => format!("Nullable<{}>", self.display(*t)),
            TypeKind::Param(i) => format!("T{}", i),
            TypeKind::Enum { name, .. } => name.clone(),
            TypeKind::Record(def) => def.name.clone(),
            TypeKind::GenericRecord(def) => format!(
                "{}<{}>",
                def.name,
                (0..def.params).map(|i| format!("T{}", i)).join(", ")
            ),
            TypeKind::Anonymous(ms) => format!(
                "{{ {} }}",
                ms.iter()
                    .map(|m| format!("{}: {}", m.name, self.display(m.ty)))
                    .join(", ")
            ),
            TypeKind::Array(t) => format!("{}[]", self.display(*t)),
            TypeKind::Container(c, ts) => format!(
                "{}<{}>",
                c.name(),
                ts.iter().map(|t| self.display(*t)).join(", ")
            ),
            TypeKind::Function(ps, r) => format!(
                "Func<{}>",
                ps.iter()
                    .chain(std::iter::once(r))
                    .map(|t| self.display(*t))
                    .join(", ")
            ),
            TypeKind::Expression(f) => format!("Expression<{}>", self.display(*f)),
        }
    }

    /// The literal kind of a type, looking through `Nullable<>`
    pub fn literal_of(&self, ty: TypeId) -> Option<Literal> {
        match &*self.kind(ty) {
            TypeKind::Literal(l) => Some(*l),
            TypeKind::Nullable(t) => self.literal_of(*t),
            _ => None,
        }
    }

    /// Terminal types are literals and nullable literals
    pub fn is_literal(&self, ty: TypeId) -> bool {
        self.literal_of(ty).is_some()
    }

    pub fn nullable_underlying(&self, ty: TypeId) -> Option<TypeId> {
        match &*self.kind(ty) {
            TypeKind::Nullable(t) => Some(*t),
            _ => None,
        }
    }

    /// Strip `Nullable<>` if present
    pub fn non_nullable(&self, ty: TypeId) -> TypeId {
        self.nullable_underlying(ty).unwrap_or(ty)
    }

    pub fn is_enum(&self, ty: TypeId) -> bool {
        matches!(&*self.kind(ty), TypeKind::Enum { .. })
    }

    pub fn enum_variants(&self, ty: TypeId) -> Option<Vec<String>> {
        match &*self.kind(ty) {
            TypeKind::Enum { variants, .. } => Some(variants.clone()),
            _ => None,
        }
    }

    /// Literals (but not strings), enums and nullables
    pub fn is_value_type(&self, ty: TypeId) -> bool {
        match &*self.kind(ty) {
            TypeKind::Literal(l) => l.is_value_type(),
            TypeKind::Enum { .. } | TypeKind::Nullable(_) => true,
            TypeKind::Container(Container::KeyValuePair, _) => true,
            _ => false,
        }
    }

    /// Types which take part in scalar conversions: literals and enums
    /// (and their nullable forms)
    pub fn is_scalar(&self, ty: TypeId) -> bool {
        self.is_literal(ty) || self.is_enum(self.non_nullable(ty))
    }

    pub fn is_record(&self, ty: TypeId) -> bool {
        matches!(&*self.kind(ty), TypeKind::Record(_))
    }

    pub fn is_anonymous(&self, ty: TypeId) -> bool {
        matches!(&*self.kind(ty), TypeKind::Anonymous(_))
    }

    pub fn base_type(&self, ty: TypeId) -> Option<TypeId> {
        match &*self.kind(ty) {
            TypeKind::Record(def) => def.base,
            _ => None,
        }
    }

    /// Members declared on the type and its bases (bases first)
    pub fn members(&self, ty: TypeId) -> Vec<Member> {
        match &*self.kind(ty) {
            TypeKind::Record(def) => {
                let mut members = def.base.map(|b| self.members(b)).unwrap_or_default();
                for m in &def.members {
                    members.retain(|existing| existing.name != m.name);
                    members.push(m.clone());
                }
                members
            }
            TypeKind::Anonymous(ms) => ms.clone(),
            _ => vec![],
        }
    }

    /// Look up a member by name, including built-in members of
    /// literals and containers.
    pub fn member(&self, ty: TypeId, name: &str) -> Option<Member> {
        let int32 = || self.int32();
        match &*self.kind(ty) {
            TypeKind::Record(_) | TypeKind::Anonymous(_) => {
                self.members(ty).into_iter().find(|m| m.name == name)
            }
            TypeKind::Nullable(t) => match name {
                "HasValue" => Some(Member::new(name, self.boolean())),
                "Value" => Some(Member::new(name, *t)),
                _ => None,
            },
            TypeKind::Array(_) if name == "Length" => Some(Member::new(name, int32())),
            TypeKind::Container(Container::List, _) | TypeKind::Container(Container::Dictionary, _)
                if name == "Count" =>
            {
                Some(Member::new(name, int32()))
            }
            TypeKind::Container(Container::KeyValuePair, args) => match name {
                "Key" => Some(Member::new(name, args[0])),
                "Value" => Some(Member::new(name, args[1])),
                _ => None,
            },
            TypeKind::Literal(Literal::String) if name == "Length" => {
                Some(Member::new(name, int32()))
            }
            TypeKind::Literal(Literal::DateTime) | TypeKind::Literal(Literal::DateTimeOffset) => {
                match name {
                    "Year" | "Month" | "Day" => Some(Member::new(name, int32())),
                    "Date" => Some(Member::new(name, self.date_time())),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Names of all members, for error suggestions
    pub fn member_names(&self, ty: TypeId) -> Vec<String> {
        self.members(ty).into_iter().map(|m| m.name).collect()
    }

    /// Element type of arrays and sequence containers. Dictionaries
    /// enumerate key value pairs.
    pub fn element_type(&self, ty: TypeId) -> Option<TypeId> {
        match &*self.kind(ty) {
            TypeKind::Array(t) => Some(*t),
            TypeKind::Container(Container::List, args)
            | TypeKind::Container(Container::Enumerable, args)
            | TypeKind::Container(Container::Queryable, args) => Some(args[0]),
            TypeKind::Container(Container::Dictionary, args) => {
                Some(self.key_value_pair(args[0], args[1]))
            }
            _ => None,
        }
    }

    pub fn is_sequence(&self, ty: TypeId) -> bool {
        self.element_type(ty).is_some()
    }

    /// Parameter and return types of a delegate, looking through
    /// `Expression<>`
    pub fn function_parts(&self, ty: TypeId) -> Option<(Vec<TypeId>, TypeId)> {
        match &*self.kind(ty) {
            TypeKind::Function(ps, r) => Some((ps.clone(), *r)),
            TypeKind::Expression(f) => self.function_parts(*f),
            _ => None,
        }
    }

    pub fn is_delegate(&self, ty: TypeId) -> bool {
        self.function_parts(ty).is_some()
    }

    /// The delegate inside `Expression<>`, or the type itself
    pub fn unwrap_expression(&self, ty: TypeId) -> TypeId {
        match &*self.kind(ty) {
            TypeKind::Expression(f) => *f,
            _ => ty,
        }
    }

    /// Generic definition of a constructed type
    pub fn generic_definition(&self, ty: TypeId) -> Option<GenericDefinition> {
        match &*self.kind(ty) {
            TypeKind::Container(c, _) => Some(GenericDefinition::Container(*c)),
            TypeKind::Record(RecordDef {
                origin: Some((def, _)),
                ..
            }) => Some(GenericDefinition::Record(*def)),
            TypeKind::Nullable(_) => Some(GenericDefinition::Nullable),
            TypeKind::Array(_) => Some(GenericDefinition::Array),
            _ => None,
        }
    }

    /// Structural type arguments of a type
    pub fn type_arguments(&self, ty: TypeId) -> Vec<TypeId> {
        match &*self.kind(ty) {
            TypeKind::Nullable(t) | TypeKind::Array(t) | TypeKind::Expression(t) => vec![*t],
            TypeKind::Container(_, args) => args.clone(),
            TypeKind::Record(RecordDef {
                origin: Some((_, args)),
                ..
            }) => args.clone(),
            TypeKind::Function(ps, r) => ps.iter().copied().chain(std::iter::once(*r)).collect(),
            TypeKind::Anonymous(ms) => ms.iter().map(|m| m.ty).collect(),
            _ => vec![],
        }
    }

    /// Rebuild a type of the same shape over new type arguments
    pub fn with_type_arguments(&self, ty: TypeId, args: &[TypeId]) -> TypeId {
        if args.len() != self.type_arguments(ty).len() {
            return ty;
        }
        match &*self.kind(ty) {
            TypeKind::Nullable(_) => self.nullable(args[0]),
            TypeKind::Array(_) => self.array(args[0]),
            TypeKind::Expression(_) => self.expression(args[0]),
            TypeKind::Container(c, _) => self.container(*c, args.to_vec()),
            TypeKind::Record(RecordDef {
                origin: Some((def, _)),
                ..
            }) => self.instantiate(*def, args).unwrap_or(ty),
            TypeKind::Function(_, _) => {
                let (ret, params) = args.split_last().map(|(r, ps)| (*r, ps.to_vec())).unwrap_or((ty, vec![]));
                self.function(params, ret)
            }
            TypeKind::Anonymous(ms) => self.anonymous(
                ms.iter()
                    .zip(args)
                    .map(|(m, t)| Member::new(&m.name, *t))
                    .collect(),
            ),
            _ => ty,
        }
    }

    /// True if `derived` is `base` or has it somewhere in its base chain
    pub fn derives_from(&self, derived: TypeId, base: TypeId) -> bool {
        let mut current = Some(derived);
        while let Some(t) = current {
            if t == base {
                return true;
            }
            current = self.base_type(t);
        }
        false
    }

    /// Implicit (reference, boxing or lifting) conversion from `from`
    /// to `to`
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let to_kind = self.kind(to);
        match &*to_kind {
            TypeKind::Object => return !matches!(&*self.kind(from), TypeKind::Void),
            TypeKind::Nullable(u) if *u == from => return true,
            TypeKind::Container(Container::Enumerable, args) => {
                if let Some(element) = self.element_type(from) {
                    return element == args[0]
                        || (!self.is_value_type(element) && self.is_assignable(element, args[0]));
                }
            }
            TypeKind::Function(tps, tr) => {
                if let TypeKind::Function(fps, fr) = &*self.kind(from) {
                    return fps == tps && self.is_assignable(*fr, *tr);
                }
            }
            _ => {}
        }
        self.is_record(from) && self.derives_from(from, to)
    }

    /// Explicit conversion (`Convert` node) from `from` to `to`
    pub fn is_convertible(&self, from: TypeId, to: TypeId) -> bool {
        if self.is_assignable(from, to) || self.is_assignable(to, from) {
            return true;
        }
        let (f, t) = (self.non_nullable(from), self.non_nullable(to));
        if f == t {
            return true;
        }
        let numeric_or_enum = |ty: TypeId| {
            self.is_enum(ty)
                || self
                    .literal_of(ty)
                    .map(|l| l.is_numeric() || l == Literal::Char)
                    .unwrap_or(false)
        };
        if numeric_or_enum(f) && numeric_or_enum(t) {
            return true;
        }
        let dates = [Some(Literal::DateTime), Some(Literal::DateTimeOffset)];
        if dates.contains(&self.literal_of(f)) && dates.contains(&self.literal_of(t)) {
            return true;
        }
        self.is_record(from) && self.is_record(to) && self.derives_from(to, from)
    }

    /// Register a method definition in the catalogue
    pub fn define_method(&self, definition: MethodDefinition) -> Rc<MethodDefinition> {
        let definition = Rc::new(definition);
        self.arena
            .borrow_mut()
            .methods
            .entry((definition.declaring.clone(), definition.name.clone()))
            .or_default()
            .push(definition.clone());
        definition
    }

    /// Find a method definition by declaring type, name and parameter count
    pub fn find_method(
        &self,
        declaring: &str,
        name: &str,
        param_count: usize,
    ) -> Option<Rc<MethodDefinition>> {
        self.arena
            .borrow()
            .methods
            .get(&(declaring.to_string(), name.to_string()))
            .and_then(|defs| defs.iter().find(|d| d.params.len() == param_count).cloned())
    }
}

/// Builder for record members. The record id is minted on creation so
/// members may refer to the record itself.
pub struct RecordBuilder<'r> {
    registry: &'r TypeRegistry,
    id: TypeId,
    name: String,
    base: Option<TypeId>,
    members: Vec<Member>,
    generic_params: Option<usize>,
}

impl<'r> RecordBuilder<'r> {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn base(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn member(mut self, name: &str, ty: TypeId) -> Self {
        self.members.retain(|m| m.name != name);
        self.members.push(Member::new(name, ty));
        self
    }

    pub fn build(self) -> TypeId {
        let kind = match self.generic_params {
            Some(params) => TypeKind::GenericRecord(GenericRecordDef {
                name: self.name,
                params,
                base: self.base,
                members: self.members,
            }),
            None => {
                let origin = match &*self.registry.kind(self.id) {
                    TypeKind::Record(def) => def.origin.clone(),
                    _ => None,
                };
                TypeKind::Record(RecordDef {
                    name: self.name,
                    base: self.base,
                    members: self.members,
                    origin,
                })
            }
        };
        self.registry.replace(self.id, kind);
        self.id
    }
}
