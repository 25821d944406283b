//! Shared registry of PostgreSQL types.
//!
//! The collection is the only cross-session mutable resource the server
//! touches; all access goes through its read/write lock. Every lookup seeds
//! the `pg_catalog` schema with the built-in types exactly once per
//! collection, so a freshly cloned collection re-seeds on first use.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::handler::ColumnType;

/// A PostgreSQL type as the wire layer needs it: name, OID, and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgType {
    pub name: String,
    pub oid: i32,
    /// On-wire size in bytes; -1 for variable length.
    pub size: i16,
}

impl PgType {
    pub fn new(name: impl Into<String>, oid: i32, size: i16) -> Self {
        PgType {
            name: name.into(),
            oid,
            size,
        }
    }
}

/// Type lookup and mutation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    AlreadyExists(String),
    DoesNotExist(String),
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeError::AlreadyExists(name) => write!(f, "type {} already exists", name),
            TypeError::DoesNotExist(name) => write!(f, "type {} does not exist", name),
        }
    }
}

impl std::error::Error for TypeError {}

type SchemaMap = HashMap<String, HashMap<String, Arc<PgType>>>;

/// A collection of types, grouped by schema.
pub struct TypeCollection {
    schemas: RwLock<SchemaMap>,
}

impl Default for TypeCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCollection {
    pub fn new() -> Self {
        TypeCollection {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a new collection with the same user-defined contents.
    /// Built-in `pg_catalog` types are not copied; the clone re-seeds them
    /// on first lookup. Runs under a read lock: cloning does not mutate.
    pub fn clone_collection(&self) -> TypeCollection {
        let schemas = self.schemas.read();
        let mut cloned: SchemaMap = HashMap::new();
        for (schema, types) in schemas.iter() {
            if types.is_empty() || schema == "pg_catalog" {
                continue;
            }
            cloned.insert(schema.clone(), types.clone());
        }
        TypeCollection {
            schemas: RwLock::new(cloned),
        }
    }

    /// Creates a new type in the given schema.
    pub fn create(&self, schema: &str, typ: PgType) -> Result<(), TypeError> {
        let mut schemas = self.schemas.write();
        seed_builtins(&mut schemas);
        let types = schemas.entry(schema.to_string()).or_default();
        if types.contains_key(&typ.name) {
            return Err(TypeError::AlreadyExists(typ.name));
        }
        types.insert(typ.name.clone(), Arc::new(typ));
        Ok(())
    }

    /// Drops an existing type.
    pub fn drop_type(&self, schema: &str, name: &str) -> Result<(), TypeError> {
        let mut schemas = self.schemas.write();
        seed_builtins(&mut schemas);
        if let Some(types) = schemas.get_mut(schema)
            && types.remove(name).is_some()
        {
            return Ok(());
        }
        Err(TypeError::DoesNotExist(name.to_string()))
    }

    /// Returns the type with the given schema and name.
    pub fn get(&self, schema: &str, name: &str) -> Option<Arc<PgType>> {
        {
            let schemas = self.schemas.read();
            if schemas.contains_key("pg_catalog") {
                return schemas.get(schema).and_then(|types| types.get(name)).cloned();
            }
        }
        let mut schemas = self.schemas.write();
        seed_builtins(&mut schemas);
        schemas.get(schema).and_then(|types| types.get(name)).cloned()
    }

    /// Checks whether a type exists with the given schema and name.
    pub fn has(&self, schema: &str, name: &str) -> bool {
        self.get(schema, name).is_some()
    }

    /// Iterates over all types in the collection, including built-ins.
    /// Stops at the first error returned by the callback.
    pub fn iterate<E>(
        &self,
        mut f: impl FnMut(&str, &Arc<PgType>) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut schemas = self.schemas.write();
        seed_builtins(&mut schemas);
        for (schema, types) in schemas.iter() {
            for typ in types.values() {
                f(schema, typ)?;
            }
        }
        Ok(())
    }

    /// The PostgreSQL type advertised for an engine column type.
    /// Unmapped types fall back to `unknown`.
    pub fn for_column(&self, column_type: ColumnType) -> Arc<PgType> {
        let name = builtin_name_for(column_type);
        self.get("pg_catalog", name)
            .unwrap_or_else(|| Arc::new(PgType::new("unknown", 705, -2)))
    }
}

/// Adds the built-in types under the `pg_catalog` schema. Does nothing if
/// the entry already exists, so seeding happens exactly once per collection.
fn seed_builtins(schemas: &mut SchemaMap) {
    if schemas.contains_key("pg_catalog") {
        return;
    }
    let mut types = HashMap::new();
    for typ in builtin_types() {
        types.insert(typ.name.clone(), Arc::new(typ));
    }
    schemas.insert("pg_catalog".to_string(), types);
}

fn builtin_types() -> Vec<PgType> {
    vec![
        PgType::new("bool", 16, 1),
        PgType::new("bytea", 17, -1),
        PgType::new("int8", 20, 8),
        PgType::new("int2", 21, 2),
        PgType::new("int4", 23, 4),
        PgType::new("text", 25, -1),
        PgType::new("json", 114, -1),
        PgType::new("float4", 700, 4),
        PgType::new("float8", 701, 8),
        PgType::new("unknown", 705, -2),
        PgType::new("bpchar", 1042, -1),
        PgType::new("varchar", 1043, -1),
        PgType::new("date", 1082, 4),
        PgType::new("time", 1083, 8),
        PgType::new("timestamp", 1114, 8),
        PgType::new("numeric", 1700, -1),
    ]
}

fn builtin_name_for(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Null => "unknown",
        ColumnType::Int8 | ColumnType::UInt8 | ColumnType::Int16 | ColumnType::Year => "int2",
        ColumnType::UInt16 | ColumnType::Int24 | ColumnType::UInt24 | ColumnType::Int32 => "int4",
        ColumnType::UInt32 | ColumnType::Int64 | ColumnType::UInt64 => "int8",
        ColumnType::Float32 => "float4",
        ColumnType::Float64 => "float8",
        ColumnType::Decimal => "numeric",
        ColumnType::Date => "date",
        ColumnType::Time => "time",
        ColumnType::Datetime | ColumnType::Timestamp => "timestamp",
        ColumnType::Char => "bpchar",
        // MySQL reports user-visible strings as VarChar; psql renders text.
        ColumnType::VarChar | ColumnType::Text | ColumnType::Enum | ColumnType::Set => "text",
        ColumnType::Blob => "bytea",
        ColumnType::Bit => "bytea",
        ColumnType::Json => "json",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_seeds_pg_catalog() {
        let collection = TypeCollection::new();
        let int4 = collection.get("pg_catalog", "int4").unwrap();
        assert_eq!(int4.oid, 23);
        assert_eq!(int4.size, 4);
        assert!(collection.has("pg_catalog", "text"));
        assert!(!collection.has("pg_catalog", "no_such_type"));
    }

    #[test]
    fn test_create_get_drop() {
        let collection = TypeCollection::new();
        collection
            .create("public", PgType::new("mood", 16384, -1))
            .unwrap();
        assert!(collection.has("public", "mood"));

        let err = collection
            .create("public", PgType::new("mood", 16385, -1))
            .unwrap_err();
        assert_eq!(err, TypeError::AlreadyExists("mood".to_string()));

        collection.drop_type("public", "mood").unwrap();
        let err = collection.drop_type("public", "mood").unwrap_err();
        assert_eq!(err, TypeError::DoesNotExist("mood".to_string()));
    }

    #[test]
    fn test_clone_is_independent() {
        let collection = TypeCollection::new();
        collection
            .create("public", PgType::new("mood", 16384, -1))
            .unwrap();

        let cloned = collection.clone_collection();
        collection.drop_type("public", "mood").unwrap();

        // The clone kept the user type and re-seeds builtins on demand.
        assert!(cloned.has("public", "mood"));
        assert!(cloned.has("pg_catalog", "int4"));
        assert!(!collection.has("public", "mood"));
    }

    #[test]
    fn test_iterate_includes_builtins_and_user_types() {
        let collection = TypeCollection::new();
        collection
            .create("public", PgType::new("mood", 16384, -1))
            .unwrap();

        let mut names = Vec::new();
        collection
            .iterate(|schema, typ| {
                names.push(format!("{}.{}", schema, typ.name));
                Ok::<(), ()>(())
            })
            .unwrap();
        assert!(names.contains(&"pg_catalog.int4".to_string()));
        assert!(names.contains(&"public.mood".to_string()));
    }

    #[test]
    fn test_iterate_stops_on_error() {
        let collection = TypeCollection::new();
        let mut seen = 0;
        let result: Result<(), &str> = collection.iterate(|_, _| {
            seen += 1;
            Err("stop")
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_column_type_mapping() {
        let collection = TypeCollection::new();
        assert_eq!(collection.for_column(ColumnType::Int32).oid, 23);
        assert_eq!(collection.for_column(ColumnType::VarChar).oid, 25);
        assert_eq!(collection.for_column(ColumnType::Int64).oid, 20);
        assert_eq!(collection.for_column(ColumnType::Null).oid, 705);
    }
}
