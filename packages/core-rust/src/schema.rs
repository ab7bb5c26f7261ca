//! Table declarations for record types.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Where the records of one type live: a database and a table within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableMeta {
    /// Name of the database the table belongs to.
    pub database_name: String,
    /// Name of the physical table.
    pub table_name: String,
}

impl TableMeta {
    #[must_use]
    pub fn new(database_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            table_name: table_name.into(),
        }
    }
}

/// Declarations for one record type.
#[derive(Debug)]
struct Declarations {
    type_name: &'static str,
    metas: Vec<TableMeta>,
}

/// Explicit mapping from record types to their [`TableMeta`].
///
/// Callers declare each type up front; resolution fails for undeclared types
/// and for types declared more than once with different metadata. Repeating
/// an identical declaration is harmless.
#[derive(Debug, Default)]
pub struct MetadataResolver {
    declarations: HashMap<TypeId, Declarations>,
}

impl MetadataResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare where records of type `T` are stored.
    pub fn declare<T: 'static>(&mut self, meta: TableMeta) -> &mut Self {
        let entry = self
            .declarations
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Declarations {
                type_name: type_name::<T>(),
                metas: Vec::new(),
            });
        if !entry.metas.contains(&meta) {
            entry.metas.push(meta);
        }
        self
    }

    /// Resolve the table metadata declared for `T`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AnnotationMissing`] if `T` was never declared.
    /// - [`StoreError::AnnotationConflict`] if `T` has conflicting declarations.
    pub fn resolve<T: 'static>(&self) -> StoreResult<TableMeta> {
        let Some(declared) = self.declarations.get(&TypeId::of::<T>()) else {
            return Err(StoreError::AnnotationMissing {
                type_name: type_name::<T>(),
            });
        };

        match declared.metas.as_slice() {
            [meta] => Ok(meta.clone()),
            [] => Err(StoreError::AnnotationMissing {
                type_name: declared.type_name,
            }),
            metas => Err(StoreError::AnnotationConflict {
                type_name: declared.type_name,
                count: metas.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note;
    struct Task;

    #[test]
    fn resolves_declared_type() {
        let mut resolver = MetadataResolver::new();
        resolver.declare::<Note>(TableMeta::new("app", "notes"));

        let meta = resolver.resolve::<Note>().unwrap();
        assert_eq!(meta.database_name, "app");
        assert_eq!(meta.table_name, "notes");
    }

    #[test]
    fn undeclared_type_is_missing() {
        let resolver = MetadataResolver::new();
        let err = resolver.resolve::<Task>().unwrap_err();
        assert!(matches!(err, StoreError::AnnotationMissing { type_name } if type_name.ends_with("Task")));
    }

    #[test]
    fn identical_redeclaration_is_not_a_conflict() {
        let mut resolver = MetadataResolver::new();
        resolver
            .declare::<Note>(TableMeta::new("app", "notes"))
            .declare::<Note>(TableMeta::new("app", "notes"));

        assert!(resolver.resolve::<Note>().is_ok());
    }

    #[test]
    fn differing_declarations_conflict() {
        let mut resolver = MetadataResolver::new();
        resolver
            .declare::<Note>(TableMeta::new("app", "notes"))
            .declare::<Note>(TableMeta::new("app", "memos"));

        let err = resolver.resolve::<Note>().unwrap_err();
        assert!(matches!(err, StoreError::AnnotationConflict { count: 2, .. }));
    }

    #[test]
    fn declarations_are_per_type() {
        let mut resolver = MetadataResolver::new();
        resolver
            .declare::<Note>(TableMeta::new("app", "notes"))
            .declare::<Task>(TableMeta::new("work", "tasks"));

        assert_eq!(resolver.resolve::<Task>().unwrap().database_name, "work");
        assert_eq!(resolver.resolve::<Note>().unwrap().table_name, "notes");
    }
}
