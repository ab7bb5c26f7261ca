//! Fluent query builder and compiled queries.
//!
//! A [`QueryBuilder`] accumulates constraints on one table. [`build`] snapshots
//! them into a [`CompiledQuery`], whose [`query`] runs against the table and
//! decodes the matching records.
//!
//! Builders never reset themselves: constraints set before one `build()` are
//! still there for the next one until [`reset`] is called.
//!
//! A builder with query caching enabled keeps one `CompiledQuery` and
//! overwrites it on every `build()` instead of making a new one. `build()`
//! takes `&mut self` and the returned reference borrows the builder, so a
//! cached query can never be read while another `build()` rewrites it.
//!
//! [`build`]: QueryBuilder::build
//! [`query`]: CompiledQuery::query
//! [`reset`]: QueryBuilder::reset

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tristore_core::{
    Codec, Column, Direction, MsgPackCodec, OrderBy, QueryFilter, QuerySpec, Record, Row,
    Selection, StoreError, StoreResult,
};

use crate::table::TableCore;

/// Accumulates constraints for a query on one table.
pub struct QueryBuilder<T, C = MsgPackCodec> {
    table: Arc<TableCore<C>>,
    filter: QueryFilter,
    cache_query: bool,
    compiled: Option<CompiledQuery<T, C>>,
}

impl<T, C> QueryBuilder<T, C> {
    pub(crate) fn new(table: Arc<TableCore<C>>, cache_query: bool) -> Self {
        Self {
            table,
            filter: QueryFilter::default(),
            cache_query,
            compiled: None,
        }
    }

    /// Clears every constraint, the order and the limit.
    pub fn reset(&mut self) -> &mut Self {
        self.filter.clear();
        self
    }

    /// Lower bound of the id range (inclusive, lexicographic).
    ///
    /// Only takes effect together with [`id_to`](Self::id_to).
    pub fn id_from(&mut self, from: impl Into<String>) -> &mut Self {
        self.filter.id_from = Some(from.into());
        self
    }

    /// Upper bound of the id range (inclusive, lexicographic).
    ///
    /// Only takes effect together with [`id_from`](Self::id_from).
    pub fn id_to(&mut self, to: impl Into<String>) -> &mut Self {
        self.filter.id_to = Some(to.into());
        self
    }

    /// Restrict to records whose type equals `record_type`.
    pub fn record_type(&mut self, record_type: impl Into<String>) -> &mut Self {
        self.filter.record_type = Some(record_type.into());
        self
    }

    /// Lower bound of the creation-time range (inclusive, epoch millis).
    ///
    /// Negative values leave the bound unset.
    pub fn created_from(&mut self, from: i64) -> &mut Self {
        self.filter.created_from = from;
        self
    }

    /// Upper bound of the creation-time range (inclusive, epoch millis).
    ///
    /// Negative values leave the bound unset.
    pub fn created_to(&mut self, to: i64) -> &mut Self {
        self.filter.created_to = to;
        self
    }

    /// Sort results by `column`. `Direction::None` leaves them unsorted.
    pub fn order(&mut self, column: Column, direction: Direction) -> &mut Self {
        self.filter.order_column = Some(column);
        self.filter.direction = direction;
        self
    }

    /// Return at most `limit` rows, counted after ordering.
    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.filter.limit = Some(limit);
        self
    }

    /// Enable or disable reuse of a single compiled query across builds.
    pub fn cache_query(&mut self, enabled: bool) -> &mut Self {
        self.cache_query = enabled;
        self
    }

    #[must_use]
    pub fn is_caching(&self) -> bool {
        self.cache_query
    }

    /// The constraints accumulated so far.
    #[must_use]
    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Compiles the current constraints into a new, independent query.
    ///
    /// Unlike [`build`](Self::build) the result does not borrow the builder.
    #[must_use]
    pub fn compile(&self) -> CompiledQuery<T, C> {
        CompiledQuery::new(Arc::clone(&self.table), self.filter.compile())
    }

    /// Compiles the current constraints.
    ///
    /// With caching enabled the retained query is rewritten in place and
    /// returned; otherwise a new query replaces it. The constraints are kept
    /// either way.
    pub fn build(&mut self) -> &CompiledQuery<T, C> {
        let spec = self.filter.compile();
        if !self.cache_query {
            self.compiled = None;
        }
        let table = &self.table;
        let query = self
            .compiled
            .get_or_insert_with(|| CompiledQuery::new(Arc::clone(table), QuerySpec::default()));
        query.update(spec);
        query
    }
}

/// Renders the selection the current constraints compile to.
impl<T, C> fmt::Display for QueryBuilder<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filter.selection())
    }
}

/// Snapshot of a builder's constraints, bound to the table it queries.
pub struct CompiledQuery<T, C = MsgPackCodec> {
    table: Arc<TableCore<C>>,
    spec: QuerySpec,
    _record: PhantomData<fn() -> T>,
}

impl<T, C> CompiledQuery<T, C> {
    fn new(table: Arc<TableCore<C>>, spec: QuerySpec) -> Self {
        Self {
            table,
            spec,
            _record: PhantomData,
        }
    }

    fn update(&mut self, spec: QuerySpec) {
        self.spec = spec;
    }

    #[must_use]
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// The `WHERE` part; empty when every row matches.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.spec.selection
    }

    #[must_use]
    pub fn order(&self) -> Option<OrderBy> {
        self.spec.order
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.spec.limit
    }

    /// Runs the query and returns the matching raw rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the storage engine fails.
    pub fn rows(&self) -> StoreResult<Vec<Row>> {
        tracing::debug!(
            table = %self.table.table_name,
            selection = %self.spec.selection,
            order = ?self.spec.order,
            limit = ?self.spec.limit,
            "running query"
        );
        Ok(self.table.engine.select(&self.table.table_name, &self.spec)?)
    }
}

impl<T, C> CompiledQuery<T, C>
where
    T: Record,
    C: Codec<T>,
{
    /// Runs the query and decodes every matching record, in result order.
    ///
    /// An empty table or an unmatched filter yields an empty vector.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Decode`] if any payload is corrupt; no partial result
    ///   is returned.
    /// - [`StoreError::Engine`] if the storage engine fails.
    pub fn query(&self) -> StoreResult<Vec<T>> {
        self.rows()?
            .iter()
            .map(|row| self.table.decode(&row.data))
            .collect()
    }
}

impl<T, C> Clone for CompiledQuery<T, C> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.table), self.spec.clone())
    }
}

impl<T, C> fmt::Debug for CompiledQuery<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("table", &self.table.table_name)
            .field("spec", &self.spec)
            .finish()
    }
}

impl<T, C> fmt::Display for CompiledQuery<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec.selection)
    }
}

impl<C> TableCore<C> {
    pub(crate) fn decode<T>(&self, data: &[u8]) -> StoreResult<T>
    where
        C: Codec<T>,
    {
        self.codec.decode(data).map_err(|source| StoreError::Decode {
            table: self.table_name.clone(),
            source,
        })
    }
}
