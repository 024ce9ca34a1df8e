//! Composable query model shared by every persistence context.
//!
//! A [`Query`] is a sequence of [`Stage`]s. Within a stage, filters are
//! conjoined, then ordering is applied, then `skip`, then `take`. Builder
//! calls are honoured in the order they were made: a filter added after
//! ordering or paging, or ordering added after paging, starts a new stage
//! that runs over the rows the previous stage produced.

pub mod predicate;
pub mod raw;

use std::fmt;
use std::marker::PhantomData;

pub use predicate::{Column, CompareOp, Predicate};
pub use raw::RawSelect;

use crate::entity::Entity;

/// Sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

/// One pass over the rows: filters, ordering, skip, take.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage {
    filters: Vec<Predicate>,
    ordering: Vec<OrderBy>,
    skip: Option<u64>,
    take: Option<u64>,
}

impl Stage {
    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn take(&self) -> Option<u64> {
        self.take
    }

    pub fn is_paged(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Ordered or paged, so a later filter cannot join this stage.
    pub fn is_shaped(&self) -> bool {
        self.is_paged() || !self.ordering.is_empty()
    }
}

/// Caller-supplied rewrite applied after the repository's own filter.
pub type Transform<T> = Box<dyn FnOnce(Query<T>) -> Query<T> + Send>;

/// Wrap a closure as the optional transform argument of repository calls.
///
/// ```
/// use repokit_core::query::{transform, Query, Transform};
/// # use repokit_core::{Entity, EntityMeta, Value};
/// # #[derive(Debug, Clone, sqlx::FromRow)]
/// # struct User { #[sqlx(flatten)] meta: EntityMeta }
/// # impl Entity for User {
/// #     const TABLE: &'static str = "Users";
/// #     fn meta(&self) -> &EntityMeta { &self.meta }
/// #     fn meta_mut(&mut self) -> &mut EntityMeta { &mut self.meta }
/// #     fn values(&self) -> Vec<(&'static str, Value)> {
/// #         self.meta.values()
/// #     }
/// # }
/// let newest_first: Option<Transform<User>> =
///     transform(|q: Query<User>| q.order_by_desc("CreatedAt").take(10));
/// ```
pub fn transform<T, F>(f: F) -> Option<Transform<T>>
where
    F: FnOnce(Query<T>) -> Query<T> + Send + 'static,
{
    Some(Box::new(f))
}

/// A query against the table of entity `T`.
pub struct Query<T> {
    // Never empty.
    stages: Vec<Stage>,
    split_query: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &std::any::type_name::<T>())
            .field("stages", &self.stages)
            .field("split_query", &self.split_query)
            .finish()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
            split_query: self.split_query,
            _entity: PhantomData,
        }
    }
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Self {
            stages: vec![Stage::default()],
            split_query: false,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Query<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &'static str {
        T::TABLE
    }
}

impl<T> Query<T> {
    fn current(&mut self) -> &mut Stage {
        if self.stages.is_empty() {
            self.stages.push(Stage::default());
        }
        let last = self.stages.len() - 1;
        &mut self.stages[last]
    }

    fn next_stage_if(
        &mut self,
        open_new: impl Fn(&Stage) -> bool,
    ) -> &mut Stage {
        if open_new(self.current()) {
            self.stages.push(Stage::default());
        }
        self.current()
    }

    /// Keep rows matching `predicate`. Applies to the output of any
    /// ordering or paging already on the query.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.next_stage_if(Stage::is_shaped).filters.push(predicate);
        self
    }

    pub fn filter_opt(self, predicate: Option<Predicate>) -> Self {
        match predicate {
            Some(predicate) => self.filter(predicate),
            None => self,
        }
    }

    /// Add an ascending sort key after any existing ones.
    pub fn order_by(self, column: impl Into<String>) -> Self {
        self.push_order(column.into(), SortOrder::Ascending)
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.push_order(column.into(), SortOrder::Descending)
    }

    fn push_order(mut self, column: String, order: SortOrder) -> Self {
        self.next_stage_if(Stage::is_paged)
            .ordering
            .push(OrderBy { column, order });
        self
    }

    /// Skip rows. Consecutive skips add up; a skip after `take` skips
    /// within the taken rows.
    pub fn skip(mut self, count: u64) -> Self {
        let stage = self.next_stage_if(|stage| stage.take.is_some());
        stage.skip = Some(stage.skip.unwrap_or(0).saturating_add(count));
        self
    }

    /// Keep at most `count` rows. Consecutive takes keep the smaller.
    pub fn take(mut self, count: u64) -> Self {
        let stage = self.current();
        stage.take = Some(stage.take.map_or(count, |take| take.min(count)));
        self
    }

    /// Ask the context to load related data with separate statements.
    pub fn as_split_query(mut self) -> Self {
        self.split_query = true;
        self
    }

    /// Restrict to the first row while honouring an existing `take(0)`.
    pub fn first(self) -> Self {
        self.take(1)
    }

    /// Apply the optional transform, or return the query unchanged.
    pub fn apply(self, transform: Option<Transform<T>>) -> Self {
        match transform {
            Some(transform) => transform(self),
            None => self,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// A single stage with nothing but filters.
    pub fn is_filter_only(&self) -> bool {
        self.stages.len() == 1 && !self.stages[0].is_shaped()
    }

    pub fn is_split_query(&self) -> bool {
        self.split_query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    fn age_over(age: i64) -> Predicate {
        Column::new("Age").gt(age)
    }

    #[test]
    fn first_clamps_take() {
        let q: Query<Marker> = Query::default().take(5).first();
        assert_eq!(q.stages()[0].take(), Some(1));
        let q: Query<Marker> = Query::default().take(0).first();
        assert_eq!(q.stages()[0].take(), Some(0));
        let q: Query<Marker> = Query::default().first();
        assert_eq!(q.stages()[0].take(), Some(1));
    }

    #[test]
    fn transform_filters_join_the_callers_stage() {
        let q: Query<Marker> = Query::default().filter(age_over(18)).apply(
            transform(|q: Query<Marker>| {
                q.filter(Column::new("Name").eq("Ann")).order_by("Name")
            }),
        );
        assert_eq!(q.stages().len(), 1);
        assert_eq!(q.stages()[0].filters().len(), 2);
        assert_eq!(q.stages()[0].filters()[0], age_over(18));
        assert_eq!(q.stages()[0].ordering()[0].order, SortOrder::Ascending);
        assert!(!q.is_filter_only());
    }

    #[test]
    fn filter_after_paging_opens_a_stage() {
        let q: Query<Marker> = Query::default()
            .filter(age_over(1))
            .order_by("Name")
            .take(2)
            .filter(age_over(18));
        assert_eq!(q.stages().len(), 2);
        assert_eq!(q.stages()[0].take(), Some(2));
        assert_eq!(q.stages()[1].filters(), &[age_over(18)]);

        let q: Query<Marker> =
            Query::default().order_by("Age").filter(age_over(3));
        assert_eq!(q.stages().len(), 2);
    }

    #[test]
    fn skip_after_take_pages_within_the_taken_rows() {
        let q: Query<Marker> = Query::default().skip(2).skip(3).take(4);
        assert_eq!(q.stages().len(), 1);
        assert_eq!(q.stages()[0].skip(), Some(5));

        let q: Query<Marker> = Query::default().take(4).skip(1).take(10);
        assert_eq!(q.stages().len(), 2);
        assert_eq!(q.stages()[0].take(), Some(4));
        assert_eq!(q.stages()[1].skip(), Some(1));
        assert_eq!(q.stages()[1].take(), Some(10));
    }

    #[test]
    fn ordering_after_paging_sorts_the_page() {
        let q: Query<Marker> =
            Query::default().order_by("Name").order_by_desc("Age");
        assert_eq!(q.stages().len(), 1);
        assert_eq!(q.stages()[0].ordering().len(), 2);

        let q: Query<Marker> = Query::default().take(3).order_by("Name");
        assert_eq!(q.stages().len(), 2);
    }

    #[test]
    fn plain_filters_stay_filter_only() {
        let q: Query<Marker> = Query::default()
            .filter(Column::id().is_not_null())
            .filter(age_over(2))
            .as_split_query();
        assert!(q.is_filter_only());
        assert!(q.is_split_query());
    }
}
