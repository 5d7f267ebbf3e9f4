//! Compiles requests into aggregation pipelines.
//!
//! Two flavors exist:
//!
//! - [`compile_tabular`] builds the grid pipeline: optional per-column search, optional
//!   global free-text search and the request filter, followed (on the paged copy only) by
//!   skip, limit and sort. Counting runs against the unpaged pipeline.
//! - [`compile_aggregate`] builds the raw aggregation pipeline: the request filter, then
//!   skip/limit, sort and a field projection.
//!
//! Both start from the caller's initial stages and never return an empty pipeline.

use crate::{
    descriptor::{FilterValue, QueryDescriptor, Request, TableQuery},
    filter::compile_filter,
    pipeline::{Pipeline, Stage},
    query::{Expr, Filter, Sort},
};

/// Search configuration for the tabular flavor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchSettings<'a> {
    /// Fields searched by the global free-text value.
    pub searchable: &'a [String],
    /// Whether each column's own search text is applied.
    pub per_column_search: bool,
}

/// The two pipelines of a tabular aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularPlan {
    /// Filtered but not paginated; its result length is the record count.
    pub filtered: Pipeline,
    /// `filtered` followed by skip, limit and sort.
    pub paged: Pipeline,
}

/// Compiles a tabular request on top of `initial`.
pub fn compile_tabular(
    initial: Pipeline,
    request: &Request,
    settings: SearchSettings<'_>,
) -> TabularPlan {
    let table = &request.table;
    let mut filtered = initial;

    if settings.per_column_search {
        if let Some(stage) = column_search(table) {
            filtered.push(Stage::Match(stage));
        }
    }

    if let Some(text) = &table.search {
        if let Some(stage) = global_search(settings.searchable, text) {
            filtered.push(Stage::Match(stage));
        }
    }

    if let Some(filter) = compile_filter(&request.query.filter) {
        filtered.push(Stage::Match(filter));
    }

    filtered.ensure_non_empty();

    let mut paged = filtered.clone();
    paged.push(Stage::Skip(table.start));
    if table.length > 0 {
        paged.push(Stage::Limit(table.length));
    }

    let sort = column_sort(table);
    if !sort.is_empty() {
        paged.push(Stage::Sort(sort));
    }

    TabularPlan { filtered, paged }
}

/// Compiles a raw aggregation request on top of `initial`.
pub fn compile_aggregate(initial: Pipeline, query: &QueryDescriptor) -> Pipeline {
    let mut pipeline = initial;

    if let Some(filter) = compile_filter(&query.filter) {
        pipeline.push(Stage::Match(filter));
    }

    if let Some(paginate) = &query.paginate {
        pipeline.push(Stage::Skip(paginate.aggregate_skip()));
        pipeline.push(Stage::Limit(paginate.limit));
    }

    if !query.sort.is_empty() {
        pipeline.push(Stage::Sort(query.sort.clone()));
    }

    if let Some(fields) = &query.select {
        pipeline.push(Stage::Project(fields.clone()));
    }

    pipeline.ensure_non_empty();

    pipeline
}

/// One OR-combined substring match over every column carrying search text.
fn column_search(table: &TableQuery) -> Option<Expr> {
    let clauses: Vec<Expr> = table
        .columns
        .iter()
        .filter(|column| !column.data.is_empty() && !column.search.trim().is_empty())
        .map(|column| Filter::contains(column.data.clone(), column.search.trim()))
        .collect();

    if clauses.is_empty() { None } else { Some(Filter::or(clauses)) }
}

/// One OR-combined match of `text` over the searchable fields: numeric equality when the
/// text parses as a number, substring match otherwise.
fn global_search(fields: &[String], text: &str) -> Option<Expr> {
    let text = text.trim();
    if fields.is_empty() || text.is_empty() {
        return None;
    }

    let number = text.parse::<f64>().ok().filter(|n| n.is_finite());

    Some(Filter::or(fields.iter().map(|field| match number {
        Some(n) => Filter::eq(field.clone(), FilterValue::Number(n).to_bson()),
        None => Filter::contains(field.clone(), text),
    })))
}

/// Sort keys from the ordered `{column, dir}` list; unknown column indexes are skipped.
fn column_sort(table: &TableQuery) -> Vec<Sort> {
    table
        .order
        .iter()
        .filter_map(|order| {
            let column = table.columns.get(order.column)?;
            (!column.data.is_empty()).then(|| Sort::new(column.data.clone(), order.direction()))
        })
        .collect()
}
