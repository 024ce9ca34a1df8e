//! Rendering of [`Query`] values and staged writes into Postgres statements.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::entity::{Entity, ID_COLUMN};
use crate::query::raw::quote_ident;
use crate::query::{Predicate, Query, Stage};
use crate::value::Value;

pub(crate) type Statement = QueryBuilder<'static, Postgres>;

fn table_ref(table: &str) -> String {
    format!("public.{} AS t", quote_ident(table))
}

fn column_ref(column: &str) -> String {
    format!("t.{}", quote_ident(column))
}

fn push_value(qb: &mut Statement, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Bool(v) => {
            qb.push_bind(*v);
        }
        Value::Int(v) => {
            qb.push_bind(*v);
        }
        Value::Float(v) => {
            qb.push_bind(*v);
        }
        Value::Text(v) => {
            qb.push_bind(v.clone());
        }
        Value::Uuid(v) => {
            qb.push_bind(*v);
        }
        Value::Timestamp(v) => {
            qb.push_bind(*v);
        }
    }
}

fn push_predicate(qb: &mut Statement, predicate: &Predicate) {
    match predicate {
        Predicate::Compare { column, op, value } => {
            qb.push(column_ref(column));
            qb.push(" ");
            qb.push(op.as_sql());
            qb.push(" ");
            push_value(qb, value);
        }
        Predicate::Like { column, pattern } => {
            qb.push(column_ref(column));
            qb.push(" LIKE ");
            qb.push_bind(pattern.clone());
        }
        Predicate::IsNull { column, negated } => {
            qb.push(column_ref(column));
            qb.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Predicate::In { column, values } => {
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            qb.push(column_ref(column));
            qb.push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
        Predicate::And(parts) => push_joined(qb, parts, " AND ", "TRUE"),
        Predicate::Or(parts) => push_joined(qb, parts, " OR ", "FALSE"),
        Predicate::Not(inner) => {
            qb.push("NOT (");
            push_predicate(qb, inner);
            qb.push(")");
        }
    }
}

fn push_joined(
    qb: &mut Statement,
    parts: &[Predicate],
    sep: &str,
    empty: &str,
) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(sep);
        }
        push_predicate(qb, part);
    }
    qb.push(")");
}

fn push_where(qb: &mut Statement, filters: &[Predicate]) {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE (" } else { " AND (" });
        push_predicate(qb, filter);
        qb.push(")");
    }
}

fn push_stage(qb: &mut Statement, stage: &Stage) {
    push_where(qb, stage.filters());

    for (i, order) in stage.ordering().iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(column_ref(&order.column));
        qb.push(" ");
        qb.push(order.order.as_sql());
    }

    if let Some(skip) = stage.skip() {
        qb.push(" OFFSET ");
        qb.push_bind(clamp(skip));
    }
    if let Some(take) = stage.take() {
        qb.push(" LIMIT ");
        qb.push_bind(clamp(take));
    }
}

/// Every stage after the first selects from the previous one as `t`.
fn push_select<T: Entity>(qb: &mut Statement, query: &Query<T>) {
    let from_table = format!("SELECT t.* FROM {}", table_ref(T::TABLE));
    let Some((first, rest)) = query.stages().split_first() else {
        qb.push(from_table);
        return;
    };
    qb.push("SELECT t.* FROM (".repeat(rest.len()));
    qb.push(from_table);
    push_stage(qb, first);
    for stage in rest {
        qb.push(") AS t");
        push_stage(qb, stage);
    }
}

/// `SELECT t.* ...` with filters, ordering and paging.
pub(crate) fn select<T: Entity>(query: &Query<T>) -> Statement {
    let mut qb = Statement::new("");
    push_select(&mut qb, query);
    qb
}

/// `SELECT COUNT(*) ...`, over a subquery once the query orders or pages.
pub(crate) fn count<T: Entity>(query: &Query<T>) -> Statement {
    let mut qb = Statement::new("SELECT COUNT(*) FROM ");
    if query.is_filter_only() {
        qb.push(table_ref(T::TABLE));
        push_where(&mut qb, query.stages()[0].filters());
    } else {
        qb.push("(");
        push_select(&mut qb, query);
        qb.push(") AS t");
    }
    qb
}

/// `SELECT EXISTS (...)` over the same rows [`select`] would return.
pub(crate) fn exists<T: Entity>(query: &Query<T>) -> Statement {
    let mut qb = Statement::new("SELECT EXISTS (");
    if query.is_filter_only() {
        qb.push(format!("SELECT 1 FROM {}", table_ref(T::TABLE)));
        push_where(&mut qb, query.stages()[0].filters());
    } else {
        push_select(&mut qb, query);
    }
    qb.push(")");
    qb
}

pub(crate) fn insert(
    table: &str,
    values: &[(&'static str, Value)],
) -> Statement {
    let mut qb =
        Statement::new(format!("INSERT INTO public.{} (", quote_ident(table)));
    for (i, (column, _)) in values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(quote_ident(column));
    }
    qb.push(") VALUES (");
    for (i, (_, value)) in values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, value);
    }
    qb.push(")");
    qb
}

/// `None` when the entity has no columns besides `Id`.
pub(crate) fn update(
    table: &str,
    id: Uuid,
    values: &[(&'static str, Value)],
) -> Option<Statement> {
    let assignments: Vec<_> = values
        .iter()
        .filter(|(column, _)| *column != ID_COLUMN)
        .collect();
    if assignments.is_empty() {
        return None;
    }

    let mut qb =
        Statement::new(format!("UPDATE public.{} SET ", quote_ident(table)));
    for (i, (column, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(quote_ident(column));
        qb.push(" = ");
        push_value(&mut qb, value);
    }
    qb.push(format!(" WHERE {} = ", quote_ident(ID_COLUMN)));
    qb.push_bind(id);
    Some(qb)
}

pub(crate) fn delete(table: &str, id: Uuid) -> Statement {
    let mut qb = Statement::new(format!(
        "DELETE FROM public.{} WHERE {} = ",
        quote_ident(table),
        quote_ident(ID_COLUMN)
    ));
    qb.push_bind(id);
    qb
}

fn clamp(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
