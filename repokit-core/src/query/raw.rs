//! String-built single-column `SELECT` used by the raw-SQL repository helpers.
//!
//! Conditions and clause values are spliced into the statement verbatim and
//! must come from trusted code. Table and column names are quoted, and clause
//! keywords are restricted to plain words, so neither can break out of their
//! position in the statement.

use crate::error::{RepositoryError, Result};

/// Quote an identifier for Postgres, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Upper-case a clause keyword such as `order by` and reject anything that
/// is not a sequence of ASCII words.
fn normalize_keyword(raw: &str) -> Result<String> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.is_empty() {
        return Err(RepositoryError::InvalidSql(
            "empty clause keyword".to_string(),
        ));
    }
    if let Some(bad) = words
        .iter()
        .find(|word| !word.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(RepositoryError::InvalidSql(format!(
            "clause keyword `{raw}` contains `{bad}`"
        )));
    }
    Ok(words.join(" ").to_ascii_uppercase())
}

/// ```text
/// SELECT t."<column>" FROM public."<table>" AS t
///     [WHERE ..] [KEYWORD value].. [OFFSET n] [LIMIT m]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSelect {
    table: String,
    column: String,
    condition: Option<String>,
    clauses: Vec<(String, String)>,
    skip: Option<u64>,
    take: Option<u64>,
}

impl RawSelect {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            condition: None,
            clauses: Vec::new(),
            skip: None,
            take: None,
        }
    }

    /// Set the `WHERE` condition; blank conditions are ignored.
    pub fn condition(mut self, condition: Option<&str>) -> Self {
        self.condition = condition
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string);
        self
    }

    /// Append clauses in order, e.g. `("order by", "t.\"Name\" DESC")`.
    pub fn clauses(mut self, clauses: &[(&str, &str)]) -> Self {
        self.clauses.extend(clauses.iter().map(|(keyword, value)| {
            (keyword.to_string(), value.to_string())
        }));
        self
    }

    pub fn skip(mut self, skip: Option<u64>) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: Option<u64>) -> Self {
        self.take = take;
        self
    }

    pub fn render(&self) -> Result<String> {
        let mut sql = format!(
            "SELECT t.{} FROM public.{} AS t",
            quote_ident(&self.column),
            quote_ident(&self.table)
        );

        if let Some(condition) = &self.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }

        for (keyword, value) in &self.clauses {
            sql.push(' ');
            sql.push_str(&normalize_keyword(keyword)?);
            sql.push(' ');
            sql.push_str(value);
        }

        if let Some(skip) = self.skip {
            sql.push_str(&format!(" OFFSET {skip}"));
        }
        if let Some(take) = self.take {
            sql.push_str(&format!(" LIMIT {take}"));
        }

        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_condition_and_paging() {
        let sql = RawSelect::new("Users", "Name")
            .condition(Some("\"Age\" > 18"))
            .skip(Some(10))
            .take(Some(5))
            .render()
            .unwrap();
        assert_eq!(
            sql,
            concat!(
                r#"SELECT t."Name" FROM public."Users" AS t "#,
                r#"WHERE "Age" > 18 OFFSET 10 LIMIT 5"#
            )
        );
    }

    #[test]
    fn renders_bare_select() {
        let sql = RawSelect::new("Users", "Id").render().unwrap();
        assert_eq!(sql, r#"SELECT t."Id" FROM public."Users" AS t"#);
    }

    #[test]
    fn clauses_keep_order_and_upper_case_keywords() {
        let sql = RawSelect::new("Orders", "Total")
            .clauses(&[
                ("group by", "t.\"Total\""),
                ("order  by", "t.\"Total\" DESC"),
            ])
            .take(Some(3))
            .render()
            .unwrap();
        assert_eq!(
            sql,
            concat!(
                r#"SELECT t."Total" FROM public."Orders" AS t "#,
                r#"GROUP BY t."Total" ORDER BY t."Total" DESC LIMIT 3"#
            )
        );
    }

    #[test]
    fn blank_condition_is_dropped() {
        let sql = RawSelect::new("Users", "Id")
            .condition(Some("   "))
            .render()
            .unwrap();
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn hostile_keyword_is_rejected() {
        let err = RawSelect::new("Users", "Id")
            .clauses(&[("ORDER BY 1; DROP TABLE", "x")])
            .render()
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidSql(_)));
    }

    #[test]
    fn identifiers_are_escaped() {
        let sql = RawSelect::new("Us\"ers", "Na\"me").render().unwrap();
        assert_eq!(sql, r#"SELECT t."Na""me" FROM public."Us""ers" AS t"#);
    }
}
