//! Clause objects and deterministic rendering.
//!
//! A [`Select`] is an ordered set of clause lists. Each [`Fragment`] owns the
//! values it binds; placeholders are only numbered when the statement is
//! rendered, walking clauses in a fixed order:
//!
//! ```text
//! WITH .. SELECT .. FROM .. JOIN .. WHERE .. GROUP BY .. HAVING .. ORDER BY .. LIMIT .. OFFSET
//! ```
//!
//! so `$n` always matches the position of its value in
//! [`RenderedQuery::params`]. Values used in several places (the request
//! language, for instance) are declared once with [`Select::share`] and
//! referenced by name; they receive a single placeholder at first use.

use std::borrow::Cow;
use std::collections::HashMap;

use sqlx::Arguments;
use sqlx::postgres::PgArguments;
use thiserror::Error;

/// Errors raised while assembling a statement.
///
/// These indicate a defect in query construction, not bad input.
#[derive(Debug, Error)]
pub enum QueryBuildError {
    /// A fragment referenced a shared value that was never declared.
    #[error("shared parameter `{0}` is referenced but not declared")]
    UndeclaredParameter(&'static str),

    /// A value could not be encoded for the wire.
    #[error("failed to encode parameter ${index}: {message}")]
    Encode { index: usize, message: String },
}

/// A value bound to one positional placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i32),
    BigInt(i64),
    Text(String),
    IntArray(Vec<i32>),
    TextArray(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Sql(Cow<'static, str>),
    Bind(SqlParam),
    Shared(&'static str),
}

/// A piece of SQL text interleaved with the values it binds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    tokens: Vec<Token>,
}

impl Fragment {
    /// Start a fragment with literal SQL.
    #[must_use]
    pub fn sql(text: impl Into<Cow<'static, str>>) -> Self {
        Self::default().push(text)
    }

    /// Append literal SQL.
    #[must_use]
    pub fn push(mut self, text: impl Into<Cow<'static, str>>) -> Self {
        self.tokens.push(Token::Sql(text.into()));
        self
    }

    /// Append a placeholder owning `value`.
    #[must_use]
    pub fn bind(mut self, value: SqlParam) -> Self {
        self.tokens.push(Token::Bind(value));
        self
    }

    /// Append a placeholder for a value declared with [`Select::share`].
    #[must_use]
    pub fn shared(mut self, name: &'static str) -> Self {
        self.tokens.push(Token::Shared(name));
        self
    }

    /// Append another fragment.
    #[must_use]
    pub fn append(mut self, other: Self) -> Self {
        self.tokens.extend(other.tokens);
        self
    }

    /// Join fragments with a literal separator.
    #[must_use]
    pub fn join(parts: impl IntoIterator<Item = Self>, separator: &'static str) -> Self {
        let mut joined = Self::default();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined = joined.push(separator);
            }
            joined = joined.append(part);
        }
        joined
    }

    fn render(&self, ctx: &mut RenderContext) -> Result<(), QueryBuildError> {
        for token in &self.tokens {
            match token {
                Token::Sql(text) => ctx.sql.push_str(text),
                Token::Bind(value) => {
                    let index = ctx.allocate(value.clone());
                    ctx.placeholder(index);
                }
                Token::Shared(name) => {
                    let index = ctx.shared_index(name)?;
                    ctx.placeholder(index);
                }
            }
        }
        Ok(())
    }
}

/// Body of a common table expression.
#[derive(Debug, Clone)]
pub enum CteBody {
    Fragment(Fragment),
    Select(Box<Select>),
}

/// One `name (columns) AS (body)` entry of a `WITH` clause.
#[derive(Debug, Clone)]
pub struct Cte {
    name: &'static str,
    columns: Option<&'static str>,
    recursive: bool,
    body: CteBody,
}

impl Cte {
    /// A CTE whose body is a nested select.
    #[must_use]
    pub fn select(name: &'static str, body: Select) -> Self {
        Self {
            name,
            columns: None,
            recursive: false,
            body: CteBody::Select(Box::new(body)),
        }
    }

    /// A CTE whose body is free-form SQL (`VALUES` lists, recursive unions).
    #[must_use]
    pub fn fragment(name: &'static str, body: Fragment) -> Self {
        Self {
            name,
            columns: None,
            recursive: false,
            body: CteBody::Fragment(body),
        }
    }

    /// Name the CTE's output columns.
    #[must_use]
    pub fn columns(mut self, columns: &'static str) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Mark the CTE as self-referencing; the statement renders `WITH RECURSIVE`.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// The relation name other clauses refer to.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn render(&self, ctx: &mut RenderContext) -> Result<(), QueryBuildError> {
        ctx.sql.push_str(self.name);
        if let Some(columns) = self.columns {
            ctx.sql.push_str(" (");
            ctx.sql.push_str(columns);
            ctx.sql.push(')');
        }
        ctx.sql.push_str(" AS (");
        match &self.body {
            CteBody::Fragment(fragment) => fragment.render(ctx)?,
            CteBody::Select(select) => select.render_into(ctx)?,
        }
        ctx.sql.push(')');
        Ok(())
    }
}

/// A `SELECT` statement assembled from clause lists.
///
/// Predicates are combined with `AND`; a predicate containing `OR` must
/// parenthesize itself.
#[derive(Debug, Clone, Default)]
pub struct Select {
    shared: Vec<(&'static str, SqlParam)>,
    ctes: Vec<Cte>,
    columns: Vec<Fragment>,
    from: Option<Fragment>,
    joins: Vec<Fragment>,
    predicates: Vec<Fragment>,
    group_by: Vec<Fragment>,
    having: Option<Fragment>,
    order_by: Vec<Fragment>,
    limit: Option<Fragment>,
    offset: Option<Fragment>,
}

impl Select {
    /// Start a statement reading from `from`.
    #[must_use]
    pub fn from(from: Fragment) -> Self {
        Self {
            from: Some(from),
            ..Self::default()
        }
    }

    /// Replace the `FROM` relation.
    pub fn set_from(&mut self, from: Fragment) {
        self.from = Some(from);
    }

    /// Declare a value that fragments reference by name.
    pub fn share(&mut self, name: &'static str, value: SqlParam) {
        self.shared.retain(|(existing, _)| *existing != name);
        self.shared.push((name, value));
    }

    pub fn with(&mut self, cte: Cte) {
        self.ctes.push(cte);
    }

    pub fn column(&mut self, column: Fragment) {
        self.columns.push(column);
    }

    pub fn join(&mut self, join: Fragment) {
        self.joins.push(join);
    }

    pub fn filter(&mut self, predicate: Fragment) {
        self.predicates.push(predicate);
    }

    pub fn group_by(&mut self, expr: Fragment) {
        self.group_by.push(expr);
    }

    pub fn having(&mut self, predicate: Fragment) {
        self.having = Some(predicate);
    }

    pub fn order_by(&mut self, expr: Fragment) {
        self.order_by.push(expr);
    }

    pub fn limit(&mut self, value: SqlParam) {
        self.limit = Some(Fragment::sql("LIMIT ").bind(value));
    }

    pub fn offset(&mut self, value: SqlParam) {
        self.offset = Some(Fragment::sql("OFFSET ").bind(value));
    }

    /// The `WHERE` predicates, in order.
    #[must_use]
    pub fn predicates(&self) -> &[Fragment] {
        &self.predicates
    }

    /// Render to SQL text and its ordered parameter list.
    ///
    /// # Errors
    ///
    /// Returns `QueryBuildError::UndeclaredParameter` if a fragment refers to
    /// a shared value that was never declared.
    pub fn render(&self) -> Result<RenderedQuery, QueryBuildError> {
        let mut ctx = RenderContext::default();
        self.render_into(&mut ctx)?;
        Ok(RenderedQuery {
            sql: ctx.sql,
            params: ctx.params,
        })
    }

    fn render_into(&self, ctx: &mut RenderContext) -> Result<(), QueryBuildError> {
        for (name, value) in &self.shared {
            ctx.declare(name, value.clone());
        }

        if !self.ctes.is_empty() {
            ctx.sql.push_str("WITH ");
            if self.ctes.iter().any(|cte| cte.recursive) {
                ctx.sql.push_str("RECURSIVE ");
            }
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    ctx.sql.push_str(", ");
                }
                cte.render(ctx)?;
            }
            ctx.sql.push(' ');
        }

        ctx.sql.push_str("SELECT ");
        if self.columns.is_empty() {
            ctx.sql.push('*');
        }
        render_list(ctx, &self.columns, ", ")?;

        if let Some(from) = &self.from {
            ctx.sql.push_str(" FROM ");
            from.render(ctx)?;
        }

        for join in &self.joins {
            ctx.sql.push(' ');
            join.render(ctx)?;
        }

        if !self.predicates.is_empty() {
            ctx.sql.push_str(" WHERE ");
            render_list(ctx, &self.predicates, " AND ")?;
        }

        if !self.group_by.is_empty() {
            ctx.sql.push_str(" GROUP BY ");
            render_list(ctx, &self.group_by, ", ")?;
        }

        if let Some(having) = &self.having {
            ctx.sql.push_str(" HAVING ");
            having.render(ctx)?;
        }

        if !self.order_by.is_empty() {
            ctx.sql.push_str(" ORDER BY ");
            render_list(ctx, &self.order_by, ", ")?;
        }

        for clause in [&self.limit, &self.offset].into_iter().flatten() {
            ctx.sql.push(' ');
            clause.render(ctx)?;
        }

        Ok(())
    }
}

fn render_list(
    ctx: &mut RenderContext,
    fragments: &[Fragment],
    separator: &str,
) -> Result<(), QueryBuildError> {
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            ctx.sql.push_str(separator);
        }
        fragment.render(ctx)?;
    }
    Ok(())
}

#[derive(Default)]
struct RenderContext {
    sql: String,
    params: Vec<SqlParam>,
    declared: HashMap<&'static str, SqlParam>,
    assigned: HashMap<&'static str, usize>,
}

impl RenderContext {
    fn declare(&mut self, name: &'static str, value: SqlParam) {
        self.declared.entry(name).or_insert(value);
    }

    /// Push a value and return its 1-based placeholder index.
    fn allocate(&mut self, value: SqlParam) -> usize {
        self.params.push(value);
        self.params.len()
    }

    fn shared_index(&mut self, name: &'static str) -> Result<usize, QueryBuildError> {
        if let Some(index) = self.assigned.get(name) {
            return Ok(*index);
        }
        let value = self
            .declared
            .get(name)
            .cloned()
            .ok_or(QueryBuildError::UndeclaredParameter(name))?;
        let index = self.allocate(value);
        self.assigned.insert(name, index);
        Ok(index)
    }

    fn placeholder(&mut self, index: usize) {
        self.sql.push('$');
        self.sql.push_str(&index.to_string());
    }
}

/// SQL text plus the values for `$1..$n`, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl RenderedQuery {
    /// Encode the parameters for `sqlx::query_as_with` and friends.
    ///
    /// # Errors
    ///
    /// Returns `QueryBuildError::Encode` if a value cannot be encoded.
    pub fn arguments(&self) -> Result<PgArguments, QueryBuildError> {
        let mut args = PgArguments::default();
        for (i, param) in self.params.iter().enumerate() {
            let added = match param {
                SqlParam::Int(v) => args.add(*v),
                SqlParam::BigInt(v) => args.add(*v),
                SqlParam::Text(v) => args.add(v.clone()),
                SqlParam::IntArray(v) => args.add(v.clone()),
                SqlParam::TextArray(v) => args.add(v.clone()),
            };
            added.map_err(|e| QueryBuildError::Encode {
                index: i + 1,
                message: e.to_string(),
            })?;
        }
        Ok(args)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_follow_clause_order() {
        let mut select = Select::from(Fragment::sql("products AS p"));
        select.column(Fragment::sql("p.id"));
        // Added out of clause order on purpose
        select.limit(SqlParam::BigInt(10));
        select.filter(Fragment::sql("p.category_id = ").bind(SqlParam::Int(3)));
        select.filter(Fragment::sql("p.slug = ").bind(SqlParam::Text("dress".into())));

        let rendered = select.render().unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT p.id FROM products AS p WHERE p.category_id = $1 AND p.slug = $2 LIMIT $3"
        );
        assert_eq!(
            rendered.params,
            vec![
                SqlParam::Int(3),
                SqlParam::Text("dress".into()),
                SqlParam::BigInt(10),
            ]
        );
    }

    #[test]
    fn test_shared_parameter_gets_one_placeholder() {
        let mut select = Select::from(Fragment::sql("t"));
        select.share("lang", SqlParam::Text("ua".into()));
        select.filter(Fragment::sql("a = ").bind(SqlParam::Int(1)));
        select.filter(Fragment::sql("b = ").shared("lang"));
        select.filter(Fragment::sql("c = ").shared("lang"));

        let rendered = select.render().unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $2"
        );
        assert_eq!(rendered.params.len(), 2);
    }

    #[test]
    fn test_unused_shared_parameter_is_not_bound() {
        let mut select = Select::from(Fragment::sql("t"));
        select.share("lang", SqlParam::Text("en".into()));
        let rendered = select.render().unwrap();
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn test_undeclared_shared_parameter_is_an_error() {
        let mut select = Select::from(Fragment::sql("t"));
        select.filter(Fragment::sql("lang = ").shared("lang"));
        assert!(matches!(
            select.render(),
            Err(QueryBuildError::UndeclaredParameter("lang"))
        ));
    }

    #[test]
    fn test_ctes_render_first_and_number_first() {
        let mut inner = Select::from(Fragment::sql("items"));
        inner.filter(Fragment::sql("kind = ").bind(SqlParam::Text("x".into())));

        let mut select = Select::from(Fragment::sql("picked"));
        select.filter(Fragment::sql("id > ").bind(SqlParam::Int(5)));
        select.with(Cte::select("picked", inner));

        let rendered = select.render().unwrap();
        assert_eq!(
            rendered.sql,
            "WITH picked AS (SELECT * FROM items WHERE kind = $1) SELECT * FROM picked WHERE id > $2"
        );
    }

    #[test]
    fn test_recursive_flag() {
        let mut select = Select::from(Fragment::sql("tree"));
        select.with(
            Cte::fragment("tree", Fragment::sql("SELECT 1 UNION ALL SELECT 2"))
                .columns("id")
                .recursive(),
        );
        let rendered = select.render().unwrap();
        assert!(rendered.sql.starts_with("WITH RECURSIVE tree (id) AS ("));
    }

    #[test]
    fn test_join_fragments() {
        let joined = Fragment::join(
            [
                Fragment::sql("(").bind(SqlParam::Int(1)).push(")"),
                Fragment::sql("(").bind(SqlParam::Int(2)).push(")"),
            ],
            ", ",
        );
        let mut select = Select::default();
        select.column(joined);
        let rendered = select.render().unwrap();
        assert_eq!(rendered.sql, "SELECT ($1), ($2)");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut select = Select::from(Fragment::sql("t"));
        select.share("lang", SqlParam::Text("en".into()));
        select.filter(Fragment::sql("x = ").shared("lang"));
        select.order_by(Fragment::sql("x DESC"));
        assert_eq!(select.render().unwrap(), select.render().unwrap());
    }

    #[test]
    fn test_arguments_encode_every_param() {
        let rendered = RenderedQuery {
            sql: String::new(),
            params: vec![
                SqlParam::Int(1),
                SqlParam::TextArray(vec!["red".into()]),
                SqlParam::IntArray(vec![1, 2]),
            ],
        };
        assert!(rendered.arguments().is_ok());
    }
}
