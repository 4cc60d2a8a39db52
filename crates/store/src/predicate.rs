//! Search predicates and their translation into SQL filter clauses.
//!
//! Each predicate field that is set becomes one independent clause; the
//! clauses are ANDed together by the query that consumes them. Only the fixed
//! clause templates below ever reach the SQL text, values are always bound.

use time::Date;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Text(String),
    Int(i64),
    Date(Date),
}
impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}
impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}
impl From<Date> for Param {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

/// A fixed SQL fragment together with the values for its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    sql: &'static str,
    params: Vec<Param>,
}
impl Clause {
    pub fn new(sql: &'static str, params: Vec<Param>) -> Self {
        debug_assert_eq!(sql.matches('?').count(), params.len(), "placeholder count mismatch in {sql:?}");
        Self { sql, params }
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// The conjunction of clauses derived from a predicate. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}
impl Filter {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub(crate) fn into_clauses(self) -> Vec<Clause> {
        self.clauses
    }
}

/// Translation of a structured search request into a store filter.
pub trait Predicate {
    /// `None` when no field is set: the caller must then skip filtering
    /// altogether rather than apply an always-true condition.
    fn to_filter(&self) -> Option<Filter>;
}

/// Wrap user text in wildcards, escaping the wildcards it already contains.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Default)]
struct FilterBuilder(Vec<Clause>);
impl FilterBuilder {
    fn contains(mut self, sql: &'static str, needle: Option<&str>) -> Self {
        if let Some(needle) = needle {
            self.0.push(Clause::new(sql, vec![Param::Text(contains_pattern(needle))]));
        }
        self
    }

    fn bound<T: Into<Param> + Copy>(mut self, sql: &'static str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.0.push(Clause::new(sql, vec![value.into()]));
        }
        self
    }

    fn finish(self) -> Option<Filter> {
        (!self.0.is_empty()).then_some(Filter { clauses: self.0 })
    }
}

const BOOK_NAME_CONTAINS: &str = r"b.name LIKE ? ESCAPE '\'";
const AUTHOR_CONTAINS: &str = r"b.author LIKE ? ESCAPE '\'";
const GENRE_CONTAINS: &str = r"b.genre LIKE ? ESCAPE '\'";
const PUBLICATION_YEAR_MIN: &str = "b.publication_year >= ?";
const PUBLICATION_YEAR_MAX: &str = "b.publication_year <= ?";
const CLIENT_NAME_CONTAINS: &str = r"c.name LIKE ? ESCAPE '\'";
const START_DATE_MIN: &str = "l.start_date >= ?";
const START_DATE_MAX: &str = "l.start_date <= ?";

/// Book search; bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSearch {
    pub name_contains: Option<String>,
    pub author_contains: Option<String>,
    pub genre_contains: Option<String>,
    pub publication_year_min: Option<i32>,
    pub publication_year_max: Option<i32>,
}
impl Predicate for BookSearch {
    fn to_filter(&self) -> Option<Filter> {
        FilterBuilder::default()
            .contains(BOOK_NAME_CONTAINS, self.name_contains.as_deref())
            .contains(AUTHOR_CONTAINS, self.author_contains.as_deref())
            .contains(GENRE_CONTAINS, self.genre_contains.as_deref())
            .bound(PUBLICATION_YEAR_MIN, self.publication_year_min)
            .bound(PUBLICATION_YEAR_MAX, self.publication_year_max)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSearch {
    pub name_contains: Option<String>,
}
impl Predicate for ClientSearch {
    fn to_filter(&self) -> Option<Filter> {
        FilterBuilder::default().contains(CLIENT_NAME_CONTAINS, self.name_contains.as_deref()).finish()
    }
}

/// Loan search over the loan, its book and its client; bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanSearch {
    pub book_name_contains: Option<String>,
    pub author_contains: Option<String>,
    pub genre_contains: Option<String>,
    pub publication_year_min: Option<i32>,
    pub publication_year_max: Option<i32>,
    pub client_name_contains: Option<String>,
    pub start_date_min: Option<Date>,
    pub start_date_max: Option<Date>,
}
impl Predicate for LoanSearch {
    fn to_filter(&self) -> Option<Filter> {
        FilterBuilder::default()
            .contains(BOOK_NAME_CONTAINS, self.book_name_contains.as_deref())
            .contains(AUTHOR_CONTAINS, self.author_contains.as_deref())
            .contains(GENRE_CONTAINS, self.genre_contains.as_deref())
            .bound(PUBLICATION_YEAR_MIN, self.publication_year_min)
            .bound(PUBLICATION_YEAR_MAX, self.publication_year_max)
            .contains(CLIENT_NAME_CONTAINS, self.client_name_contains.as_deref())
            .bound(START_DATE_MIN, self.start_date_min)
            .bound(START_DATE_MAX, self.start_date_max)
            .finish()
    }
}

/// Translate an optional predicate; an absent one filters nothing either.
pub(crate) fn translate<P: Predicate>(predicate: Option<&P>) -> Option<Filter> {
    predicate.and_then(Predicate::to_filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::date;

    #[test]
    fn test_empty_predicates_translate_to_nothing() {
        assert_eq!(BookSearch::default().to_filter(), None);
        assert_eq!(ClientSearch::default().to_filter(), None);
        assert_eq!(LoanSearch::default().to_filter(), None);
        assert_eq!(translate::<BookSearch>(None), None);
    }

    #[test]
    fn test_one_clause_per_set_field() {
        let search = LoanSearch {
            author_contains: Some("Tolkien".to_string()),
            publication_year_min: Some(2000),
            publication_year_max: Some(2010),
            start_date_max: Some(date!(2024 - 06 - 30)),
            ..LoanSearch::default()
        };
        let filter = search.to_filter().unwrap();
        let sql: Vec<_> = filter.clauses().iter().map(Clause::sql).collect();
        assert_eq!(sql, vec![AUTHOR_CONTAINS, PUBLICATION_YEAR_MIN, PUBLICATION_YEAR_MAX, START_DATE_MAX]);
        assert_eq!(filter.clauses()[0].params(), &[Param::Text("%Tolkien%".to_string())]);
        assert_eq!(filter.clauses()[1].params(), &[Param::Int(2000)]);
        assert_eq!(filter.clauses()[3].params(), &[Param::Date(date!(2024 - 06 - 30))]);
    }

    #[test]
    fn test_client_search() {
        let search = ClientSearch { name_contains: Some("ann".to_string()) };
        let filter = search.to_filter().unwrap();
        assert_eq!(filter.clauses().len(), 1);
        assert_eq!(filter.clauses()[0].sql(), CLIENT_NAME_CONTAINS);
    }

    #[rstest]
    #[case("plain", "%plain%")]
    #[case("", "%%")]
    #[case("100%", r"%100\%%")]
    #[case("snake_case", r"%snake\_case%")]
    #[case(r"back\slash", r"%back\\slash%")]
    fn test_contains_pattern_escapes_wildcards(#[case] needle: &str, #[case] expected: &str) {
        assert_eq!(contains_pattern(needle), expected);
    }

    #[test]
    fn test_every_template_has_one_placeholder() {
        for sql in [
            BOOK_NAME_CONTAINS,
            AUTHOR_CONTAINS,
            GENRE_CONTAINS,
            PUBLICATION_YEAR_MIN,
            PUBLICATION_YEAR_MAX,
            CLIENT_NAME_CONTAINS,
            START_DATE_MIN,
            START_DATE_MAX,
        ] {
            assert_eq!(sql.matches('?').count(), 1, "{sql}");
        }
    }
}
