//! Parameterized statement assembly shared by the strategies.
//!
//! User-supplied values are always bound as parameters. Identifiers come from
//! [`EngineConfig`] or filter keys and are double-quoted.

use serde_json::Value;

use super::config::EngineConfig;
use super::store::Statement;
use super::types::QueryOptions;

/// Accumulates bound parameters while a statement is being written.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    params: Vec<Value>,
}

impl StatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.params.push(value.into());
        format!("${}", self.params.len())
    }

    /// `LIMIT $n OFFSET $m` for the requested page.
    pub fn page_clause(&mut self, options: &QueryOptions) -> String {
        let limit = self.bind(options.limit);
        let offset = self.bind(options.offset());
        format!("LIMIT {limit} OFFSET {offset}")
    }

    /// Equality predicates for active filters plus the language restriction,
    /// when the engine has a language field.
    pub fn filter_predicates(&mut self, config: &EngineConfig, options: &QueryOptions) -> Vec<String> {
        let mut predicates = Vec::new();
        for (field, value) in options.active_filters() {
            let placeholder = self.bind(filter_param(value));
            predicates.push(format!("{} = {placeholder}", quote_ident(field)));
        }
        if let Some(language_field) = &config.language_field {
            let placeholder = self.bind(options.language.as_str());
            predicates.push(format!("{} = {placeholder}", quote_ident(language_field)));
        }
        predicates
    }

    pub fn finish(self, sql: String) -> Statement {
        Statement::new(sql, self.params)
    }
}

/// Scalars bind as themselves; anything structured binds as its JSON text.
fn filter_param(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar.clone(),
    }
}

/// Quote an identifier, per segment for dotted names (`schema.table`).
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|segment| format!("\"{}\"", segment.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// `%query%` with LIKE metacharacters escaped.
pub fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Join predicates into a `WHERE` clause (empty when there are none).
pub fn where_clause(predicates: &[String]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", predicates.join(" AND "))
    }
}

/// Postgres text-search configuration for a request language code.
pub fn text_search_config(language: &str) -> &'static str {
    match language.trim().to_ascii_lowercase().as_str() {
        "en" | "english" => "english",
        "ru" | "russian" => "russian",
        "ar" | "arabic" => "arabic",
        "de" | "german" => "german",
        "fr" | "french" => "french",
        "es" | "spanish" => "spanish",
        "it" | "italian" => "italian",
        "pt" | "portuguese" => "portuguese",
        "nl" | "dutch" => "dutch",
        "tr" | "turkish" => "turkish",
        "id" | "indonesian" => "indonesian",
        "sv" | "swedish" => "swedish",
        _ => "simple",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::SearchRequest;
    use serde_json::json;

    #[test]
    fn placeholders_are_sequential() {
        let mut b = StatementBuilder::new();
        assert_eq!(b.bind("a"), "$1");
        assert_eq!(b.bind(2), "$2");
        let stmt = b.finish("SELECT $1, $2".into());
        assert_eq!(stmt.params, vec![json!("a"), json!(2)]);
    }

    #[test]
    fn quote_ident_escapes_and_splits() {
        assert_eq!(quote_ident("text"), "\"text\"");
        assert_eq!(quote_ident("public.hadiths"), "\"public\".\"hadiths\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn contains_pattern_escapes_like_metacharacters() {
        assert_eq!(contains_pattern("prayer"), "%prayer%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn filter_predicates_bind_values_and_language() {
        let config = EngineConfig::new("hadiths", ["text"]).with_language_field("language_code");
        let options = SearchRequest::new("q")
            .with_language("ru")
            .with_filter("grade", "sahih")
            .with_filter("book", "")
            .options(20);
        let mut b = StatementBuilder::new();
        let predicates = b.filter_predicates(&config, &options);
        assert_eq!(
            predicates,
            vec!["\"grade\" = $1".to_string(), "\"language_code\" = $2".to_string()]
        );
        let stmt = b.finish(String::new());
        assert_eq!(stmt.params, vec![json!("sahih"), json!("ru")]);
    }

    #[test]
    fn page_clause_binds_limit_and_offset() {
        let options = SearchRequest::new("q").with_page(3).with_limit(10).options(20);
        let mut b = StatementBuilder::new();
        assert_eq!(b.page_clause(&options), "LIMIT $1 OFFSET $2");
        assert_eq!(b.finish(String::new()).params, vec![json!(10), json!(20)]);
    }

    #[test]
    fn where_clause_joins() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(
            where_clause(&["a = $1".into(), "b = $2".into()]),
            "WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn text_search_config_mapping() {
        assert_eq!(text_search_config("en"), "english");
        assert_eq!(text_search_config("RU"), "russian");
        assert_eq!(text_search_config("ar"), "arabic");
        assert_eq!(text_search_config("xx"), "simple");
    }
}
