use serde_json::Value;

/// A table query the way the route handlers express it: equality / membership
/// filters, ordering and a window. Both backends translate it, PostgREST into
/// URL parameters and SQLite into a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    /// Case-insensitive substring match on any of the columns.
    ILikeAny { columns: Vec<String>, needle: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Comma separated column list; the default is every column.
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "*")
            .map(str::to_string)
            .collect();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn in_<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn ilike_any(mut self, columns: &[&str], needle: &str) -> Self {
        self.filters.push(Filter::ILikeAny {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            needle: needle.to_string(),
        });
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// True when an `IN ()` filter makes the result empty without asking the
    /// backend (PostgREST rejects an empty list).
    pub fn is_trivially_empty(&self) -> bool {
        self.filters
            .iter()
            .any(|f| matches!(f, Filter::In(_, values) if values.is_empty()))
    }

    /// Every identifier the query mentions, for validation before it is
    /// spliced into SQL or a URL.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        let filter_columns = self.filters.iter().flat_map(|f| match f {
            Filter::Eq(c, _) | Filter::In(c, _) | Filter::IsNull(c) => vec![c.as_str()],
            Filter::ILikeAny { columns, .. } => columns.iter().map(String::as_str).collect(),
        });

        std::iter::once(self.table.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .chain(filter_columns)
            .chain(self.order.iter().map(|o| o.column.as_str()))
    }
}

/// Identifiers are always plain snake_case names chosen by the server.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_star_means_all_columns() {
        let q = Query::table("usuarios").select("*");
        assert!(q.columns.is_empty());

        let q = Query::table("usuarios").select("id, nome,foto_url");
        assert_eq!(q.columns, vec!["id", "nome", "foto_url"]);
    }

    #[test]
    fn empty_in_list_short_circuits() {
        let ids: Vec<i64> = vec![];
        assert!(Query::table("avaliacoes").in_("contratacao_id", ids).is_trivially_empty());
        assert!(!Query::table("avaliacoes").in_("contratacao_id", [1]).is_trivially_empty());
    }

    #[test]
    fn identifiers_cover_filters_and_order() {
        let q = Query::table("anuncios")
            .select("id, titulo")
            .eq("tipo", json!("oferta"))
            .ilike_any(&["titulo", "descricao"], "pintor")
            .order("publicado_em", true);
        let ids: Vec<&str> = q.identifiers().collect();
        assert_eq!(
            ids,
            vec!["anuncios", "id", "titulo", "tipo", "titulo", "descricao", "publicado_em"]
        );
        assert!(ids.iter().all(|i| is_valid_identifier(i)));
    }

    #[test]
    fn rejects_injected_identifiers() {
        assert!(!is_valid_identifier("nome; drop table usuarios"));
        assert!(!is_valid_identifier("Nome"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(is_valid_identifier("disp_segunda"));
    }
}
