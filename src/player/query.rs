use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Longitud máxima de una búsqueda en texto libre
const MAX_QUERY_LEN: usize = 500;

static SEARCH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(ytsearch|scsearch):\s*(.*)$").expect("regex válida"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("La búsqueda está vacía")]
    Empty,

    #[error("Las búsquedas están desactivadas en este canal")]
    SearchDisabled,

    #[error("La búsqueda es demasiado larga ({0} caracteres)")]
    TooLong(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    YouTube,
    SoundCloud,
}

impl SearchProvider {
    /// Prefijo de búsqueda de yt-dlp
    pub fn ytdlp_prefix(self) -> &'static str {
        match self {
            SearchProvider::YouTube => "ytsearch",
            SearchProvider::SoundCloud => "scsearch",
        }
    }
}

/// A playback request, either a direct link or a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Url(Url),
    Search {
        provider: SearchProvider,
        terms: String,
    },
}

impl Query {
    /// Parses free text into a query.
    ///
    /// With `dont_search` set, anything that is not an http(s) link is
    /// rejected, including explicit `ytsearch:`/`scsearch:` prefixes.
    pub fn parse(text: &str, dont_search: bool) -> Result<Self, QueryError> {
        let text = text.trim();
        // Discord suprime la vista previa con <url>
        let text = text
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(text)
            .trim();

        if text.is_empty() {
            return Err(QueryError::Empty);
        }

        let length = text.chars().count();
        if length > MAX_QUERY_LEN {
            return Err(QueryError::TooLong(length));
        }

        if let Some(captures) = SEARCH_PREFIX.captures(text) {
            if dont_search {
                return Err(QueryError::SearchDisabled);
            }

            let provider = match captures[1].to_lowercase().as_str() {
                "scsearch" => SearchProvider::SoundCloud,
                _ => SearchProvider::YouTube,
            };
            let terms = captures[2].trim();
            if terms.is_empty() {
                return Err(QueryError::Empty);
            }

            return Ok(Query::Search {
                provider,
                terms: terms.to_string(),
            });
        }

        if let Ok(url) = Url::parse(text) {
            if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
                return Ok(Query::Url(url));
            }
        }

        if dont_search {
            return Err(QueryError::SearchDisabled);
        }

        Ok(Query::Search {
            provider: SearchProvider::YouTube,
            terms: text.to_string(),
        })
    }

    #[cfg(test)]
    pub fn is_search(&self) -> bool {
        matches!(self, Query::Search { .. })
    }

    /// Argumento que se le pasa a yt-dlp
    pub fn ytdlp_target(&self, results: usize) -> String {
        match self {
            Query::Url(url) => url.to_string(),
            Query::Search { provider, terms } => {
                format!("{}{}:{}", provider.ytdlp_prefix(), results.max(1), terms)
            }
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Url(url) => write!(f, "{}", url),
            Query::Search { terms, .. } => write!(f, "{}", terms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_becomes_youtube_search() {
        assert_eq!(
            Query::parse("Hello by Adele", false).unwrap(),
            Query::Search {
                provider: SearchProvider::YouTube,
                terms: "Hello by Adele".to_string()
            }
        );
    }

    #[test]
    fn plain_text_is_invalid_when_searches_are_disabled() {
        assert_eq!(
            Query::parse("Hello by Adele", true),
            Err(QueryError::SearchDisabled)
        );
    }

    #[test]
    fn links_are_accepted_even_without_search() {
        let query = Query::parse("<https://youtu.be/YQHsXMglC9A>", true).unwrap();
        assert!(!query.is_search());
        assert_eq!(query.to_string(), "https://youtu.be/YQHsXMglC9A");
    }

    #[test]
    fn explicit_prefixes_pick_the_provider() {
        let query = Query::parse("scsearch: lofi beats", false).unwrap();
        assert_eq!(query.ytdlp_target(1), "scsearch1:lofi beats");
        assert_eq!(
            Query::parse("ytsearch:lofi", true),
            Err(QueryError::SearchDisabled)
        );
        assert_eq!(Query::parse("ytsearch:   ", false), Err(QueryError::Empty));
    }

    #[test]
    fn non_http_schemes_are_treated_as_text() {
        let query = Query::parse("mailto:someone@example.com", false).unwrap();
        assert!(query.is_search());
    }

    #[test]
    fn rejects_empty_and_oversized_input() {
        assert_eq!(Query::parse("   ", false), Err(QueryError::Empty));
        assert_eq!(Query::parse("<>", false), Err(QueryError::Empty));
        let long = "a".repeat(MAX_QUERY_LEN + 1);
        assert_eq!(
            Query::parse(&long, false),
            Err(QueryError::TooLong(MAX_QUERY_LEN + 1))
        );
    }
}
