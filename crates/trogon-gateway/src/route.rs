//! Path-only request classification.

use crate::rate_limit::PolicyTag;

const N8N_PREFIX: &str = "/api/n8n";
const WEBHOOK_PREFIX: &str = "/webhook";

/// The logical route an inbound request is dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Health,
    Search,
    Vision,
    Perplexity,
    /// Carries the rewritten upstream path, e.g. `/webhook/smart-shopping/search`.
    N8nProxy(String),
    NotFound,
}

impl RouteDecision {
    /// Rules are evaluated in order and the first match wins. The method is
    /// accepted for signature symmetry only: each forwarder enforces its own
    /// allowed verbs.
    pub fn classify(_method: &str, path: &str) -> Self {
        match path {
            "/" | "/health" => Self::Health,
            "/api/search" => Self::Search,
            "/api/vision" => Self::Vision,
            "/api/perplexity" => Self::Perplexity,
            _ => match path.strip_prefix(N8N_PREFIX) {
                Some(rest) if rest.starts_with('/') => {
                    Self::N8nProxy(format!("{WEBHOOK_PREFIX}{rest}"))
                }
                _ => Self::NotFound,
            },
        }
    }

    /// Which quota applies, if any. `Perplexity` draws from the `Search`
    /// budget and shares its counter namespace.
    pub fn policy_tag(&self) -> Option<PolicyTag> {
        match self {
            Self::Search | Self::Perplexity => Some(PolicyTag::Search),
            Self::Vision => Some(PolicyTag::Vision),
            Self::N8nProxy(_) => Some(PolicyTag::N8n),
            Self::Health | Self::NotFound => None,
        }
    }

    /// Short label for logs and spans.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Search => "search",
            Self::Vision => "vision",
            Self::Perplexity => "perplexity",
            Self::N8nProxy(_) => "n8n",
            Self::NotFound => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_health_are_health() {
        assert_eq!(RouteDecision::classify("GET", "/"), RouteDecision::Health);
        assert_eq!(RouteDecision::classify("GET", "/health"), RouteDecision::Health);
    }

    #[test]
    fn fixed_api_routes() {
        assert_eq!(RouteDecision::classify("GET", "/api/search"), RouteDecision::Search);
        assert_eq!(RouteDecision::classify("POST", "/api/vision"), RouteDecision::Vision);
        assert_eq!(
            RouteDecision::classify("POST", "/api/perplexity"),
            RouteDecision::Perplexity
        );
    }

    #[test]
    fn n8n_prefix_is_rewritten_to_webhook() {
        assert_eq!(
            RouteDecision::classify("POST", "/api/n8n/smart-shopping/search"),
            RouteDecision::N8nProxy("/webhook/smart-shopping/search".to_string())
        );
        assert_eq!(
            RouteDecision::classify("GET", "/api/n8n/a/b"),
            RouteDecision::N8nProxy("/webhook/a/b".to_string())
        );
    }

    #[test]
    fn n8n_with_trailing_slash_only_still_proxies() {
        assert_eq!(
            RouteDecision::classify("GET", "/api/n8n/"),
            RouteDecision::N8nProxy("/webhook/".to_string())
        );
    }

    #[test]
    fn n8n_without_separator_is_not_found() {
        assert_eq!(RouteDecision::classify("GET", "/api/n8n"), RouteDecision::NotFound);
        assert_eq!(RouteDecision::classify("GET", "/api/n8nx/a"), RouteDecision::NotFound);
    }

    #[test]
    fn everything_else_is_not_found() {
        for path in ["/nope", "/api", "/api/search/", "/API/SEARCH", "/healthz", ""] {
            assert_eq!(RouteDecision::classify("GET", path), RouteDecision::NotFound, "{path}");
        }
    }

    #[test]
    fn method_does_not_affect_classification() {
        for method in ["GET", "POST", "DELETE", "PATCH"] {
            assert_eq!(RouteDecision::classify(method, "/api/vision"), RouteDecision::Vision);
        }
    }

    #[test]
    fn perplexity_shares_the_search_policy() {
        assert_eq!(RouteDecision::Perplexity.policy_tag(), Some(PolicyTag::Search));
        assert_eq!(RouteDecision::Search.policy_tag(), Some(PolicyTag::Search));
    }

    #[test]
    fn quota_free_routes_have_no_policy() {
        assert_eq!(RouteDecision::Health.policy_tag(), None);
        assert_eq!(RouteDecision::NotFound.policy_tag(), None);
        assert_eq!(
            RouteDecision::N8nProxy("/webhook/x".into()).policy_tag(),
            Some(PolicyTag::N8n)
        );
        assert_eq!(RouteDecision::Vision.policy_tag(), Some(PolicyTag::Vision));
    }
}
