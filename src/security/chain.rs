use super::{SecurityError, SecurityFailure, SecurityHandler, SecurityHandlers, DEFAULT_FAILURE_STATUS};
use crate::dispatcher::HandlerRequest;
use crate::spec::SecurityRequirement;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Stand-in for a scheme nobody supplied a handler for.
struct MissingHandler {
    name: String,
}

#[async_trait]
impl SecurityHandler for MissingHandler {
    async fn authenticate(&self, _req: &HandlerRequest, _scopes: &[String]) -> Result<(), SecurityFailure> {
        Err(SecurityFailure::new(format!(
            "Missing handler for \"{}\" validation",
            self.name
        )))
    }
}

enum ChainEntry {
    Scheme {
        name: String,
        handler: Arc<dyn SecurityHandler>,
    },
    /// An empty requirement object: anonymous access is one of the alternatives
    Anonymous,
}

/// Composite handler for one requirement sequence.
///
/// Immutable once built, shared by every route with the same requirements.
pub struct SecurityChain {
    entries: Vec<ChainEntry>,
}

impl SecurityChain {
    /// Scheme names in evaluation order.
    pub fn schemes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                ChainEntry::Scheme { name, .. } => Some(name.as_str()),
                ChainEntry::Anonymous => None,
            })
            .collect()
    }

    /// Try each scheme in declared order; the first success admits the request.
    ///
    /// The schemes named by one requirement object are flattened into the
    /// same ordered list as every other alternative, so a requirement listing
    /// several schemes is satisfied by any one of them.
    ///
    /// `requirements` are the route's own, the sequence this chain was built
    /// from. Chains are shared by scheme names alone, so each handler gets its
    /// scopes from here.
    pub async fn authenticate(
        &self,
        req: &HandlerRequest,
        requirements: &[SecurityRequirement],
    ) -> Result<(), SecurityError> {
        let mut failed_schemes = Vec::new();
        let mut causes = Vec::new();
        let mut status_code = None;
        let mut declared_scopes = requirements
            .iter()
            .flat_map(|r| r.schemes().map(|(_, scopes)| scopes));

        for entry in &self.entries {
            let (name, handler) = match entry {
                ChainEntry::Anonymous => return Ok(()),
                ChainEntry::Scheme { name, handler } => (name, handler),
            };
            let scopes = declared_scopes.next().unwrap_or_default();
            match handler.authenticate(req, scopes).await {
                Ok(()) => return Ok(()),
                Err(failure) => {
                    debug!(
                        scheme = %name,
                        operation_id = %req.operation_id,
                        error = %failure.message,
                        "Security scheme rejected request"
                    );
                    if let Some(code) = failure.status_code {
                        status_code = Some(code);
                    }
                    failed_schemes.push(name.clone());
                    causes.push(failure);
                }
            }
        }

        Err(SecurityError::new(
            failed_schemes,
            causes,
            status_code.unwrap_or(DEFAULT_FAILURE_STATUS),
        ))
    }
}

/// Builds and memoizes [`SecurityChain`]s during setup.
///
/// Chains are keyed by the canonical JSON of the requirement sequence, which
/// holds scheme names only. The builder is consumed by registration; nothing
/// is added after setup.
pub struct SecurityChainBuilder {
    handlers: SecurityHandlers,
    cache: HashMap<String, Arc<SecurityChain>>,
    missing: Vec<String>,
}

impl SecurityChainBuilder {
    pub fn new(handlers: SecurityHandlers) -> Self {
        Self {
            handlers,
            cache: HashMap::new(),
            missing: Vec::new(),
        }
    }

    fn cache_key(requirements: &[SecurityRequirement]) -> String {
        serde_json::to_string(requirements).unwrap_or_default()
    }

    /// The chain for `requirements`, building it on first use.
    ///
    /// An empty sequence means unauthenticated access and yields `None`.
    pub fn add(&mut self, requirements: &[SecurityRequirement]) -> Option<Arc<SecurityChain>> {
        if requirements.is_empty() {
            return None;
        }
        let key = Self::cache_key(requirements);
        if let Some(chain) = self.cache.get(&key) {
            return Some(Arc::clone(chain));
        }

        let mut entries = Vec::new();
        for requirement in requirements {
            if requirement.is_empty() {
                entries.push(ChainEntry::Anonymous);
                continue;
            }
            for name in requirement.names() {
                let handler = match self.handlers.get(name) {
                    Some(handler) => handler,
                    None => {
                        if !self.missing.contains(name) {
                            self.missing.push(name.clone());
                        }
                        Arc::new(MissingHandler { name: name.clone() })
                    }
                };
                entries.push(ChainEntry::Scheme {
                    name: name.clone(),
                    handler,
                });
            }
        }

        let chain = Arc::new(SecurityChain { entries });
        self.cache.insert(key, Arc::clone(&chain));
        Some(chain)
    }

    /// A previously built chain.
    pub fn get(&self, requirements: &[SecurityRequirement]) -> Option<Arc<SecurityChain>> {
        self.cache.get(&Self::cache_key(requirements)).map(Arc::clone)
    }

    /// Scheme names referenced by a route but absent from the handler table,
    /// each listed once.
    pub fn missing_handlers(&self) -> &[String] {
        &self.missing
    }

    pub fn handlers(&self) -> &SecurityHandlers {
        &self.handlers
    }

    /// Number of distinct chains built.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Scoped;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn req(names: &[&str]) -> SecurityRequirement {
        SecurityRequirement::new(names.iter().copied())
    }

    fn request() -> HandlerRequest {
        HandlerRequest::new(Method::GET, "/pets")
    }

    fn reject(message: &'static str) -> impl Fn(&HandlerRequest) -> Result<(), SecurityFailure> {
        move |_: &HandlerRequest| Err(SecurityFailure::new(message))
    }

    fn accept(_: &HandlerRequest) -> Result<(), SecurityFailure> {
        Ok(())
    }

    #[tokio::test]
    async fn test_first_success_in_second_alternative_wins() {
        let handlers = SecurityHandlers::new()
            .scheme("api_key", reject("bad key"))
            .scheme("skipped", accept)
            .scheme("failing", reject("should not run"));
        let mut builder = SecurityChainBuilder::new(handlers);
        let requirements = [req(&["api_key"]), req(&["skipped", "failing"])];
        let chain = builder.add(&requirements).unwrap();
        assert!(chain.authenticate(&request(), &requirements).await.is_ok());
    }

    #[tokio::test]
    async fn test_all_failures_are_aggregated() {
        let handlers = SecurityHandlers::new()
            .scheme("api_key", reject("bad key"))
            .scheme("oauth", |_: &HandlerRequest| {
                Err(SecurityFailure::new("expired").with_status(403))
            })
            .scheme("basic", reject("no credentials"));
        let mut builder = SecurityChainBuilder::new(handlers);
        let requirements = [req(&["api_key"]), req(&["oauth"]), req(&["basic"])];
        let chain = builder.add(&requirements).unwrap();
        let err = chain.authenticate(&request(), &requirements).await.unwrap_err();
        assert_eq!(err.failed_schemes, vec!["api_key", "oauth", "basic"]);
        assert_eq!(err.causes.len(), 3);
        // last failure that chose a status
        assert_eq!(err.status_code, 403);
        assert_eq!(
            err.message,
            "None of the security schemes (api_key, oauth, basic) successfully authenticated this request."
        );
    }

    #[tokio::test]
    async fn test_default_status_is_401() {
        let handlers = SecurityHandlers::new().scheme("api_key", reject("bad key"));
        let mut builder = SecurityChainBuilder::new(handlers);
        let requirements = [req(&["api_key"])];
        let chain = builder.add(&requirements).unwrap();
        let err = chain.authenticate(&request(), &requirements).await.unwrap_err();
        assert_eq!(err.status_code, 401);
    }

    #[tokio::test]
    async fn test_missing_handler_fails_and_is_listed_once() {
        let mut builder = SecurityChainBuilder::new(SecurityHandlers::new());
        let requirements = [req(&["petstore_auth"])];
        let chain = builder.add(&requirements).unwrap();
        builder.add(&[req(&["petstore_auth"]), req(&["other"])]);
        builder.add(&[req(&["other"]), req(&["petstore_auth"])]);
        assert_eq!(builder.missing_handlers(), ["petstore_auth", "other"]);

        let err = chain.authenticate(&request(), &requirements).await.unwrap_err();
        assert_eq!(err.status_code, 401);
        assert_eq!(
            err.causes[0].message,
            "Missing handler for \"petstore_auth\" validation"
        );
    }

    #[tokio::test]
    async fn test_empty_requirement_object_allows_anonymous() {
        let handlers = SecurityHandlers::new().scheme("api_key", reject("bad key"));
        let mut builder = SecurityChainBuilder::new(handlers);
        let requirements = [req(&["api_key"]), req(&[])];
        let chain = builder.add(&requirements).unwrap();
        assert!(chain.authenticate(&request(), &requirements).await.is_ok());
    }

    #[test]
    fn test_empty_sequence_has_no_chain() {
        let mut builder = SecurityChainBuilder::new(SecurityHandlers::new());
        assert!(builder.add(&[]).is_none());
        assert!(builder.is_empty());
    }

    #[tokio::test]
    async fn test_identical_requirements_share_one_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handlers = SecurityHandlers::new().scheme("api_key", move |_: &HandlerRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let mut builder = SecurityChainBuilder::new(handlers);
        let requirements = [req(&["api_key"])];
        let first = builder.add(&requirements).unwrap();
        let second = builder.add(&[req(&["api_key"])]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.len(), 1);
        assert!(Arc::ptr_eq(&builder.get(&requirements).unwrap(), &first));

        second.authenticate(&request(), &requirements).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.schemes(), vec!["api_key"]);
    }

    #[tokio::test]
    async fn test_scopes_come_from_the_route_not_the_shared_chain() {
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
        let record = Arc::clone(&seen);
        let handlers = SecurityHandlers::new().scheme(
            "oauth",
            Scoped(move |_: &HandlerRequest, scopes: &[String]| {
                record.lock().unwrap().push(scopes.to_vec());
                Ok::<_, SecurityFailure>(())
            }),
        );
        let mut builder = SecurityChainBuilder::new(handlers);
        let read: SecurityRequirement = [("oauth", vec!["read".to_string()])].into_iter().collect();
        let write: SecurityRequirement = [("oauth", vec!["write".to_string()])].into_iter().collect();

        let read_chain = builder.add(&[read.clone()]).unwrap();
        let write_chain = builder.add(&[write.clone()]).unwrap();
        assert!(Arc::ptr_eq(&read_chain, &write_chain));

        read_chain.authenticate(&request(), &[read]).await.unwrap();
        write_chain.authenticate(&request(), &[write]).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![vec!["read"], vec!["write"]]);
    }
}
