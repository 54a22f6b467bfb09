//! Rule checking that external links answer.
//!
//! Every `link`, `image` and `definition` pointing at an external http(s)
//! URL is requested with `HEAD`, falling back to `GET` for servers that
//! reject `HEAD`. Relative paths, fragments and local hosts are skipped.
//!
//! # Configuration
//!
//! - `max_concurrent`: outstanding requests at once (default: 8)
//! - `timeout_secs`: per-request timeout (default: 10)
//! - `min_interval_ms`: minimum spacing between request starts (default: 100)

use reqwest::{Method, Url};
use sip_lint_core::{walk_shared, AstNode, Context, NodeKind, Rule, RuleError, Validators};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info};

/// Rule id for bad-link.
pub const NAME: &str = "bad-link";

const LOCAL_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "[::1]"];

/// Reports external URLs that fail to load.
#[derive(Debug, Clone)]
pub struct BadLink {
    /// Maximum number of requests in flight.
    pub max_concurrent: usize,
    /// Timeout of a single request.
    pub timeout: Duration,
    /// Minimum spacing between request starts.
    pub min_interval: Duration,
}

impl Default for BadLink {
    fn default() -> Self {
        Self::new()
    }
}

impl BadLink {
    /// Creates the rule with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_concurrent: 8,
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_millis(100),
        }
    }

    /// Sets the maximum number of requests in flight.
    #[must_use]
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the minimum spacing between request starts.
    #[must_use]
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }
}

impl Rule for BadLink {
    fn id(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "External links must be reachable"
    }

    fn create(&self, ctx: &Arc<Context>) -> Result<Validators, RuleError> {
        let checker = Arc::new(LinkChecker::new(self)?);
        let ctx = Arc::clone(ctx);

        Ok(Validators::new().on_async("root", move |root| {
            let ctx = Arc::clone(&ctx);
            let checker = Arc::clone(&checker);
            async move {
                let targets: Vec<(String, Url, Arc<AstNode>)> = walk_shared(&root)
                    .into_iter()
                    .filter(|node| {
                        matches!(
                            node.kind(),
                            NodeKind::Link | NodeKind::Image | NodeKind::Definition
                        )
                    })
                    .filter_map(|node| {
                        let raw = node.url()?.to_string();
                        let url = external_url(&raw)?;
                        Some((raw, url, node))
                    })
                    .collect();
                debug!("Checking {} external link(s)", targets.len());

                let mut pending = JoinSet::new();
                for (index, (_, url, _)) in targets.iter().enumerate() {
                    let checker = Arc::clone(&checker);
                    let url = url.clone();
                    pending.spawn(async move { (index, checker.check(&url).await) });
                }

                let mut statuses = vec![None; targets.len()];
                while let Some(joined) = pending.join_next().await {
                    let (index, status) = joined
                        .map_err(|e| RuleError::msg(format!("link check failed: {e}")))?;
                    statuses[index] = Some(status);
                }

                for ((url, _, node), status) in targets.iter().zip(statuses) {
                    match status {
                        Some(LinkStatus::Ok) | None => {}
                        Some(LinkStatus::OkWithGet { head_status }) => info!(
                            "The server responded with {head_status} using HEAD for url \"{url}\" but succeeded using GET. That server is not following http specification."
                        ),
                        Some(LinkStatus::Failed { status }) => ctx.report(
                            node,
                            format!("Url \"{url}\" is invalid, the server responded with {status}"),
                        )?,
                        Some(LinkStatus::Unreachable) => ctx.report(
                            node,
                            format!("Url \"{url}\" is invalid, the server doesn't exist or there's no internet access."),
                        )?,
                    }
                }
                Ok(())
            }
        }))
    }
}

/// Parses `url` if it should be requested.
///
/// Relative paths, fragments, local hosts and non-http schemes yield `None`.
fn external_url(url: &str) -> Option<Url> {
    let Ok(parsed) = Url::parse(url) else {
        debug!("Skipping relative url {url:?}");
        return None;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        debug!("Skipping {} url {url:?}", parsed.scheme());
        return None;
    }
    if parsed
        .host_str()
        .is_some_and(|host| LOCAL_HOSTS.contains(&host))
    {
        return None;
    }
    Some(parsed)
}

fn client_builder(rule: &BadLink) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(rule.timeout)
        .user_agent(concat!("sip-lint/", env!("CARGO_PKG_VERSION")))
}

/// Outcome of checking one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkStatus {
    Ok,
    OkWithGet { head_status: u16 },
    Failed { status: u16 },
    Unreachable,
}

/// Shared request budget for one run.
struct LinkChecker {
    client: reqwest::Client,
    permits: Semaphore,
    min_interval: Duration,
    next_start: Mutex<Instant>,
    cache: Mutex<HashMap<String, Arc<OnceCell<LinkStatus>>>>,
}

impl LinkChecker {
    fn new(rule: &BadLink) -> Result<Self, RuleError> {
        let client = client_builder(rule)
            .build()
            .map_err(|e| RuleError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self::with_client(client, rule))
    }

    fn with_client(client: reqwest::Client, rule: &BadLink) -> Self {
        Self {
            client,
            permits: Semaphore::new(rule.max_concurrent.max(1)),
            min_interval: rule.min_interval,
            next_start: Mutex::new(Instant::now()),
            cache: Mutex::default(),
        }
    }

    /// Checks a URL; identical URLs are only requested once per run.
    async fn check(&self, url: &Url) -> LinkStatus {
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(url.to_string()).or_default())
        };
        cell.get_or_init(|| self.fetch(url)).await.clone()
    }

    async fn fetch(&self, url: &Url) -> LinkStatus {
        let head = match self.request(Method::HEAD, url).await {
            Ok(response) => response.status(),
            Err(e) => {
                debug!("HEAD {url} failed: {e}");
                return LinkStatus::Unreachable;
            }
        };
        if head.is_success() {
            return LinkStatus::Ok;
        }

        debug!("HEAD {url} responded {head}, trying GET");
        match self.request(Method::GET, url).await {
            Ok(response) if response.status().is_success() => LinkStatus::OkWithGet {
                head_status: head.as_u16(),
            },
            Ok(response) => LinkStatus::Failed {
                status: response.status().as_u16(),
            },
            Err(e) => {
                debug!("GET {url} failed: {e}");
                LinkStatus::Unreachable
            }
        }
    }

    async fn request(&self, method: Method, url: &Url) -> reqwest::Result<reqwest::Response> {
        let _permit = self.permits.acquire().await.ok();
        self.pace().await;
        self.client.request(method, url.clone()).send().await
    }

    /// Waits for this request's start slot.
    async fn pace(&self) {
        let start = {
            let mut next = self.next_start.lock().await;
            let start = (*next).max(Instant::now());
            *next = start + self.min_interval;
            start
        };
        tokio::time::sleep_until(start).await;
    }
}
