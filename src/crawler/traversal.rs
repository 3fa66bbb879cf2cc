//! Staged traversal - the multi-hop walk from the seed page
//!
//! Stage `i` fetches every URL in the current frontier, extracts the links
//! of each page and keeps the ones selected by `stages[i]`. The union of
//! those selections is the frontier of stage `i + 1`. Whatever the last
//! stage selects is the crawl result.
//!
//! Failures are contained per page: a page that cannot be fetched or parsed
//! contributes no links and the stage carries on. The seed page is the
//! exception, since nothing can be found without it.

use crate::crawler::{extract_links, run_pool, PageFetcher};
use crate::pattern::SearchStage;
use crate::{DlError, PatternError};
use std::collections::BTreeSet;
use std::sync::Arc;
use url::Url;

/// A URL reached by the traversal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraversalNode {
    pub url: Url,
    /// Number of stages matched on the way here; the seed is at depth 0
    pub depth: usize,
}

/// What happened during one stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Zero-based stage position
    pub index: usize,
    /// The stage's pattern chain, as typed
    pub stage: String,
    /// Pages whose links were examined
    pub pages_fetched: usize,
    /// Pages that could not be fetched or parsed
    pub pages_failed: usize,
    /// Links examined across all fetched pages
    pub links_seen: usize,
    /// Pages whose selection came from a fallback pattern
    pub fallback_pages: usize,
    /// Size of the frontier this stage produced
    pub matched: usize,
}

/// Outcome of a complete traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlResult {
    /// URLs selected by the last stage
    pub urls: BTreeSet<Url>,
    /// One report per stage that ran
    pub stages: Vec<StageReport>,
}

impl CrawlResult {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// The result URLs as traversal nodes at their final depth
    pub fn nodes(&self) -> Vec<TraversalNode> {
        let depth = self.stages.len();
        self.urls
            .iter()
            .map(|url| TraversalNode {
                url: url.clone(),
                depth,
            })
            .collect()
    }
}

/// Links found on one page and the part of them the stage kept
struct PageVisit {
    links_seen: usize,
    matched: BTreeSet<Url>,
    used_fallback: bool,
}

/// Drives pages through the stage pipeline
pub struct Traversal {
    fetcher: Arc<dyn PageFetcher>,
    workers: usize,
}

impl Traversal {
    /// Creates a traversal that fetches up to `workers` pages at once
    pub fn new(fetcher: Arc<dyn PageFetcher>, workers: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
        }
    }

    /// Walks every stage starting from `seed`
    ///
    /// An empty frontier ends the walk early with an empty result; that is
    /// not an error. The only page failure that aborts the run is the seed
    /// fetch.
    pub async fn run(&self, seed: &Url, stages: &[SearchStage]) -> Result<CrawlResult, DlError> {
        if stages.is_empty() {
            return Err(PatternError::Empty.into());
        }

        let mut frontier = vec![TraversalNode {
            url: seed.clone(),
            depth: 0,
        }];
        let mut reports = Vec::with_capacity(stages.len());

        for (index, stage) in stages.iter().enumerate() {
            if frontier.is_empty() {
                tracing::info!(
                    "Nothing left to follow, skipping {} remaining stage(s)",
                    stages.len() - index
                );
                break;
            }

            tracing::info!(
                "Stage {}/{} ({}): fetching {} page(s) with {}",
                index + 1,
                stages.len(),
                stage,
                frontier.len(),
                self.fetcher.name()
            );

            let (next, report) = self.run_stage(index, stage, frontier).await?;

            tracing::info!(
                "Stage {}/{} matched {} URL(s) ({} page(s) failed, {} used a fallback)",
                index + 1,
                stages.len(),
                report.matched,
                report.pages_failed,
                report.fallback_pages
            );

            reports.push(report);
            frontier = next;
        }

        Ok(CrawlResult {
            urls: frontier.into_iter().map(|node| node.url).collect(),
            stages: reports,
        })
    }

    async fn run_stage(
        &self,
        index: usize,
        stage: &SearchStage,
        frontier: Vec<TraversalNode>,
    ) -> Result<(Vec<TraversalNode>, StageReport), DlError> {
        let urls: Vec<Url> = frontier.into_iter().map(|node| node.url).collect();
        let fetcher = Arc::clone(&self.fetcher);
        let shared_stage = Arc::new(stage.clone());

        let visits = run_pool(urls.clone(), self.workers, move |url| {
            let fetcher = Arc::clone(&fetcher);
            let stage = Arc::clone(&shared_stage);
            async move { visit_page(fetcher.as_ref(), &stage, &url).await }
        })
        .await;

        let mut report = StageReport {
            index,
            stage: stage.to_string(),
            ..StageReport::default()
        };
        let mut next = BTreeSet::new();

        for (url, visit) in urls.iter().zip(visits) {
            match visit {
                Some(Ok(visit)) => {
                    report.pages_fetched += 1;
                    report.links_seen += visit.links_seen;
                    if visit.used_fallback {
                        report.fallback_pages += 1;
                    }
                    next.extend(visit.matched);
                }
                Some(Err(DlError::Fetch(e))) if index == 0 => {
                    return Err(DlError::SeedUnreachable {
                        url: url.to_string(),
                        source: e,
                    });
                }
                Some(Err(e)) => {
                    report.pages_failed += 1;
                    tracing::warn!("Skipping {}: {}", url, e);
                }
                None => {
                    report.pages_failed += 1;
                    tracing::warn!("Skipping {}: worker stopped unexpectedly", url);
                }
            }
        }

        report.matched = next.len();
        let nodes = next
            .into_iter()
            .map(|url| TraversalNode {
                url,
                depth: index + 1,
            })
            .collect();

        Ok((nodes, report))
    }
}

async fn visit_page(
    fetcher: &dyn PageFetcher,
    stage: &SearchStage,
    url: &Url,
) -> Result<PageVisit, DlError> {
    let page = fetcher.fetch(url).await?;
    let links = extract_links(&page)?;
    let selection = stage.select_with_pattern(&links);
    let used_fallback = selection.used_fallback();

    if used_fallback {
        if let Some(pattern) = selection.pattern_index.and_then(|i| stage.patterns().get(i)) {
            tracing::debug!(
                "{}: no '{}' links, fell back to '{}' ({} match(es))",
                url,
                stage.primary(),
                pattern,
                selection.urls.len()
            );
        }
    } else {
        tracing::debug!(
            "{}: {} link(s), {} matched",
            url,
            links.len(),
            selection.urls.len()
        );
    }

    Ok(PageVisit {
        links_seen: links.len(),
        matched: selection.urls,
        used_fallback,
    })
}
