//! Windowed pagination
//!
//! Drives cursor-based pagination over the hourly windows of a date
//! range, one page per pull. Pacing bounds the request rate: at least
//! 100ms between pages, and a page cycle never completes in under one
//! second. Timeouts retry with linear backoff; any other request
//! failure ends the current window and moves on — one bad window never
//! aborts the rest of the range.
//!
//! The producer is finite and not restartable mid-window: callers pull
//! batches until `None`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::counters::JobCounters;
use crate::error::{HarvestError, Result};
use crate::normalize::Normalizer;
use crate::retry::RetryPolicy;
use crate::schemas::TalkwalkerRecord;
use crate::sources::TalkwalkerClient;
use crate::windows::TimeWindow;

/// Request pacing: a minimum gap between consecutive page requests,
/// and a floor under one request-and-normalize cycle. Bounds the
/// worst-case request rate against upstream throttling.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub page_gap: Duration,
    pub cycle_floor: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_gap: Duration::from_millis(100),
            cycle_floor: Duration::from_secs(1),
        }
    }
}

/// One completed page of normalized records.
#[derive(Debug)]
pub struct PageBatch {
    pub window: TimeWindow,
    pub records: Vec<TalkwalkerRecord>,
}

struct WindowState {
    window: TimeWindow,
    offset: u64,
    items_seen: u64,
}

/// Pull-based producer of page batches across the window sequence.
pub struct WindowedPaginator<'a> {
    client: &'a TalkwalkerClient,
    windows: VecDeque<TimeWindow>,
    current: Option<WindowState>,
    retry: RetryPolicy,
    pacing: Pacing,
}

impl<'a> WindowedPaginator<'a> {
    pub fn new(
        client: &'a TalkwalkerClient,
        windows: Vec<TimeWindow>,
        max_retries: u32,
    ) -> Self {
        Self::with_pacing(client, windows, max_retries, Pacing::default())
    }

    pub fn with_pacing(
        client: &'a TalkwalkerClient,
        windows: Vec<TimeWindow>,
        max_retries: u32,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            windows: windows.into(),
            current: None,
            retry: RetryPolicy::page_timeout(max_retries),
            pacing,
        }
    }

    /// Produces the next non-empty page batch, or `None` when every
    /// window is exhausted. Batches arrive in window order, then page
    /// order within the window.
    pub async fn next_batch(
        &mut self,
        normalizer: &mut Normalizer,
        counters: &mut JobCounters,
    ) -> Result<Option<PageBatch>> {
        loop {
            let state = match self.current.take() {
                Some(state) => state,
                None => match self.windows.pop_front() {
                    Some(window) => {
                        info!(
                            day = %window.day,
                            hour = window.hour,
                            "Fetching window"
                        );
                        WindowState {
                            window,
                            offset: 0,
                            items_seen: 0,
                        }
                    }
                    None => return Ok(None),
                },
            };

            let cycle_start = Instant::now();
            tokio::time::sleep(self.pacing.page_gap).await;

            let page = match self.fetch_page_with_retry(&state, counters).await {
                Some(page) => page,
                None => {
                    // Window abandoned; its partial batch was already
                    // emitted page by page.
                    self.finish_window(&state, counters);
                    continue;
                }
            };

            let mut records = Vec::with_capacity(page.items.len());
            for item in page.items {
                records.push(normalizer.normalize(item, counters).await);
            }

            let item_count = records.len() as u64;
            counters.total_retrieved += item_count;

            let window = state.window;
            match page.next_offset {
                // The window continues only while pages keep yielding
                // both items and a cursor.
                Some(next_offset) if !records.is_empty() => {
                    self.current = Some(WindowState {
                        window,
                        offset: next_offset,
                        items_seen: state.items_seen + item_count,
                    });
                }
                _ => {
                    let finished = WindowState {
                        items_seen: state.items_seen + item_count,
                        ..state
                    };
                    self.finish_window(&finished, counters);
                }
            }

            // A fast page cycle sleeps out the remainder of the floor.
            let elapsed = cycle_start.elapsed();
            if elapsed < self.pacing.cycle_floor {
                tokio::time::sleep(self.pacing.cycle_floor - elapsed).await;
            }

            if records.is_empty() {
                continue;
            }
            return Ok(Some(PageBatch { window, records }));
        }
    }

    /// Fetches one page, retrying timeouts per policy. Returns `None`
    /// when the page must be treated as empty (retries exhausted or a
    /// non-timeout failure), which ends the window.
    async fn fetch_page_with_retry(
        &self,
        state: &WindowState,
        counters: &mut JobCounters,
    ) -> Option<crate::sources::SearchPage> {
        let filter = state.window.query_filter();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.fetch_results_page(&filter, state.offset).await {
                Ok(page) => return Some(page),
                Err(HarvestError::HttpError(e)) if e.is_timeout() => {
                    warn!(attempt, offset = state.offset, "Request timed out");
                    counters.log_error(format!("Request timed out. Attempt: {}", attempt));
                    match self.retry.delay_after(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return None,
                    }
                }
                Err(e) => {
                    warn!(
                        offset = state.offset,
                        error = %e,
                        "Page request failed, ending window"
                    );
                    counters.log_error(e.to_string());
                    return None;
                }
            }
        }
    }

    fn finish_window(&self, state: &WindowState, counters: &JobCounters) {
        info!(
            day = %state.window.day,
            hour = state.window.hour,
            items = state.items_seen,
            total_retrieved = counters.total_retrieved,
            total_twitter = counters.total_twitter,
            saved = counters.total_saved,
            "Window complete"
        );
    }
}
