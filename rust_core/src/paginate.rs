//! Offset/limit pagination over vendor list endpoints.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Knobs for a paginated fetch.
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Page size requested from the vendor.
    pub batch_size: usize,
    /// Stop after collecting this many items, when set.
    pub max_items: Option<usize>,
    /// Extra sleep between pages, on top of the client's own pacing.
    pub page_delay: Duration,
    /// Offset to resume from. Callers that persist progress can restart here.
    pub start_offset: usize,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_items: None,
            page_delay: Duration::from_secs(1),
            start_offset: 0,
        }
    }
}

/// Drain a limit/offset endpoint into a single Vec.
///
/// `fetch_page(limit, offset)` returns one page. Termination: an empty page,
/// or a page shorter than the requested limit (the vendor convention for
/// "that was the last one"), or the `max_items` cap.
pub async fn paginate<T, E, F, Fut>(mut fetch_page: F, opts: &PageOptions) -> Result<Vec<T>, E>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut offset = opts.start_offset;

    loop {
        debug!("fetching page at offset {} (limit {})", offset, opts.batch_size);
        let page = fetch_page(opts.batch_size, offset).await?;
        let page_len = page.len();
        items.extend(page);
        info!("page at offset {}: {} items ({} total)", offset, page_len, items.len());

        if let Some(max) = opts.max_items {
            if items.len() >= max {
                items.truncate(max);
                break;
            }
        }
        // Short or empty page means the dataset is exhausted.
        if page_len < opts.batch_size {
            break;
        }

        offset += page_len;
        if !opts.page_delay.is_zero() {
            tokio::time::sleep(opts.page_delay).await;
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn slice_page(data: &[i32], limit: usize, offset: usize) -> Vec<i32> {
        data.iter().skip(offset).take(limit).copied().collect()
    }

    #[tokio::test]
    async fn test_exact_request_count_for_short_final_page() {
        tokio::time::pause();
        let data: Vec<i32> = (0..5).collect();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let opts = PageOptions {
            batch_size: 2,
            page_delay: Duration::from_millis(0),
            ..Default::default()
        };
        let result: Result<Vec<i32>, ()> = paginate(
            |limit, offset| {
                let calls = calls_clone.clone();
                let data = data.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(slice_page(&data, limit, offset))
                }
            },
            &opts,
        )
        .await;

        // 5 items at page size 2: pages of 2, 2, 1. ceil(5/2) = 3 requests.
        assert_eq!(result.unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_dataset_single_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let opts = PageOptions {
            batch_size: 10,
            page_delay: Duration::from_millis(0),
            ..Default::default()
        };
        let result: Result<Vec<i32>, ()> = paginate(
            |_limit, _offset| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                }
            },
            &opts,
        )
        .await;

        assert!(result.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_items_cap() {
        let data: Vec<i32> = (0..100).collect();
        let opts = PageOptions {
            batch_size: 10,
            max_items: Some(25),
            page_delay: Duration::from_millis(0),
            ..Default::default()
        };
        let result: Result<Vec<i32>, ()> = paginate(
            |limit, offset| {
                let data = data.clone();
                async move { Ok(slice_page(&data, limit, offset)) }
            },
            &opts,
        )
        .await;

        let items = result.unwrap();
        assert_eq!(items.len(), 25);
        assert_eq!(items[24], 24);
    }

    #[tokio::test]
    async fn test_resume_from_start_offset() {
        let data: Vec<i32> = (0..7).collect();
        let opts = PageOptions {
            batch_size: 3,
            page_delay: Duration::from_millis(0),
            start_offset: 3,
            ..Default::default()
        };
        let result: Result<Vec<i32>, ()> = paginate(
            |limit, offset| {
                let data = data.clone();
                async move { Ok(slice_page(&data, limit, offset)) }
            },
            &opts,
        )
        .await;

        assert_eq!(result.unwrap(), vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let opts = PageOptions {
            batch_size: 5,
            page_delay: Duration::from_millis(0),
            ..Default::default()
        };
        let result: Result<Vec<i32>, &'static str> =
            paginate(|_l, _o| async { Err("boom") }, &opts).await;
        assert_eq!(result.unwrap_err(), "boom");
    }
}
