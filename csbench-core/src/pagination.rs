use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

/// One page of a listing together with the total the server reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Outcome of a pagination walk. `error` is set when a page fetch failed; `items` then holds
/// whatever was accumulated before the failure.
#[derive(Debug)]
pub struct Walk<T, E> {
    pub items: Vec<T>,
    pub error: Option<E>,
}

impl<T, E> Walk<T, E> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches pages `1, 2, ...` of size `page_size` until the accumulated count reaches the
/// reported total or a page comes back short.
///
/// Never retries; a failed fetch ends the walk with the partial result.
pub async fn walk<T, E, F, Fut>(label: &str, page_size: u32, mut fetch: F) -> Walk<T, E>
where
    E: Display,
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let page_size = page_size.max(1);
    let mut items: Vec<T> = Vec::new();
    let mut page = 1u32;

    loop {
        let fetched = match fetch(page, page_size).await {
            Ok(p) => p,
            Err(err) => {
                warn!(
                    listing = label,
                    page,
                    collected = items.len(),
                    error = %err,
                    "listing failed; continuing with a partial result"
                );
                return Walk {
                    items,
                    error: Some(err),
                };
            }
        };

        let got = fetched.items.len();
        let total = fetched.total;
        items.extend(fetched.items);
        debug!(listing = label, page, got, total, "fetched page");

        if items.len() as u64 >= total {
            break;
        }
        if got == 0 || got < page_size as usize {
            warn!(
                listing = label,
                collected = items.len(),
                total,
                "listing ended before the reported total"
            );
            break;
        }
        page += 1;
    }

    Walk { items, error: None }
}
