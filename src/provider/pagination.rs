//! # 分页拉取
//!
//! 反复调用单页接口，直到游标耗尽、达到上限或出现错误

use std::future::Future;

use super::types::Page;
use crate::error::{ProviderError, ProviderResult};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 默认每页大小
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// 默认最多拉取条目数
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// 分页拉取结果
///
/// 中途出错时保留已拉取的条目，并在 `interrupted` 中给出中断原因
#[derive(Debug, Clone, PartialEq)]
pub struct Drained<T> {
    pub items: Vec<T>,
    pub interrupted: Option<ProviderError>,
}

impl<T> Drained<T> {
    /// 是否完整拉取
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }

    /// 忽略中断错误，只返回已拉取的条目
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// 严格模式：中途出错则整体失败
    pub fn into_result(self) -> ProviderResult<Vec<T>> {
        match self.interrupted {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

/// 拉取全部分页
///
/// `fetch_page(page_size, cursor)` 每次只拉取一页。结果长度不超过 `max_items`。
pub async fn drain<T, F, Fut>(mut fetch_page: F, page_size: u32, max_items: usize) -> Drained<T>
where
    F: FnMut(u32, Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<Page<T>>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut interrupted = None;
    let mut cursor: Option<String> = None;
    let mut pages = 0_usize;

    if max_items == 0 {
        return Drained { items, interrupted };
    }

    loop {
        match fetch_page(page_size, cursor.take()).await {
            Ok(page) => {
                pages += 1;
                let next = page.cursor().map(str::to_owned);
                items.extend(page.results);

                match next {
                    Some(next) if items.len() < max_items => cursor = Some(next),
                    _ => break,
                }
            }
            Err(err) => {
                lwarn!(
                    "system",
                    LogStage::ExternalApi,
                    LogComponent::Pagination,
                    "drain",
                    &format!(
                        "分页拉取在第 {} 页中断，已拉取 {} 条: {err}",
                        pages + 1,
                        items.len()
                    )
                );
                interrupted = Some(err);
                break;
            }
        }
    }

    items.truncate(max_items);

    ldebug!(
        "system",
        LogStage::ExternalApi,
        LogComponent::Pagination,
        "drain",
        &format!("分页拉取完成: pages={pages}, items={}", items.len())
    );

    Drained { items, interrupted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(start: usize, len: usize, next_id: Option<&str>) -> Page<usize> {
        Page {
            results: (start..start + len).collect(),
            next_id: next_id.map(str::to_owned),
            total: 0,
        }
    }

    #[tokio::test]
    async fn test_drain_stops_at_max_items_when_cursor_never_ends() {
        let calls = AtomicUsize::new(0);
        let drained = drain(
            |limit, _cursor| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, ProviderError>(page(n * limit as usize, limit as usize, Some("more"))) }
            },
            30,
            100,
        )
        .await;

        assert_eq!(drained.items.len(), 100);
        assert_eq!(drained.items, (0..100).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(drained.is_complete());
    }

    #[tokio::test]
    async fn test_drain_concatenates_until_natural_end() {
        let drained = drain(
            |_limit, cursor: Option<String>| async move {
                Ok::<_, ProviderError>(match cursor.as_deref() {
                    None => page(0, 3, Some("p2")),
                    Some("p2") => page(3, 3, Some("p3")),
                    Some(_) => page(6, 2, None),
                })
            },
            3,
            1000,
        )
        .await;

        assert_eq!(drained.into_result().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_drain_passes_cursor_forward() {
        let seen = std::sync::Mutex::new(Vec::new());
        let _ = drain(
            |limit, cursor: Option<String>| {
                seen.lock().unwrap().push((limit, cursor.clone()));
                async move {
                    Ok::<_, ProviderError>(match cursor.as_deref() {
                        None => page(0, 1, Some("c1")),
                        _ => page(1, 1, Some("")),
                    })
                }
            },
            50,
            10,
        )
        .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(50, None), (50, Some("c1".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_drain_keeps_partial_items_on_error() {
        let drained = drain(
            |_limit, cursor: Option<String>| async move {
                match cursor {
                    None => Ok(page(0, 2, Some("p2"))),
                    Some(_) => Err(ProviderError::ServiceUnavailable("down".into())),
                }
            },
            2,
            1000,
        )
        .await;

        assert_eq!(drained.items, vec![0, 1]);
        assert!(!drained.is_complete());
        assert_eq!(drained.clone().into_items(), vec![0, 1]);
        assert!(matches!(
            drained.into_result(),
            Err(ProviderError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_drain_with_zero_max_fetches_nothing() {
        let calls = AtomicUsize::new(0);
        let drained = drain(
            |_limit, _cursor| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProviderError>(page(0, 5, None)) }
            },
            10,
            0,
        )
        .await;
        assert!(drained.items.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
