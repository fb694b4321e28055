//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了通用的分页拉取能力。
//!
//! 按上一页返回的续传令牌依次请求下一页，直到某一页不再返回令牌。
//! 不预设页数上限；失败时把已拉取的部分结果与错误一起交给调用方。

use crate::error::FetchError;
use crate::model::Page;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::future::Future;
use tracing::{debug, warn};

/// 拉取中途失败时的部分结果
#[derive(Debug)]
pub struct PartialFetch<T> {
    /// 失败前已拉取的记录
    pub fetched: Vec<T>,
    /// 失败原因
    pub error: FetchError,
    /// 成功拉取的页数
    pub pages: usize,
}

impl<T> PartialFetch<T> {
    pub fn into_error(self) -> FetchError {
        self.error
    }
}

impl<T> From<PartialFetch<T>> for FetchError {
    fn from(partial: PartialFetch<T>) -> Self {
        partial.error
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// 惰性的分页流
///
/// `query` 接收续传令牌（首页为 None）并返回一页数据。
/// 若提供方返回的令牌与本次请求的令牌相同，视为致命错误，避免死循环。
pub fn pages<T, F, Fut>(query: F) -> impl Stream<Item = Result<Page<T>, FetchError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    stream::try_unfold((query, Cursor::Start), |(mut query, cursor)| async move {
        let token = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = query(token.clone()).await?;
        let next = match page.next_token.as_deref() {
            None | Some("") => Cursor::Done,
            Some(next) if token.as_deref() == Some(next) => {
                warn!("pagination token did not advance: {}", next);
                return Err(FetchError::Fatal(format!(
                    "pagination token `{}` did not advance",
                    next
                )));
            }
            Some(next) => Cursor::Next(next.to_string()),
        };

        Ok(Some((page, (query, next))))
    })
}

/// 惰性的记录流，逐页展开
pub fn records<T, F, Fut>(query: F) -> impl Stream<Item = Result<T, FetchError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    pages(query)
        .map_ok(|page| stream::iter(page.items.into_iter().map(Ok)))
        .try_flatten()
}

/// 拉取全部页
///
/// 成功时返回全部记录；失败时返回 `PartialFetch`，其中包含失败前已拉取的记录
pub async fn fetch_all<T, F, Fut>(query: F) -> Result<Vec<T>, PartialFetch<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    let mut fetched = Vec::new();
    let mut page_count = 0usize;

    let stream = pages(query);
    futures::pin_mut!(stream);

    while let Some(page) = stream.next().await {
        match page {
            Ok(page) => {
                page_count += 1;
                fetched.extend(page.items);
            }
            Err(error) => {
                debug!(
                    "fetch_all aborted after {} pages, {} records: {}",
                    page_count,
                    fetched.len(),
                    error
                );
                return Err(PartialFetch {
                    fetched,
                    error,
                    pages: page_count,
                });
            }
        }
    }

    debug!("fetch_all: pages={}, records={}", page_count, fetched.len());
    Ok(fetched)
}
