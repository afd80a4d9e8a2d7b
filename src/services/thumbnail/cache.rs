// 缩略图内存缓存
//
// 容量固定的键值缓存，按插入顺序淘汰（近似 LRU，读取不会刷新顺序）。
// 失败结果同样会被缓存，可选地为失败结果设置有效期。

use crate::models::{ItemKey, ThumbnailResult};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    result: ThumbnailResult,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired_failure(&self, failure_ttl: Option<Duration>) -> bool {
        match failure_ttl {
            Some(ttl) => self.result.is_empty() && self.inserted_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// 有界缓存
#[derive(Debug)]
pub struct BoundedCache {
    entries: HashMap<ItemKey, CacheEntry>,
    /// 插入顺序，队首最旧
    order: VecDeque<ItemKey>,
    max_entries: usize,
    failure_ttl: Option<Duration>,
}

impl BoundedCache {
    pub fn new(max_entries: usize, failure_ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::with_capacity(max_entries.min(1024)),
            order: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
            failure_ttl,
        }
    }

    /// 读取缓存；过期的失败结果视为未命中并被移除
    pub fn get(&mut self, key: &ItemKey) -> Option<ThumbnailResult> {
        let expired = self.entries.get(key)?.is_expired_failure(self.failure_ttl);
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.result.clone())
    }

    /// 写入缓存
    ///
    /// 已存在的键直接覆盖并移到最新位置；容量已满时先淘汰最早插入的条目
    pub fn put(&mut self, key: ItemKey, result: ThumbnailResult) {
        if self.max_entries == 0 {
            return;
        }

        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else {
            while self.entries.len() >= self.max_entries {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                        tracing::debug!("缩略图缓存已满，淘汰最早条目: {}", oldest);
                    }
                    None => break,
                }
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn remove(&mut self, key: &ItemKey) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}
