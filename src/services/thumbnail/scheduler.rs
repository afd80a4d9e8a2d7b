// 调度状态 - 准入、去重、FIFO 队列与并发计数
//
// 缓存、待处理集合、队列和活动计数是唯一的共享可变状态，
// 由服务层用同一把互斥锁保护，这里只包含纯状态转换，不做任何异步操作。

use crate::models::{ItemKey, ThumbnailRequest, ThumbnailResult};
use crate::services::thumbnail::cache::BoundedCache;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::oneshot;
use uuid::Uuid;

/// 等待结果的调用方
pub(crate) type Waiter = oneshot::Sender<ThumbnailResult>;

/// 已准入、等待执行的任务
#[derive(Debug)]
pub(crate) struct Job {
    pub id: Uuid,
    pub request: ThumbnailRequest,
    /// 入队时的清空代数，清空之后完成的旧任务不再写缓存
    pub epoch: u64,
}

/// 准入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 缓存命中，已直接返回结果
    Hit,
    /// 同键任务正在处理，已加入等待列表
    Joined,
    /// 新任务已入队
    Queued,
    /// 服务已关闭，直接返回空结果
    Rejected,
}

/// 服务运行统计
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceStats {
    pub max_concurrency: usize,
    pub active: usize,
    pub queued: usize,
    pub pending: usize,
    pub cached: usize,
    pub max_cache_entries: usize,
    pub cache_hits: u64,
    pub deduplicated: u64,
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    /// 清空后才完成、结果被丢弃的任务数
    pub jobs_discarded: u64,
    pub process_extraction_available: bool,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cleared_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: u64,
    deduplicated: u64,
    jobs_started: u64,
    jobs_succeeded: u64,
    jobs_failed: u64,
    jobs_discarded: u64,
}

/// 调度状态
#[derive(Debug)]
pub(crate) struct SchedulerState {
    cache: BoundedCache,
    /// 待处理集合：键 → 所有等待该键结果的调用方
    pending: HashMap<ItemKey, Vec<Waiter>>,
    queue: VecDeque<Job>,
    /// 正在执行任务的键（含清空前启动的旧任务），同一键同时只执行一个任务
    running: HashSet<ItemKey>,
    active: usize,
    max_concurrency: usize,
    epoch: u64,
    closed: bool,
    counters: Counters,
    last_cleared_at: Option<DateTime<Utc>>,
}

impl SchedulerState {
    pub fn new(max_concurrency: usize, cache: BoundedCache) -> Self {
        Self {
            cache,
            pending: HashMap::new(),
            queue: VecDeque::new(),
            running: HashSet::new(),
            active: 0,
            max_concurrency: max_concurrency.max(1),
            epoch: 0,
            closed: false,
            counters: Counters::default(),
            last_cleared_at: None,
        }
    }

    /// 准入一个请求
    ///
    /// - 缓存命中：立即把缓存结果发给调用方
    /// - 同键处理中：加入该键的等待列表，不创建第二个任务
    /// - 其他情况：标记为处理中并入队
    pub fn admit(&mut self, request: ThumbnailRequest, waiter: Waiter) -> Admission {
        if self.closed {
            let _ = waiter.send(ThumbnailResult::empty());
            return Admission::Rejected;
        }

        if let Some(hit) = self.cache.get(&request.key) {
            self.counters.cache_hits += 1;
            let _ = waiter.send(hit);
            return Admission::Hit;
        }

        if let Some(waiters) = self.pending.get_mut(&request.key) {
            self.counters.deduplicated += 1;
            waiters.push(waiter);
            return Admission::Joined;
        }

        self.pending.insert(request.key.clone(), vec![waiter]);
        self.queue.push_back(Job {
            id: Uuid::new_v4(),
            request,
            epoch: self.epoch,
        });
        Admission::Queued
    }

    /// 取出当前可以开始执行的任务（按入队顺序），并计入活动数
    ///
    /// 同键的旧任务仍在执行时，该键的新任务留在队列中，后面的任务照常派发
    pub fn take_dispatchable(&mut self) -> Vec<Job> {
        let mut jobs = Vec::new();
        let mut index = 0;
        while self.active < self.max_concurrency && index < self.queue.len() {
            if self.running.contains(&self.queue[index].request.key) {
                index += 1;
                continue;
            }
            let Some(job) = self.queue.remove(index) else {
                break;
            };
            self.running.insert(job.request.key.clone());
            self.active += 1;
            self.counters.jobs_started += 1;
            jobs.push(job);
        }
        jobs
    }

    /// 任务完成（成功或失败均视为正常完成）
    ///
    /// 返回需要通知的调用方；清空之前入队的任务不写缓存，也没有调用方需要通知
    pub fn complete(&mut self, job: &Job, result: &ThumbnailResult) -> Vec<Waiter> {
        self.active = self.active.saturating_sub(1);
        self.running.remove(&job.request.key);

        if job.epoch != self.epoch {
            self.counters.jobs_discarded += 1;
            return Vec::new();
        }

        if result.is_empty() {
            self.counters.jobs_failed += 1;
        } else {
            self.counters.jobs_succeeded += 1;
        }

        let waiters = self.pending.remove(&job.request.key).unwrap_or_default();
        self.cache.put(job.request.key.clone(), result.clone());
        waiters
    }

    /// 清空缓存、待处理集合和队列
    ///
    /// 返回所有尚未得到结果的调用方（排队中和执行中的），由调用者发送空结果
    pub fn clear(&mut self) -> Vec<Waiter> {
        self.epoch += 1;
        self.cache.clear();
        self.queue.clear();
        self.last_cleared_at = Some(Utc::now());
        self.pending.drain().flat_map(|(_, waiters)| waiters).collect()
    }

    /// 关闭准入，之后的请求直接得到空结果
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn cached(&mut self, key: &ItemKey) -> Option<ThumbnailResult> {
        self.cache.get(key)
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn stats(&self, process_extraction_available: bool) -> ServiceStats {
        ServiceStats {
            max_concurrency: self.max_concurrency,
            active: self.active,
            queued: self.queue.len(),
            pending: self.pending.len(),
            cached: self.cache.len(),
            max_cache_entries: self.cache.max_entries(),
            cache_hits: self.counters.cache_hits,
            deduplicated: self.counters.deduplicated,
            jobs_started: self.counters.jobs_started,
            jobs_succeeded: self.counters.jobs_succeeded,
            jobs_failed: self.counters.jobs_failed,
            jobs_discarded: self.counters.jobs_discarded,
            process_extraction_available,
            closed: self.closed,
            last_cleared_at: self.last_cleared_at,
        }
    }
}
