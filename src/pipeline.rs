//! 流水线协调器
//!
//! 单生产者 / 单消费者：
//! - 生产者在调用线程上逐行读取、转换，并把记录累积为批次；
//! - 消费者是独立的写入线程，独占数据库连接，按顺序逐批提交事务；
//! - 两者之间只通过有界队列传递批次，队列满时生产者阻塞（背压）。
//!
//! 状态变化：`Idle → Streaming → Draining → Done`，任何阶段出现无法恢复的错误时进入 `Failed`。
//! 已提交的批次不会因为后续失败而回滚。

use crate::config::{Config, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_DEPTH};
use crate::database::{BatchWriter, Database, PersistenceHandle, WriterStats};
use crate::error::{Error, Result, StorageError};
use crate::reader::LineSource;
use crate::record::Record;
use crate::transform::Transformer;
use std::fmt;
use std::mem;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// 单个批次预分配容量的上限
const MAX_BATCH_PREALLOC: usize = 16 * 1024;

/// 每读取这么多行检查一次写入线程是否已提前退出
const WRITER_CHECK_INTERVAL: u64 = 4096;

/// 流水线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Streaming,
    Draining,
    Done,
    Failed,
}

/// 流水线参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// 每批包含的记录数（按被接受的行计数）
    pub batch_size: usize,
    /// 等待写入的批次数上限
    pub queue_depth: usize,
    /// 不输出阶段性进度
    pub silent: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            silent: false,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            queue_depth: config.queue_depth,
            silent: config.silent,
        }
    }
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunSummary {
    /// 读取的行数
    pub lines_processed: u64,
    /// 转换成功的行数
    pub rows_accepted: u64,
    /// 提交的事务数
    pub batches_committed: usize,
    /// 写入数据库的行数
    pub rows_written: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// 被拒绝的行数
    pub fn rows_rejected(&self) -> u64 {
        self.lines_processed - self.rows_accepted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} lines, added {} rows",
            self.lines_processed, self.rows_accepted
        )
    }
}

/// 流水线协调器
pub struct Pipeline {
    transformer: Transformer,
    options: PipelineOptions,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(transformer: Transformer, options: PipelineOptions) -> Self {
        Self {
            transformer,
            options: PipelineOptions {
                batch_size: options.batch_size.max(1),
                queue_depth: options.queue_depth.max(1),
                ..options
            },
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }

    /// 运行流水线直到输入耗尽或出现错误
    ///
    /// 只有在写入线程结束之后才返回。
    ///
    /// # 参数
    ///
    /// * `lines` - 行来源，读取失败以 `Err` 形式出现
    /// * `handle` - 持久化目标，所有权转移给写入线程
    pub fn run<I, P>(&mut self, lines: I, handle: P) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<String>>,
        P: PersistenceHandle + 'static,
    {
        let started = Instant::now();
        let batch_size = self.options.batch_size;
        let capacity = batch_size.min(MAX_BATCH_PREALLOC);

        let (sender, receiver) = mpsc::sync_channel::<Vec<Record>>(self.options.queue_depth);
        let writer = thread::Builder::new()
            .name("logfiler-writer".into())
            .spawn(move || write_batches(receiver, handle))
            .map_err(Error::Spawn)?;

        self.transition(PipelineState::Streaming);

        let mut batch: Vec<Record> = Vec::with_capacity(capacity);
        let mut lines_processed: u64 = 0;
        let mut rows_accepted: u64 = 0;
        let mut read_failure: Option<Error> = None;
        let mut writer_stopped = false;
        let mut window_start = Instant::now();
        let mut window_lines: u64 = 0;

        for line in lines {
            // 写入线程只会因错误提前退出，此时不必再读完一个批次
            if lines_processed > 0
                && lines_processed % WRITER_CHECK_INTERVAL == 0
                && writer.is_finished()
            {
                writer_stopped = true;
                break;
            }

            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    read_failure = Some(err);
                    break;
                }
            };
            lines_processed += 1;
            window_lines += 1;

            let Some(record) = self.transformer.transform_line(&line) else {
                continue;
            };
            batch.push(record);
            rows_accepted += 1;

            if batch.len() >= batch_size {
                if !self.options.silent {
                    let per_line = window_start.elapsed().as_secs_f64() * 1000.0 / window_lines as f64;
                    info!(
                        "Processed {} lines, added {} rows - Time per line: {:.6} ms",
                        lines_processed, rows_accepted, per_line
                    );
                }
                window_start = Instant::now();
                window_lines = 0;

                let full = mem::replace(&mut batch, Vec::with_capacity(capacity));
                if sender.send(full).is_err() {
                    // 写入线程已因错误退出
                    writer_stopped = true;
                    break;
                }
            }
        }

        if read_failure.is_none() && !writer_stopped {
            self.transition(PipelineState::Draining);
            // 剩余批次（可能为空）也照常交出；发送失败时写入线程的错误由 join 带回
            let _ = sender.send(batch);
        }
        drop(sender);

        let written = writer.join().map_err(|_| Error::WriterPanicked);

        let outcome = match (read_failure, written) {
            (Some(err), written) => {
                if let Ok(Err(storage)) = written {
                    error!(error = %storage, "database writer failed after read error");
                }
                Err(err)
            }
            (None, Err(panicked)) => Err(panicked),
            (None, Ok(Err(storage))) => Err(Error::Storage(storage)),
            (None, Ok(Ok(stats))) => {
                Ok(RunSummary {
                    lines_processed,
                    rows_accepted,
                    batches_committed: stats.batches,
                    rows_written: stats.rows,
                    elapsed: started.elapsed(),
                })
            }
        };

        match &outcome {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                info!(
                    lines = summary.lines_processed,
                    rows = summary.rows_accepted,
                    batches = summary.batches_committed,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "run complete"
                );
            }
            Err(err) => {
                self.transition(PipelineState::Failed);
                error!(error = %err, lines = lines_processed, "run aborted");
            }
        }

        outcome
    }
}

/// 写入线程主体：按接收顺序提交每个批次，遇到错误立即退出。
///
/// 退出时丢弃接收端，生产者随后的发送会失败并停止读取。
fn write_batches<P: PersistenceHandle>(
    receiver: Receiver<Vec<Record>>,
    handle: P,
) -> std::result::Result<WriterStats, StorageError> {
    let mut writer = BatchWriter::new(handle);
    for batch in receiver {
        writer.submit(batch)?;
    }
    writer.finish()
}

/// 按配置完成一次完整的导入：编译模板 → 打开日志 → 重建数据库 → 运行流水线
///
/// 模板错误在产生任何副作用之前返回。
pub fn run(config: &Config) -> Result<RunSummary> {
    let transformer = Transformer::from_pattern(&config.pattern, config.verbose)?;
    let lines = LineSource::open(&config.file_path)?;
    let database = Database::open(config.database_path(), true)?;

    let mut pipeline = Pipeline::new(transformer, PipelineOptions::from(config));
    pipeline.run(lines, database)
}
