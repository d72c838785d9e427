//! LineSource - 从文件流式读取文本行
//!
//! 逐行读取，不一次性加载整个文件。读到文件末尾时迭代正常结束，
//! 读取失败时产出一次 `Error::Io` 后结束。
//!
//! 非法的 UTF-8 字节不算读取失败：按 U+FFFD 替换后照常交给匹配器。

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// 读缓冲大小，减少系统调用次数
const READ_BUFFER_CAPACITY: usize = 256 * 1024;

/// 行迭代器
///
/// 只能向前读取一遍；需要再次读取时重新创建。
///
/// # 类型参数
///
/// * `R` - 实现了 `Read` trait 的类型
pub struct LineSource<R: Read> {
    reader: BufReader<R>,
    path: PathBuf,
    /// 行的原始字节，跨行复用
    buffer: Vec<u8>,
    finished: bool,
}

impl LineSource<File> {
    /// 打开日志文件
    ///
    /// # 错误
    ///
    /// 文件不存在或无法打开时返回 `Error::Io`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_path(file, path))
    }
}

impl<R: Read> LineSource<R> {
    /// 从任意 reader 创建，错误信息中使用 `<reader>` 作为路径
    pub fn new(reader: R) -> Self {
        Self::with_path(reader, "<reader>")
    }

    fn with_path<P: AsRef<Path>>(reader: R, path: P) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_CAPACITY, reader),
            path: path.as_ref().to_path_buf(),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// 读取下一行并去掉行尾的 `\n` / `\r\n`
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.buffer.clear();
        let bytes_read = self.reader.read_until(b'\n', &mut self.buffer)?;

        if bytes_read == 0 {
            return Ok(None);
        }

        let mut end = self.buffer.len();
        while end > 0 && matches!(self.buffer[end - 1], b'\n' | b'\r') {
            end -= 1;
        }

        Ok(Some(String::from_utf8_lossy(&self.buffer[..end]).into_owned()))
    }
}

impl<R: Read> Iterator for LineSource<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(source) => {
                self.finished = true;
                Some(Err(Error::Io {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}
