//! 错误类型定义
//!
//! 提供 YAFFS2 镜像操作的错误类型。

use core::fmt;

/// 镜像操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 镜像损坏
    Corrupted,
    /// 权限错误
    PermissionDenied,
    /// 对象或文件不存在
    NotFound,
    /// 已存在
    AlreadyExists,
    /// 不支持的操作
    Unsupported,
    /// 无效状态
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 创建带原因的错误
    ///
    /// 原因只写入日志，不保存在错误值中
    pub fn with_cause(kind: ErrorKind, message: &'static str, cause: impl fmt::Debug) -> Self {
        log::debug!("{}: {:?}", message, cause);
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;
        let (kind, message) = match err.kind() {
            IoKind::NotFound => (ErrorKind::NotFound, "File not found"),
            IoKind::PermissionDenied => (ErrorKind::PermissionDenied, "Permission denied"),
            IoKind::AlreadyExists => (ErrorKind::AlreadyExists, "File already exists"),
            IoKind::UnexpectedEof => (ErrorKind::Corrupted, "Unexpected end of file"),
            IoKind::InvalidInput => (ErrorKind::InvalidInput, "Invalid I/O argument"),
            _ => (ErrorKind::Io, "I/O error"),
        };
        Error::with_cause(kind, message, err)
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_accessors() {
        let err = Error::new(ErrorKind::Corrupted, "Bad header");
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert_eq!(err.message(), "Bad header");
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
