//! 启动 / 运行期错误
//!
//! Request handlers answer with [`AppError`](shared::error::AppError); this
//! type covers server bootstrap and the serve loop.

use thiserror::Error;

use crate::auth::JwtError;
use crate::orders::ManagerError;
use crate::orders::storage::StorageError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("种子数据错误: {0}")]
    Seed(String),

    #[error("JWT 配置错误: {0}")]
    Jwt(#[from] JwtError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ManagerError> for ServerError {
    fn from(err: ManagerError) -> Self {
        ServerError::Seed(err.to_string())
    }
}

/// 启动流程的 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
