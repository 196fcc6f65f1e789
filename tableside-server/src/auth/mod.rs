//! 认证授权模块
//!
//! - [`JwtService`] - 员工 JWT 令牌服务
//! - [`CurrentUser`] - 当前员工上下文
//! - [`TableTokenService`] - 桌台二维码令牌
//! - [`CustomerTable`] - 顾客端桌台凭证提取器

pub mod extractor;
pub mod jwt;
pub mod permissions;
pub mod table_token;

pub use extractor::{CustomerTable, authenticate_staff, authorize_customer};
pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use permissions::{StaffAction, can};
pub use table_token::TableTokenService;
