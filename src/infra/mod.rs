// Infrastructure layer - 基础设施层
// 负责数据库连接、迁移和监控指标

pub mod database;
pub mod metrics;

pub use database::{mask_database_url, Database};
