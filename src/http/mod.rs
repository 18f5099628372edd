//! HTTP 服务器模块 - 使用 Axum 提供 token 签发与刷新接口
//!
//! 功能包括：
//! - 健康检查
//! - 为已存在的用户签发 token 对
//! - 用旧 token 对换取新 token 对
//! - Prometheus 指标

pub mod routes;
pub mod server;

pub use server::{build_router, HttpServer, HttpServerState};
