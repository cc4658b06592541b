//! HypeUp 消息核心服务
//!
//! 聊天消息投递、帖子评分聚合与帖子生命周期（提醒、过期删除）

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod service;
