// 媒体预览后端库
//
// 本库提供媒体预览图（缩略图 + 时长）的按需生成功能，包括：
// - 缩略图服务（准入去重、并发调度、缓存淘汰、多策略抽帧）
// - API 路由
// - 数据模型

pub mod api;
pub mod models;
pub mod services;
