//! 入口侧组件：意图路由与会话表

pub mod intent;
pub mod session;

pub use intent::{Intent, Router};
pub use session::{SessionId, SessionState, SessionTable, DEFAULT_HISTORY_LIMIT, REPEAT_FALLBACK};
