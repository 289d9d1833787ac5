//! 报告模块 - 把分析结果整理成给评审委员会阅读的文本

pub mod markdown;
pub mod summary;

pub use markdown::render_markdown;
pub use summary::{Summary, SummaryItem};
