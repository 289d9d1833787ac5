//! 配置文件管理模块

use crate::core::models::AppConfig;
use anyhow::Result;
use std::path::PathBuf;

/// 配置管理器
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// 获取默认配置路径
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "equivalencias", "Equivalencias")
            .map(|d| d.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// 默认数据库路径
    pub fn default_database_path() -> PathBuf {
        directories::ProjectDirs::from("com", "equivalencias", "Equivalencias")
            .map(|d| d.data_dir().join("equivalencias.db"))
            .unwrap_or_else(|| PathBuf::from("equivalencias.db"))
    }

    /// 加载配置，文件不存在时返回默认配置
    ///
    /// 前缀与排除代码会被整理成大写、去重、去空白的形式。
    pub fn load(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: AppConfig = serde_json::from_str(&content)?;
        config.course_prefixes = tidy_codes(&config.course_prefixes);
        config.excluded_codes = tidy_codes(&config.excluded_codes);

        if config.course_prefixes.is_empty() {
            tracing::warn!(
                "配置 {} 中没有可用的课程前缀，成绩单提取将失败",
                self.config_path.display()
            );
        }
        if let Some(path) = config.default_rules_path.as_ref().filter(|p| !p.exists()) {
            tracing::warn!("默认规则文件不存在: {}", path.display());
        }

        tracing::debug!("已加载配置: {}", self.config_path.display());
        Ok(config)
    }

    /// 保存配置
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        // 确保目录存在
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// 重置为默认配置
    pub fn reset(&self) -> Result<()> {
        self.save(&AppConfig::default())
    }
}

/// 去空白、转大写、按首次出现去重
fn tidy_codes(raw: &[String]) -> Vec<String> {
    let mut tidy: Vec<String> = Vec::with_capacity(raw.len());
    for code in raw {
        let code = code.trim().to_uppercase();
        if !code.is_empty() && !tidy.contains(&code) {
            tidy.push(code);
        }
    }
    tidy
}
