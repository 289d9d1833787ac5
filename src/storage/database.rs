//! 数据库存储模块
//!
//! 使用SQLite缓存导入的规则表，并保存分析历史

use crate::core::models::{AnalysisReport, EquivalenceRule};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;

/// 已缓存的规则表
#[derive(Debug, Clone)]
pub struct StoredRuleTable {
    pub institution: String,
    pub fingerprint: String,
    pub imported_at: DateTime<Utc>,
    pub rules: Vec<EquivalenceRule>,
}

/// 数据库管理器
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 打开或创建数据库
    pub fn open(path: &Path) -> Result<Self> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_tables()?;
        Ok(db)
    }

    /// 内存数据库
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_tables()?;
        Ok(db)
    }

    /// 初始化表结构
    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- 规则表缓存（每个机构一份）
            CREATE TABLE IF NOT EXISTS rule_tables (
                institution TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                rules_json TEXT NOT NULL,
                imported_at TEXT NOT NULL
            );

            -- 分析历史
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                institution TEXT NOT NULL,
                strategy TEXT NOT NULL,
                created_at TEXT NOT NULL,
                report_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_created ON analyses(created_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// 规则表指纹：按加载顺序拼接规则ID后取SHA-256
    pub fn fingerprint(rules: &[EquivalenceRule]) -> String {
        let mut hasher = Sha256::new();
        for rule in rules {
            hasher.update(rule.id.as_bytes());
            hasher.update(rule.priority.to_be_bytes());
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }

    /// 保存规则表，返回是否有变化
    pub fn save_rule_table(&self, institution: &str, rules: &[EquivalenceRule]) -> Result<bool> {
        let fingerprint = Self::fingerprint(rules);
        if self.rule_table_fingerprint(institution)?.as_deref() == Some(fingerprint.as_str()) {
            tracing::debug!("机构 '{}' 的规则表未变化", institution);
            return Ok(false);
        }

        let rules_json = serde_json::to_string(rules)?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO rule_tables (institution, fingerprint, rules_json, imported_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![institution, fingerprint, rules_json, Utc::now().to_rfc3339()],
        )?;

        tracing::info!("已缓存机构 '{}' 的 {} 条规则", institution, rules.len());
        Ok(true)
    }

    fn rule_table_fingerprint(&self, institution: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT fingerprint FROM rule_tables WHERE institution = ?1",
            params![institution],
            |row| row.get(0),
        );

        match result {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取缓存的规则表
    pub fn load_rule_table(&self, institution: &str) -> Result<Option<StoredRuleTable>> {
        let result = self.conn.query_row(
            r#"
            SELECT institution, fingerprint, rules_json, imported_at
            FROM rule_tables
            WHERE institution = ?1
            "#,
            params![institution],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );

        let (institution, fingerprint, rules_json, imported_at) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(StoredRuleTable {
            institution,
            fingerprint,
            imported_at: parse_timestamp(&imported_at),
            rules: serde_json::from_str(&rules_json)?,
        }))
    }

    /// 已缓存的机构（按名称排序）
    pub fn list_institutions(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT institution FROM rule_tables ORDER BY institution")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// 保存分析报告
    pub fn save_analysis(&self, report: &AnalysisReport) -> Result<()> {
        let report_json = serde_json::to_string(report)?;

        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO analyses (id, institution, strategy, created_at, report_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                report.id,
                report.institution,
                report.strategy().to_string(),
                report.created_at.to_rfc3339(),
                report_json,
            ],
        )?;
        Ok(())
    }

    /// 加载最近的分析报告
    pub fn load_recent_analyses(&self, limit: usize) -> Result<Vec<AnalysisReport>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT report_json
            FROM analyses
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;

        let mut reports = Vec::new();
        for json in rows {
            match serde_json::from_str(&json?) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!("跳过无法解析的分析记录: {}", e),
            }
        }
        Ok(reports)
    }

    /// 清理旧的分析记录
    pub fn cleanup_old_analyses(&self, keep_count: usize) -> Result<usize> {
        let affected = self.conn.execute(
            r#"
            DELETE FROM analyses
            WHERE id NOT IN (
                SELECT id FROM analyses
                ORDER BY created_at DESC
                LIMIT ?1
            )
            "#,
            params![keep_count],
        )?;
        Ok(affected)
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
