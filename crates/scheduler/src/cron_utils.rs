use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use workq_core::errors::{Result, WorkqError};

/// 5段CRON表达式（分 时 日 月 周）的解析与调度工具
///
/// `cron` crate 要求秒字段，这里在编译时统一补上 `0`，对外只接受
/// 标准5段格式。
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let fields = expression.split_whitespace().count();
        if fields != 5 {
            return Err(WorkqError::InvalidCron {
                expr: expression.to_string(),
                message: format!("需要5段（分 时 日 月 周），实际 {fields} 段"),
            });
        }

        let with_seconds = format!("0 {expression}");
        let schedule = Schedule::from_str(&with_seconds).map_err(|e| WorkqError::InvalidCron {
            expr: expression.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// 校验表达式是否合法
    pub fn validate(expression: &str) -> Result<()> {
        Self::parse(expression).map(|_| ())
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// `from` 之后的下一次执行时间
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// `from` 之后的若干次执行时间
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 距离下一次执行还有多久
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.next_after(now).map(|next| next - now)
    }
}
