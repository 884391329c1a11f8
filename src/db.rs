use anyhow::{Context, Result, anyhow};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, params, params_from_iter};
use std::path::{Path, PathBuf};

use crate::models::{
    Application, ApplicationFilter, ApplicationStats, CompanyCount, LogApplicationRequest,
};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_url TEXT NOT NULL,
                company TEXT,
                title TEXT,
                status TEXT NOT NULL DEFAULT 'applied',
                resume_used TEXT,
                timestamp TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
            CREATE INDEX IF NOT EXISTS idx_applications_created ON applications(created_at);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'autoapply init' first."
            ));
        }
        Ok(())
    }

    // --- Application log ---

    pub fn log_application(&self, req: &LogApplicationRequest) -> Result<i64> {
        let timestamp = req
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Local::now().to_rfc3339());
        let metadata = req
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize application metadata")?;

        self.conn.execute(
            "INSERT INTO applications (job_url, company, title, status, resume_used, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                req.job_url,
                req.company,
                req.title,
                req.status,
                req.resume_used,
                timestamp,
                metadata
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let mut sql = String::from(
            "SELECT id, job_url, company, title, status, resume_used, timestamp, metadata, created_at
             FROM applications
             WHERE 1=1",
        );

        let mut values: Vec<Value> = vec![];

        if let Some(s) = &filter.status {
            sql.push_str(&format!(" AND status = ?{}", values.len() + 1));
            values.push(Value::Text(s.clone()));
        }

        if let Some(company) = &filter.company {
            sql.push_str(&format!(" AND company LIKE ?{}", values.len() + 1));
            values.push(Value::Text(format!("%{}%", company)));
        }

        sql.push_str(&format!(
            " ORDER BY created_at DESC, id DESC LIMIT ?{}",
            values.len() + 1
        ));
        values.push(Value::Integer(filter.limit as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_application)?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list applications")
    }

    pub fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let result = self.conn.query_row(
            "SELECT id, job_url, company, title, status, resume_used, timestamp, metadata, created_at
             FROM applications WHERE id = ?1",
            [id],
            Self::row_to_application,
        );
        match result {
            Ok(app) => Ok(Some(app)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns false when no record had that id.
    pub fn delete_application(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM applications WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    pub fn stats(&self) -> Result<ApplicationStats> {
        let mut stats = ApplicationStats {
            total: self
                .conn
                .query_row("SELECT COUNT(*) FROM applications", [], |row| row.get(0))?,
            ..Default::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM applications GROUP BY status")?;
        for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
            let (status, count) = row?;
            stats.by_status.insert(status, count);
        }

        let mut stmt = self.conn.prepare(
            "SELECT company, COUNT(*) AS count
             FROM applications
             WHERE company IS NOT NULL
             GROUP BY company
             ORDER BY count DESC, company ASC
             LIMIT 10",
        )?;
        for row in stmt.query_map([], |row| {
            Ok(CompanyCount {
                company: row.get(0)?,
                count: row.get(1)?,
            })
        })? {
            stats.by_company.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT DATE(created_at) AS day, COUNT(*)
             FROM applications
             WHERE created_at >= datetime('now', '-30 days')
             GROUP BY DATE(created_at)
             ORDER BY day DESC",
        )?;
        for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
            let (day, count) = row?;
            stats.per_day.insert(day, count);
        }

        Ok(stats)
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        let metadata: Option<String> = row.get(7)?;
        let metadata = metadata
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
                })
            })
            .transpose()?;

        Ok(Application {
            id: row.get(0)?,
            job_url: row.get(1)?,
            company: row.get(2)?,
            title: row.get(3)?,
            status: row.get(4)?,
            resume_used: row.get(5)?,
            timestamp: row.get(6)?,
            metadata,
            created_at: row.get(8)?,
        })
    }
}
