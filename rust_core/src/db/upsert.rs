//! Chunked batch upserts with per-row fallback.
//!
//! One multi-row `INSERT .. ON CONFLICT .. DO UPDATE` per chunk. Update
//! columns go through `COALESCE(EXCLUDED.col, table.col)` so a partial
//! record from one vendor never nulls out values another vendor wrote.
//! When a whole chunk fails, each of its rows is retried individually so a
//! single bad record cannot sink its neighbours.

use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};
use uuid::Uuid;

/// A row type that knows how to upsert itself.
pub trait UpsertRow: Send + Sync {
    const TABLE: &'static str;
    /// Conflict target column list, e.g. `"external_id, league_id"`.
    const CONFLICT: &'static str;
    /// Insert columns, in bind order.
    const COLUMNS: &'static [&'static str];
    /// Columns refreshed on conflict. Conflict-key columns stay out.
    const UPDATE_COLUMNS: &'static [&'static str];
    /// Whether the statement returns `(external_id, id)` pairs for the
    /// resolution cache. Tables without an external id column opt out.
    const RETURNS_EXTERNAL_ID: bool = false;
    /// Whether the table carries an `updated_at` column to touch on update.
    const SET_UPDATED_AT: bool = true;

    /// Push this row's values, in `COLUMNS` order.
    fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>);

    /// Identifier used in failure logs.
    fn key(&self) -> String;
}

/// Outcome of an upsert pass. `ids` feeds the resolution cache.
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub written: usize,
    pub failed: usize,
    pub ids: Vec<(String, Uuid)>,
}

impl UpsertReport {
    pub fn merge(&mut self, other: UpsertReport) {
        self.written += other.written;
        self.failed += other.failed;
        self.ids.extend(other.ids);
    }
}

fn build_query<R: UpsertRow>(rows: &[R]) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} ({}) ", R::TABLE, R::COLUMNS.join(", ")));
    qb.push_values(rows, |mut b, row| {
        row.bind(&mut b);
    });
    qb.push(format!(" ON CONFLICT ({}) DO UPDATE SET ", R::CONFLICT));
    for (i, col) in R::UPDATE_COLUMNS.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("{col} = COALESCE(EXCLUDED.{col}, {}.{col})", R::TABLE));
    }
    if R::SET_UPDATED_AT {
        qb.push(", updated_at = NOW()");
    }
    if R::RETURNS_EXTERNAL_ID {
        qb.push(" RETURNING external_id, id");
    }
    qb
}

async fn run_chunk<R: UpsertRow>(pool: &PgPool, rows: &[R]) -> Result<Vec<(String, Uuid)>, sqlx::Error> {
    let mut qb = build_query(rows);
    if R::RETURNS_EXTERNAL_ID {
        qb.build_query_as::<(String, Uuid)>().fetch_all(pool).await
    } else {
        qb.build().execute(pool).await?;
        Ok(Vec::new())
    }
}

/// Upsert `rows` in chunks of `batch_size`.
///
/// Never returns an error: chunk failures degrade to per-row statements and
/// individual failures are counted and logged. Later chunks always run.
pub async fn upsert_rows<R: UpsertRow>(pool: &PgPool, rows: &[R], batch_size: usize) -> UpsertReport {
    let mut report = UpsertReport::default();
    if rows.is_empty() {
        return report;
    }
    let batch_size = batch_size.max(1);

    for chunk in rows.chunks(batch_size) {
        match run_chunk(pool, chunk).await {
            Ok(ids) => {
                debug!("upserted {} rows into {}", chunk.len(), R::TABLE);
                report.written += chunk.len();
                report.ids.extend(ids);
            }
            Err(e) => {
                warn!(
                    "batch upsert of {} rows into {} failed ({}), retrying individually",
                    chunk.len(),
                    R::TABLE,
                    e
                );
                for row in chunk {
                    match run_chunk(pool, std::slice::from_ref(row)).await {
                        Ok(ids) => {
                            report.written += 1;
                            report.ids.extend(ids);
                        }
                        Err(e) => {
                            warn!("upsert of {} row {} failed: {}", R::TABLE, row.key(), e);
                            report.failed += 1;
                        }
                    }
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        external_id: String,
        name: String,
        size: Option<i32>,
    }

    impl UpsertRow for Widget {
        const TABLE: &'static str = "widgets";
        const CONFLICT: &'static str = "external_id";
        const COLUMNS: &'static [&'static str] = &["external_id", "name", "size"];
        const UPDATE_COLUMNS: &'static [&'static str] = &["name", "size"];
        const RETURNS_EXTERNAL_ID: bool = true;

        fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
            b.push_bind(self.external_id.clone());
            b.push_bind(self.name.clone());
            b.push_bind(self.size);
        }

        fn key(&self) -> String {
            self.external_id.clone()
        }
    }

    #[test]
    fn test_build_query_shape() {
        let rows = vec![
            Widget {
                external_id: "w1".to_string(),
                name: "one".to_string(),
                size: Some(3),
            },
            Widget {
                external_id: "w2".to_string(),
                name: "two".to_string(),
                size: None,
            },
        ];
        let qb = build_query(&rows);
        let sql = qb.sql();

        assert!(sql.starts_with("INSERT INTO widgets (external_id, name, size) VALUES "));
        assert!(sql.contains("($1, $2, $3), ($4, $5, $6)"));
        assert!(sql.contains("ON CONFLICT (external_id) DO UPDATE SET"));
        assert!(sql.contains("name = COALESCE(EXCLUDED.name, widgets.name)"));
        assert!(sql.contains("size = COALESCE(EXCLUDED.size, widgets.size)"));
        assert!(sql.contains("updated_at = NOW()"));
        assert!(sql.ends_with("RETURNING external_id, id"));
        // Conflict-key column must not be rewritten by the update clause.
        assert!(!sql.contains("external_id = COALESCE"));
    }

    #[test]
    fn test_report_merge() {
        let mut total = UpsertReport {
            written: 3,
            failed: 1,
            ids: vec![("a".to_string(), Uuid::new_v4())],
        };
        total.merge(UpsertReport {
            written: 2,
            failed: 0,
            ids: vec![("b".to_string(), Uuid::new_v4())],
        });
        assert_eq!(total.written, 5);
        assert_eq!(total.failed, 1);
        assert_eq!(total.ids.len(), 2);
    }
}
