//! Search index over Postgres: BM25 (ParadeDB) + HNSW cosine (pgvector)
//!
//! One row per graph node. Mutations run on a caller-supplied connection so
//! a whole unit of work (ingest, or an overlay-scoped query) commits or
//! rolls back atomically.

use crate::embedding::{Embedder, EmbeddingError, InputType};
use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use regex::Regex;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS code (
    id SERIAL PRIMARY KEY,
    file TEXT,
    text TEXT,
    nodeid BIGINT,
    graphid TEXT,
    embedding vector(768)
);

CREATE SEQUENCE IF NOT EXISTS code_seq
START WITH 1
INCREMENT BY 1
NO MINVALUE
NO MAXVALUE
CACHE 1;
"#;

const FTS_IDX_SQL: &str = r#"
CALL paradedb.create_bm25(
    index_name => 'code_search_idx',
    table_name => 'code',
    key_field => 'id',
    text_fields => paradedb.field('text', tokenizer => paradedb.tokenizer('source_code')) ||
                   paradedb.field('file', tokenizer => paradedb.tokenizer('source_code')) ||
                   paradedb.field('graphid', tokenizer => paradedb.tokenizer('raw'))
);
"#;

const VECTOR_IDX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS code_embedding_idx ON public.code
USING hnsw (embedding vector_cosine_ops)
"#;

/// Candidate pool size for each side of the hybrid scorer.
const CANDIDATE_POOL: i64 = 5000;
const INSERT_BATCH: usize = 100;

/// One indexed row, minus the embedding (which never leaves the database).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub id: i32,
    pub file: Option<String>,
    pub text: Option<String>,
    pub node_id: i64,
    pub graph_id: String,
}

/// A pending mutation for `bulk_action`.
#[derive(Debug, Clone)]
pub enum SearchAction {
    Create {
        file: String,
        content: String,
        node_id: i64,
    },
    Delete {
        node_id: i64,
    },
}

pub struct SearchStore {
    pool: PgPool,
    embedder: Arc<Embedder>,
}

impl SearchStore {
    pub async fn connect(dsn: &str, embedder: Arc<Embedder>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(dsn)
            .await
            .with_context(|| format!("connecting to {dsn}"))?;
        Ok(SearchStore { pool, embedder })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.context("opening transaction")
    }

    /// Create the table and both indexes. Safe to call on every startup; the
    /// BM25 procedure has no IF NOT EXISTS, so an existing index is treated
    /// as success.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .context("creating code table")?;
        if let Err(e) = sqlx::raw_sql(FTS_IDX_SQL).execute(&self.pool).await {
            if e.to_string().contains("already exists") {
                tracing::debug!("bm25 index already exists");
            } else {
                return Err(e).context("creating bm25 index");
            }
        }
        sqlx::raw_sql(VECTOR_IDX_SQL)
            .execute(&self.pool)
            .await
            .context("creating hnsw index")?;
        Ok(())
    }

    /// Apply creates and deletes for one graph under the caller's
    /// connection. Creates are embedded in batches and inserted 100 rows at
    /// a time, with `progress_cb(done/total)` after each insert.
    pub async fn bulk_action(
        &self,
        graph_id: &str,
        actions: Vec<SearchAction>,
        mut progress_cb: Option<&mut (dyn FnMut(f32) + Send)>,
        conn: &mut PgConnection,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut creates = Vec::new();
        let mut delete_ids = Vec::new();
        for action in actions {
            match action {
                SearchAction::Create { file, content, node_id } => {
                    creates.push((file, content, node_id));
                }
                SearchAction::Delete { node_id } => delete_ids.push(node_id),
            }
        }

        if !creates.is_empty() {
            let contents: Vec<String> = creates.iter().map(|(_, c, _)| c.clone()).collect();
            let embed_stream =
                self.embedder
                    .embed(contents, InputType::RetrievalDocument, cancel.clone());
            let mut chunks = std::pin::pin!(embed_stream.chunks(INSERT_BATCH));

            let total = creates.len();
            let mut inserted = 0usize;
            while let Some(chunk) = chunks.next().await {
                if cancel.is_cancelled() {
                    return Err(EmbeddingError::Cancelled.into());
                }
                let embeddings = chunk
                    .into_iter()
                    .collect::<Result<Vec<Option<Vec<f32>>>, EmbeddingError>>()?;

                let batch = &creates[inserted..inserted + embeddings.len()];
                let mut builder: QueryBuilder<Postgres> =
                    QueryBuilder::new("INSERT INTO code (file, text, nodeid, graphid, embedding) ");
                builder.push_values(batch.iter().zip(&embeddings), |mut b, ((file, content, node_id), embedding)| {
                    b.push_bind(file.clone())
                        .push_bind(content.clone())
                        .push_bind(*node_id)
                        .push_bind(graph_id.to_string())
                        .push_bind(embedding.as_ref().map(vector_literal))
                        .push_unseparated("::vector");
                });
                builder
                    .build()
                    .execute(&mut *conn)
                    .await
                    .context("inserting search rows")?;

                inserted += embeddings.len();
                if let Some(cb) = progress_cb.as_mut() {
                    cb(inserted as f32 / total as f32);
                }
            }
        }

        if !delete_ids.is_empty() {
            sqlx::query("DELETE FROM code WHERE graphid = $1 AND nodeid = ANY($2)")
                .bind(graph_id)
                .bind(&delete_ids)
                .execute(&mut *conn)
                .await
                .context("deleting search rows")?;
        }

        Ok(())
    }

    /// Hybrid BM25 + cosine search, or BM25-only when no query embedding is
    /// available. Both candidate pools are capped at 5000 and the final list
    /// is restricted to `graph_id`.
    pub async fn search(
        &self,
        graph_id: &str,
        query: &str,
        top: i64,
        bm25_weight: f64,
        vector_weight: f64,
        conn: &mut PgConnection,
        cancel: &CancellationToken,
    ) -> Result<Vec<(SearchRow, f32)>> {
        let terms = tokenize_query(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let term_list = terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" ");
        let bm25_query = format!("text:({term_list}) OR file:({term_list})^2");

        let embedding = self
            .embedder
            .embed_one(query.to_string(), InputType::RetrievalQuery, cancel.clone())
            .await?;

        let rows = match embedding {
            Some(embedding) => {
                let similarity_query = format!("'{}' <=> embedding", vector_literal(&embedding));
                sqlx::query(
                    r#"
        WITH scores AS (
            SELECT id, score_hybrid AS score FROM code_search_idx.score_hybrid(
                bm25_query => $1,
                similarity_query => $2,
                bm25_weight => $3,
                similarity_weight => $4,
                bm25_limit_n => $5,
                similarity_limit_n => $5
            )
        )
        SELECT code.id, code.file, code.text, code.nodeid, code.graphid, scores.score
        FROM code
        JOIN scores
            ON code.id = scores.id
        WHERE code.graphid = $6
        ORDER BY score DESC
        LIMIT $7
        "#,
                )
                .bind(&bm25_query)
                .bind(&similarity_query)
                .bind(bm25_weight)
                .bind(vector_weight)
                .bind(CANDIDATE_POOL)
                .bind(graph_id)
                .bind(top)
                .fetch_all(&mut *conn)
                .await
                .context("hybrid search")?
            }
            None => sqlx::query(
                r#"
        WITH scores AS (
            SELECT id, score_bm25 AS score FROM code_search_idx.score_bm25(
                $1,
                limit_rows => $2
            )
        )
        SELECT code.id, code.file, code.text, code.nodeid, code.graphid, scores.score
        FROM code
        JOIN scores
            ON code.id = scores.id
        WHERE code.graphid = $3
        ORDER BY score DESC
        LIMIT $4
        "#,
            )
            .bind(&bm25_query)
            .bind(CANDIDATE_POOL)
            .bind(graph_id)
            .bind(top)
            .fetch_all(&mut *conn)
            .await
            .context("bm25 search")?,
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let node_id: Option<i64> = row.try_get("nodeid")?;
            let Some(node_id) = node_id else {
                bail!("search row without nodeid");
            };
            out.push((
                SearchRow {
                    id: row.try_get("id")?,
                    file: row.try_get("file")?,
                    text: row.try_get("text")?,
                    node_id,
                    graph_id: row.try_get("graphid")?,
                },
                row.try_get::<f32, _>("score")?,
            ));
        }
        Ok(out)
    }

    /// Drop every row belonging to one graph. Runs on the pool; deleting a
    /// feature is not part of any larger transaction.
    pub async fn delete_graph(&self, graph_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM code WHERE graphid = $1")
            .bind(graph_id)
            .execute(&self.pool)
            .await
            .context("deleting graph rows")?;
        Ok(result.rows_affected())
    }
}

/// Split a query on code punctuation and whitespace, dropping empties and
/// escaping backslashes so tokens can be quoted into the BM25 query.
pub fn tokenize_query(query: &str) -> Vec<String> {
    // Same separators the indexer's tokenizer treats as breaks.
    let splitter = Regex::new(r#"[ \n`.()\[\]{}'"/-]+"#).expect("static regex");
    splitter
        .split(query)
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.replace('\\', "\\\\"))
        .collect()
}

/// pgvector text literal: `[v1,v2,...]`.
fn vector_literal(embedding: &Vec<f32>) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}
