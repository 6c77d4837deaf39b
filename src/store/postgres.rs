use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgListener, postgres::PgPoolOptions, types::Json, PgPool};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    ops, CollectionRef, DocRef, Document, DocumentStore, FieldFilter, SetMode, StoreError,
    Subscription, WriteResult,
};

const CHANNEL: &str = "documents_changed";

type DocRow = (String, Json<Map<String, Value>>, i64);

/// Postgres-backed document store. Documents live in one `jsonb` table and
/// changes are fanned out to subscribers through `LISTEN/NOTIFY`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            warn!(error = %e, "migration failed; continuing");
        }

        Ok(Self { pool })
    }

    async fn mutate<F>(&self, doc: &DocRef, apply: F) -> Result<WriteResult, StoreError>
    where
        F: FnOnce(Option<Document>) -> Result<Map<String, Value>, StoreError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        lock_path(&mut tx, doc).await?;
        let row = sqlx::query_as::<_, DocRow>(
            r#"
            SELECT path, data, version
            FROM documents
            WHERE path = $1
            "#,
        )
        .bind(doc.path())
        .fetch_optional(&mut *tx)
        .await?;

        let current = row.map(into_document);
        let version = match &current {
            Some(d) => d.version + 1,
            None => last_deleted_version(&mut tx, doc).await? + 1,
        };
        let data = apply(current)?;

        sqlx::query(
            r#"
            INSERT INTO documents (path, collection, data, version)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (path) DO UPDATE
               SET data = EXCLUDED.data,
                   version = EXCLUDED.version,
                   updated_at = now()
            "#,
        )
        .bind(doc.path())
        .bind(doc.collection())
        .bind(Json(&data))
        .bind(version as i64)
        .execute(&mut *tx)
        .await?;

        notify(&mut tx, doc).await?;
        tx.commit().await?;
        debug!(path = doc.path(), version, "document written");
        Ok(WriteResult { version })
    }
}

/// Serialise writers of one path for the rest of the transaction. Unlike a
/// row lock this also holds while the document does not exist yet.
async fn lock_path(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    doc: &DocRef,
) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(doc.path())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn last_deleted_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    doc: &DocRef,
) -> Result<u64, StoreError> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM document_tombstones WHERE path = $1")
            .bind(doc.path())
            .fetch_optional(&mut **tx)
            .await?;
    Ok(version.unwrap_or(0) as u64)
}

fn into_document((path, Json(data), version): DocRow) -> Document {
    let id = path.rsplit('/').next().unwrap_or(&path).to_string();
    Document {
        id,
        data,
        version: version as u64,
    }
}

async fn fetch(pool: &PgPool, doc: &DocRef) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query_as::<_, DocRow>(
        r#"SELECT path, data, version FROM documents WHERE path = $1"#,
    )
    .bind(doc.path())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(into_document))
}

async fn notify(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    doc: &DocRef,
) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(CHANNEL)
        .bind(doc.path())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError> {
        fetch(&self.pool, doc).await
    }

    async fn subscribe(&self, doc: &DocRef) -> Result<Subscription, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANNEL).await?;
        let initial = fetch(&self.pool, doc).await?;
        let (tx, rx) = watch::channel(initial);

        let pool = self.pool.clone();
        let doc = doc.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = listener.recv() => match msg {
                        Ok(n) if n.payload() == doc.path() => match fetch(&pool, &doc).await {
                            Ok(current) => {
                                tx.send_replace(current);
                            }
                            Err(e) => warn!(error = %e, path = doc.path(), "refetch after notify failed"),
                        },
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, path = doc.path(), "document listener stopped");
                            break;
                        }
                    },
                }
            }
            debug!(path = doc.path(), "document subscription closed");
        });

        Ok(rx)
    }

    async fn set(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
        mode: SetMode,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::set(current, data, mode)))
            .await
    }

    async fn update(
        &self,
        doc: &DocRef,
        fields: Map<String, Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| ops::update(doc, current, fields))
            .await
    }

    async fn delete(&self, doc: &DocRef) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        lock_path(&mut tx, doc).await?;
        let removed: Option<i64> =
            sqlx::query_scalar("DELETE FROM documents WHERE path = $1 RETURNING version")
                .bind(doc.path())
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(version) = removed {
            sqlx::query(
                r#"
                INSERT INTO document_tombstones (path, version)
                VALUES ($1, $2)
                ON CONFLICT (path) DO UPDATE SET version = EXCLUDED.version
                "#,
            )
            .bind(doc.path())
            .bind(version)
            .execute(&mut *tx)
            .await?;
            notify(&mut tx, doc).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn array_union(
        &self,
        doc: &DocRef,
        field: &str,
        values: Vec<Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::array_union(current, field, values)))
            .await
    }

    async fn array_remove(
        &self,
        doc: &DocRef,
        field: &str,
        values: Vec<Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::array_remove(current, field, values)))
            .await
    }

    async fn array_replace(
        &self,
        doc: &DocRef,
        field: &str,
        old: Value,
        new: Value,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| Ok(ops::array_replace(current, field, &old, new)))
            .await
    }

    async fn create(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| ops::create(doc, current, data))
            .await
    }

    async fn overwrite_field(
        &self,
        doc: &DocRef,
        field: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> Result<WriteResult, StoreError> {
        self.mutate(doc, |current| {
            ops::overwrite_field(doc, current, field, value, expected_version)
        })
        .await
    }

    async fn add(
        &self,
        collection: &CollectionRef,
        data: Map<String, Value>,
    ) -> Result<DocRef, StoreError> {
        let doc = collection.doc(&Uuid::new_v4().to_string());
        self.mutate(&doc, |_| Ok(data)).await?;
        Ok(doc)
    }

    async fn query(
        &self,
        collection: &CollectionRef,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = match filter {
            Some(f) => {
                sqlx::query_as::<_, DocRow>(
                    r#"
                    SELECT path, data, version
                    FROM documents
                    WHERE collection = $1 AND data -> $2 = $3
                    ORDER BY path
                    "#,
                )
                .bind(collection.path())
                .bind(&f.field)
                .bind(Json(&f.equals))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DocRow>(
                    r#"
                    SELECT path, data, version
                    FROM documents
                    WHERE collection = $1
                    ORDER BY path
                    "#,
                )
                .bind(collection.path())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(into_document).collect())
    }
}
