//! PostgreSQL read layer over the typed entity store.
//!
//! Entities live in `nodes`/`edges` tables with JSONB attribute documents;
//! this side never writes them. Filters are pushed into SQL so the store
//! does the narrowing instead of the job and graph layers re-checking in
//! memory.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres};

use nexo_core::{EdgeFilter, Entity, EntityStore, Error, NodeFilter, Result};

/// PostgreSQL implementation of [`EntityStore`].
#[derive(Clone)]
pub struct PgEntityStore {
    pool: Pool<Postgres>,
}

impl PgEntityStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn to_entities(rows: Vec<JsonValue>) -> Vec<Entity> {
        rows.into_iter().map(Entity::from).collect()
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn node_collections(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT collection FROM nodes ORDER BY collection")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn edge_collections(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT collection FROM edges ORDER BY collection")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn nodes(&self, collection: &str, filter: &NodeFilter) -> Result<Vec<Entity>> {
        let rows = match filter {
            NodeFilter::All => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM nodes WHERE collection = $1 ORDER BY primary_id",
                )
                .bind(collection)
                .fetch_all(&self.pool)
                .await
            }
            NodeFilter::TaxidIn(taxids) => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM nodes
                     WHERE collection = $1 AND (attrs->>'taxid')::bigint = ANY($2)
                     ORDER BY primary_id",
                )
                .bind(collection)
                .bind(taxids)
                .fetch_all(&self.pool)
                .await
            }
            NodeFilter::TaxidNotIn(taxids) => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM nodes
                     WHERE collection = $1
                       AND (attrs->>'taxid' IS NULL
                            OR NOT ((attrs->>'taxid')::bigint = ANY($2)))
                     ORDER BY primary_id",
                )
                .bind(collection)
                .bind(taxids)
                .fetch_all(&self.pool)
                .await
            }
            NodeFilter::GroupAny(groups) => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM nodes
                     WHERE collection = $1 AND jsonb_exists_any(attrs->'drugGroups', $2)
                     ORDER BY primary_id",
                )
                .bind(collection)
                .bind(groups)
                .fetch_all(&self.pool)
                .await
            }
            NodeFilter::GroupNone(groups) => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM nodes
                     WHERE collection = $1
                       AND (attrs->'drugGroups' IS NULL
                            OR NOT jsonb_exists_any(attrs->'drugGroups', $2))
                     ORDER BY primary_id",
                )
                .bind(collection)
                .bind(groups)
                .fetch_all(&self.pool)
                .await
            }
        };

        Ok(Self::to_entities(rows.map_err(Error::Database)?))
    }

    async fn edges(&self, collection: &str, filter: &EdgeFilter) -> Result<Vec<Entity>> {
        let rows = match filter {
            EdgeFilter::All => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM edges WHERE collection = $1 ORDER BY id",
                )
                .bind(collection)
                .fetch_all(&self.pool)
                .await
            }
            EdgeFilter::EvidenceAny(evidence) => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM edges
                     WHERE collection = $1 AND jsonb_exists_any(attrs->'evidenceTypes', $2)
                     ORDER BY id",
                )
                .bind(collection)
                .bind(evidence)
                .fetch_all(&self.pool)
                .await
            }
            // A single qualifying criterion is sufficient: curated assertion
            // OR score at/above the threshold. assertedBy may be stored as a
            // scalar or a list, so both shapes are checked.
            EdgeFilter::CuratedOrScored {
                source: Some(source),
                min_score,
            } => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM edges
                     WHERE collection = $1
                       AND (jsonb_exists(attrs->'assertedBy', $2)
                            OR attrs->>'assertedBy' = $2
                            OR (attrs->>'score')::float8 >= $3)
                     ORDER BY id",
                )
                .bind(collection)
                .bind(source)
                .bind(min_score)
                .fetch_all(&self.pool)
                .await
            }
            EdgeFilter::CuratedOrScored {
                source: None,
                min_score,
            } => {
                sqlx::query_scalar::<_, JsonValue>(
                    "SELECT attrs FROM edges
                     WHERE collection = $1 AND (attrs->>'score')::float8 >= $2
                     ORDER BY id",
                )
                .bind(collection)
                .bind(min_score)
                .fetch_all(&self.pool)
                .await
            }
        };

        Ok(Self::to_entities(rows.map_err(Error::Database)?))
    }
}
