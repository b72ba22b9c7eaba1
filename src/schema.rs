use crate::Result;
use sqlx::PgPool;

/// DDL for the `documents` table backing [`crate::Store`].
const DOCUMENTS_DDL: &[&str] = &[
    r#"create table if not exists documents (
        collection text not null,
        id text not null,
        doc jsonb not null,
        version int not null default 1,
        created_at timestamptz not null default now(),
        updated_at timestamptz not null default now(),
        primary key (collection, id)
    )"#,
    "create index if not exists documents_doc_gin on documents using gin (doc)",
];

/// Create the `documents` table and its index if they are missing.
pub async fn ensure_documents_table(pool: &PgPool) -> Result<()> {
    for stmt in DOCUMENTS_DDL {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}
