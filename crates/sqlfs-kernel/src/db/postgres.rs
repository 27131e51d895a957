//! PostgreSQL dialect.

use crate::db::dialect::{Dialect, DialectKind, InodeAllocation, Placeholders};

// The identity starts at 2; inode 1 is seeded explicitly.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS metadata (
        inode BIGINT GENERATED BY DEFAULT AS IDENTITY (START WITH 2) PRIMARY KEY,
        uid BIGINT NOT NULL,
        gid BIGINT NOT NULL,
        mode BIGINT NOT NULL,
        type BIGINT NOT NULL,
        ctime BIGINT NOT NULL,
        atime BIGINT NOT NULL,
        mtime BIGINT NOT NULL,
        name TEXT NOT NULL,
        size BIGINT NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_metadata_name ON metadata(name)",
    "CREATE TABLE IF NOT EXISTS parent (
        pinode BIGINT NOT NULL,
        inode BIGINT NOT NULL UNIQUE
    )",
    "CREATE INDEX IF NOT EXISTS idx_parent_pinode ON parent(pinode, inode)",
    "CREATE TABLE IF NOT EXISTS filedata (
        inode BIGINT PRIMARY KEY,
        data BYTEA NOT NULL
    )",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn schema(&self) -> &'static [&'static str] {
        SCHEMA
    }

    fn seed_root_sql(&self) -> &'static str {
        "INSERT INTO metadata (inode, uid, gid, mode, type, ctime, atime, mtime, name, size)
         VALUES (1, $1, $2, $3, $4, $5, $6, $7, '', 0)
         ON CONFLICT (inode) DO NOTHING"
    }

    fn placeholders(&self) -> Placeholders {
        Placeholders::Dollar
    }

    fn allocation(&self) -> InodeAllocation {
        InodeAllocation::Returning
    }
}
