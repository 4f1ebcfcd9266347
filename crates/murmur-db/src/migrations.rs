use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, messages, replies)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                ip          TEXT,
                user_agent  TEXT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                time        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER REFERENCES users(id),
                ip          TEXT,
                user_agent  TEXT,
                time        TEXT NOT NULL,
                message     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_user
                ON messages(user_id);

            CREATE TABLE IF NOT EXISTS replies (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                time        TEXT NOT NULL,
                message_id  INTEGER NOT NULL UNIQUE REFERENCES messages(id),
                reply       TEXT NOT NULL,
                likes       INTEGER NOT NULL DEFAULT 0
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (profile columns)");
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN description TEXT;
            ALTER TABLE users ADD COLUMN email TEXT;
            ALTER TABLE users ADD COLUMN notify_email INTEGER NOT NULL DEFAULT 0;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
