use crate::Database;
use crate::models::{MessageRow, ReplyRow, ThreadRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, ffi};

pub struct NewUser<'a> {
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub time: &'a str,
}

pub struct NewMessage<'a> {
    pub user_id: Option<i64>,
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub time: &'a str,
    pub message: &'a str,
}

/// One updatable profile column. The column name comes from this fixed set,
/// never from request input.
#[derive(Debug, Clone, Copy)]
pub enum ProfileField<'a> {
    Username(&'a str),
    Description(&'a str),
    Email(&'a str),
    NotifyEmail(bool),
}

impl ProfileField<'_> {
    pub fn column(&self) -> &'static str {
        match self {
            ProfileField::Username(_) => "username",
            ProfileField::Description(_) => "description",
            ProfileField::Email(_) => "email",
            ProfileField::NotifyEmail(_) => "notify_email",
        }
    }
}

const USER_COLUMNS: &str =
    "id, ip, user_agent, username, password, time, description, email, notify_email";

const THREAD_COLUMNS: &str =
    "m.id, m.message, m.time, r.id, r.reply, r.time, r.likes";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (ip, user_agent, username, password, time) VALUES (?1, ?2, ?3, ?4, ?5)",
                (user.ip, user.user_agent, user.username, user.password_hash, user.time),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
        })
    }

    pub fn update_user_field(&self, user_id: i64, field: ProfileField<'_>) -> Result<()> {
        self.with_conn(|conn| {
            let sql = format!("UPDATE users SET {} = ?1 WHERE id = ?2", field.column());
            match field {
                ProfileField::Username(v) | ProfileField::Description(v) | ProfileField::Email(v) => {
                    conn.execute(&sql, rusqlite::params![v, user_id])?
                }
                ProfileField::NotifyEmail(v) => conn.execute(&sql, rusqlite::params![v, user_id])?,
            };
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (user_id, ip, user_agent, time, message) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![msg.user_id, msg.ip, msg.user_agent, msg.time, msg.message],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The message with `message_id`, only if it belongs to `user_id`.
    pub fn get_message_for_user(&self, message_id: i64, user_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, user_id, ip, user_agent, time, message
                     FROM messages WHERE id = ?1 AND user_id = ?2",
                    [message_id, user_id],
                    message_from_row,
                )
                .optional()?)
        })
    }

    /// Global-inbox messages, oldest first.
    pub fn get_global_messages(&self) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, ip, user_agent, time, message
                 FROM messages WHERE user_id IS NULL ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every message sent to `user_id` with its reply, if any. Oldest first.
    pub fn get_threads_for_user(&self, user_id: i64) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            query_threads(
                conn,
                &format!(
                    "SELECT {THREAD_COLUMNS}
                     FROM messages m
                     LEFT JOIN replies r ON r.message_id = m.id
                     WHERE m.user_id = ?1
                     ORDER BY m.id ASC"
                ),
                user_id,
            )
        })
    }

    /// Every reply `user_id` has written, with the message it answers.
    /// Oldest reply first.
    pub fn get_replies_for_user(&self, user_id: i64) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            query_threads(
                conn,
                &format!(
                    "SELECT {THREAD_COLUMNS}
                     FROM replies r
                     JOIN messages m ON r.message_id = m.id
                     WHERE m.user_id = ?1
                     ORDER BY r.id ASC"
                ),
                user_id,
            )
        })
    }

    // -- Replies --

    pub fn get_reply_for_message(&self, message_id: i64) -> Result<Option<ReplyRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, time, message_id, reply, likes FROM replies WHERE message_id = ?1",
                    [message_id],
                    reply_from_row,
                )
                .optional()?)
        })
    }

    pub fn insert_reply(&self, message_id: i64, reply: &str, time: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO replies (time, message_id, reply) VALUES (?1, ?2, ?3)",
                rusqlite::params![time, message_id, reply],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Add `delta` to a reply's likes. Returns the number of rows touched,
    /// which is 0 for an unknown id.
    pub fn adjust_likes(&self, reply_id: i64, delta: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE replies SET likes = likes + ?1 WHERE id = ?2",
                [delta, reply_id],
            )?;
            Ok(changed)
        })
    }
}

/// True when `err` is a SQLite UNIQUE constraint failure.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        ip: row.get(1)?,
        user_agent: row.get(2)?,
        username: row.get(3)?,
        password: row.get(4)?,
        time: row.get(5)?,
        description: row.get(6)?,
        email: row.get(7)?,
        notify_email: row.get(8)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        ip: row.get(2)?,
        user_agent: row.get(3)?,
        time: row.get(4)?,
        message: row.get(5)?,
    })
}

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        time: row.get(1)?,
        message_id: row.get(2)?,
        reply: row.get(3)?,
        likes: row.get(4)?,
    })
}

fn query_threads(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<ThreadRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(ThreadRow {
                message_id: row.get(0)?,
                message: row.get(1)?,
                message_time: row.get(2)?,
                reply_id: row.get(3)?,
                reply: row.get(4)?,
                reply_time: row.get(5)?,
                likes: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: &str = "2024-01-01T00:00:00.000Z";

    fn db_with_user(username: &str) -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .create_user(&NewUser {
                ip: Some("127.0.0.1"),
                user_agent: Some("test"),
                username,
                password_hash: "hash",
                time: T0,
            })
            .unwrap();
        (db, id)
    }

    fn send(db: &Database, user_id: Option<i64>, text: &str) -> i64 {
        db.insert_message(&NewMessage {
            user_id,
            ip: None,
            user_agent: None,
            time: T0,
            message: text,
        })
        .unwrap()
    }

    #[test]
    fn user_lookup_is_case_sensitive() {
        let (db, id) = db_with_user("Alice");
        let user = db.get_user_by_username("Alice").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(!user.notify_email);
        assert!(user.email.is_none());
        assert!(db.get_user_by_username("alice").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_hits_unique_constraint() {
        let (db, _) = db_with_user("alice");
        let err = db
            .create_user(&NewUser {
                ip: None,
                user_agent: None,
                username: "alice",
                password_hash: "other",
                time: T0,
            })
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn update_touches_only_the_named_column() {
        let (db, id) = db_with_user("alice");
        db.update_user_field(id, ProfileField::Description("hi")).unwrap();
        db.update_user_field(id, ProfileField::NotifyEmail(true)).unwrap();

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.description.as_deref(), Some("hi"));
        assert!(user.notify_email);
        assert!(user.email.is_none());
    }

    #[test]
    fn threads_include_unanswered_messages() {
        let (db, id) = db_with_user("alice");
        let first = send(&db, Some(id), "first");
        send(&db, Some(id), "second");
        send(&db, None, "global");
        db.insert_reply(first, "answer", T0).unwrap();

        let threads = db.get_threads_for_user(id).unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].message, "first");
        assert_eq!(threads[0].reply.as_deref(), Some("answer"));
        assert_eq!(threads[0].likes, Some(0));
        assert_eq!(threads[1].message, "second");
        assert!(threads[1].reply.is_none());
        assert!(threads[1].reply_id.is_none());

        let replies = db.get_replies_for_user(id).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message_id, first);
    }

    #[test]
    fn message_lookup_is_scoped_to_owner() {
        let (db, alice) = db_with_user("alice");
        let bob = db
            .create_user(&NewUser {
                ip: None,
                user_agent: None,
                username: "bob",
                password_hash: "h",
                time: T0,
            })
            .unwrap();
        let msg = send(&db, Some(alice), "for alice");

        assert!(db.get_message_for_user(msg, alice).unwrap().is_some());
        assert!(db.get_message_for_user(msg, bob).unwrap().is_none());
    }

    #[test]
    fn second_reply_hits_unique_constraint() {
        let (db, id) = db_with_user("alice");
        let msg = send(&db, Some(id), "m");
        db.insert_reply(msg, "one", T0).unwrap();
        let err = db.insert_reply(msg, "two", T0).unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(db.get_reply_for_message(msg).unwrap().unwrap().reply, "one");
    }

    #[test]
    fn likes_can_go_negative_and_missing_ids_are_noops() {
        let (db, id) = db_with_user("alice");
        let msg = send(&db, Some(id), "m");
        let reply = db.insert_reply(msg, "r", T0).unwrap();

        assert_eq!(db.adjust_likes(reply, -1).unwrap(), 1);
        assert_eq!(db.adjust_likes(reply, -1).unwrap(), 1);
        assert_eq!(db.get_reply_for_message(msg).unwrap().unwrap().likes, -2);

        assert_eq!(db.adjust_likes(reply + 100, 1).unwrap(), 0);
    }

    #[test]
    fn global_messages_exclude_user_inboxes() {
        let (db, id) = db_with_user("alice");
        send(&db, Some(id), "private");
        send(&db, None, "one");
        send(&db, None, "two");

        let global = db.get_global_messages().unwrap();
        let texts: Vec<_> = global.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, ["one", "two"]);
        assert!(global.iter().all(|m| m.user_id.is_none()));
    }
}
