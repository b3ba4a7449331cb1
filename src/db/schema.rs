//! Database schema definitions.
//!
//! Migrations are applied in order; each entry is one schema version.

/// Ordered list of schema migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Mailboxes table
    r#"
CREATE TABLE mailboxes (
    id              TEXT PRIMARY KEY,
    address         TEXT NOT NULL UNIQUE,
    created_at      TEXT NOT NULL,
    expires_at      TEXT NOT NULL,
    last_activity   TEXT NOT NULL,
    CHECK (expires_at > created_at)
);

CREATE INDEX idx_mailboxes_expires_at ON mailboxes(expires_at);
"#,
    // v2: Messages table
    r#"
CREATE TABLE messages (
    id              TEXT PRIMARY KEY,
    mailbox_id      TEXT NOT NULL REFERENCES mailboxes(id) ON DELETE CASCADE,
    from_address    TEXT NOT NULL,
    to_address      TEXT NOT NULL,
    subject         TEXT,
    text_body       TEXT,
    html_body       TEXT,
    raw_message     BLOB NOT NULL,
    received_at     TEXT NOT NULL
);

CREATE INDEX idx_messages_mailbox_id ON messages(mailbox_id);
CREATE INDEX idx_messages_received_at ON messages(received_at);
"#,
    // v3: Attachments table
    r#"
CREATE TABLE attachments (
    id              TEXT PRIMARY KEY,
    message_id      TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    filename        TEXT NOT NULL,
    content_type    TEXT NOT NULL,
    size            INTEGER NOT NULL,
    storage_path    TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_attachments_message_id ON attachments(message_id);
"#,
];
