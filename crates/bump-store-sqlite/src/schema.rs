//! SQL schema for the bump SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Timestamps are fixed-width RFC 3339 UTC strings (microsecond precision,
//! `Z` suffix), so string comparison orders them chronologically.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Emails presented by authenticated users; used to address pairing requests.
CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    email       TEXT NOT NULL,
    email_lower TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Never hard-deleted.
CREATE TABLE IF NOT EXISTS pregnancies (
    pregnancy_id         TEXT PRIMARY KEY,
    owner_id             TEXT NOT NULL UNIQUE,
    partner_id           TEXT,
    partner_status       TEXT NOT NULL DEFAULT 'none',  -- none | pending | approved | denied
    partner_permission   TEXT,                          -- read | write
    partner_name         TEXT,
    coowner_id           TEXT,
    coowner_name         TEXT,
    display_partner_card INTEGER NOT NULL DEFAULT 1,
    due_date             TEXT,                          -- YYYY-MM-DD
    baby_name            TEXT,
    mom_name             TEXT,
    outcome              TEXT,
    outcome_date         TEXT,
    archived             INTEGER NOT NULL DEFAULT 0,
    archived_at          TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- One row per (pregnancy, user); removal is soft and re-redemption revives.
CREATE TABLE IF NOT EXISTS supporters (
    supporter_id         TEXT PRIMARY KEY,
    pregnancy_id         TEXT NOT NULL REFERENCES pregnancies(pregnancy_id),
    user_id              TEXT NOT NULL,
    display_name         TEXT,
    permission           TEXT NOT NULL DEFAULT 'read',
    joined_at            TEXT NOT NULL,
    invited_via_code     TEXT,
    removed_at           TEXT,
    display_partner_card INTEGER NOT NULL DEFAULT 1,
    UNIQUE (pregnancy_id, user_id)
);

-- Only the argon2 hash of a code is stored.
CREATE TABLE IF NOT EXISTS invite_codes (
    code_id      TEXT PRIMARY KEY,
    pregnancy_id TEXT NOT NULL REFERENCES pregnancies(pregnancy_id),
    code_hash    TEXT NOT NULL,
    code_prefix  TEXT NOT NULL,
    role         TEXT NOT NULL,   -- father | support
    permission   TEXT NOT NULL,   -- read | write
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL,
    redeemed_at  TEXT,
    redeemed_by  TEXT,
    revoked_at   TEXT
);

-- Append-only.
CREATE TABLE IF NOT EXISTS code_attempts (
    attempt_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      TEXT NOT NULL,
    attempted_at TEXT NOT NULL,
    success      INTEGER NOT NULL,
    origin       TEXT
);

CREATE TABLE IF NOT EXISTS pairing_requests (
    request_id     TEXT PRIMARY KEY,
    requester_id   TEXT NOT NULL,
    requester_name TEXT,
    target_email   TEXT NOT NULL,
    target_id      TEXT,
    status         TEXT NOT NULL DEFAULT 'pending',  -- pending | approved | denied | cancelled
    permission     TEXT,
    created_at     TEXT NOT NULL,
    resolved_at    TEXT
);

CREATE TABLE IF NOT EXISTS entries (
    entry_id     TEXT PRIMARY KEY,
    pregnancy_id TEXT NOT NULL REFERENCES pregnancies(pregnancy_id),
    client_id    TEXT NOT NULL,
    entry_type   TEXT NOT NULL,
    data         TEXT NOT NULL,   -- JSON
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    deleted_at   TEXT,
    UNIQUE (pregnancy_id, entry_type, client_id)
);

CREATE TABLE IF NOT EXISTS settings (
    pregnancy_id TEXT NOT NULL REFERENCES pregnancies(pregnancy_id),
    setting_type TEXT NOT NULL,
    data         TEXT NOT NULL,   -- JSON
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (pregnancy_id, setting_type)
);

CREATE INDEX IF NOT EXISTS users_email_idx          ON users(email_lower);
CREATE INDEX IF NOT EXISTS pregnancies_partner_idx  ON pregnancies(partner_id);
CREATE INDEX IF NOT EXISTS pregnancies_coowner_idx  ON pregnancies(coowner_id);
CREATE INDEX IF NOT EXISTS supporters_user_idx      ON supporters(user_id);
CREATE INDEX IF NOT EXISTS invite_codes_expiry_idx  ON invite_codes(expires_at);
CREATE INDEX IF NOT EXISTS invite_codes_preg_idx    ON invite_codes(pregnancy_id);
CREATE INDEX IF NOT EXISTS code_attempts_user_idx   ON code_attempts(user_id, attempted_at);
CREATE INDEX IF NOT EXISTS pairing_target_idx       ON pairing_requests(target_id, status);
CREATE INDEX IF NOT EXISTS entries_updated_idx      ON entries(pregnancy_id, updated_at);

PRAGMA user_version = 1;
";
