//! [`SqliteStore`]: the SQLite implementation of [`SharingStore`].

use std::{collections::BTreeMap, path::Path};

use bump_core::{
  access::Permission,
  entry::{Entry, EntryQuery, NewEntry},
  invite::{CodeClaim, InviteCode, InviteRole, NewInviteCode},
  limiter::CodeAttempt,
  pairing::{NewPairingRequest, PairingRequest, RequestStatus},
  pregnancy::{Coowner, PartnerLink, PartnerStatus, Pregnancy, Profile, Supporter},
  store::{Outcome, SharingStore},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ENTRY_COLUMNS, INVITE_CODE_COLUMNS, PAIRING_COLUMNS, PREGNANCY_COLUMNS,
    RawEntry, RawInviteCode, RawMembership, RawPairingRequest, RawPregnancy,
    RawSupporter, SUPPORTER_COLUMNS, encode_date, encode_dt, encode_partner_status,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sharing store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The first pregnancy matching `filter` (a `WHERE ... [ORDER BY ...]`
  /// clause over alias `p` with a single parameter).
  async fn pregnancy_where(&self, filter: &'static str, param: String) -> Result<Option<Pregnancy>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_pregnancy(conn, filter, rusqlite::params![param])?))
      .await?;
    raw.map(RawPregnancy::into_pregnancy).transpose()
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn select_pregnancy<P: rusqlite::Params>(
  conn:   &Connection,
  filter: &str,
  params: P,
) -> rusqlite::Result<Option<RawPregnancy>> {
  conn
    .query_row(
      &format!("SELECT {PREGNANCY_COLUMNS} FROM pregnancies p {filter} LIMIT 1"),
      params,
      |row| RawPregnancy::read(row, 0),
    )
    .optional()
}

fn select_pairing_request(
  conn:       &Connection,
  request_id: &str,
) -> rusqlite::Result<Option<RawPairingRequest>> {
  conn
    .query_row(
      &format!("SELECT {PAIRING_COLUMNS} FROM pairing_requests WHERE request_id = ?1"),
      rusqlite::params![request_id],
      RawPairingRequest::read,
    )
    .optional()
}

enum PartnerSlot {
  Set,
  Taken,
  Missing,
}

/// Put `link` in the partner slot of `pregnancy_id`.
///
/// Both code redemption and pairing approval go through here. A slot held by
/// a different approved partner is never overwritten.
fn set_partner(
  conn:         &Connection,
  pregnancy_id: &str,
  link:         &PartnerLink,
  now:          &str,
) -> rusqlite::Result<PartnerSlot> {
  let current: Option<(Option<String>, String)> = conn
    .query_row(
      "SELECT partner_id, partner_status FROM pregnancies WHERE pregnancy_id = ?1",
      rusqlite::params![pregnancy_id],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;

  let Some((partner_id, status)) = current else {
    return Ok(PartnerSlot::Missing);
  };

  let approved = encode_partner_status(PartnerStatus::Approved);
  if status == approved && partner_id.as_deref().is_some_and(|p| p != link.user_id) {
    return Ok(PartnerSlot::Taken);
  }

  conn.execute(
    "UPDATE pregnancies SET
       partner_id = ?2, partner_status = ?3, partner_permission = ?4,
       partner_name = ?5, display_partner_card = ?6, updated_at = ?7
     WHERE pregnancy_id = ?1",
    rusqlite::params![
      pregnancy_id,
      link.user_id,
      approved,
      link.permission.as_str(),
      link.display_name,
      link.display_card,
      now,
    ],
  )?;
  Ok(PartnerSlot::Set)
}

/// Insert or replace one entry and read it back. `data` is the serialised
/// JSON payload.
fn write_entry(
  conn:         &Connection,
  pregnancy_id: &str,
  entry:        &NewEntry,
  data:         &str,
  now:          &str,
) -> rusqlite::Result<RawEntry> {
  conn.execute(
    "INSERT INTO entries
       (entry_id, pregnancy_id, client_id, entry_type, data, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
     ON CONFLICT (pregnancy_id, entry_type, client_id) DO UPDATE SET
       data = excluded.data,
       updated_at = excluded.updated_at,
       deleted_at = NULL",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      pregnancy_id,
      entry.client_id,
      entry.entry_type,
      data,
      now,
    ],
  )?;
  conn.query_row(
    &format!(
      "SELECT {ENTRY_COLUMNS} FROM entries
       WHERE pregnancy_id = ?1 AND entry_type = ?2 AND client_id = ?3"
    ),
    rusqlite::params![pregnancy_id, entry.entry_type, entry.client_id],
    RawEntry::read,
  )
}

// ─── SharingStore impl ───────────────────────────────────────────────────────

impl SharingStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn remember_user(&self, user_id: &str, email: &str, now: DateTime<Utc>) -> Result<()> {
    let user_id = user_id.to_owned();
    let email = email.trim().to_owned();
    let email_lower = email.to_lowercase();
    let now = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, email_lower, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id) DO UPDATE SET
             email = excluded.email,
             email_lower = excluded.email_lower,
             updated_at = excluded.updated_at",
          rusqlite::params![user_id, email, email_lower, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Pregnancies ───────────────────────────────────────────────────────────

  async fn insert_pregnancy(
    &self,
    owner_id: &str,
    profile:  &Profile,
    now:      DateTime<Utc>,
  ) -> Result<Outcome<Pregnancy>> {
    let pregnancy = Pregnancy {
      pregnancy_id:         Uuid::new_v4(),
      owner_id:             owner_id.to_owned(),
      partner_id:           None,
      partner_status:       PartnerStatus::None,
      partner_permission:   None,
      partner_name:         None,
      coowner_id:           None,
      coowner_name:         None,
      display_partner_card: true,
      profile:              profile.clone(),
      outcome:              None,
      outcome_date:         None,
      archived:             false,
      archived_at:          None,
      created_at:           now,
      updated_at:           now,
    };

    let id_str    = encode_uuid(pregnancy.pregnancy_id);
    let owner     = pregnancy.owner_id.clone();
    let due_date  = profile.due_date.map(encode_date);
    let baby_name = profile.baby_name.clone();
    let mom_name  = profile.mom_name.clone();
    let now_str   = encode_dt(now);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO pregnancies
             (pregnancy_id, owner_id, due_date, baby_name, mom_name, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
           ON CONFLICT (owner_id) DO NOTHING",
          rusqlite::params![id_str, owner, due_date, baby_name, mom_name, now_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Ok(Outcome::Unavailable);
    }
    Ok(Outcome::Applied(pregnancy))
  }

  async fn get_pregnancy(&self, pregnancy_id: Uuid) -> Result<Option<Pregnancy>> {
    self
      .pregnancy_where("WHERE p.pregnancy_id = ?1", encode_uuid(pregnancy_id))
      .await
  }

  async fn pregnancy_by_owner(&self, user_id: &str) -> Result<Option<Pregnancy>> {
    self
      .pregnancy_where("WHERE p.owner_id = ?1", user_id.to_owned())
      .await
  }

  async fn pregnancy_by_coowner(&self, user_id: &str) -> Result<Option<Pregnancy>> {
    self
      .pregnancy_where(
        "WHERE p.coowner_id = ?1 ORDER BY p.updated_at DESC, p.rowid DESC",
        user_id.to_owned(),
      )
      .await
  }

  async fn pregnancy_by_partner(&self, user_id: &str) -> Result<Option<Pregnancy>> {
    self
      .pregnancy_where(
        "WHERE p.partner_id = ?1 AND p.partner_status = 'approved'
         ORDER BY p.updated_at DESC, p.rowid DESC",
        user_id.to_owned(),
      )
      .await
  }

  async fn pregnancy_by_supporter(
    &self,
    user_id: &str,
  ) -> Result<Option<(Pregnancy, Supporter)>> {
    let user_id = user_id.to_owned();

    let raw: Option<RawMembership> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {PREGNANCY_COLUMNS}, {SUPPORTER_COLUMNS}
               FROM supporters s
               JOIN pregnancies p ON p.pregnancy_id = s.pregnancy_id
               WHERE s.user_id = ?1 AND s.removed_at IS NULL
               ORDER BY s.joined_at DESC, s.rowid DESC
               LIMIT 1"
            ),
            rusqlite::params![user_id],
            RawMembership::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMembership::into_membership).transpose()
  }

  async fn update_profile(
    &self,
    pregnancy_id: Uuid,
    profile:      &Profile,
    now:          DateTime<Utc>,
  ) -> Result<Option<Pregnancy>> {
    let id_str    = encode_uuid(pregnancy_id);
    let due_date  = profile.due_date.map(encode_date);
    let baby_name = profile.baby_name.clone();
    let mom_name  = profile.mom_name.clone();
    let now       = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE pregnancies SET
             due_date  = COALESCE(?2, due_date),
             baby_name = COALESCE(?3, baby_name),
             mom_name  = COALESCE(?4, mom_name),
             updated_at = ?5
           WHERE pregnancy_id = ?1",
          rusqlite::params![id_str, due_date, baby_name, mom_name, now],
        )?;
        Ok(select_pregnancy(conn, "WHERE p.pregnancy_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    raw.map(RawPregnancy::into_pregnancy).transpose()
  }

  async fn set_outcome(
    &self,
    pregnancy_id: Uuid,
    outcome:      Option<&str>,
    outcome_date: Option<NaiveDate>,
    now:          DateTime<Utc>,
  ) -> Result<Option<Pregnancy>> {
    let id_str       = encode_uuid(pregnancy_id);
    let outcome      = outcome.map(str::to_owned);
    let outcome_date = outcome_date.map(encode_date);
    let now          = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE pregnancies SET outcome = ?2, outcome_date = ?3, updated_at = ?4
           WHERE pregnancy_id = ?1",
          rusqlite::params![id_str, outcome, outcome_date, now],
        )?;
        Ok(select_pregnancy(conn, "WHERE p.pregnancy_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    raw.map(RawPregnancy::into_pregnancy).transpose()
  }

  async fn set_archived(
    &self,
    pregnancy_id: Uuid,
    archived:     bool,
    now:          DateTime<Utc>,
  ) -> Result<Option<Pregnancy>> {
    let id_str = encode_uuid(pregnancy_id);
    let now    = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE pregnancies SET
             archived = ?2,
             archived_at = CASE WHEN ?2 THEN ?3 ELSE NULL END,
             updated_at = ?3
           WHERE pregnancy_id = ?1",
          rusqlite::params![id_str, archived, now],
        )?;
        Ok(select_pregnancy(conn, "WHERE p.pregnancy_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    raw.map(RawPregnancy::into_pregnancy).transpose()
  }

  async fn set_coowner(
    &self,
    pregnancy_id: Uuid,
    coowner:      Option<&Coowner>,
    now:          DateTime<Utc>,
  ) -> Result<Option<Pregnancy>> {
    let id_str       = encode_uuid(pregnancy_id);
    let coowner_id   = coowner.map(|c| c.user_id.clone());
    let coowner_name = coowner.and_then(|c| c.display_name.clone());
    let now          = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE pregnancies SET coowner_id = ?2, coowner_name = ?3, updated_at = ?4
           WHERE pregnancy_id = ?1",
          rusqlite::params![id_str, coowner_id, coowner_name, now],
        )?;
        Ok(select_pregnancy(conn, "WHERE p.pregnancy_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    raw.map(RawPregnancy::into_pregnancy).transpose()
  }

  // ── Invite codes ──────────────────────────────────────────────────────────

  async fn insert_invite_code(&self, code: NewInviteCode) -> Result<InviteCode> {
    let stored = InviteCode {
      code_id:      Uuid::new_v4(),
      pregnancy_id: code.pregnancy_id,
      code_hash:    code.code_hash,
      code_prefix:  code.code_prefix,
      role:         code.role,
      permission:   code.permission,
      created_at:   code.created_at,
      expires_at:   code.expires_at,
      redeemed_at:  None,
      redeemed_by:  None,
      revoked_at:   None,
    };

    let code_id      = encode_uuid(stored.code_id);
    let pregnancy_id = encode_uuid(stored.pregnancy_id);
    let code_hash    = stored.code_hash.clone();
    let code_prefix  = stored.code_prefix.clone();
    let role         = stored.role.as_str();
    let permission   = stored.permission.as_str();
    let created_at   = encode_dt(stored.created_at);
    let expires_at   = encode_dt(stored.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO invite_codes
             (code_id, pregnancy_id, code_hash, code_prefix, role, permission,
              created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            code_id, pregnancy_id, code_hash, code_prefix, role, permission,
            created_at, expires_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(stored)
  }

  async fn active_invite_codes(
    &self,
    pregnancy_id: Uuid,
    now:          DateTime<Utc>,
  ) -> Result<Vec<InviteCode>> {
    let id_str = encode_uuid(pregnancy_id);
    let now    = encode_dt(now);

    let raws: Vec<RawInviteCode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INVITE_CODE_COLUMNS} FROM invite_codes
           WHERE pregnancy_id = ?1
             AND redeemed_at IS NULL AND revoked_at IS NULL AND expires_at > ?2
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, now], RawInviteCode::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInviteCode::into_code).collect()
  }

  async fn all_active_invite_codes(&self, now: DateTime<Utc>) -> Result<Vec<InviteCode>> {
    let now = encode_dt(now);

    let raws: Vec<RawInviteCode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INVITE_CODE_COLUMNS} FROM invite_codes
           WHERE redeemed_at IS NULL AND revoked_at IS NULL AND expires_at > ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![now], RawInviteCode::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInviteCode::into_code).collect()
  }

  async fn redeem_invite_code(&self, claim: CodeClaim) -> Result<Outcome<Pregnancy>> {
    let code_id      = encode_uuid(claim.code_id);
    let supporter_id = encode_uuid(Uuid::new_v4());
    let now          = encode_dt(claim.claimed_at);

    let outcome: Outcome<RawPregnancy> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The conditional update is the lock: of several concurrent claims
        // only one sees a row change.
        let claimed = tx.execute(
          "UPDATE invite_codes SET redeemed_at = ?2, redeemed_by = ?3
           WHERE code_id = ?1
             AND redeemed_at IS NULL AND revoked_at IS NULL AND expires_at > ?2",
          rusqlite::params![code_id, now, claim.user_id],
        )?;
        if claimed != 1 {
          return Ok(Outcome::Unavailable);
        }

        let (pregnancy_id, role): (String, String) = tx.query_row(
          "SELECT pregnancy_id, role FROM invite_codes WHERE code_id = ?1",
          rusqlite::params![code_id],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if role == InviteRole::Father.as_str() {
          let link = PartnerLink {
            user_id:      claim.user_id.clone(),
            permission:   claim.permission,
            display_name: claim.display_name.clone(),
            display_card: claim.display_card,
          };
          match set_partner(&tx, &pregnancy_id, &link, &now)? {
            PartnerSlot::Set => {}
            PartnerSlot::Taken => return Ok(Outcome::PartnerTaken),
            PartnerSlot::Missing => return Ok(Outcome::Unavailable),
          }
        } else {
          tx.execute(
            "INSERT INTO supporters
               (supporter_id, pregnancy_id, user_id, display_name, permission,
                joined_at, invited_via_code, display_partner_card)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (pregnancy_id, user_id) DO UPDATE SET
               display_name = excluded.display_name,
               permission = excluded.permission,
               joined_at = excluded.joined_at,
               invited_via_code = excluded.invited_via_code,
               display_partner_card = excluded.display_partner_card,
               removed_at = NULL",
            rusqlite::params![
              supporter_id,
              pregnancy_id,
              claim.user_id,
              claim.display_name,
              claim.permission.as_str(),
              now,
              code_id,
              claim.display_card,
            ],
          )?;
        }

        let pregnancy =
          select_pregnancy(&tx, "WHERE p.pregnancy_id = ?1", rusqlite::params![pregnancy_id])?;
        let Some(pregnancy) = pregnancy else {
          return Ok(Outcome::Unavailable);
        };
        tx.commit()?;
        Ok(Outcome::Applied(pregnancy))
      })
      .await?;

    Ok(match outcome {
      Outcome::Applied(raw) => Outcome::Applied(raw.into_pregnancy()?),
      Outcome::Unavailable => Outcome::Unavailable,
      Outcome::PartnerTaken => Outcome::PartnerTaken,
    })
  }

  async fn revoke_invite_code(
    &self,
    code_id:  Uuid,
    owner_id: &str,
    now:      DateTime<Utc>,
  ) -> Result<bool> {
    let code_id  = encode_uuid(code_id);
    let owner_id = owner_id.to_owned();
    let now      = encode_dt(now);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE invite_codes SET revoked_at = ?3
           WHERE code_id = ?1
             AND redeemed_at IS NULL AND revoked_at IS NULL AND expires_at > ?3
             AND pregnancy_id IN (SELECT pregnancy_id FROM pregnancies WHERE owner_id = ?2)",
          rusqlite::params![code_id, owner_id, now],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  // ── Supporters ────────────────────────────────────────────────────────────

  async fn active_supporters(&self, pregnancy_id: Uuid) -> Result<Vec<Supporter>> {
    let id_str = encode_uuid(pregnancy_id);

    let raws: Vec<RawSupporter> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUPPORTER_COLUMNS} FROM supporters s
           WHERE s.pregnancy_id = ?1 AND s.removed_at IS NULL
           ORDER BY s.joined_at DESC, s.rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| RawSupporter::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSupporter::into_supporter).collect()
  }

  async fn remove_supporter(
    &self,
    supporter_id: Uuid,
    pregnancy_id: Uuid,
    now:          DateTime<Utc>,
  ) -> Result<bool> {
    let supporter_id = encode_uuid(supporter_id);
    let pregnancy_id = encode_uuid(pregnancy_id);
    let now          = encode_dt(now);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE supporters SET removed_at = ?3
           WHERE supporter_id = ?1 AND pregnancy_id = ?2 AND removed_at IS NULL",
          rusqlite::params![supporter_id, pregnancy_id, now],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn set_supporter_permission(
    &self,
    supporter_id: Uuid,
    pregnancy_id: Uuid,
    permission:   Permission,
  ) -> Result<Option<Supporter>> {
    let supporter_id = encode_uuid(supporter_id);
    let pregnancy_id = encode_uuid(pregnancy_id);

    let raw: Option<RawSupporter> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE supporters SET permission = ?3
           WHERE supporter_id = ?1 AND pregnancy_id = ?2 AND removed_at IS NULL",
          rusqlite::params![supporter_id, pregnancy_id, permission.as_str()],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(conn
          .query_row(
            &format!("SELECT {SUPPORTER_COLUMNS} FROM supporters s WHERE s.supporter_id = ?1"),
            rusqlite::params![supporter_id],
            |row| RawSupporter::read(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSupporter::into_supporter).transpose()
  }

  // ── Attempts ──────────────────────────────────────────────────────────────

  async fn count_failed_attempts(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32> {
    let user_id = user_id.to_owned();
    let since   = encode_dt(since);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM code_attempts
           WHERE user_id = ?1 AND success = 0 AND attempted_at >= ?2",
          rusqlite::params![user_id, since],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
  }

  async fn record_attempt(&self, attempt: CodeAttempt) -> Result<()> {
    let attempted_at = encode_dt(attempt.attempted_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO code_attempts (user_id, attempted_at, success, origin)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![attempt.user_id, attempted_at, attempt.success, attempt.origin],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Pairing ───────────────────────────────────────────────────────────────

  async fn insert_pairing_request(&self, request: NewPairingRequest) -> Result<PairingRequest> {
    let request_id   = Uuid::new_v4();
    let id_str       = encode_uuid(request_id);
    let requester_id = request.requester_id.clone();
    let name         = request.requester_name.clone();
    let email        = request.target_email.clone();
    let created_at   = encode_dt(request.created_at);

    let target_id: Option<String> = self
      .conn
      .call(move |conn| {
        let target_id: Option<String> = conn
          .query_row(
            "SELECT user_id FROM users WHERE email_lower = ?1
             ORDER BY updated_at DESC LIMIT 1",
            rusqlite::params![email.trim().to_lowercase()],
            |row| row.get(0),
          )
          .optional()?;

        conn.execute(
          "INSERT INTO pairing_requests
             (request_id, requester_id, requester_name, target_email, target_id,
              status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            requester_id,
            name,
            email,
            target_id,
            RequestStatus::Pending.as_str(),
            created_at,
          ],
        )?;
        Ok(target_id)
      })
      .await?;

    Ok(PairingRequest {
      request_id,
      requester_id: request.requester_id,
      requester_name: request.requester_name,
      target_email: request.target_email,
      target_id,
      status: RequestStatus::Pending,
      permission: None,
      created_at: request.created_at,
      resolved_at: None,
    })
  }

  async fn pending_pairing_requests(&self, target_id: &str) -> Result<Vec<PairingRequest>> {
    let target_id = target_id.to_owned();

    let raws: Vec<RawPairingRequest> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PAIRING_COLUMNS} FROM pairing_requests
           WHERE target_id = ?1 AND status = 'pending'
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![target_id], RawPairingRequest::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPairingRequest::into_request).collect()
  }

  async fn approve_pairing_request(
    &self,
    request_id: Uuid,
    target_id:  &str,
    permission: Permission,
    now:        DateTime<Utc>,
  ) -> Result<Outcome<PairingRequest>> {
    let request_id = encode_uuid(request_id);
    let target_id  = target_id.to_owned();
    let now        = encode_dt(now);

    let outcome: Outcome<RawPairingRequest> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let requester: Option<(String, Option<String>)> = tx
          .query_row(
            "SELECT requester_id, requester_name FROM pairing_requests
             WHERE request_id = ?1 AND target_id = ?2 AND status = 'pending'",
            rusqlite::params![request_id, target_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((requester_id, requester_name)) = requester else {
          return Ok(Outcome::Unavailable);
        };

        let pregnancy_id: Option<String> = tx
          .query_row(
            "SELECT pregnancy_id FROM pregnancies WHERE owner_id = ?1",
            rusqlite::params![target_id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(pregnancy_id) = pregnancy_id else {
          return Ok(Outcome::Unavailable);
        };

        tx.execute(
          "UPDATE pairing_requests SET status = ?2, permission = ?3, resolved_at = ?4
           WHERE request_id = ?1",
          rusqlite::params![
            request_id,
            RequestStatus::Approved.as_str(),
            permission.as_str(),
            now,
          ],
        )?;

        let link = PartnerLink {
          user_id: requester_id,
          permission,
          display_name: requester_name,
          display_card: true,
        };
        match set_partner(&tx, &pregnancy_id, &link, &now)? {
          PartnerSlot::Set => {}
          PartnerSlot::Taken => return Ok(Outcome::PartnerTaken),
          PartnerSlot::Missing => return Ok(Outcome::Unavailable),
        }

        let Some(request) = select_pairing_request(&tx, &request_id)? else {
          return Ok(Outcome::Unavailable);
        };
        tx.commit()?;
        Ok(Outcome::Applied(request))
      })
      .await?;

    Ok(match outcome {
      Outcome::Applied(raw) => Outcome::Applied(raw.into_request()?),
      Outcome::Unavailable => Outcome::Unavailable,
      Outcome::PartnerTaken => Outcome::PartnerTaken,
    })
  }

  async fn deny_pairing_request(
    &self,
    request_id: Uuid,
    target_id:  &str,
    now:        DateTime<Utc>,
  ) -> Result<Option<PairingRequest>> {
    let request_id = encode_uuid(request_id);
    let target_id  = target_id.to_owned();
    let now        = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE pairing_requests SET status = ?3, resolved_at = ?4
           WHERE request_id = ?1 AND target_id = ?2 AND status = 'pending'",
          rusqlite::params![request_id, target_id, RequestStatus::Denied.as_str(), now],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_pairing_request(conn, &request_id)?)
      })
      .await?;

    raw.map(RawPairingRequest::into_request).transpose()
  }

  async fn cancel_pairing_request(
    &self,
    request_id:   Uuid,
    requester_id: &str,
    now:          DateTime<Utc>,
  ) -> Result<Option<PairingRequest>> {
    let request_id   = encode_uuid(request_id);
    let requester_id = requester_id.to_owned();
    let now          = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE pairing_requests SET status = ?3, resolved_at = ?4
           WHERE request_id = ?1 AND requester_id = ?2 AND status = 'pending'",
          rusqlite::params![request_id, requester_id, RequestStatus::Cancelled.as_str(), now],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_pairing_request(conn, &request_id)?)
      })
      .await?;

    raw.map(RawPairingRequest::into_request).transpose()
  }

  async fn update_partner_permission(
    &self,
    owner_id:   &str,
    permission: Permission,
    now:        DateTime<Utc>,
  ) -> Result<Option<Pregnancy>> {
    let owner_id = owner_id.to_owned();
    let now      = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE pregnancies SET partner_permission = ?2, updated_at = ?3
           WHERE owner_id = ?1 AND partner_id IS NOT NULL AND partner_status = 'approved'",
          rusqlite::params![owner_id, permission.as_str(), now],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_pregnancy(conn, "WHERE p.owner_id = ?1", rusqlite::params![owner_id])?)
      })
      .await?;

    raw.map(RawPregnancy::into_pregnancy).transpose()
  }

  async fn remove_pairing(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let user_id = user_id.to_owned();
    let now     = encode_dt(now);

    let changed = self
      .conn
      .call(move |conn| {
        let as_owner = conn.execute(
          "UPDATE pregnancies SET
             partner_id = NULL, partner_status = 'none', partner_permission = NULL,
             partner_name = NULL, updated_at = ?2
           WHERE owner_id = ?1 AND partner_id IS NOT NULL",
          rusqlite::params![user_id, now],
        )?;
        if as_owner > 0 {
          return Ok(as_owner);
        }
        Ok(conn.execute(
          "UPDATE pregnancies SET
             partner_id = NULL, partner_status = 'none', partner_permission = NULL,
             partner_name = NULL, updated_at = ?2
           WHERE partner_id = ?1",
          rusqlite::params![user_id, now],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Entries ───────────────────────────────────────────────────────────────

  async fn upsert_entry(
    &self,
    pregnancy_id: Uuid,
    entry:        NewEntry,
    now:          DateTime<Utc>,
  ) -> Result<Entry> {
    let pregnancy_id = encode_uuid(pregnancy_id);
    let data         = serde_json::to_string(&entry.data)?;
    let now          = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| Ok(write_entry(conn, &pregnancy_id, &entry, &data, &now)?))
      .await?;

    raw.into_entry()
  }

  async fn upsert_entries(
    &self,
    pregnancy_id: Uuid,
    entries:      Vec<NewEntry>,
    now:          DateTime<Utc>,
  ) -> Result<Vec<Entry>> {
    let pregnancy_id = encode_uuid(pregnancy_id);
    let now          = encode_dt(now);
    let entries = entries
      .into_iter()
      .map(|e| -> Result<(String, NewEntry)> { Ok((serde_json::to_string(&e.data)?, e)) })
      .collect::<Result<Vec<_>>>()?;

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raws = entries
          .iter()
          .map(|(data, entry)| write_entry(&tx, &pregnancy_id, entry, data, &now))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn entries(&self, pregnancy_id: Uuid, query: &EntryQuery) -> Result<Vec<Entry>> {
    let pregnancy_id    = encode_uuid(pregnancy_id);
    let entry_type      = query.entry_type.clone();
    let since           = query.since.map(encode_dt);
    let include_deleted = query.include_deleted;

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE pregnancy_id = ?1
             AND (?2 IS NULL OR entry_type = ?2)
             AND (?3 IS NULL OR updated_at > ?3)
             AND (?4 OR deleted_at IS NULL)
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![pregnancy_id, entry_type, since, include_deleted],
            RawEntry::read,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn delete_entry(
    &self,
    pregnancy_id: Uuid,
    client_id:    &str,
    now:          DateTime<Utc>,
  ) -> Result<bool> {
    let pregnancy_id = encode_uuid(pregnancy_id);
    let client_id    = client_id.to_owned();
    let now          = encode_dt(now);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE entries SET deleted_at = ?3, updated_at = ?3
           WHERE pregnancy_id = ?1 AND client_id = ?2 AND deleted_at IS NULL",
          rusqlite::params![pregnancy_id, client_id, now],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  async fn settings(&self, pregnancy_id: Uuid) -> Result<BTreeMap<String, serde_json::Value>> {
    let pregnancy_id = encode_uuid(pregnancy_id);

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT setting_type, data FROM settings WHERE pregnancy_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pregnancy_id], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(setting_type, data)| -> Result<(String, serde_json::Value)> {
        Ok((setting_type, serde_json::from_str(&data)?))
      })
      .collect()
  }

  async fn upsert_setting(
    &self,
    pregnancy_id: Uuid,
    setting_type: &str,
    data:         &serde_json::Value,
    now:          DateTime<Utc>,
  ) -> Result<()> {
    let pregnancy_id = encode_uuid(pregnancy_id);
    let setting_type = setting_type.to_owned();
    let data         = serde_json::to_string(data)?;
    let now          = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (pregnancy_id, setting_type, data, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (pregnancy_id, setting_type) DO UPDATE SET
             data = excluded.data,
             updated_at = excluded.updated_at",
          rusqlite::params![pregnancy_id, setting_type, data, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
