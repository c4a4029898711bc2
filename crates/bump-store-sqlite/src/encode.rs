//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings, dates are `YYYY-MM-DD`, UUIDs
//! are hyphenated lowercase strings and enumerations are their lowercase
//! names. Rows are first read into `Raw*` structs of plain strings on the
//! database thread and decoded afterwards.

use bump_core::{
  access::Permission,
  entry::Entry,
  invite::{InviteCode, InviteRole},
  pairing::{PairingRequest, RequestStatus},
  pregnancy::{PartnerStatus, Pregnancy, Profile, Supporter},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_permission(s: &str) -> Result<Permission> { Ok(s.parse()?) }

pub fn decode_role(s: &str) -> Result<InviteRole> { Ok(s.parse()?) }

pub fn encode_partner_status(s: PartnerStatus) -> &'static str {
  match s {
    PartnerStatus::None => "none",
    PartnerStatus::Pending => "pending",
    PartnerStatus::Approved => "approved",
    PartnerStatus::Denied => "denied",
  }
}

pub fn decode_partner_status(s: &str) -> Result<PartnerStatus> {
  match s {
    "none" => Ok(PartnerStatus::None),
    "pending" => Ok(PartnerStatus::Pending),
    "approved" => Ok(PartnerStatus::Approved),
    "denied" => Ok(PartnerStatus::Denied),
    other => Err(Error::Decode { column: "partner_status", value: other.to_owned() }),
  }
}

pub fn decode_request_status(s: &str) -> Result<RequestStatus> {
  match s {
    "pending" => Ok(RequestStatus::Pending),
    "approved" => Ok(RequestStatus::Approved),
    "denied" => Ok(RequestStatus::Denied),
    "cancelled" => Ok(RequestStatus::Cancelled),
    other => Err(Error::Decode { column: "status", value: other.to_owned() }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns selected for a pregnancy, aliased `p`.
pub const PREGNANCY_COLUMNS: &str = "p.pregnancy_id, p.owner_id, p.partner_id, \
  p.partner_status, p.partner_permission, p.partner_name, p.coowner_id, \
  p.coowner_name, p.display_partner_card, p.due_date, p.baby_name, p.mom_name, \
  p.outcome, p.outcome_date, p.archived, p.archived_at, p.created_at, \
  p.updated_at";

const PREGNANCY_WIDTH: usize = 18;

pub struct RawPregnancy {
  pub pregnancy_id:         String,
  pub owner_id:             String,
  pub partner_id:           Option<String>,
  pub partner_status:       String,
  pub partner_permission:   Option<String>,
  pub partner_name:         Option<String>,
  pub coowner_id:           Option<String>,
  pub coowner_name:         Option<String>,
  pub display_partner_card: bool,
  pub due_date:             Option<String>,
  pub baby_name:            Option<String>,
  pub mom_name:             Option<String>,
  pub outcome:              Option<String>,
  pub outcome_date:         Option<String>,
  pub archived:             bool,
  pub archived_at:          Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawPregnancy {
  /// Read [`PREGNANCY_COLUMNS`] starting at column `at`.
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      pregnancy_id:         row.get(at)?,
      owner_id:             row.get(at + 1)?,
      partner_id:           row.get(at + 2)?,
      partner_status:       row.get(at + 3)?,
      partner_permission:   row.get(at + 4)?,
      partner_name:         row.get(at + 5)?,
      coowner_id:           row.get(at + 6)?,
      coowner_name:         row.get(at + 7)?,
      display_partner_card: row.get(at + 8)?,
      due_date:             row.get(at + 9)?,
      baby_name:            row.get(at + 10)?,
      mom_name:             row.get(at + 11)?,
      outcome:              row.get(at + 12)?,
      outcome_date:         row.get(at + 13)?,
      archived:             row.get(at + 14)?,
      archived_at:          row.get(at + 15)?,
      created_at:           row.get(at + 16)?,
      updated_at:           row.get(at + 17)?,
    })
  }

  pub fn into_pregnancy(self) -> Result<Pregnancy> {
    Ok(Pregnancy {
      pregnancy_id:         decode_uuid(&self.pregnancy_id)?,
      owner_id:             self.owner_id,
      partner_id:           self.partner_id,
      partner_status:       decode_partner_status(&self.partner_status)?,
      partner_permission:   self
        .partner_permission
        .as_deref()
        .map(decode_permission)
        .transpose()?,
      partner_name:         self.partner_name,
      coowner_id:           self.coowner_id,
      coowner_name:         self.coowner_name,
      display_partner_card: self.display_partner_card,
      profile:              Profile {
        due_date:  decode_opt_date(self.due_date)?,
        baby_name: self.baby_name,
        mom_name:  self.mom_name,
      },
      outcome:              self.outcome,
      outcome_date:         decode_opt_date(self.outcome_date)?,
      archived:             self.archived,
      archived_at:          decode_opt_dt(self.archived_at)?,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Columns selected for a supporter, aliased `s`.
pub const SUPPORTER_COLUMNS: &str = "s.supporter_id, s.pregnancy_id, s.user_id, \
  s.display_name, s.permission, s.joined_at, s.invited_via_code, s.removed_at, \
  s.display_partner_card";

pub struct RawSupporter {
  pub supporter_id:         String,
  pub pregnancy_id:         String,
  pub user_id:              String,
  pub display_name:         Option<String>,
  pub permission:           String,
  pub joined_at:            String,
  pub invited_via_code:     Option<String>,
  pub removed_at:           Option<String>,
  pub display_partner_card: bool,
}

impl RawSupporter {
  pub fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      supporter_id:         row.get(at)?,
      pregnancy_id:         row.get(at + 1)?,
      user_id:              row.get(at + 2)?,
      display_name:         row.get(at + 3)?,
      permission:           row.get(at + 4)?,
      joined_at:            row.get(at + 5)?,
      invited_via_code:     row.get(at + 6)?,
      removed_at:           row.get(at + 7)?,
      display_partner_card: row.get(at + 8)?,
    })
  }

  pub fn into_supporter(self) -> Result<Supporter> {
    Ok(Supporter {
      supporter_id:         decode_uuid(&self.supporter_id)?,
      pregnancy_id:         decode_uuid(&self.pregnancy_id)?,
      user_id:              self.user_id,
      display_name:         self.display_name,
      permission:           decode_permission(&self.permission)?,
      joined_at:            decode_dt(&self.joined_at)?,
      invited_via_code:     self.invited_via_code.as_deref().map(decode_uuid).transpose()?,
      removed_at:           decode_opt_dt(self.removed_at)?,
      display_partner_card: self.display_partner_card,
    })
  }
}

/// A pregnancy joined with one of its supporters.
pub struct RawMembership {
  pub pregnancy: RawPregnancy,
  pub supporter: RawSupporter,
}

impl RawMembership {
  /// Read [`PREGNANCY_COLUMNS`] followed by [`SUPPORTER_COLUMNS`].
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pregnancy: RawPregnancy::read(row, 0)?,
      supporter: RawSupporter::read(row, PREGNANCY_WIDTH)?,
    })
  }

  pub fn into_membership(self) -> Result<(Pregnancy, Supporter)> {
    Ok((self.pregnancy.into_pregnancy()?, self.supporter.into_supporter()?))
  }
}

pub const INVITE_CODE_COLUMNS: &str = "code_id, pregnancy_id, code_hash, \
  code_prefix, role, permission, created_at, expires_at, redeemed_at, \
  redeemed_by, revoked_at";

pub struct RawInviteCode {
  pub code_id:      String,
  pub pregnancy_id: String,
  pub code_hash:    String,
  pub code_prefix:  String,
  pub role:         String,
  pub permission:   String,
  pub created_at:   String,
  pub expires_at:   String,
  pub redeemed_at:  Option<String>,
  pub redeemed_by:  Option<String>,
  pub revoked_at:   Option<String>,
}

impl RawInviteCode {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code_id:      row.get(0)?,
      pregnancy_id: row.get(1)?,
      code_hash:    row.get(2)?,
      code_prefix:  row.get(3)?,
      role:         row.get(4)?,
      permission:   row.get(5)?,
      created_at:   row.get(6)?,
      expires_at:   row.get(7)?,
      redeemed_at:  row.get(8)?,
      redeemed_by:  row.get(9)?,
      revoked_at:   row.get(10)?,
    })
  }

  pub fn into_code(self) -> Result<InviteCode> {
    Ok(InviteCode {
      code_id:      decode_uuid(&self.code_id)?,
      pregnancy_id: decode_uuid(&self.pregnancy_id)?,
      code_hash:    self.code_hash,
      code_prefix:  self.code_prefix,
      role:         decode_role(&self.role)?,
      permission:   decode_permission(&self.permission)?,
      created_at:   decode_dt(&self.created_at)?,
      expires_at:   decode_dt(&self.expires_at)?,
      redeemed_at:  decode_opt_dt(self.redeemed_at)?,
      redeemed_by:  self.redeemed_by,
      revoked_at:   decode_opt_dt(self.revoked_at)?,
    })
  }
}

pub const PAIRING_COLUMNS: &str = "request_id, requester_id, requester_name, \
  target_email, target_id, status, permission, created_at, resolved_at";

pub struct RawPairingRequest {
  pub request_id:     String,
  pub requester_id:   String,
  pub requester_name: Option<String>,
  pub target_email:   String,
  pub target_id:      Option<String>,
  pub status:         String,
  pub permission:     Option<String>,
  pub created_at:     String,
  pub resolved_at:    Option<String>,
}

impl RawPairingRequest {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:     row.get(0)?,
      requester_id:   row.get(1)?,
      requester_name: row.get(2)?,
      target_email:   row.get(3)?,
      target_id:      row.get(4)?,
      status:         row.get(5)?,
      permission:     row.get(6)?,
      created_at:     row.get(7)?,
      resolved_at:    row.get(8)?,
    })
  }

  pub fn into_request(self) -> Result<PairingRequest> {
    Ok(PairingRequest {
      request_id:     decode_uuid(&self.request_id)?,
      requester_id:   self.requester_id,
      requester_name: self.requester_name,
      target_email:   self.target_email,
      target_id:      self.target_id,
      status:         decode_request_status(&self.status)?,
      permission:     self.permission.as_deref().map(decode_permission).transpose()?,
      created_at:     decode_dt(&self.created_at)?,
      resolved_at:    decode_opt_dt(self.resolved_at)?,
    })
  }
}

pub const ENTRY_COLUMNS: &str = "entry_id, pregnancy_id, client_id, entry_type, \
  data, created_at, updated_at, deleted_at";

pub struct RawEntry {
  pub entry_id:     String,
  pub pregnancy_id: String,
  pub client_id:    String,
  pub entry_type:   String,
  pub data:         String,
  pub created_at:   String,
  pub updated_at:   String,
  pub deleted_at:   Option<String>,
}

impl RawEntry {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:     row.get(0)?,
      pregnancy_id: row.get(1)?,
      client_id:    row.get(2)?,
      entry_type:   row.get(3)?,
      data:         row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
      deleted_at:   row.get(7)?,
    })
  }

  pub fn into_entry(self) -> Result<Entry> {
    Ok(Entry {
      entry_id:     decode_uuid(&self.entry_id)?,
      pregnancy_id: decode_uuid(&self.pregnancy_id)?,
      client_id:    self.client_id,
      entry_type:   self.entry_type,
      data:         serde_json::from_str(&self.data)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
      deleted_at:   decode_opt_dt(self.deleted_at)?,
    })
  }
}
