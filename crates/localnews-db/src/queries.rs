use crate::models::{AdminRow, DistrictCountRow, DistrictRow, UserRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, mobile_number, otp, otp_expiry, verified, district_id";

impl Database {
    // -- Users --

    /// Store a fresh OTP for `mobile_number`, creating the (unverified) user
    /// on first request. A pending code is overwritten, never accumulated.
    pub fn upsert_user_otp(&self, mobile_number: &str, otp: &str, otp_expiry: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let id = conn.query_row(
                "INSERT INTO users (mobile_number, otp, otp_expiry) VALUES (?1, ?2, ?3)
                 ON CONFLICT(mobile_number) DO UPDATE SET
                     otp = excluded.otp,
                     otp_expiry = excluded.otp_expiry,
                     updated_at = datetime('now')
                 RETURNING id",
                rusqlite::params![mobile_number, otp, otp_expiry],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    /// Promote a user to verified in `district_id` and clear the pending OTP.
    pub fn mark_user_verified(&self, user_id: i64, district_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET verified = 1, district_id = ?2, otp = NULL, otp_expiry = NULL,
                     updated_at = datetime('now')
                 WHERE id = ?1",
                (user_id, district_id),
            )?;
            Ok(())
        })
    }

    /// Redeem a pending OTP: verify the user only if `otp` is still the stored
    /// code and unexpired at `now`, clearing it in the same statement.
    /// Returns `false` when the code was wrong, expired or already used.
    pub fn redeem_user_otp(&self, user_id: i64, district_id: i64, otp: &str, now: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET verified = 1, district_id = ?2, otp = NULL, otp_expiry = NULL,
                     updated_at = datetime('now')
                 WHERE id = ?1 AND otp = ?3 AND otp_expiry > ?4",
                rusqlite::params![user_id, district_id, otp, now],
            )?;
            Ok(updated == 1)
        })
    }

    pub fn get_user_by_mobile(&self, mobile_number: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "mobile_number = ?1", mobile_number))
    }

    pub fn get_verified_user_by_mobile(&self, mobile_number: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "mobile_number = ?1 AND verified = 1", mobile_number))
    }

    // -- Admins --

    pub fn create_admin(&self, username: &str, password_hash: &str, email: Option<&str>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO admin_users (username, password_hash, email) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, password_hash, email],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_active_admin(&self, username: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, password_hash, email, active
                 FROM admin_users WHERE username = ?1 AND active = 1",
                [username],
                |row| {
                    Ok(AdminRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        email: row.get(3)?,
                        active: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn count_admins(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM admin_users", [], |r| r.get(0))?))
    }

    // -- Districts --

    /// Insert `districts` (name, code) only when the table is empty.
    /// Returns the number of rows inserted.
    pub fn seed_districts(&self, districts: &[(&str, &str)]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM districts", [], |r| r.get(0))?;
            if existing > 0 {
                return Ok(0);
            }
            for (name, code) in districts {
                tx.execute("INSERT INTO districts (name, code) VALUES (?1, ?2)", (name, code))?;
            }
            tx.commit()?;
            Ok(districts.len())
        })
    }

    pub fn get_district(&self, id: i64) -> Result<Option<DistrictRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, code FROM districts WHERE id = ?1",
                [id],
                district_from_row,
            )
            .optional()
        })
    }

    pub fn list_active_districts(&self) -> Result<Vec<DistrictRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, code FROM districts WHERE active = 1 ORDER BY name")?;
            let rows = stmt
                .query_map([], district_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Devices --

    /// Register a push device for a user; re-registering reactivates it.
    pub fn upsert_device(&self, user_id: i64, device_token: &str, platform: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_devices (user_id, device_token, platform) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, device_token) DO UPDATE SET active = 1, platform = excluded.platform",
                rusqlite::params![user_id, device_token, platform],
            )?;
            Ok(())
        })
    }

    pub fn get_push_targets(&self, district_id: Option<i64>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.device_token
                 FROM user_devices d
                 JOIN users u ON d.user_id = u.id
                 WHERE d.active = 1 AND u.verified = 1
                   AND (?1 IS NULL OR u.district_id = ?1)
                 ORDER BY d.id",
            )?;
            let tokens = stmt
                .query_map([district_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(tokens)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, subject: &str, expires_at: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, subject, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, subject, expires_at],
            )?;
            Ok(())
        })
    }

    /// Subject of an unexpired session.
    pub fn get_session_subject(&self, id: &str, now: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT subject FROM sessions WHERE id = ?1 AND expires_at > ?2",
                rusqlite::params![id, now],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])? > 0))
    }

    pub fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?))
    }

    // -- Dashboard --

    pub fn count_users(&self) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(verified), 0) FROM users",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?)
        })
    }

    /// Per active district: active videos and verified users.
    pub fn district_counts(&self) -> Result<Vec<DistrictCountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.name,
                        (SELECT COUNT(*) FROM videos v WHERE v.district_id = d.id AND v.active = 1),
                        (SELECT COUNT(*) FROM users u WHERE u.district_id = d.id AND u.verified = 1)
                 FROM districts d
                 WHERE d.active = 1
                 ORDER BY d.name",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(DistrictCountRow {
                        name: row.get(0)?,
                        videos: row.get(1)?,
                        users: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, filter: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
    conn.query_row(&sql, [value], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        mobile_number: row.get(1)?,
        otp: row.get(2)?,
        otp_expiry: row.get(3)?,
        verified: row.get(4)?,
        district_id: row.get(5)?,
    })
}

fn district_from_row(row: &Row<'_>) -> rusqlite::Result<DistrictRow> {
    Ok(DistrictRow {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
    })
}
