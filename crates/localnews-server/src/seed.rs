use tracing::{info, warn};

use localnews_db::Database;

pub const DISTRICTS: &[(&str, &str)] = &[
    ("Agra", "AGR"),
    ("Aligarh", "ALG"),
    ("Allahabad", "ALD"),
    ("Bareilly", "BRL"),
    ("Ghaziabad", "GZB"),
    ("Gorakhpur", "GKP"),
    ("Kanpur", "KNP"),
    ("Lucknow", "LKW"),
    ("Meerut", "MRT"),
    ("Moradabad", "MBD"),
    ("Varanasi", "VNS"),
];

/// First-start data: districts when none exist, and one admin account when
/// none exists and a password was configured.
pub fn run(db: &Database, admin_username: &str, admin_password: Option<&str>) -> anyhow::Result<()> {
    let seeded = db.seed_districts(DISTRICTS)?;
    if seeded > 0 {
        info!("Seeded {} districts", seeded);
    }

    if db.count_admins()? > 0 {
        return Ok(());
    }

    match admin_password {
        Some(password) => {
            let hash = localnews_api::auth::hash_password(password)?;
            db.create_admin(admin_username, &hash, None)?;
            info!("Created admin account {}", admin_username);
        }
        None => warn!("No admin account exists and LOCALNEWS_ADMIN_PASSWORD is unset; skipping admin seed"),
    }
    Ok(())
}
