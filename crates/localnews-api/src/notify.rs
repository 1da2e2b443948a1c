use tracing::{info, warn};

use localnews_db::Database;

pub const NEW_VIDEO_TITLE: &str = "New Video Available!";

/// Outbound delivery of OTP codes and push notifications. Both calls are
/// best-effort: `false` means the message was not delivered.
pub trait Notifier: Send + Sync {
    fn send_otp(&self, mobile_number: &str, code: &str) -> bool;

    fn send_push(&self, device_token: &str, title: &str, body: &str) -> bool;
}

/// Development notifier: writes messages to the log instead of delivering
/// them. Always reports success.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_otp(&self, mobile_number: &str, code: &str) -> bool {
        info!("SMS delivery disabled. OTP for {}: {}", mobile_number, code);
        true
    }

    fn send_push(&self, device_token: &str, title: &str, body: &str) -> bool {
        info!("Push to device {}: {} - {}", device_token, title, body);
        true
    }
}

/// Fan out a new-video push to every active device of verified users in the
/// video's district. Failures are logged and never propagate.
/// Returns the number of devices that accepted the push.
pub fn notify_new_video(
    db: &Database,
    notifier: &dyn Notifier,
    district_id: Option<i64>,
    title: &str,
) -> usize {
    let targets = match db.get_push_targets(district_id) {
        Ok(targets) => targets,
        Err(e) => {
            warn!("Could not load push targets: {}", e);
            return 0;
        }
    };

    let delivered = targets
        .iter()
        .filter(|token| notifier.send_push(token, NEW_VIDEO_TITLE, title))
        .count();

    if delivered < targets.len() {
        warn!(
            "Push notifications: {} of {} devices failed",
            targets.len() - delivered,
            targets.len()
        );
    }
    delivered
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[test]
    fn new_video_reaches_district_devices_only() {
        let db = Database::open_in_memory().unwrap();
        db.seed_districts(&[("Agra", "AGR"), ("Kanpur", "KNP")]).unwrap();
        let agra = db.upsert_user_otp("9000000001", "000000", 0).unwrap();
        let kanpur = db.upsert_user_otp("9000000002", "000000", 0).unwrap();
        db.mark_user_verified(agra, 1).unwrap();
        db.mark_user_verified(kanpur, 2).unwrap();
        db.upsert_device(agra, "agra-phone", "android").unwrap();
        db.upsert_device(agra, "agra-tablet", "android").unwrap();
        db.upsert_device(kanpur, "kanpur-phone", "android").unwrap();

        let notifier = RecordingNotifier {
            fail_push_to: Some("agra-tablet".into()),
            ..Default::default()
        };
        let delivered = notify_new_video(&db, &notifier, Some(1), "Flooding on MG Road");

        assert_eq!(delivered, 1);
        let pushes = notifier.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 2);
        assert!(pushes.iter().all(|(_, title, body)| title == NEW_VIDEO_TITLE && body == "Flooding on MG Road"));
        assert!(!pushes.iter().any(|(token, _, _)| token == "kanpur-phone"));
    }
}
