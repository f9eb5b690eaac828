//! Artifact naming

use uuid::Uuid;

/// Builds `<prefix>_<unix millis>_<8 hex chars>`
///
/// The random tail keeps names distinct for jobs finishing in the same millisecond.
pub fn timestamped_name(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let tail = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, millis, &tail[..8])
}
