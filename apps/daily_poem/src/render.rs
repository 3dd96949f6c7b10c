//! Plain-text rendering of a poem snapshot for the terminal.

use chrono::NaiveDate;
use shared::domain::{PoemSnapshot, SnapshotStatus, LOADING_TEXT};

const HEADER: &str = "DAILY POETRY";

pub fn render(snapshot: &PoemSnapshot, today: NaiveDate) -> String {
    let mut out = format!(
        "{HEADER}\n\n{}\n{}\n\n",
        snapshot.display_title().to_uppercase(),
        today.format("%A, %B %-d, %Y").to_string().to_uppercase()
    );

    if snapshot.text().is_empty() {
        out.push_str(LOADING_TEXT);
        out.push('\n');
    } else {
        for line in snapshot.lines() {
            out.push_str(&line.to_uppercase());
            out.push('\n');
        }
    }

    match snapshot.status() {
        SnapshotStatus::Ready => {
            let updated = snapshot
                .last_update_date()
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            out.push_str(&format!(
                "\nPOEM #{} (UPDATED {updated})\n",
                snapshot.count()
            ));
        }
        SnapshotStatus::Error => {
            out.push_str(&format!("\n{}\n", snapshot.error_message()));
        }
        SnapshotStatus::Idle | SnapshotStatus::Loading => {}
    }
    out
}
