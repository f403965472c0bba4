use super::callback::CallbackAction;
use crate::models::autopost::MAX_AUTOPOST_TIMES;
use crate::telegram::{Button, Keyboard, Outgoing};
use chrono_tz::Tz;

const HOURS_PER_ROW: u32 = 4;

pub fn schedule_text(times: &[String], tz: Tz) -> String {
    if times.is_empty() {
        return format!(
            "⏰ Autopost is off.\nPick up to {MAX_AUTOPOST_TIMES} times ({tz}) or send /autopost HH:MM [HH:MM ...]."
        );
    }
    format!(
        "⏰ Autopost times ({tz}): {}\nPress an hour to add it, or send /autopost HH:MM [HH:MM ...] to replace the list.",
        times.join(", ")
    )
}

/// Every full hour as a button; already selected slots are ticked.
pub fn hour_grid(selected: &[String]) -> Keyboard {
    let mut keyboard = Keyboard::default();
    let mut row = Vec::new();
    for hour in 0..24 {
        let time = format!("{hour:02}:00");
        let label = if selected.contains(&time) {
            format!("✅ {time}")
        } else {
            time.clone()
        };
        row.push(Button::new(label, CallbackAction::AutopostSet(time).encode()));
        if row.len() as u32 == HOURS_PER_ROW {
            keyboard = keyboard.row(std::mem::take(&mut row));
        }
    }
    keyboard
        .row(row)
        .row(vec![Button::new("🚫 Disable", CallbackAction::AutopostDisable.encode())])
}

pub fn menu(times: &[String], tz: Tz) -> Outgoing {
    Outgoing::plain(schedule_text(times, tz)).with_keyboard(hour_grid(times))
}
