//! Answer synthesis: serialize the retrieval tree into a textual context
//! block and hand it to the chat provider together with the original query.
//!
//! The context format is one `-`-separated paragraph per truck (name and
//! menu), with a line per location carrying inline `Day start - end`
//! schedule entries in 12-hour time.

use anyhow::{Context, Result};

use crate::embedding::{ChatProvider, ChatTurn};
use crate::models::TruckMatch;

pub const NO_MATCHES_ANSWER: &str = "No food trucks found.";

const SYSTEM_PROMPT: &str = "You will be provided with a list of food trucks, along with their \
food items, locations, and schedules. Reply the user queries by with food trucks that are \
currently open or about to open, and serve food items matching the user's query. You must \
provide location and schedule information. Answer like humans do, not like a machine. Do not \
use structured responses.";

/// The fixed few-shot preamble sent before the real query.
pub fn few_shot() -> Vec<ChatTurn> {
    vec![
        ChatTurn {
            role: "user",
            content: "Where can I eat chicken quesadillas?".to_string(),
        },
        ChatTurn {
            role: "assistant",
            content: "Here are the locations and schedules".to_string(),
        },
    ]
}

/// Serialize the nested tree plus the user query into the chat context.
pub fn build_context(now: &str, trucks: &[TruckMatch], query: &str) -> String {
    let mut content = format!("Current date: {}\n", now);

    for truck in trucks {
        content.push_str(&format!("-\nFood Truck: {}", truck.name));
        content.push_str(&format!("\nMenu: {}", truck.food_items));
        for location in &truck.locations {
            content.push_str(&format!("\nLocation: {}", location.address));
            for schedule in &location.schedules {
                content.push_str(&format!(
                    " - {} {} - {}",
                    schedule.day_of_week,
                    format_time_12h(&schedule.start_time),
                    format_time_12h(&schedule.end_time),
                ));
            }
        }
        content.push('\n');
    }

    content.push_str(&format!("-\n\nUser query: {}", query));
    content
}

/// Build the context and request a completion. Only the first candidate's
/// text is consumed.
pub async fn synthesize(
    chat: &dyn ChatProvider,
    trucks: &[TruckMatch],
    query: &str,
) -> Result<String> {
    let now = chrono::Local::now()
        .format("%A, %B %-d, %Y, %-I:%M:%S %p")
        .to_string();
    let content = build_context(&now, trucks, query);

    chat.complete(SYSTEM_PROMPT, &few_shot(), &content)
        .await
        .context("failed to get chat response")
}

/// Render a `HH:MM` 24-hour time as `HH:MM AM/PM`. Values that do not parse
/// pass through unchanged; the feed occasionally carries blanks.
pub fn format_time_12h(time: &str) -> String {
    let Some((h, m)) = time.split_once(':') else {
        return time.to_string();
    };
    let Ok(hour) = h.parse::<u32>() else {
        return time.to_string();
    };
    if hour > 23 {
        return time.to_string();
    }

    let (hour12, suffix) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{:02}:{} {}", hour12, m, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationMatch, ScheduleMatch};

    fn sample_trucks() -> Vec<TruckMatch> {
        vec![TruckMatch {
            id: 1,
            name: "Taco Cart".to_string(),
            food_items: "Tacos: Burritos".to_string(),
            locations: vec![LocationMatch {
                id: 10,
                address: "1 Market St".to_string(),
                status: "APPROVED".to_string(),
                schedules: vec![
                    ScheduleMatch {
                        day_of_week: "Monday".to_string(),
                        start_time: "10:00".to_string(),
                        end_time: "14:30".to_string(),
                    },
                    ScheduleMatch {
                        day_of_week: "Tuesday".to_string(),
                        start_time: "00:00".to_string(),
                        end_time: "23:00".to_string(),
                    },
                ],
            }],
        }]
    }

    #[test]
    fn test_format_time_12h() {
        assert_eq!(format_time_12h("00:00"), "12:00 AM");
        assert_eq!(format_time_12h("09:15"), "09:15 AM");
        assert_eq!(format_time_12h("12:00"), "12:00 PM");
        assert_eq!(format_time_12h("13:30"), "01:30 PM");
        assert_eq!(format_time_12h("23:59"), "11:59 PM");
    }

    #[test]
    fn test_format_time_12h_passthrough_on_junk() {
        assert_eq!(format_time_12h(""), "");
        assert_eq!(format_time_12h("noon"), "noon");
        assert_eq!(format_time_12h("25:00"), "25:00");
    }

    #[test]
    fn test_build_context_shape() {
        let content = build_context("Monday, June 1, 2026", &sample_trucks(), "tacos near me");

        assert!(content.starts_with("Current date: Monday, June 1, 2026\n"));
        assert!(content.contains("-\nFood Truck: Taco Cart"));
        assert!(content.contains("\nMenu: Tacos: Burritos"));
        assert!(content.contains("\nLocation: 1 Market St - Monday 10:00 AM - 02:30 PM"));
        assert!(content.contains("Tuesday 12:00 AM - 11:00 PM"));
        assert!(content.ends_with("-\n\nUser query: tacos near me"));
    }

    #[test]
    fn test_build_context_one_paragraph_per_truck() {
        let mut trucks = sample_trucks();
        let mut second = trucks[0].clone();
        second.id = 2;
        second.name = "Burger Van".to_string();
        trucks.push(second);

        let content = build_context("now", &trucks, "q");
        assert_eq!(content.matches("-\nFood Truck: ").count(), 2);
    }
}
