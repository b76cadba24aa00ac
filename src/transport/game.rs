//! `/api/game/headlines` (spec §6): a static, file-backed rotation of
//! four headlines with one satire answer. No LLM or network call —
//! intentionally kept small (spec.md §6 "explicitly outside the core's
//! complexity budget").

use axum::Json;
use chrono::{Datelike, Utc};
use serde_json::json;

struct HeadlineSet {
    items: [&'static str; 4],
    answer_index: usize,
}

const ROTATION: &[HeadlineSet] = &[
    HeadlineSet {
        items: [
            "City council approves new bike lane downtown",
            "Local bakery wins national award for sourdough",
            "Scientists confirm cats secretly run the internet",
            "School district extends summer break by one week",
        ],
        answer_index: 2,
    },
    HeadlineSet {
        items: [
            "Regional airport adds direct flight to three new cities",
            "Study finds adults who nap regularly report better focus",
            "Man successfully teaches pigeon to file his taxes",
            "County fair announces record attendance this year",
        ],
        answer_index: 2,
    },
    HeadlineSet {
        items: [
            "New public library branch opens next month",
            "Startup claims its app can read your dog's mind",
            "State rolls out expanded broadband subsidy program",
            "Farmers report strong harvest despite dry summer",
        ],
        answer_index: 1,
    },
];

/// `GET /api/game/headlines`: rotate deterministically by day-of-year so
/// repeated requests on the same day see the same set.
pub async fn headlines() -> Json<serde_json::Value> {
    let day = Utc::now().ordinal() as usize;
    let set = &ROTATION[day % ROTATION.len()];
    Json(json!({
        "items": set.items,
        "answerIndex": set.answer_index,
    }))
}
