//! Initial dashboard state shape

use serde_json::{json, Value};

/// Section shown when the dashboard opens
pub const DEFAULT_SECTION: &str = "overview";

/// Paths persisted across sessions unless configured otherwise
pub const DEFAULT_PERSIST_KEYS: [&str; 4] =
    ["currentGuildId", "ui.theme", "ui.sidebarCollapsed", "filters"];

/// Tree the store starts from and returns to on reset
#[must_use]
pub fn default_dashboard_state() -> Value {
    json!({
        "currentGuildId": null,
        "user": null,
        "guilds": [],
        "ui": {
            "activeSection": DEFAULT_SECTION,
            "loading": false,
            "sidebarCollapsed": false,
            "theme": "dark",
            "modal": null,
            "notifications": []
        },
        "filters": {
            "actions": {
                "type": "all",
                "moderator": "all",
                "dateRange": "7d"
            },
            "appeals": {
                "status": "pending"
            },
            "search": ""
        },
        "actions": [],
        "appeals": [],
        "stats": {},
        "settings": {}
    })
}
