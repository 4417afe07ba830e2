use ar_domain::config::Config;
use serde::Serialize;

/// A suggested first message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Starter {
    pub label: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

pub fn starters(config: &Config) -> Vec<Starter> {
    config
        .starters
        .iter()
        .filter(|s| !s.message.trim().is_empty())
        .map(|s| Starter {
            label: s.label.clone(),
            message: s.message.clone(),
            icon: s.icon.clone(),
        })
        .collect()
}
