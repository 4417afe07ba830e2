use serde::{Deserialize, Serialize};

/// A canned prompt offered to the user before the first message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarterConfig {
    pub label: String,
    pub message: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl StarterConfig {
    fn new(label: &str, message: &str, icon: &str) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
            icon: Some(icon.into()),
        }
    }
}

pub(crate) fn d_starters() -> Vec<StarterConfig> {
    vec![
        StarterConfig::new("Help", "help.", "./public/idea.svg"),
        StarterConfig::new(
            "Create a vivid pie chart of sales by region.",
            "Create a vivid pie chart of sales by region.",
            "./public/learn.svg",
        ),
        StarterConfig::new(
            "Staafdiagram van maandelijkse inkomsten voor wintersportproducten in 2023 met levendige kleuren.",
            "Staafdiagram van maandelijkse inkomsten voor wintersportproducten in 2023 met levendige kleuren.",
            "./public/terminal.svg",
        ),
        StarterConfig::new(
            "Download excel file for sales by category",
            "Download excel file for sales by category",
            "./public/write.svg",
        ),
    ]
}
