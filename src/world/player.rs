use serde::{Deserialize, Serialize};

/// A player seen on the wire, keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Player {
    pub name: String,
    pub guild: String,
    pub alliance: String,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guild: String::new(),
            alliance: String::new(),
        }
    }

    pub fn with_tags(
        name: impl Into<String>,
        guild: impl Into<String>,
        alliance: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            guild: guild.into(),
            alliance: alliance.into(),
        }
    }

    /// Fill guild and alliance from a richer sighting. Empty values never
    /// overwrite known ones.
    pub fn merge_tags(&mut self, guild: &str, alliance: &str) {
        if !guild.is_empty() {
            self.guild = guild.to_string();
        }
        if !alliance.is_empty() {
            self.alliance = alliance.to_string();
        }
    }

    /// `{alliance} [guild] name`, omitting empty parts.
    pub fn format_name(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.alliance.is_empty() {
            parts.push(format!("{{{}}}", self.alliance));
        }
        if !self.guild.is_empty() {
            parts.push(format!("[{}]", self.guild));
        }
        parts.push(self.name.clone());
        parts.join(" ")
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_name())
    }
}
