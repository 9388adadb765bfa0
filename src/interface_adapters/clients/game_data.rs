// Static game-data lookups (monster tables), shared read-only by the tick
// and network contexts.

use serde_json::Value;
use std::time::Duration;

/// The immutable game-data blob. The host usually fetches it once per
/// process and hands the same copy to every bot.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    root: Value,
}

impl GameData {
    /// Wraps an already-loaded blob.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// An empty table set; every lookup misses. Useful for tests and for
    /// bots that never meet monsters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetches the blob from an HTTP endpoint serving JSON.
    pub async fn fetch(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let root = http.get(url).send().await?.json::<Value>().await?;
        Ok(Self { root })
    }

    fn monster(&self, species: &str) -> Option<&Value> {
        self.root.get("monsters")?.get(species)
    }

    pub fn monster_speed(&self, species: &str) -> Option<f64> {
        self.monster(species)?.get("speed")?.as_f64()
    }

    pub fn monster_hp(&self, species: &str) -> Option<i64> {
        self.monster(species)?.get("hp")?.as_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookups_hit_the_monster_tables() {
        let data = GameData::from_value(json!({
            "monsters": {
                "bee": { "speed": 11.5, "hp": 60 },
                "crab": { "hp": 150 }
            }
        }));

        assert_eq!(data.monster_speed("bee"), Some(11.5));
        assert_eq!(data.monster_hp("bee"), Some(60));
        assert_eq!(data.monster_speed("crab"), None);
        assert_eq!(data.monster_hp("slime"), None);
    }

    #[test]
    fn empty_tables_miss_everything() {
        assert_eq!(GameData::empty().monster_speed("bee"), None);
    }
}
