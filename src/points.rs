use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Result of a debit attempt. Insufficient balance is an ordinary outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { remaining: i64 },
    InsufficientBalance { balance: i64 },
}

/// Flat key/value store for chatter point balances. The whole map is loaded
/// at startup and rewritten after every mutation. User keys are lowercased.
pub struct PointsStore {
    path: PathBuf,
    points: HashMap<String, i64>,
}

impl PointsStore {
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let points = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(points) => points,
                Err(e) => {
                    log::warn!(
                        "Failed to parse points file {}: {} - starting empty",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self { path, points }
    }

    pub fn balance(&self, user: &str) -> i64 {
        self.points.get(&user.to_lowercase()).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, user: &str, amount: i64) {
        let entry = self.points.entry(user.to_lowercase()).or_insert(0);
        *entry += amount;
        self.save();
    }

    pub fn debit(&mut self, user: &str, amount: i64) -> DebitOutcome {
        let key = user.to_lowercase();
        let balance = self.points.get(&key).copied().unwrap_or(0);
        if balance < amount {
            return DebitOutcome::InsufficientBalance { balance };
        }

        let remaining = balance - amount;
        self.points.insert(key, remaining);
        self.save();
        DebitOutcome::Debited { remaining }
    }

    fn save(&self) {
        match serde_json::to_string_pretty(&self.points) {
            Ok(content) => {
                if let Err(e) = fs::write(&self.path, content) {
                    log::error!("Failed to write points file {}: {}", self.path.display(), e);
                }
            }
            Err(e) => log::error!("Failed to serialize points: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> PointsStore {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("points_{}_{}.json", name, nanos));
        PointsStore::load(path)
    }

    #[test]
    fn test_unknown_user_has_zero_balance() {
        let store = temp_store("zero");
        assert_eq!(store.balance("nobody"), 0);
    }

    #[test]
    fn test_credit_and_debit() {
        let mut store = temp_store("credit");
        store.credit("SomeUser", 60);
        assert_eq!(store.balance("someuser"), 60);

        assert_eq!(
            store.debit("someuser", 50),
            DebitOutcome::Debited { remaining: 10 }
        );
        assert_eq!(
            store.debit("SomeUser", 50),
            DebitOutcome::InsufficientBalance { balance: 10 }
        );
        assert_eq!(store.balance("someuser"), 10);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut store = temp_store("case");
        store.credit("MixedCase", 5);
        assert_eq!(store.balance("mixedcase"), 5);
        assert_eq!(store.balance("MIXEDCASE"), 5);
    }

    #[test]
    fn test_balances_survive_reload() {
        let mut store = temp_store("reload");
        store.credit("keeper", 42);
        let path = store.path.clone();

        let reloaded = PointsStore::load(path.clone());
        assert_eq!(reloaded.balance("keeper"), 42);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("points_corrupt_{}.json", nanos));
        fs::write(&path, "not json at all").unwrap();

        let store = PointsStore::load(path.clone());
        assert_eq!(store.balance("anyone"), 0);

        let _ = fs::remove_file(path);
    }
}
